// ── Durable state store ──
//
// Single-writer JSON record of every device ever seen. The poll loop owns
// the only `StateStore`; nothing else writes the file.

mod file;
mod state_store;

pub use state_store::StateStore;
