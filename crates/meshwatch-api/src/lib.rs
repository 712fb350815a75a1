// meshwatch-api: HTTP boundary for the mesh roster directory and notification endpoints

pub mod error;
pub mod notify;
pub mod roster;
pub mod transport;

pub use error::Error;
pub use notify::{Endpoint, EndpointKind, Message, MessageKind, NotifyClient};
pub use roster::{RosterClient, RosterDevice};
pub use transport::{TlsMode, TransportConfig};
