// ── Message rendering ──

use std::fmt::Write as _;
use std::time::Duration;

use meshwatch_api::{Message, MessageKind};

use crate::model::{DeviceSnapshot, TransitionEvent, TransitionKind};
use crate::monitor::CyclePhase;

/// Title and body for one transition.
pub fn transition_message(event: &TransitionEvent) -> Message {
    let name = &event.display_name;
    let (kind, title, status) = match event.kind {
        TransitionKind::FirstSeen => (MessageKind::Info, "🆕 New device", format!("{name} is online")),
        TransitionKind::BecameOnline => (
            MessageKind::Success,
            "🟢 Device online",
            format!("{name} is now online"),
        ),
        TransitionKind::BecameOffline => (
            MessageKind::Failure,
            "🔴 Device offline",
            format!("{name} is now offline"),
        ),
    };
    let body = format!("{status}\nat {}", event.timestamp.to_rfc3339());
    Message::new(kind, title, body)
}

/// Startup summary of the whole roster.
pub fn status_report(roster: &[DeviceSnapshot], poll_interval: Duration) -> Message {
    let mut online: Vec<&str> = Vec::new();
    let mut offline: Vec<&str> = Vec::new();
    for snap in roster {
        if snap.online {
            online.push(&snap.display_name);
        } else {
            offline.push(&snap.display_name);
        }
    }
    online.sort_unstable();
    offline.sort_unstable();

    let mut body = format!("Total devices: {}\n", roster.len());
    push_section(&mut body, "🟢 Online", &online);
    push_section(&mut body, "🔴 Offline", &offline);
    let _ = write!(
        body,
        "\n🔍 Watching for changes every {}s",
        poll_interval.as_secs()
    );

    Message::new(MessageKind::Info, "📊 Mesh status report", body)
}

fn push_section(body: &mut String, heading: &str, names: &[&str]) {
    let _ = writeln!(body, "\n{heading} ({}):", names.len());
    if names.is_empty() {
        body.push_str("  (none)\n");
    }
    for name in names {
        let _ = writeln!(body, "  • {name}");
    }
}

/// Alert sent when cycles start failing.
pub fn failure_alert(phase: CyclePhase, error: &str) -> Message {
    Message::new(
        MessageKind::Warning,
        "⚠️ Monitor error",
        format!("Cycle failed while {phase}: {error}"),
    )
}
