use tracing::{info, warn};

use crate::engine::policy::BlockReason;

/// Receiver for the engine's asynchronous "enforce now" pushes
///
/// Implementations must not block: a blocking decision never waits on
/// delivery, and a failed delivery is not retried.
pub trait EnforcementSink: Send + Sync {
    /// Interrupt whatever surface currently renders the site
    fn enforce(&self, site: &str, reason: BlockReason);

    /// Broadcast an administrative announcement (e.g. emergency block)
    fn announce(&self, title: &str, message: &str);
}

/// Desktop-notification sink
pub struct NotifySink;

impl EnforcementSink for NotifySink {
    fn enforce(&self, site: &str, reason: BlockReason) {
        warn!("Enforcing block on {}: {}", site, reason);
        send_system_notification("Site blocked", &format!("Access to {} is blocked: {}", site, reason));
    }

    fn announce(&self, title: &str, message: &str) {
        info!("{}: {}", title, message);
        send_system_notification(title, message);
    }
}

/// Send a system notification (platform-specific), fire-and-forget
fn send_system_notification(title: &str, message: &str) {
    #[cfg(target_os = "linux")]
    {
        use std::process::Command;
        let _ = Command::new("notify-send")
            .arg(title)
            .arg(message)
            .arg("--urgency=critical")
            .arg("--icon=dialog-warning")
            .spawn();
    }

    #[cfg(target_os = "macos")]
    {
        use std::process::Command;
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            message, title
        );
        let _ = Command::new("osascript").arg("-e").arg(&script).spawn();
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        warn!("Notification: {} - {}", title, message);
    }
}
