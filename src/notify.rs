use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn new(severity: Severity, title: impl Into<String>, description: impl Into<String>) -> Self {
        Notification {
            severity,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Write-only sink for messages meant for the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sends notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Info | Severity::Success => {
                info!(severity = ?n.severity, title = %n.title, "{}", n.description)
            }
            Severity::Warning => warn!(title = %n.title, "{}", n.description),
            Severity::Destructive => error!(title = %n.title, "{}", n.description),
        }
    }
}
