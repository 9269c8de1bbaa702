//! Operator-facing status line

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Human-readable session status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Nothing started yet
    Idle,
    /// Model bundle is being fetched and loaded
    LoadingModel,
    /// Frame source is being opened
    StartingCapture,
    /// First broker connect in progress
    Connecting,
    /// Broker handshake acknowledged
    Connected,
    /// Link lost, retrying on the fixed interval
    Reconnecting,
    /// Transport error that stops the link
    LinkError(String),
    /// Startup failure (model or capture)
    Error(String),
    /// Last payload handed to the broker
    Sent(String),
}

impl Default for Status {
    fn default() -> Self {
        Status::Idle
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "Idle"),
            Status::LoadingModel => write!(f, "Loading model..."),
            Status::StartingCapture => write!(f, "Starting camera..."),
            Status::Connecting => write!(f, "Connecting MQTT..."),
            Status::Connected => write!(f, "MQTT connected"),
            Status::Reconnecting => write!(f, "Reconnecting MQTT..."),
            Status::LinkError(msg) => write!(f, "MQTT error: {}", msg),
            Status::Error(msg) => write!(f, "Error: {}", msg),
            Status::Sent(payload) => write!(f, "Sent: {}", payload),
        }
    }
}

/// Publishes status changes on a watch channel.
///
/// Cloning is cheap; every clone feeds the same channel.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    sender: Arc<watch::Sender<Status>>,
}

impl StatusReporter {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Status::Idle);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Replace the current status. Repeating the same status is a no-op.
    pub fn set(&self, status: Status) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status.clone();
                true
            }
        });
        if changed {
            info!(status = %status, "status changed");
        }
    }

    pub fn current(&self) -> Status {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.sender.subscribe()
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Idle.to_string(), "Idle");
        assert_eq!(Status::Connected.to_string(), "MQTT connected");
        assert_eq!(Status::Reconnecting.to_string(), "Reconnecting MQTT...");
        assert_eq!(Status::Sent("F".to_string()).to_string(), "Sent: F");
        assert_eq!(
            Status::LinkError("refused".to_string()).to_string(),
            "MQTT error: refused"
        );
    }

    #[test]
    fn test_reporter_starts_idle() {
        let reporter = StatusReporter::new();
        assert_eq!(reporter.current(), Status::Idle);
    }

    #[tokio::test]
    async fn test_reporter_notifies_subscribers() {
        let reporter = StatusReporter::new();
        let mut rx = reporter.subscribe();

        reporter.set(Status::Connecting);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Status::Connecting);

        // Same value again does not wake the receiver
        reporter.set(Status::Connecting);
        assert!(!rx.has_changed().unwrap());

        reporter.set(Status::Sent("S".to_string()));
        assert!(rx.has_changed().unwrap());
    }
}
