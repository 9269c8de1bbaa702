//! Connection state machine
//!
//! Transport callbacks arrive as `LinkEvent`s on a queue and are applied
//! here, on the driving loop's own context. Publishing is only attempted
//! while `Connected`.

use crate::error::CnsError;
use async_trait::async_trait;
use robolink_core::{Status, StatusReporter};
use std::fmt;
use tracing::{debug, info, warn};

/// Link state as seen by the driving loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not linked; carries the error that stopped the link, if any
    Disconnected(Option<String>),
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected(None) => write!(f, "disconnected"),
            ConnectionState::Disconnected(Some(err)) => write!(f, "disconnected ({})", err),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Transport notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A connect attempt was started
    ConnectRequested,
    /// The broker acknowledged the handshake
    Acknowledged,
    /// The link dropped; the transport retries on its own
    LinkLost(String),
    /// The link cannot be established at all
    Failed(String),
}

/// Outbound side of a transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Hand one message to the transport (at-most-once, not retained).
    /// Fails with `NotConnected` when the transport knows its link is down.
    fn publish(&self, channel: &str, payload: &str) -> Result<(), CnsError>;

    /// Shut the transport down, giving it a chance to say goodbye to the broker
    async fn close(&self) {}
}

/// Owns the link state and the transport handle.
pub struct ConnectionHandle {
    state: ConnectionState,
    publisher: Option<Box<dyn Publisher>>,
    status: StatusReporter,
}

impl ConnectionHandle {
    pub fn new(status: StatusReporter, publisher: Option<Box<dyn Publisher>>) -> Self {
        Self {
            state: ConnectionState::Disconnected(None),
            publisher,
            status,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Apply one transport event. Returns whether the state changed.
    pub fn apply(&mut self, event: LinkEvent) -> bool {
        let next = match (&self.state, event) {
            (ConnectionState::Disconnected(_), LinkEvent::ConnectRequested) => {
                self.status.set(Status::Connecting);
                ConnectionState::Connecting
            }
            (ConnectionState::Connecting, LinkEvent::Acknowledged) => {
                info!("MQTT connected");
                self.status.set(Status::Connected);
                ConnectionState::Connected
            }
            (ConnectionState::Connected | ConnectionState::Connecting, LinkEvent::LinkLost(reason)) => {
                warn!("MQTT link lost: {}", reason);
                self.status.set(Status::Reconnecting);
                ConnectionState::Connecting
            }
            (_, LinkEvent::Failed(reason)) => {
                warn!("MQTT link failed: {}", reason);
                self.status.set(Status::LinkError(reason.clone()));
                ConnectionState::Disconnected(Some(reason))
            }
            (state, event) => {
                debug!("Ignoring {:?} while {}", event, state);
                return false;
            }
        };

        let changed = next != self.state;
        self.state = next;
        changed
    }

    /// Publish while connected. A successful hand-off updates the status line.
    pub fn publish(&self, channel: &str, payload: &str) -> Result<(), CnsError> {
        if !self.is_connected() {
            return Err(CnsError::NotConnected);
        }
        let publisher = self.publisher.as_ref().ok_or(CnsError::NotConnected)?;
        publisher.publish(channel, payload)?;
        self.status.set(Status::Sent(payload.to_string()));
        Ok(())
    }

    /// Close the transport. Further events leave the handle disconnected.
    pub async fn close(&mut self) {
        self.state = ConnectionState::Disconnected(None);
        if let Some(publisher) = self.publisher.take() {
            publisher.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ConnectionHandle, StatusReporter) {
        let status = StatusReporter::new();
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().returning(|_, _| Ok(()));
        publisher.expect_close().returning(|| ());
        (ConnectionHandle::new(status.clone(), Some(Box::new(publisher))), status)
    }

    #[test]
    fn test_connect_sequence() {
        let (mut conn, status) = handle();
        assert!(!conn.is_connected());

        assert!(conn.apply(LinkEvent::ConnectRequested));
        assert_eq!(conn.state(), &ConnectionState::Connecting);
        assert_eq!(status.current(), Status::Connecting);

        assert!(conn.apply(LinkEvent::Acknowledged));
        assert!(conn.is_connected());
        assert_eq!(status.current(), Status::Connected);

        // a second acknowledgement changes nothing
        assert!(!conn.apply(LinkEvent::Acknowledged));
        assert!(conn.is_connected());
    }

    #[test]
    fn test_link_lost_and_recovery() {
        let (mut conn, status) = handle();
        conn.apply(LinkEvent::ConnectRequested);
        conn.apply(LinkEvent::Acknowledged);

        assert!(conn.apply(LinkEvent::LinkLost("timeout".to_string())));
        assert_eq!(conn.state(), &ConnectionState::Connecting);
        assert_eq!(status.current(), Status::Reconnecting);

        // repeated loss while retrying stays in Connecting
        assert!(!conn.apply(LinkEvent::LinkLost("refused".to_string())));

        conn.apply(LinkEvent::Acknowledged);
        assert!(conn.is_connected());
        assert_eq!(status.current(), Status::Connected);
    }

    #[test]
    fn test_failure_from_any_state() {
        for setup in [vec![], vec![LinkEvent::ConnectRequested], vec![LinkEvent::ConnectRequested, LinkEvent::Acknowledged]] {
            let (mut conn, status) = handle();
            for event in setup {
                conn.apply(event);
            }
            conn.apply(LinkEvent::Failed("bad url".to_string()));
            assert_eq!(
                conn.state(),
                &ConnectionState::Disconnected(Some("bad url".to_string()))
            );
            assert_eq!(status.current(), Status::LinkError("bad url".to_string()));
        }
    }

    #[test]
    fn test_events_ignored_while_disconnected() {
        let (mut conn, status) = handle();
        assert!(!conn.apply(LinkEvent::Acknowledged));
        assert!(!conn.apply(LinkEvent::LinkLost("x".to_string())));
        assert_eq!(conn.state(), &ConnectionState::Disconnected(None));
        assert_eq!(status.current(), Status::Idle);
    }

    #[test]
    fn test_publish_requires_connection() {
        let status = StatusReporter::new();
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .withf(|channel, payload| channel == "rc/car/cmd" && payload == "F")
            .times(1)
            .returning(|_, _| Ok(()));
        let mut conn = ConnectionHandle::new(status.clone(), Some(Box::new(publisher)));

        assert!(matches!(conn.publish("rc/car/cmd", "F"), Err(CnsError::NotConnected)));

        conn.apply(LinkEvent::ConnectRequested);
        conn.apply(LinkEvent::Acknowledged);
        assert!(conn.publish("rc/car/cmd", "F").is_ok());
        assert_eq!(status.current(), Status::Sent("F".to_string()));
    }

    #[tokio::test]
    async fn test_close_disconnects() {
        let status = StatusReporter::new();
        let mut publisher = MockPublisher::new();
        publisher.expect_close().times(1).returning(|| ());
        let mut conn = ConnectionHandle::new(status, Some(Box::new(publisher)));
        conn.apply(LinkEvent::ConnectRequested);
        conn.apply(LinkEvent::Acknowledged);

        conn.close().await;
        assert!(!conn.is_connected());
        assert!(conn.publish("rc/car/cmd", "F").is_err());

        // the transport is closed once
        conn.close().await;
    }
}
