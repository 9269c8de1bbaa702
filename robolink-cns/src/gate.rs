//! Publish gate: change-or-heartbeat decision policy

use crate::connection::ConnectionHandle;
use crate::error::CnsError;
use crate::payload::PayloadRenderer;
use robolink_core::{ChannelName, Classification, GateConfig, Label};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Last successfully emitted label and when it went out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateState {
    last_label: Option<Label>,
    last_emit: Option<Instant>,
}

impl GateState {
    /// Emit on a label change or once `interval` has strictly elapsed.
    pub fn should_emit(&self, label: &Label, now: Instant, interval: Duration) -> bool {
        match (&self.last_label, self.last_emit) {
            (Some(last), Some(at)) => {
                last != label || now.saturating_duration_since(at) > interval
            }
            _ => true,
        }
    }

    pub fn record(&mut self, label: Label, now: Instant) {
        self.last_label = Some(label);
        self.last_emit = Some(now);
    }

    pub fn last_label(&self) -> Option<&Label> {
        self.last_label.as_ref()
    }

    pub fn last_emit(&self) -> Option<Instant> {
        self.last_emit
    }
}

/// What the gate did with one observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Payload handed to the transport
    Sent(String),
    /// Same label inside the heartbeat interval
    Suppressed,
    /// Link not connected; nothing attempted
    Disconnected,
    /// No command maps to the label
    Unmapped,
    /// Transport refused the hand-off
    Failed(String),
}

pub struct PublishGate {
    state: GateState,
    interval: Duration,
    renderer: PayloadRenderer,
    channel: ChannelName,
}

impl PublishGate {
    pub fn new(interval: Duration, renderer: PayloadRenderer, channel: ChannelName) -> Self {
        Self {
            state: GateState::default(),
            interval,
            renderer,
            channel,
        }
    }

    pub fn from_config(config: &GateConfig, channel: ChannelName) -> Self {
        Self::new(config.interval(), PayloadRenderer::from_config(config), channel)
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Offer the top classification of a frame observed at `now`.
    ///
    /// Gate state changes only when a payload reached a connected transport.
    pub fn offer(
        &mut self,
        classification: &Classification,
        now: Instant,
        connection: &ConnectionHandle,
    ) -> GateOutcome {
        if !connection.is_connected() {
            return GateOutcome::Disconnected;
        }

        let label = classification.normalized_label();
        if !self.state.should_emit(&label, now, self.interval) {
            return GateOutcome::Suppressed;
        }

        let payload = match self.renderer.render(&label, classification.confidence) {
            Some(payload) => payload,
            None => {
                debug!("No command for label {}", label);
                return GateOutcome::Unmapped;
            }
        };

        match connection.publish(self.channel.as_str(), &payload) {
            Ok(()) => {
                debug!("Published {} to {}", payload, self.channel);
                self.state.record(label, now);
                GateOutcome::Sent(payload)
            }
            Err(CnsError::NotConnected) => {
                // the transport saw the drop before the loop did
                debug!("Link down, {} not sent", payload);
                GateOutcome::Disconnected
            }
            Err(e) => {
                warn!("Publish to {} failed: {}", self.channel, e);
                GateOutcome::Failed(e.to_string())
            }
        }
    }
}
