//! robolink-cns: Publish Gate for robolink
//!
//! Turns ranked classifications into rate-limited robot commands:
//! - `connection`: link state machine fed by transport events
//! - `mqtt`: rumqttc-backed transport
//! - `payload` / `gate`: change-or-heartbeat publish decisions
//! - `session`: the cancellable frame loop tying it all together

pub mod connection;
pub mod error;
pub mod gate;
pub mod mqtt;
pub mod payload;
pub mod session;

pub use connection::{ConnectionHandle, ConnectionState, LinkEvent, Publisher};
pub use error::CnsError;
pub use gate::{GateOutcome, GateState, PublishGate};
pub use mqtt::{client_id, MqttLink};
pub use payload::PayloadRenderer;
pub use session::{Session, SessionReport};
