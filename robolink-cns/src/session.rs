//! Driving loop: frame tick → predict → gate

use crate::connection::{ConnectionHandle, LinkEvent};
use crate::error::CnsError;
use crate::gate::{GateOutcome, PublishGate};
use robolink_core::{top_classification, Classifier, FrameSource, RobolinkConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Counters collected over one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub frames: u64,
    pub capture_failures: u64,
    pub inference_failures: u64,
    pub published: u64,
    pub suppressed: u64,
    pub dropped_disconnected: u64,
    pub unmapped: u64,
    pub publish_failures: u64,
}

impl SessionReport {
    fn record(&mut self, outcome: &GateOutcome) {
        match outcome {
            GateOutcome::Sent(_) => self.published += 1,
            GateOutcome::Suppressed => self.suppressed += 1,
            GateOutcome::Disconnected => self.dropped_disconnected += 1,
            GateOutcome::Unmapped => self.unmapped += 1,
            GateOutcome::Failed(_) => self.publish_failures += 1,
        }
    }
}

/// One classification-to-command session.
///
/// Owns the gate and the connection handle; link events are applied
/// between steps, never while a step is in flight.
pub struct Session {
    source: Box<dyn FrameSource>,
    classifier: Box<dyn Classifier>,
    gate: PublishGate,
    connection: ConnectionHandle,
    events: mpsc::Receiver<LinkEvent>,
    tick: Duration,
    inference_timeout: Option<Duration>,
    report: SessionReport,
}

impl Session {
    pub fn new(
        config: &RobolinkConfig,
        source: Box<dyn FrameSource>,
        classifier: Box<dyn Classifier>,
        connection: ConnectionHandle,
        events: mpsc::Receiver<LinkEvent>,
    ) -> Result<Self, CnsError> {
        config.gate.validate().map_err(CnsError::Config)?;
        config.session.validate().map_err(CnsError::Config)?;
        let channel = config.broker.channel()?;

        Ok(Self {
            source,
            classifier,
            gate: PublishGate::from_config(&config.gate, channel),
            connection,
            events,
            tick: config.session.tick_interval(),
            inference_timeout: config.session.inference_timeout(),
            report: SessionReport::default(),
        })
    }

    /// Run until `shutdown` turns true (or its sender goes away).
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SessionReport {
        info!(
            "Session started: {} → {} every {:?}",
            self.source.describe(),
            self.gate.channel(),
            self.tick
        );

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut events_open = true;

        while !*shutdown.borrow() {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                event = self.events.recv(), if events_open => match event {
                    Some(event) => {
                        self.connection.apply(event);
                    }
                    None => {
                        debug!("Link event queue closed");
                        events_open = false;
                    }
                },
                _ = ticker.tick() => self.step().await,
            }
        }

        self.connection.close().await;
        info!("Session stopped: {:?}", self.report);
        self.report
    }

    async fn step(&mut self) {
        let frame = match self.source.next_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                self.report.capture_failures += 1;
                warn!("Frame capture failed: {}", e);
                return;
            }
        };
        self.report.frames += 1;

        let prediction = match self.inference_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.classifier.predict(&frame)).await {
                Ok(result) => result,
                Err(_) => Err(robolink_core::Error::Inference(format!(
                    "prediction timed out after {:?}",
                    limit
                ))),
            },
            None => self.classifier.predict(&frame).await,
        };

        let classes = match prediction {
            Ok(classes) => classes,
            Err(e) => {
                self.report.inference_failures += 1;
                warn!("Prediction failed: {}", e);
                return;
            }
        };

        let Some(top) = top_classification(&classes) else {
            self.report.inference_failures += 1;
            warn!("Classifier returned no classes");
            return;
        };

        let outcome = self.gate.offer(top, Instant::now(), &self.connection);
        debug!("{} ({:.3}) → {:?}", top.label, top.confidence, outcome);
        self.report.record(&outcome);
    }
}
