// Session assembly: model → capture → link → loop

use anyhow::Context;
use robolink_cns::{ConnectionHandle, MqttLink, Publisher, Session, SessionReport};
use robolink_core::{Classifier, ModelConfig, RobolinkConfig, Status, StatusReporter};
use robolink_eye::{open_source, ModelBundle, ModelManager, OnnxClassifier};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Queue between the MQTT driver task and the loop
const LINK_EVENT_CAPACITY: usize = 64;

/// Upper bound on waiting for the final status line
const PRINTER_DRAIN: Duration = Duration::from_secs(1);

pub async fn fetch_bundle(config: &ModelConfig) -> anyhow::Result<ModelBundle> {
    let manager = ModelManager::new(Arc::new(config.clone()));
    manager.fetch().await.context("failed to fetch model bundle")
}

async fn load_classifier(config: &ModelConfig) -> anyhow::Result<Box<dyn Classifier>> {
    let bundle = fetch_bundle(config).await?;
    let classifier = OnnxClassifier::load(&bundle, config).context("failed to load classifier")?;
    Ok(Box::new(classifier))
}

/// Emit the current status right away, then every change until all
/// reporters are dropped. The last value is always emitted.
fn spawn_status_printer<F>(status: &StatusReporter, mut emit: F) -> JoinHandle<()>
where
    F: FnMut(&Status) + Send + 'static,
{
    let mut updates = status.subscribe();
    let initial = updates.borrow_and_update().clone();
    emit(&initial);
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let status = updates.borrow_and_update().clone();
            emit(&status);
        }
    })
}

fn print_status(status: &Status) {
    println!("Status: {}", status);
}

/// Drop the last reporter and let the printer drain
async fn finish_status(status: StatusReporter, mut printer: JoinHandle<()>) {
    drop(status);
    if tokio::time::timeout(PRINTER_DRAIN, &mut printer).await.is_err() {
        warn!("Status printer still running, stopping it");
        printer.abort();
    }
}

/// Run one session until Ctrl-C.
pub async fn run(config: RobolinkConfig) -> anyhow::Result<SessionReport> {
    let status = StatusReporter::new();
    let printer = spawn_status_printer(&status, print_status);

    status.set(Status::LoadingModel);
    let classifier = match load_classifier(&config.model).await {
        Ok(classifier) => classifier,
        Err(e) => {
            status.set(Status::Error(format!("{:#}", e)));
            finish_status(status, printer).await;
            return Err(e);
        }
    };

    status.set(Status::StartingCapture);
    let source = match open_source(&config.capture).await {
        Ok(source) => source,
        Err(e) => {
            status.set(Status::Error(e.to_string()));
            finish_status(status, printer).await;
            return Err(e).context("failed to open frame source");
        }
    };

    let (events, events_rx) = mpsc::channel(LINK_EVENT_CAPACITY);
    let publisher: Option<Box<dyn Publisher>> = match MqttLink::start(&config.broker, events) {
        Ok(link) => Some(Box::new(link)),
        Err(e) => {
            // reported through the event queue; the loop keeps running without a link
            warn!("MQTT link not started: {}", e);
            None
        }
    };
    let connection = ConnectionHandle::new(status.clone(), publisher);
    let session = match Session::new(&config, source, classifier, connection, events_rx) {
        Ok(session) => session,
        Err(e) => {
            status.set(Status::Error(e.to_string()));
            finish_status(status, printer).await;
            return Err(e).context("failed to set up session");
        }
    };

    let (shutdown, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping");
            let _ = shutdown.send(true);
        }
    });

    let report = session.run(shutdown_rx).await;
    finish_status(status, printer).await;
    Ok(report)
}
