//! MQTT link (rumqttc)
//!
//! The rumqttc event loop runs in its own task and only forwards
//! `LinkEvent`s; all state changes happen in the driving loop.
//!
//! Nothing is buffered across a reconnect: requests left over from a
//! dropped link are discarded, and `publish` refuses while the driver
//! knows the link is down.

use crate::connection::{LinkEvent, Publisher};
use crate::error::CnsError;
use async_trait::async_trait;
use parking_lot::Mutex;
use robolink_core::{BrokerConfig, BrokerEndpoint, BrokerScheme};
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS, Transport,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long `close` waits for the DISCONNECT to go out
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Per-session client identifier: `<prefix>-<8 hex digits>`
pub fn client_id(prefix: &str) -> String {
    format!("{}-{:08x}", prefix, rand::random::<u32>())
}

/// Build rumqttc options for an endpoint
pub fn mqtt_options(endpoint: &BrokerEndpoint, config: &BrokerConfig, client_id: &str) -> MqttOptions {
    // websocket transports take the full URL as broker address
    let address = if endpoint.scheme.is_websocket() {
        endpoint.to_string()
    } else {
        endpoint.host.clone()
    };

    let mut options = MqttOptions::new(client_id, address, endpoint.port);
    options.set_clean_session(true);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    let transport = match endpoint.scheme {
        BrokerScheme::Tcp => Transport::Tcp,
        BrokerScheme::Tls => Transport::tls_with_default_config(),
        BrokerScheme::Ws => Transport::Ws,
        BrokerScheme::Wss => Transport::wss_with_default_config(),
    };
    options.set_transport(transport);
    options
}

/// Live MQTT link
pub struct MqttLink {
    client: AsyncClient,
    online: Arc<AtomicBool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl MqttLink {
    /// Start connecting. Emits `ConnectRequested` right away; a broker URL
    /// that cannot be parsed emits `Failed` instead and returns the error.
    pub fn start(config: &BrokerConfig, events: mpsc::Sender<LinkEvent>) -> Result<Self, CnsError> {
        let endpoint = match config.endpoint() {
            Ok(endpoint) => endpoint,
            Err(e) => {
                let _ = events.try_send(LinkEvent::Failed(e.to_string()));
                return Err(e.into());
            }
        };

        let id = client_id(&config.client_id_prefix);
        let options = mqtt_options(&endpoint, config, &id);
        let (client, eventloop) = AsyncClient::new(options, config.request_capacity);

        info!("Connecting to {} as {}", endpoint, id);
        events
            .try_send(LinkEvent::ConnectRequested)
            .map_err(|e| CnsError::Transport(format!("Event queue unavailable: {}", e)))?;

        let online = Arc::new(AtomicBool::new(false));
        let driver = tokio::spawn(drive(
            eventloop,
            events,
            online.clone(),
            config.reconnect_period(),
        ));

        Ok(Self {
            client,
            online,
            driver: Mutex::new(Some(driver)),
        })
    }

    /// Whether the broker has acknowledged the current connection
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

async fn drive(
    mut eventloop: EventLoop,
    events: mpsc::Sender<LinkEvent>,
    online: Arc<AtomicBool>,
    retry: Duration,
) {
    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    online.store(true, Ordering::Release);
                    LinkEvent::Acknowledged
                } else {
                    LinkEvent::LinkLost(format!("connection refused: {:?}", ack.code))
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                online.store(false, Ordering::Release);
                debug!("MQTT disconnect sent, stopping event loop");
                break;
            }
            Ok(other) => {
                debug!("MQTT event: {:?}", other);
                continue;
            }
            Err(ConnectionError::RequestsDone) => {
                online.store(false, Ordering::Release);
                debug!("MQTT client dropped, stopping event loop");
                break;
            }
            Err(e) => {
                online.store(false, Ordering::Release);
                LinkEvent::LinkLost(e.to_string())
            }
        };

        let lost = matches!(event, LinkEvent::LinkLost(_));
        if lost {
            // rumqttc keeps unsent requests for replay after reconnect
            let stale = std::mem::take(&mut eventloop.pending).len();
            if stale > 0 {
                debug!("Dropped {} request(s) queued on the lost link", stale);
            }
        }
        if events.send(event).await.is_err() {
            online.store(false, Ordering::Release);
            break;
        }
        if lost {
            // next poll reconnects
            tokio::time::sleep(retry).await;
        }
    }
}

#[async_trait]
impl Publisher for MqttLink {
    fn publish(&self, channel: &str, payload: &str) -> Result<(), CnsError> {
        if !self.is_online() {
            return Err(CnsError::NotConnected);
        }
        self.client
            .try_publish(channel, QoS::AtMostOnce, false, payload.as_bytes().to_vec())?;
        Ok(())
    }

    async fn close(&self) {
        let was_online = self.online.swap(false, Ordering::AcqRel);
        let driver = self.driver.lock().take();
        let Some(mut driver) = driver else {
            return;
        };

        if was_online {
            if let Err(e) = self.client.try_disconnect() {
                warn!("MQTT disconnect request failed: {}", e);
            }
            if tokio::time::timeout(DISCONNECT_GRACE, &mut driver).await.is_ok() {
                return;
            }
            warn!("MQTT disconnect not confirmed within {:?}", DISCONNECT_GRACE);
        }
        driver.abort();
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }
    }
}
