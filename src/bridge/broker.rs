//! Broker-side ingest.
//!
//! # Responsibilities
//! - Subscribe to the broker's full topic space
//! - Mirror each broker publish onto the pub/sub channel of the same
//!   name, verbatim
//!
//! # Design Decisions
//! - The mirror is the ingest path: routing happens on the pub/sub
//!   side, so anything arriving from the broker becomes routable the
//!   moment it lands
//! - Broker connection errors back off and retry forever; they never
//!   crash the process
//! - Each mirror write runs on its own task so a slow store never
//!   stalls the broker event loop (and its keep-alive)

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::broadcast;

use crate::bridge::backoff::reconnect_backoff;
use crate::config::schema::BrokerConfig;
use crate::dispatch::Transport;

const RECONNECT_BASE_MS: u64 = 500;
const RECONNECT_MAX_MS: u64 = 30_000;

/// Mirrors the broker topic space into the pub/sub channel space.
pub struct BrokerBridge {
    config: BrokerConfig,
    transport: Arc<dyn Transport>,
}

impl BrokerBridge {
    pub fn new(config: BrokerConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Run until shutdown. Never returns an error: connection
    /// failures are logged and retried with backoff.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs));

        let (client, mut event_loop) = AsyncClient::new(options, 64);

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            client_id = %self.config.client_id,
            "broker bridge starting"
        );

        let mut failures: u32 = 0;
        loop {
            let event = tokio::select! {
                _ = shutdown.recv() => break,
                event = event_loop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    failures = 0;
                    tracing::info!("broker connected, subscribing to full topic space");
                    // Subscriptions do not survive a reconnect, so
                    // re-issue on every ConnAck.
                    if let Err(err) = client.subscribe("#", QoS::AtMostOnce).await {
                        tracing::warn!(error = %err, "subscribe failed");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let topic = publish.topic.clone();
                    let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                    let transport = Arc::clone(&self.transport);
                    tokio::spawn(async move {
                        if let Err(err) = transport.publish(&topic, &payload).await {
                            tracing::warn!(topic = %topic, error = %err, "mirror publish failed");
                        }
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    failures = failures.saturating_add(1);
                    let delay = reconnect_backoff(failures, RECONNECT_BASE_MS, RECONNECT_MAX_MS);
                    tracing::warn!(
                        error = %err,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "broker connection error, backing off"
                    );
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::info!("broker bridge stopped");
    }
}
