//! Pub/sub-side ingest: the routing loop.
//!
//! # Responsibilities
//! - Subscribe to the full pub/sub channel space
//! - Feed every delivered message through the router
//!
//! # Design Decisions
//! - Routing for each message runs on its own spawned task, so a
//!   slow shell dispatch on one message never blocks delivery of
//!   others
//! - A lost pub/sub connection is re-established with backoff; the
//!   messages published meanwhile are gone, which is the pub/sub
//!   contract, not a bridge defect

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::broadcast;

use crate::bridge::backoff::reconnect_backoff;
use crate::routing::router::{RouteOutcome, Router};

const RECONNECT_BASE_MS: u64 = 500;
const RECONNECT_MAX_MS: u64 = 30_000;

/// Subscribes to the channel space and routes every message.
pub struct RoutingIngest {
    client: redis::Client,
    router: Arc<Router>,
    /// Caller context variables supplied on every message.
    extra: Vec<(String, String)>,
}

impl RoutingIngest {
    pub fn new(client: redis::Client, router: Arc<Router>, extra: Vec<(String, String)>) -> Self {
        Self {
            client,
            router,
            extra,
        }
    }

    /// Run until shutdown, reconnecting on failure.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut failures: u32 = 0;
        loop {
            match self.subscribe_and_route(&mut shutdown).await {
                Ok(()) => break,
                Err(err) => {
                    failures = failures.saturating_add(1);
                    let delay = reconnect_backoff(failures, RECONNECT_BASE_MS, RECONNECT_MAX_MS);
                    tracing::warn!(
                        error = %err,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "pub/sub connection lost, backing off"
                    );
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
        tracing::info!("routing ingest stopped");
    }

    /// One subscription session. Returns `Ok(())` on shutdown and an
    /// error when the connection drops.
    async fn subscribe_and_route(
        &self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), redis::RedisError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe("*").await?;
        tracing::info!("subscribed to channel space");

        let mut messages = pubsub.on_message();
        loop {
            let message = tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                message = messages.next() => message,
            };

            let Some(message) = message else {
                // Stream ended: the connection is gone.
                return Err(redis::RedisError::from(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "pub/sub stream closed",
                )));
            };

            let channel = message.get_channel_name().to_string();
            let payload: Vec<u8> = match message.get_payload() {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::warn!(channel = %channel, error = %err, "unreadable payload");
                    continue;
                }
            };

            let router = Arc::clone(&self.router);
            let extra = self.extra.clone();
            tokio::spawn(async move {
                match router.route_message(&channel, &payload, &extra).await {
                    Ok(outcomes) => log_outcomes(&channel, &outcomes),
                    Err(err) => {
                        // Store unreachable: this cycle is skipped,
                        // the next message tries again.
                        tracing::warn!(channel = %channel, error = %err, "routing cycle skipped");
                    }
                }
            });
        }
    }
}

fn log_outcomes(channel: &str, outcomes: &[RouteOutcome]) {
    if outcomes.is_empty() {
        return;
    }
    let dispatched = outcomes.iter().filter(|o| o.is_dispatched()).count();
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, RouteOutcome::DispatchFailed { .. }))
        .count();
    let invalid = outcomes
        .iter()
        .filter(|o| matches!(o, RouteOutcome::Invalid { .. }))
        .count();
    tracing::debug!(
        channel = %channel,
        total = outcomes.len(),
        dispatched,
        failed,
        invalid,
        "message routed"
    );
}
