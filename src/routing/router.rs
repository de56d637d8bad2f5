//! Per-message route evaluation.
//!
//! # Responsibilities
//! - Load the full stored rule set for each inbound message
//! - Parse, match, substitute, and dispatch each route
//! - Report one outcome per route record, in store order
//!
//! # Design Decisions
//! - Routes are re-parsed from stored text on every evaluation, so
//!   routing always reflects current store contents (stale reads
//!   self-heal on the next message)
//! - One bad route never blocks the others; parse and dispatch
//!   failures become per-route outcome values
//! - Source matching is an exact string comparison, not a glob;
//!   explicit `NotMatched` rather than silent skip in the outcome
//!   list so callers can see why nothing fired

use std::sync::Arc;

use crate::dispatch::{DispatchError, Dispatcher};
use crate::routing::grammar::{self, SyntaxError};
use crate::routing::substitute::SubstitutionContext;
use crate::store::{RouteStore, StoreError};

/// What happened to one stored route for one inbound message.
#[derive(Debug)]
pub enum RouteOutcome {
    /// Source matched and the sink effect completed.
    Dispatched { route: String },
    /// Source matched but the sink effect failed.
    DispatchFailed { route: String, error: DispatchError },
    /// Source did not match the inbound channel.
    NotMatched { route: String },
    /// The stored text does not parse; the record is skipped.
    Invalid { route: String, error: SyntaxError },
}

impl RouteOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, RouteOutcome::Dispatched { .. })
    }
}

/// Evaluates every stored route against each inbound message.
pub struct Router {
    store: Arc<dyn RouteStore>,
    dispatcher: Dispatcher,
}

impl Router {
    pub fn new(store: Arc<dyn RouteStore>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Evaluate one inbound message against the full rule set.
    ///
    /// `extra` supplies caller context variables (connection
    /// parameters and the like); the fixed `$message`/`$channel`
    /// pair is overlaid last and cannot be shadowed.
    ///
    /// Returns one outcome per stored route, in store iteration
    /// order. An empty store yields an empty list. A store failure
    /// means this cycle is skipped; the caller logs it and waits for
    /// the next message.
    pub async fn route_message(
        &self,
        channel: &str,
        payload: &[u8],
        extra: &[(String, String)],
    ) -> Result<Vec<RouteOutcome>, StoreError> {
        let records = self.store.list().await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let payload_text = String::from_utf8_lossy(payload);
        let ctx = SubstitutionContext::for_message(channel, &payload_text, extra);

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            let text = record.text.trim();
            if text.starts_with('#') {
                // Disabled line: not a route, no outcome.
                continue;
            }

            let route = match grammar::parse(text) {
                Ok(route) => route,
                Err(error) => {
                    tracing::warn!(route = %text, %error, "stored route does not parse");
                    outcomes.push(RouteOutcome::Invalid {
                        route: text.to_string(),
                        error,
                    });
                    continue;
                }
            };

            if route.source != channel {
                outcomes.push(RouteOutcome::NotMatched {
                    route: text.to_string(),
                });
                continue;
            }

            match self.dispatcher.dispatch(&route, &ctx).await {
                Ok(()) => {
                    tracing::debug!(route = %text, channel = %channel, "dispatched");
                    outcomes.push(RouteOutcome::Dispatched {
                        route: text.to_string(),
                    });
                }
                Err(error) => {
                    tracing::warn!(route = %text, channel = %channel, %error, "dispatch failed");
                    outcomes.push(RouteOutcome::DispatchFailed {
                        route: text.to_string(),
                        error,
                    });
                }
            }
        }

        Ok(outcomes)
    }
}
