//! weft: rule-driven message bridge.
//!
//! Routes messages between a Redis pub/sub channel space and an MQTT
//! topic space according to one-line textual rules, and provisions
//! nearby wireless devices that match configured name patterns.
//!
//! # Architecture Overview
//!
//! ```text
//!   MQTT broker ──subscribe #──▶ bridge::broker ──mirror──▶ Redis pub/sub
//!                                                              │
//!                                              psubscribe *    ▼
//!                                                     bridge::ingest
//!                                                              │
//!                    store (routes:<host>:<port>) ──▶ routing::router
//!                                                              │
//!                               parse ─ match ─ substitute ────┤
//!                                                              ▼
//!                                                         dispatch
//!                                      publish / key write / shell call
//!
//!   scan timer ──▶ wireless::associate ──▶ join / lease / PUT /config
//! ```

// Core subsystems
pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod routing;
pub mod store;
pub mod wireless;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::BridgeConfig;
pub use lifecycle::Shutdown;
pub use routing::{RouteOutcome, Router};
