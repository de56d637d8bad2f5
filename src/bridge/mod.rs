//! Transport ingest: broker mirror and pub/sub routing loop.

pub mod backoff;
pub mod broker;
pub mod ingest;

pub use broker::BrokerBridge;
pub use ingest::RoutingIngest;
