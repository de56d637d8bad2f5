//! Durable route storage.

pub mod routes;

pub use routes::{
    content_hash, is_disabled_line, removal_hash, RedisRouteStore, RouteRecord, RouteStore,
    StoreError,
};
