//! Sink execution for matched routes.

pub mod dispatcher;
pub mod transport;

pub use dispatcher::{DispatchError, Dispatcher};
pub use transport::{RedisTransport, Transport, TransportError};
