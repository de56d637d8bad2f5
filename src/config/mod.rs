//! Configuration schema, loading, and validation.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BridgeConfig, BrokerConfig, DispatchConfig, StoreConfig, SubstitutionConfig, WirelessConfig,
};
pub use validation::{validate_config, ValidationError};
