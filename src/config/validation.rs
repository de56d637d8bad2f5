//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and required combinations
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the config
//! - Runs before the config is accepted into the system

use thiserror::Error;

use crate::config::schema::BridgeConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("store.port must not be 0")]
    StorePortZero,

    #[error("broker.port must not be 0")]
    BrokerPortZero,

    #[error("broker.client_id must not be empty")]
    BrokerClientIdEmpty,

    #[error("dispatch.shell_timeout_secs must be greater than 0 when set")]
    ShellTimeoutZero,

    #[error("wireless.interface is required when wireless is enabled")]
    WirelessInterfaceMissing,

    #[error("wireless.patterns must not be empty when wireless is enabled")]
    WirelessPatternsEmpty,

    #[error("wireless needs exactly one of template or template_path when enabled")]
    WirelessTemplateMissing,

    #[error("wireless.template and wireless.template_path are mutually exclusive")]
    WirelessTemplateConflict,

    #[error("wireless.scan_interval_secs must be greater than 0")]
    WirelessScanIntervalZero,
}

/// Check the whole config, accumulating every violation.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.store.port == 0 {
        errors.push(ValidationError::StorePortZero);
    }
    if config.broker.port == 0 {
        errors.push(ValidationError::BrokerPortZero);
    }
    if config.broker.client_id.is_empty() {
        errors.push(ValidationError::BrokerClientIdEmpty);
    }
    if config.dispatch.shell_timeout_secs == Some(0) {
        errors.push(ValidationError::ShellTimeoutZero);
    }

    if config.wireless.enabled {
        if config.wireless.interface.is_empty() {
            errors.push(ValidationError::WirelessInterfaceMissing);
        }
        if config.wireless.patterns.is_empty() {
            errors.push(ValidationError::WirelessPatternsEmpty);
        }
        match (&config.wireless.template, &config.wireless.template_path) {
            (None, None) => errors.push(ValidationError::WirelessTemplateMissing),
            (Some(_), Some(_)) => errors.push(ValidationError::WirelessTemplateConflict),
            _ => {}
        }
        if config.wireless.scan_interval_secs == 0 {
            errors.push(ValidationError::WirelessScanIntervalZero);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
