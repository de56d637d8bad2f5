//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! bridge. All types derive Serde traits for deserialization from
//! TOML config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Key/value store connection (route store, pub/sub, key writes).
    pub store: StoreConfig,

    /// MQTT broker connection.
    pub broker: BrokerConfig,

    /// Sink execution policy.
    pub dispatch: DispatchConfig,

    /// Variable substitution settings.
    pub substitution: SubstitutionConfig,

    /// Wireless discovery and provisioning.
    pub wireless: WirelessConfig,
}

/// Key/value store connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
        }
    }
}

/// MQTT broker connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,

    /// Client identifier presented to the broker.
    pub client_id: String,

    /// MQTT keep-alive interval.
    pub keep_alive_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            client_id: "weft-bridge".to_string(),
            keep_alive_secs: 60,
        }
    }
}

/// Sink execution policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Gate for `--` routes. When false, shell dispatch is refused
    /// and no process is ever spawned.
    pub allow_shell_calls: bool,

    /// Upper bound on a blocking command's runtime. Absent means
    /// wait indefinitely.
    pub shell_timeout_secs: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            allow_shell_calls: false,
            shell_timeout_secs: None,
        }
    }
}

/// Variable substitution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubstitutionConfig {
    /// Supply `$DB_HOST`, `$DB_PORT`, `$BROKER_HOST`, `$BROKER_PORT`
    /// as caller context on every message.
    pub basic_env_vars: bool,
}

impl Default for SubstitutionConfig {
    fn default() -> Self {
        Self {
            basic_env_vars: true,
        }
    }
}

/// Wireless discovery and provisioning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WirelessConfig {
    /// Master switch for the scan loop.
    pub enabled: bool,

    /// Wireless interface to scan and associate on.
    pub interface: String,

    /// Glob patterns selecting network names to provision.
    pub patterns: Vec<String>,

    /// Inline payload template. Mutually exclusive with
    /// `template_path`.
    pub template: Option<String>,

    /// Path to a payload template file.
    pub template_path: Option<PathBuf>,

    /// Variables substituted into the template per match.
    pub template_vars: BTreeMap<String, String>,

    /// Seconds between scans.
    pub scan_interval_secs: u64,

    /// Seconds between joining a network and requesting a lease, and
    /// between retry attempts.
    pub associate_delay_secs: u64,

    /// Extra association attempts after the first. Absent means a
    /// single attempt.
    pub retries: Option<u32>,

    /// Seconds to wait after provisioning so the peer can
    /// reconfigure.
    pub settle_secs: u64,

    /// Prefix wireless tooling invocations with sudo.
    pub use_sudo: bool,
}

impl Default for WirelessConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interface: String::new(),
            patterns: Vec::new(),
            template: None,
            template_path: None,
            template_vars: BTreeMap::new(),
            scan_interval_secs: 5,
            associate_delay_secs: 5,
            retries: None,
            settle_secs: 5,
            use_sudo: true,
        }
    }
}

impl WirelessConfig {
    /// The payload template, inline or read from `template_path`.
    pub fn resolve_template(&self) -> Result<Option<String>, std::io::Error> {
        if let Some(template) = &self.template {
            return Ok(Some(template.clone()));
        }
        match &self.template_path {
            Some(path) => std::fs::read_to_string(path).map(Some),
            None => Ok(None),
        }
    }
}
