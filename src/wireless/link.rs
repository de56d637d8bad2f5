//! OS wireless control surface.
//!
//! # Responsibilities
//! - Scan one interface and parse visible network names
//! - Join a network, acquire a DHCP lease, read the interface address
//! - Force disassociation by resetting to a null BSSID
//!
//! # Design Decisions
//! - Everything shells out to the standard wireless tooling
//!   (`iwlist`/`iwconfig`/`dhclient`/`ip`); the trait is the seam so
//!   tests script the link instead
//! - An absent interface is an error at this layer; the scan loop
//!   above decides to tolerate it

use std::net::Ipv4Addr;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Null BSSID used to force disassociation.
const NULL_BSSID: &str = "00:00:00:00:00:00";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WirelessError {
    #[error("interface {0} is not present")]
    InterfaceMissing(String),

    #[error("{command} failed: {detail}")]
    Command { command: String, detail: String },

    #[error("no IPv4 address on {0}")]
    NoAddress(String),

    #[error("payload is not valid JSON: {0}")]
    PayloadInvalid(String),

    #[error("provisioning endpoint returned status {0}")]
    ProvisionRejected(u16),

    #[error("provisioning request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Control operations against one wireless interface.
#[async_trait]
pub trait WifiLink: Send + Sync {
    /// Visible network names on `interface`, case preserved, in scan
    /// output order.
    async fn scan(&self, interface: &str) -> Result<Vec<String>, WirelessError>;

    /// Point the interface at a network by name.
    async fn join(&self, interface: &str, network: &str) -> Result<(), WirelessError>;

    /// Obtain a DHCP lease on the interface.
    async fn acquire_lease(&self, interface: &str) -> Result<(), WirelessError>;

    /// The interface's current IPv4 address.
    async fn interface_address(&self, interface: &str) -> Result<Ipv4Addr, WirelessError>;

    /// Reset the association to a null BSSID.
    async fn disassociate(&self, interface: &str) -> Result<(), WirelessError>;
}

/// `WifiLink` over the standard command-line wireless tooling.
pub struct CommandLink {
    use_sudo: bool,
}

impl CommandLink {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    fn interface_present(interface: &str) -> bool {
        Path::new("/sys/class/net").join(interface).exists()
    }

    async fn run(&self, args: &[&str]) -> Result<String, WirelessError> {
        let (program, rest): (&str, &[&str]) = if self.use_sudo {
            ("sudo", args)
        } else {
            (args[0], &args[1..])
        };

        let output = Command::new(program)
            .args(rest)
            .output()
            .await
            .map_err(|err| WirelessError::Command {
                command: args.join(" "),
                detail: err.to_string(),
            })?;

        if !output.status.success() {
            return Err(WirelessError::Command {
                command: args.join(" "),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl WifiLink for CommandLink {
    async fn scan(&self, interface: &str) -> Result<Vec<String>, WirelessError> {
        if !Self::interface_present(interface) {
            return Err(WirelessError::InterfaceMissing(interface.to_string()));
        }
        let output = self.run(&["iwlist", interface, "scan"]).await?;
        Ok(parse_scan_output(&output))
    }

    async fn join(&self, interface: &str, network: &str) -> Result<(), WirelessError> {
        self.run(&["iwconfig", interface, "essid", network]).await?;
        Ok(())
    }

    async fn acquire_lease(&self, interface: &str) -> Result<(), WirelessError> {
        // -1: try once and exit, so a dead network fails fast instead
        // of leaving dhclient looping in the background.
        self.run(&["dhclient", "-1", "-v", interface]).await?;
        Ok(())
    }

    async fn interface_address(&self, interface: &str) -> Result<Ipv4Addr, WirelessError> {
        let output = self.run(&["ip", "-o", "-4", "addr", "show", "dev", interface]).await?;
        parse_interface_address(&output)
            .ok_or_else(|| WirelessError::NoAddress(interface.to_string()))
    }

    async fn disassociate(&self, interface: &str) -> Result<(), WirelessError> {
        self.run(&["iwconfig", interface, "ap", NULL_BSSID]).await?;
        Ok(())
    }
}

/// Pull ESSID names out of `iwlist` scan output. Lines look like
/// `ESSID:"homie-abc"`; names keep their case.
fn parse_scan_output(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let rest = line.strip_prefix("ESSID:\"")?;
            let name = rest.strip_suffix('"')?;
            if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}

/// Pull the first IPv4 address out of `ip -o -4 addr show` output,
/// e.g. `3: wlan0    inet 192.168.12.34/24 brd ...`.
fn parse_interface_address(output: &str) -> Option<Ipv4Addr> {
    let mut words = output.split_whitespace();
    while let Some(word) = words.next() {
        if word == "inet" {
            let cidr = words.next()?;
            let addr = cidr.split('/').next()?;
            return addr.parse().ok();
        }
    }
    None
}
