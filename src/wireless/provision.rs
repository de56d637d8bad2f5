//! Configuration push to a freshly-associated device.
//!
//! # Responsibilities
//! - Validate the rendered payload as JSON before any network call
//! - PUT the payload to the peer's well-known config endpoint
//!
//! # Design Decisions
//! - The peer address is a convention: the interface's own address
//!   with the host octet replaced by `.1`
//! - The payload is re-serialized, so the device receives canonical
//!   JSON regardless of template formatting

use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::wireless::link::WirelessError;

/// The peer device's address by convention.
pub fn peer_address(interface_addr: Ipv4Addr) -> Ipv4Addr {
    let [a, b, c, _] = interface_addr.octets();
    Ipv4Addr::new(a, b, c, 1)
}

/// Validate `payload` as JSON and return its canonical rendering.
/// Fails fast with `PayloadInvalid` before any network call.
pub fn canonical_payload(payload: &str) -> Result<String, WirelessError> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|err| WirelessError::PayloadInvalid(err.to_string()))?;
    serde_json::to_string(&value).map_err(|err| WirelessError::PayloadInvalid(err.to_string()))
}

/// Delivery of a validated payload to a peer. Seam for tests.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn push(&self, peer: Ipv4Addr, body: &str) -> Result<(), WirelessError>;
}

/// HTTP PUT to `http://<peer>/config`.
pub struct HttpProvisioner {
    client: reqwest::Client,
}

impl HttpProvisioner {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Provisioner for HttpProvisioner {
    async fn push(&self, peer: Ipv4Addr, body: &str) -> Result<(), WirelessError> {
        let url = format!("http://{peer}/config");
        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%url, status = status.as_u16(), body = %body, "provisioning rejected");
            return Err(WirelessError::ProvisionRejected(status.as_u16()));
        }
        tracing::info!(%url, "configuration accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_address_convention() {
        assert_eq!(
            peer_address(Ipv4Addr::new(192, 168, 12, 34)),
            Ipv4Addr::new(192, 168, 12, 1)
        );
    }

    #[test]
    fn test_canonical_payload_accepts_json() {
        let canonical = canonical_payload("{\"name\":  \"lamp\"}").unwrap();
        assert_eq!(canonical, "{\"name\":\"lamp\"}");
    }

    #[test]
    fn test_canonical_payload_rejects_non_json() {
        assert!(matches!(
            canonical_payload("not json"),
            Err(WirelessError::PayloadInvalid(_))
        ));
    }
}
