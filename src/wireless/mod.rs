//! Wireless discovery, association, and device provisioning.

pub mod associate;
pub mod link;
pub mod pattern;
pub mod provision;

pub use associate::{AssociateSettings, AssociationOutcome, Associator};
pub use link::{CommandLink, WifiLink, WirelessError};
pub use pattern::Pattern;
pub use provision::{HttpProvisioner, Provisioner};
