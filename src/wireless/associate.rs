//! Association attempts and the recurring scan loop.
//!
//! # Responsibilities
//! - Scan one interface on a timer and filter names by pattern
//! - Drive one association attempt: join, lease, address, provision
//! - Bound retries with an explicit counter
//!
//! # Design Decisions
//! - Retry is an explicit loop over a decrementing counter; unlimited
//!   retry does not exist, and unset retries means one attempt
//! - Scans for one interface are sequential by construction: the
//!   loop awaits each association before scanning again
//! - A shutdown signal aborts the loop and any in-flight retry wait

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::routing::substitute::SubstitutionContext;
use crate::wireless::link::{WifiLink, WirelessError};
use crate::wireless::pattern::{select_targets, Pattern};
use crate::wireless::provision::{canonical_payload, peer_address, Provisioner};

/// Timing and retry policy for association attempts.
#[derive(Debug, Clone)]
pub struct AssociateSettings {
    /// Wait between pointing the interface at a network and asking
    /// for a lease; also the wait between retry attempts.
    pub delay: Duration,
    /// Extra attempts after the first. `None` means a single attempt.
    pub retries: Option<u32>,
    /// Wait after provisioning so the peer can reconfigure.
    pub settle: Duration,
}

/// Terminal result of one associate-and-provision operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationOutcome {
    /// Association and configuration push both succeeded.
    Provisioned,
    /// The attempt was abandoned: association failed with retries
    /// unset, or the provisioning push itself failed.
    Failed,
    /// Every attempt failed; `attempts` counts the initial attempt
    /// plus all retries.
    Exhausted { attempts: u32 },
    /// Shutdown arrived during a retry wait.
    Aborted,
}

/// Drives discovery and association for one wireless interface.
pub struct Associator {
    link: Arc<dyn WifiLink>,
    provisioner: Arc<dyn Provisioner>,
    interface: String,
    settings: AssociateSettings,
}

impl Associator {
    pub fn new(
        link: Arc<dyn WifiLink>,
        provisioner: Arc<dyn Provisioner>,
        interface: impl Into<String>,
        settings: AssociateSettings,
    ) -> Self {
        Self {
            link,
            provisioner,
            interface: interface.into(),
            settings,
        }
    }

    /// Scan the interface, tolerating failure: a missing interface or
    /// a flaky driver yields an empty list and a warning, never an
    /// error, so the loop survives transient conditions.
    pub async fn scan(&self) -> Vec<String> {
        match self.link.scan(&self.interface).await {
            Ok(names) => names,
            Err(err) => {
                tracing::warn!(interface = %self.interface, error = %err, "scan failed");
                Vec::new()
            }
        }
    }

    /// One associate-and-provision operation against `target`.
    ///
    /// Attempts run until one succeeds, the retry budget is spent, or
    /// shutdown arrives. With `retries` unset a single failure
    /// abandons the attempt.
    pub async fn associate(
        &self,
        target: &str,
        payload: &str,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> AssociationOutcome {
        let mut remaining = self.settings.retries;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            tracing::info!(
                interface = %self.interface,
                target = %target,
                attempt = attempts,
                "associating"
            );

            match self.try_associate(target).await {
                Ok(address) => {
                    return match self.provision(address, payload).await {
                        Ok(()) => AssociationOutcome::Provisioned,
                        Err(err) => {
                            tracing::warn!(target = %target, error = %err, "provisioning failed");
                            AssociationOutcome::Failed
                        }
                    };
                }
                Err(err) => {
                    tracing::warn!(
                        interface = %self.interface,
                        target = %target,
                        attempt = attempts,
                        error = %err,
                        "association attempt failed"
                    );
                    match remaining {
                        None => {
                            tracing::info!(target = %target, "retry not enabled, abandoning");
                            return AssociationOutcome::Failed;
                        }
                        Some(0) => {
                            tracing::warn!(target = %target, attempts, "retries exhausted");
                            return AssociationOutcome::Exhausted { attempts };
                        }
                        Some(n) => {
                            remaining = Some(n - 1);
                            tokio::select! {
                                _ = shutdown.recv() => return AssociationOutcome::Aborted,
                                _ = tokio::time::sleep(self.settings.delay) => {}
                            }
                        }
                    }
                }
            }
        }
    }

    /// Join, wait for the interface to settle, obtain a lease, and
    /// read the resulting address.
    async fn try_associate(&self, target: &str) -> Result<Ipv4Addr, WirelessError> {
        self.link.join(&self.interface, target).await?;
        tokio::time::sleep(self.settings.delay).await;
        self.link.acquire_lease(&self.interface).await?;
        self.link.interface_address(&self.interface).await
    }

    /// Push the payload to the peer, then force disassociation and
    /// wait out the settle delay so the peer can reconfigure.
    async fn provision(&self, address: Ipv4Addr, payload: &str) -> Result<(), WirelessError> {
        let body = canonical_payload(payload)?;
        let peer = peer_address(address);
        self.provisioner.push(peer, &body).await?;

        if let Err(err) = self.link.disassociate(&self.interface).await {
            tracing::warn!(interface = %self.interface, error = %err, "disassociation failed");
        }
        tokio::time::sleep(self.settings.settle).await;
        Ok(())
    }

    /// Recurring scan loop: every `interval`, scan, filter by
    /// pattern, and associate with each match in turn.
    ///
    /// The template is rendered per match. One name matching two
    /// patterns triggers two associate calls.
    pub async fn run_scan_loop(
        &self,
        patterns: &[Pattern],
        template: &str,
        template_vars: &SubstitutionContext,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            interface = %self.interface,
            patterns = ?patterns.iter().map(Pattern::source).collect::<Vec<_>>(),
            interval_secs = interval.as_secs(),
            "scan loop starting"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {}
            }

            let names = self.scan().await;
            if names.is_empty() {
                continue;
            }
            tracing::debug!(interface = %self.interface, found = ?names, "scan results");

            for target in select_targets(patterns, &names) {
                let payload = template_vars.apply(template);
                match self.associate(target, &payload, &mut shutdown).await {
                    AssociationOutcome::Provisioned => {
                        tracing::info!(target = %target, "device provisioned");
                    }
                    AssociationOutcome::Aborted => {
                        tracing::info!("scan loop stopping");
                        return;
                    }
                    outcome => {
                        tracing::warn!(target = %target, ?outcome, "association gave up");
                    }
                }
            }
        }

        tracing::info!(interface = %self.interface, "scan loop stopped");
    }
}
