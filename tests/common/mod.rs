//! Shared doubles for integration testing.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use weft::dispatch::{Transport, TransportError};
use weft::store::{content_hash, is_disabled_line, removal_hash, RouteRecord, RouteStore, StoreError};
use weft::wireless::{Provisioner, WifiLink, WirelessError};

/// In-memory route store with a switchable failure mode.
#[derive(Default)]
pub struct MemoryRouteStore {
    entries: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
}

impl MemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes(routes: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut entries = store.entries.lock().unwrap();
            for route in routes {
                entries.insert(content_hash(route), route.to_string());
            }
        }
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RouteStore for MemoryRouteStore {
    async fn add(&self, text: &str) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        if is_disabled_line(text) {
            return Ok(None);
        }
        let text = text.trim();
        let hash = content_hash(text);
        self.entries
            .lock()
            .unwrap()
            .insert(hash.clone(), text.to_string());
        Ok(Some(hash))
    }

    async fn remove(&self, text_or_hash: &str) -> Result<(), StoreError> {
        self.check_available()?;
        let hash = removal_hash(text_or_hash);
        self.entries.lock().unwrap().remove(&hash);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RouteRecord>, StoreError> {
        self.check_available()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(hash, text)| RouteRecord {
                hash: hash.clone(),
                text: text.clone(),
            })
            .collect())
    }
}

/// One effect observed by the recording transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Publish { channel: String, payload: String },
    Set { key: String, value: String },
    SetField {
        key: String,
        field: String,
        value: String,
    },
}

/// Transport double that records every effect, or refuses them all.
#[derive(Default)]
pub struct RecordingTransport {
    events: Mutex<Vec<TransportEvent>>,
    failing: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: TransportEvent) -> Result<(), TransportError> {
        if self.failing {
            return Err(TransportError("transport offline".to_string()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), TransportError> {
        self.record(TransportEvent::Publish {
            channel: channel.to_string(),
            payload: payload.to_string(),
        })
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), TransportError> {
        self.record(TransportEvent::Set {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), TransportError> {
        self.record(TransportEvent::SetField {
            key: key.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// Scripted wireless link: fixed scan results, optional lease
/// failure, and call counting for retry assertions.
pub struct ScriptedLink {
    pub networks: Vec<String>,
    pub fail_scan: bool,
    pub fail_lease: bool,
    pub address: Ipv4Addr,
    pub join_calls: AtomicUsize,
    pub disassociations: AtomicUsize,
}

impl Default for ScriptedLink {
    fn default() -> Self {
        Self {
            networks: Vec::new(),
            fail_scan: false,
            fail_lease: false,
            address: Ipv4Addr::new(192, 168, 12, 34),
            join_calls: AtomicUsize::new(0),
            disassociations: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl WifiLink for ScriptedLink {
    async fn scan(&self, interface: &str) -> Result<Vec<String>, WirelessError> {
        if self.fail_scan {
            return Err(WirelessError::InterfaceMissing(interface.to_string()));
        }
        Ok(self.networks.clone())
    }

    async fn join(&self, _interface: &str, _network: &str) -> Result<(), WirelessError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn acquire_lease(&self, interface: &str) -> Result<(), WirelessError> {
        if self.fail_lease {
            return Err(WirelessError::Command {
                command: format!("dhclient -1 -v {interface}"),
                detail: "no lease".to_string(),
            });
        }
        Ok(())
    }

    async fn interface_address(&self, _interface: &str) -> Result<Ipv4Addr, WirelessError> {
        Ok(self.address)
    }

    async fn disassociate(&self, _interface: &str) -> Result<(), WirelessError> {
        self.disassociations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Provisioner double recording every push.
#[derive(Default)]
pub struct ScriptedProvisioner {
    pushes: Mutex<Vec<(Ipv4Addr, String)>>,
}

impl ScriptedProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pushes(&self) -> Vec<(Ipv4Addr, String)> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provisioner for ScriptedProvisioner {
    async fn push(&self, peer: Ipv4Addr, body: &str) -> Result<(), WirelessError> {
        self.pushes.lock().unwrap().push((peer, body.to_string()));
        Ok(())
    }
}
