//! The property bus - device registry plus event fan-out.
//!
//! The bus is an explicit object with its own lifecycle rather than
//! process-global state, so several independent buses can coexist in tests.
//! Events are distributed through a broadcast channel; every subscriber
//! (typically one per client connection) filters the stream itself.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{BusError, Result};
use crate::event::BusEvent;
use crate::property::{Property, PropertyFilter};
use crate::request::PropertyRequest;

/// Default event channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The process-wide property bus.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

struct BusInner {
    name: String,
    devices: RwLock<HashMap<String, Arc<dyn Device>>>,
    tx: broadcast::Sender<BusEvent>,
}

impl Bus {
    /// Create a bus with the default event capacity.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with an explicit event buffer capacity.
    ///
    /// The capacity bounds how far a slow subscriber may fall behind before
    /// it starts losing events.
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(BusInner {
                name: name.into(),
                devices: RwLock::new(HashMap::new()),
                tx,
            }),
        }
    }

    /// Name of this bus, for log correlation.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of currently attached devices.
    pub async fn device_count(&self) -> usize {
        self.inner.devices.read().await.len()
    }

    /// Names of currently attached devices.
    pub async fn device_names(&self) -> Vec<String> {
        self.inner.devices.read().await.keys().cloned().collect()
    }

    /// Look up an attached device.
    pub async fn device(&self, name: &str) -> Option<Arc<dyn Device>> {
        self.inner.devices.read().await.get(name).cloned()
    }

    /// Attach a device and run its `attach` entry point.
    ///
    /// Atomic on failure: the device does not stay registered and nothing
    /// has been defined to clients.
    pub async fn attach(&self, device: Arc<dyn Device>) -> Result<()> {
        let name = device.name();
        {
            let mut devices = self.inner.devices.write().await;
            if devices.contains_key(&name) {
                return Err(BusError::Duplicated(name));
            }
            devices.insert(name.clone(), Arc::clone(&device));
        }
        if let Err(e) = device.attach().await {
            self.inner.devices.write().await.remove(&name);
            warn!(bus = %self.inner.name, device = %name, error = %e, "device attach failed");
            return Err(e);
        }
        info!(bus = %self.inner.name, device = %name, "device attached");
        // Announce the new device to everyone already listening.
        device.enumerate_properties(&PropertyFilter::all()).await
    }

    /// Detach a device: run its `detach` entry point, drop it from the
    /// registry and publish the synthetic all-properties-deleted event.
    pub async fn detach(&self, name: &str) -> Result<()> {
        let device = self
            .inner
            .devices
            .write()
            .await
            .remove(name)
            .ok_or_else(|| BusError::NotFound(name.to_string()))?;
        device.detach().await?;
        self.publish(BusEvent::Delete {
            device: name.to_string(),
            name: None,
            message: None,
        });
        info!(bus = %self.inner.name, device = %name, "device detached");
        Ok(())
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.inner.tx.subscribe()
    }

    /// Publish an event to every subscriber. Returns `true` if anyone was
    /// listening; an unheard event is simply dropped.
    pub fn publish(&self, event: BusEvent) -> bool {
        self.inner.tx.send(event).is_ok()
    }

    /// Publish a property definition.
    pub fn define(&self, property: &Property, message: Option<String>) {
        if property.hidden {
            return;
        }
        self.publish(BusEvent::Define {
            property: property.clone(),
            message,
        });
    }

    /// Publish a property update.
    pub fn update(&self, property: &Property, message: Option<String>) {
        if property.hidden {
            return;
        }
        self.publish(BusEvent::Update {
            property: property.clone(),
            message,
        });
    }

    /// Publish a property (or whole-device) deletion.
    pub fn delete(&self, device: &str, name: Option<&str>, message: Option<String>) {
        self.publish(BusEvent::Delete {
            device: device.to_string(),
            name: name.map(str::to_string),
            message,
        });
    }

    /// Publish a device-scoped or broadcast text message.
    pub fn send_message(&self, device: Option<&str>, message: impl Into<String>) {
        self.publish(BusEvent::Message {
            device: device.map(str::to_string),
            message: message.into(),
        });
    }

    /// Ask every device matching the filter to redefine its properties.
    /// This is how a newly connected client discovers bus state.
    pub async fn enumerate_properties(&self, filter: &PropertyFilter) -> Result<()> {
        let devices: Vec<Arc<dyn Device>> = {
            let map = self.inner.devices.read().await;
            map.iter()
                .filter(|(name, _)| filter.device.is_empty() || filter.device == **name)
                .map(|(_, d)| Arc::clone(d))
                .collect()
        };
        for device in devices {
            device.enumerate_properties(filter).await?;
        }
        Ok(())
    }

    /// Route a change request to the device it targets.
    pub async fn change_property(&self, request: &PropertyRequest) -> Result<()> {
        let Some(device) = self.device(&request.device).await else {
            debug!(bus = %self.inner.name, device = %request.device, "request for unknown device");
            return Err(BusError::NotFound(request.device.clone()));
        };
        device.change_property(request).await
    }
}
