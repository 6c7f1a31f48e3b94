//! The generic device skeleton.
//!
//! [`BaseDevice`] implements the bus device contract once for every
//! driver: it owns the property table, creates the standard property set
//! at attach, applies the connection transition guard, persists and
//! replays configuration, and manages clone instances. A [`Driver`] only
//! sees the four lifecycle entry points plus a handle for its own
//! properties.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use starbus_core::{
    Bus, BusError, Device, Item, ItemValue, Permission, Property, PropertyFilter, PropertyKind,
    PropertyRequest, PropertyState, RequestValue, Result, SwitchRule,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::ConfigStore;
use crate::driver::Driver;
use crate::lock::LockManager;
use crate::names;

/// Static facts about a device, fixed at construction.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    /// Device name as announced on the bus.
    pub name: String,
    pub driver_name: String,
    pub driver_version: String,
    /// Capability bitmask reported through `INFO`.
    pub interface: u32,
    pub model: String,
    pub firmware: String,
    pub serial: String,
    /// Name of the master device whose hardware lock this device shares;
    /// `None` means the device locks under its own name.
    pub master: Option<String>,
    /// Number of selectable configuration profiles.
    pub profile_count: usize,
    /// Expose the `SIMULATION` toggle.
    pub simulation: bool,
    /// Initial serial/network endpoint; `None` hides `DEVICE_PORT`.
    pub port: Option<String>,
    /// Known endpoints for `DEVICE_PORTS`; empty hides the vector.
    pub ports: Vec<String>,
    /// Initial baud rate; `None` hides `DEVICE_BAUDRATE`.
    pub baudrate: Option<String>,
    /// Expose the write-only `AUTHENTICATION` vector.
    pub authentication: bool,
}

impl DeviceDescriptor {
    pub fn new(
        name: impl Into<String>,
        driver_name: impl Into<String>,
        driver_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            driver_name: driver_name.into(),
            driver_version: driver_version.into(),
            interface: 0,
            model: String::new(),
            firmware: String::new(),
            serial: String::new(),
            master: None,
            profile_count: 5,
            simulation: false,
            port: None,
            ports: Vec::new(),
            baudrate: None,
            authentication: false,
        }
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn with_master(mut self, master: impl Into<String>) -> Self {
        self.master = Some(master.into());
        self
    }

    pub fn with_simulation(mut self) -> Self {
        self.simulation = true;
        self
    }
}

/// A device on the bus: generic lifecycle plus one [`Driver`].
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct BaseDevice {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    /// Actual bus name; differs from the descriptor's for clone instances.
    pub(crate) name: String,
    /// Base device name when this is a clone instance.
    pub(crate) base: Option<String>,
    pub(crate) descriptor: DeviceDescriptor,
    pub(crate) bus: Bus,
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) config: ConfigStore,
    pub(crate) locks: Arc<LockManager>,
    pub(crate) properties: RwLock<Vec<Property>>,
    /// Serializes save/load/remove for this device.
    pub(crate) config_gate: Mutex<()>,
    /// Clone instances created through `ADDITIONAL_INSTANCES`.
    pub(crate) instances: Mutex<Vec<BaseDevice>>,
    /// Internal slave devices that follow this device's instance count.
    pub(crate) slaves: Mutex<Vec<BaseDevice>>,
    /// Extra property names the driver wants persisted.
    pub(crate) saved_extra: std::sync::Mutex<Vec<String>>,
    /// Set once `attach` has fully succeeded. Until then the property
    /// table is built silently: a failed attach must leave nothing
    /// defined to clients, and `Bus::attach` announces the table itself
    /// on success.
    pub(crate) live: AtomicBool,
}

impl BaseDevice {
    pub fn new(
        descriptor: DeviceDescriptor,
        driver: Arc<dyn Driver>,
        bus: Bus,
        config: ConfigStore,
        locks: Arc<LockManager>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: descriptor.name.clone(),
                base: None,
                descriptor,
                bus,
                driver,
                config,
                locks,
                properties: RwLock::new(Vec::new()),
                config_gate: Mutex::new(()),
                instances: Mutex::new(Vec::new()),
                slaves: Mutex::new(Vec::new()),
                saved_extra: std::sync::Mutex::new(Vec::new()),
                live: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Whether this device is a clone instance of another.
    pub fn is_clone(&self) -> bool {
        self.inner.base.is_some()
    }

    /// Attach this device to its bus.
    pub async fn attach_to_bus(&self) -> Result<()> {
        self.inner.bus.attach(Arc::new(self.clone())).await
    }

    /// Key under which this device locks its hardware: the master's name
    /// for slave devices sharing a serial link, its own otherwise.
    fn lock_key(&self) -> String {
        self.inner
            .descriptor
            .master
            .clone()
            .unwrap_or_else(|| self.inner.name.clone())
    }

    /// Snapshot of one property.
    pub async fn property(&self, name: &str) -> Option<Property> {
        self.inner
            .properties
            .read()
            .await
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }

    /// Define a new property and announce it. Names must stay unique
    /// within the device. During `attach` the definition is only recorded;
    /// the whole table is announced at once when the attach succeeds.
    pub async fn define_property(&self, property: Property, message: Option<String>) -> Result<()> {
        let mut properties = self.inner.properties.write().await;
        if properties.iter().any(|p| p.name == property.name) {
            return Err(BusError::Duplicated(property.name));
        }
        if self.inner.live.load(Ordering::Acquire) {
            self.inner.bus.define(&property, message);
        }
        properties.push(property);
        Ok(())
    }

    /// Delete a property and announce its removal.
    pub async fn delete_property(&self, name: &str, message: Option<String>) -> Result<()> {
        let mut properties = self.inner.properties.write().await;
        let index = properties
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| BusError::NotFound(name.to_string()))?;
        let property = properties.remove(index);
        if !property.hidden {
            self.inner.bus.delete(&self.inner.name, Some(name), message);
        }
        Ok(())
    }

    /// Mutate one property under the table lock and publish the result.
    pub async fn update_property<F>(&self, name: &str, message: Option<String>, f: F) -> Result<()>
    where
        F: FnOnce(&mut Property),
    {
        let snapshot = {
            let mut properties = self.inner.properties.write().await;
            let property = properties
                .iter_mut()
                .find(|p| p.name == name)
                .ok_or_else(|| BusError::NotFound(name.to_string()))?;
            f(property);
            property.clone()
        };
        self.inner.bus.update(&snapshot, message);
        Ok(())
    }

    /// Set a property's state and publish the update.
    pub async fn set_state(
        &self,
        name: &str,
        state: PropertyState,
        message: Option<String>,
    ) -> Result<()> {
        self.update_property(name, message, |p| p.state = state).await
    }

    /// Whether the device currently reports itself connected.
    pub async fn is_connected(&self) -> bool {
        match self.property(names::CONNECTION).await {
            Some(p) => {
                p.item(names::CONNECTION_CONNECTED)
                    .map(Item::is_on)
                    .unwrap_or(false)
                    || p.state == PropertyState::Busy
            }
            None => false,
        }
    }

    /// Ask for `name` to be included in saved configurations in addition
    /// to the standard writable set.
    pub fn persist_property(&self, name: impl Into<String>) {
        let mut extra = self
            .inner
            .saved_extra
            .lock()
            .unwrap_or_else(|p| p.into_inner());
        let name = name.into();
        if !extra.contains(&name) {
            extra.push(name);
        }
    }

    fn standard_properties(&self) -> Vec<Property> {
        let d = &self.inner.descriptor;
        let name = &self.inner.name;
        let mut out = Vec::with_capacity(10);

        out.push(
            Property::switch(
                name,
                names::CONNECTION,
                names::GROUP_MAIN,
                "Connection",
                PropertyState::Idle,
                Permission::ReadWrite,
                SwitchRule::OneOfMany,
                2,
            )
            .with_item(Item::switch(names::CONNECTION_CONNECTED, "Connected", false))
            .with_item(Item::switch(
                names::CONNECTION_DISCONNECTED,
                "Disconnected",
                true,
            )),
        );

        let mut info = Property::new(
            PropertyKind::Text,
            name,
            names::INFO,
            names::GROUP_MAIN,
            "Device info",
            PropertyState::Ok,
            Permission::ReadOnly,
            7,
        )
        .with_item(Item::text(names::INFO_DEVICE_NAME, "Name", name))
        .with_item(Item::text(names::INFO_DEVICE_DRIVER, "Driver", &d.driver_name))
        .with_item(Item::text(
            names::INFO_DEVICE_VERSION,
            "Version",
            &d.driver_version,
        ))
        .with_item(Item::text(
            names::INFO_DEVICE_INTERFACE,
            "Interface",
            d.interface.to_string(),
        ));
        if !d.model.is_empty() {
            info.push(Item::text(names::INFO_DEVICE_MODEL, "Model", &d.model));
        }
        if !d.firmware.is_empty() {
            info.push(Item::text(names::INFO_DEVICE_FIRMWARE, "Firmware", &d.firmware));
        }
        if !d.serial.is_empty() {
            info.push(Item::text(names::INFO_DEVICE_SERIAL, "Serial", &d.serial));
        }
        out.push(info);

        let mut simulation = Property::switch(
            name,
            names::SIMULATION,
            names::GROUP_MAIN,
            "Simulation",
            PropertyState::Idle,
            Permission::ReadWrite,
            SwitchRule::OneOfMany,
            2,
        )
        .with_item(Item::switch(names::SIMULATION_ENABLED, "Enabled", false))
        .with_item(Item::switch(names::SIMULATION_DISABLED, "Disabled", true));
        simulation.hidden = !d.simulation;
        out.push(simulation);

        out.push(
            Property::switch(
                name,
                names::CONFIG,
                names::GROUP_MAIN,
                "Configuration",
                PropertyState::Idle,
                Permission::ReadWrite,
                SwitchRule::AtMostOne,
                3,
            )
            .with_item(Item::switch(names::CONFIG_LOAD, "Load", false))
            .with_item(Item::switch(names::CONFIG_SAVE, "Save", false))
            .with_item(Item::switch(names::CONFIG_REMOVE, "Remove", false)),
        );

        let mut profile = Property::switch(
            name,
            names::PROFILE,
            names::GROUP_MAIN,
            "Profile",
            PropertyState::Idle,
            Permission::ReadWrite,
            SwitchRule::OneOfMany,
            d.profile_count,
        );
        for i in 0..d.profile_count.max(1) {
            profile.push(Item::switch(
                format!("{}{i}", names::PROFILE_ITEM_PREFIX),
                format!("Profile #{i}"),
                i == 0,
            ));
        }
        out.push(profile);

        let mut port = Property::new(
            PropertyKind::Text,
            name,
            names::DEVICE_PORT,
            names::GROUP_MAIN,
            "Device port",
            PropertyState::Idle,
            Permission::ReadWrite,
            1,
        )
        .with_item(Item::text(
            names::DEVICE_PORT_ITEM,
            "Port",
            d.port.clone().unwrap_or_default(),
        ));
        port.hidden = d.port.is_none();
        out.push(port);

        let mut ports = Property::switch(
            name,
            names::DEVICE_PORTS,
            names::GROUP_MAIN,
            "Known ports",
            PropertyState::Idle,
            Permission::ReadWrite,
            SwitchRule::AtMostOne,
            d.ports.len(),
        );
        for p in &d.ports {
            ports.push(Item::switch(p.clone(), p.clone(), false));
        }
        ports.hidden = d.ports.is_empty();
        out.push(ports);

        let mut baudrate = Property::new(
            PropertyKind::Text,
            name,
            names::DEVICE_BAUDRATE,
            names::GROUP_MAIN,
            "Baud rate",
            PropertyState::Idle,
            Permission::ReadWrite,
            1,
        )
        .with_item(Item::text(
            names::DEVICE_BAUDRATE_ITEM,
            "Baud rate",
            d.baudrate.clone().unwrap_or_default(),
        ));
        baudrate.hidden = d.baudrate.is_none();
        out.push(baudrate);

        let mut auth = Property::new(
            PropertyKind::Text,
            name,
            names::AUTHENTICATION,
            names::GROUP_MAIN,
            "Authentication",
            PropertyState::Idle,
            Permission::WriteOnly,
            2,
        )
        .with_item(Item::text(names::AUTHENTICATION_USER, "User", ""))
        .with_item(Item::text(names::AUTHENTICATION_PASSWORD, "Password", ""));
        auth.hidden = !d.authentication;
        out.push(auth);

        let mut instances = Property::new(
            PropertyKind::Number,
            name,
            names::ADDITIONAL_INSTANCES,
            names::GROUP_MAIN,
            "Additional instances",
            PropertyState::Idle,
            Permission::ReadWrite,
            1,
        )
        .with_item(Item::number(
            names::ADDITIONAL_INSTANCES_COUNT,
            "Count",
            0.0,
            crate::instances::MAX_ADDITIONAL_INSTANCES as f64,
            1.0,
            0.0,
        ));
        instances.hidden = self.is_clone();
        out.push(instances);

        out
    }

    /// Apply a request onto a standard property in place. Returns `false`
    /// when the property is unknown, handing the request to the driver.
    async fn apply_generic(&self, request: &PropertyRequest) -> Result<bool> {
        let snapshot = {
            let mut properties = self.inner.properties.write().await;
            let Some(property) = properties.iter_mut().find(|p| p.name == request.name) else {
                return Ok(false);
            };
            if property.perm == Permission::ReadOnly {
                warn!(device = %self.inner.name, property = %request.name,
                    "change request for read-only property refused");
                return Ok(true);
            }
            match property.copy_values(request, false) {
                Ok(()) => property.state = PropertyState::Ok,
                Err(e) => {
                    property.state = PropertyState::Alert;
                    let snapshot = property.clone();
                    drop(properties);
                    self.inner.bus.update(&snapshot, Some(e.to_string()));
                    return Ok(true);
                }
            }
            let mut snapshot = property.clone();
            // Write-only values are applied but never echoed back.
            if snapshot.perm == Permission::WriteOnly {
                for item in &mut snapshot.items {
                    if let ItemValue::Text(text) = &mut item.value {
                        text.clear();
                    }
                }
            }
            snapshot
        };
        self.inner.bus.update(&snapshot, None);
        Ok(true)
    }

    async fn handle_connection(&self, request: &PropertyRequest) -> Result<()> {
        let connected = request
            .item(names::CONNECTION_CONNECTED)
            .and_then(RequestValue::as_switch);
        let disconnected = request
            .item(names::CONNECTION_DISCONNECTED)
            .and_then(RequestValue::as_switch);
        // Check and claim in one critical section: a concurrent request
        // must either win the transition or observe Busy.
        let (want, snapshot) = {
            let mut properties = self.inner.properties.write().await;
            let property = properties
                .iter_mut()
                .find(|p| p.name == names::CONNECTION)
                .ok_or_else(|| BusError::NotFound(names::CONNECTION.to_string()))?;
            if property.state == PropertyState::Busy {
                debug!(device = %self.inner.name, "connection change ignored while busy");
                return Ok(());
            }
            let current = property
                .item(names::CONNECTION_CONNECTED)
                .map(Item::is_on)
                .unwrap_or(false);
            let Some(want) = connection_target(connected, disconnected, current) else {
                debug!(device = %self.inner.name, "connection request is a no-op");
                return Ok(());
            };
            property.state = PropertyState::Busy;
            (want, property.clone())
        };
        self.inner.bus.update(&snapshot, None);
        if want {
            self.connect(request).await
        } else {
            self.disconnect(request).await
        }
    }

    // The CONNECTION property is already Busy when these run; every exit
    // path settles it to Ok or Alert.
    async fn connect(&self, request: &PropertyRequest) -> Result<()> {
        let key = self.lock_key();
        if let Err(e) = self.inner.locks.acquire(&key) {
            return self
                .update_property(names::CONNECTION, Some(e.to_string()), |p| {
                    select(p, names::CONNECTION_DISCONNECTED);
                    p.state = PropertyState::Alert;
                })
                .await;
        }
        match self.inner.driver.change_property(self, request).await {
            Ok(()) => {
                info!(device = %self.inner.name, "connected");
                self.update_property(names::CONNECTION, None, |p| {
                    select(p, names::CONNECTION_CONNECTED);
                    p.state = PropertyState::Ok;
                })
                .await
            }
            Err(e) => {
                warn!(device = %self.inner.name, error = %e, "connect failed");
                self.inner.locks.release(&key);
                self.update_property(names::CONNECTION, Some(e.to_string()), |p| {
                    select(p, names::CONNECTION_DISCONNECTED);
                    p.state = PropertyState::Alert;
                })
                .await
            }
        }
    }

    async fn disconnect(&self, request: &PropertyRequest) -> Result<()> {
        let result = self.inner.driver.change_property(self, request).await;
        // The lock goes away even if the driver failed to shut down
        // cleanly; the device is disconnected either way.
        self.inner.locks.release(&self.lock_key());
        let (state, message) = match result {
            Ok(()) => {
                info!(device = %self.inner.name, "disconnected");
                (PropertyState::Ok, None)
            }
            Err(e) => {
                warn!(device = %self.inner.name, error = %e, "disconnect failed");
                (PropertyState::Alert, Some(e.to_string()))
            }
        };
        self.update_property(names::CONNECTION, message, |p| {
            select(p, names::CONNECTION_DISCONNECTED);
            p.state = state;
        })
        .await
    }

    /// Index of the currently selected profile.
    async fn active_profile(&self) -> usize {
        let Some(profile) = self.property(names::PROFILE).await else {
            return 0;
        };
        profile
            .selected()
            .and_then(|name| name.strip_prefix(names::PROFILE_ITEM_PREFIX))
            .and_then(|index| index.parse().ok())
            .unwrap_or(0)
    }

    /// Properties included in a saved configuration: writable, visible,
    /// minus the action vectors whose replay would have side effects.
    async fn persisted_properties(&self) -> Vec<Property> {
        const EXCLUDED: [&str; 3] = [names::CONNECTION, names::CONFIG, names::PROFILE];
        let extra = self
            .inner
            .saved_extra
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        self.inner
            .properties
            .read()
            .await
            .iter()
            .filter(|p| {
                extra.iter().any(|name| *name == p.name)
                    || (p.perm == Permission::ReadWrite
                        && !p.hidden
                        && !EXCLUDED.contains(&p.name.as_str()))
            })
            .cloned()
            .collect()
    }

    async fn handle_config(&self, request: &PropertyRequest) -> Result<()> {
        let on = |item: &str| {
            request
                .item(item)
                .and_then(RequestValue::as_switch)
                .unwrap_or(false)
        };
        let profile = self.active_profile().await;
        let _gate = self.inner.config_gate.lock().await;

        let outcome = if on(names::CONFIG_SAVE) {
            let snapshot = self.persisted_properties().await;
            self.inner
                .config
                .save(self.name(), profile, &snapshot)
                .map(|()| format!("configuration saved to profile {profile}"))
        } else if on(names::CONFIG_LOAD) {
            self.replay_config(profile)
                .await
                .map(|count| format!("{count} properties loaded from profile {profile}"))
        } else if on(names::CONFIG_REMOVE) {
            self.inner
                .config
                .remove(self.name(), profile)
                .map(|()| format!("profile {profile} removed"))
        } else {
            return Ok(());
        };

        let (state, message) = match outcome {
            Ok(message) => (PropertyState::Ok, message),
            Err(e) => {
                warn!(device = %self.inner.name, error = %e, "configuration action failed");
                (PropertyState::Alert, e.to_string())
            }
        };
        // Action switches are write-once: they always report back off.
        self.update_property(names::CONFIG, Some(message), |p| {
            for item in &mut p.items {
                if let ItemValue::Switch(value) = &mut item.value {
                    *value = false;
                }
            }
            p.state = state;
        })
        .await
    }

    /// Replay a saved profile as ordinary change requests.
    async fn replay_config(&self, profile: usize) -> Result<usize> {
        let changes = self.inner.config.load(self.name(), profile)?;
        let mut applied = 0usize;
        for change in &changes {
            // A replayed CONFIG action would re-enter the gate we hold.
            if change.name == names::CONFIG {
                continue;
            }
            match self.change_property(change).await {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!(device = %self.inner.name, property = %change.name, error = %e,
                        "saved property did not apply");
                }
            }
        }
        Ok(applied)
    }
}

/// The connection transition guard.
///
/// Connection requests arrive as a pair of optional switch values; the
/// request proceeds only if it asks for a genuine transition away from
/// `current`, otherwise it is ignored. Contradictory and redundant pairs
/// are ignored rather than rejected.
fn connection_target(
    connected: Option<bool>,
    disconnected: Option<bool>,
    current: bool,
) -> Option<bool> {
    match (connected, disconnected) {
        (Some(a), Some(b)) if a == b => None,
        (Some(a), Some(_)) => (a != current).then_some(a),
        (Some(a), None) => (a && !current).then_some(true),
        (None, Some(b)) => (b && current).then_some(false),
        (None, None) => None,
    }
}

/// Turn exactly the named switch on.
fn select(property: &mut Property, name: &str) {
    for item in &mut property.items {
        if let ItemValue::Switch(on) = &mut item.value {
            *on = item.name == name;
        }
    }
}

#[async_trait]
impl Device for BaseDevice {
    fn name(&self) -> String {
        self.inner.name.clone()
    }

    async fn attach(&self) -> Result<()> {
        self.inner.live.store(false, Ordering::Release);
        {
            let mut properties = self.inner.properties.write().await;
            properties.clear();
            properties.extend(self.standard_properties());
        }
        if let Err(e) = self.inner.driver.attach(self).await {
            // Atomic on failure: no property survives a failed attach,
            // and since the device never went live, none was announced.
            self.inner.properties.write().await.clear();
            return Err(e);
        }
        self.inner.live.store(true, Ordering::Release);
        Ok(())
    }

    async fn enumerate_properties(&self, filter: &PropertyFilter) -> Result<()> {
        let snapshot: Vec<Property> = {
            let properties = self.inner.properties.read().await;
            properties
                .iter()
                .filter(|p| !p.hidden && p.matches(filter))
                .cloned()
                .collect()
        };
        for property in snapshot {
            self.inner.bus.define(&property, None);
        }
        self.inner.driver.enumerate_properties(self, filter).await
    }

    async fn change_property(&self, request: &PropertyRequest) -> Result<()> {
        match request.name.as_str() {
            names::CONNECTION => self.handle_connection(request).await,
            names::CONFIG => self.handle_config(request).await,
            names::ADDITIONAL_INSTANCES => self.handle_instances(request).await,
            _ => {
                if self.apply_generic(request).await? {
                    Ok(())
                } else {
                    self.inner.driver.change_property(self, request).await
                }
            }
        }
    }

    async fn detach(&self) -> Result<()> {
        self.inner.live.store(false, Ordering::Release);
        // Clones go first, while the bus still routes for them.
        let clones: Vec<BaseDevice> = {
            let mut instances = self.inner.instances.lock().await;
            instances.drain(..).collect()
        };
        for clone in clones {
            if let Err(e) = self.inner.bus.detach(clone.name()).await {
                warn!(device = %clone.name(), error = %e, "clone detach failed");
            }
        }
        let connected = self.is_connected().await;
        self.inner.driver.detach(self).await?;
        if connected {
            self.inner.locks.release(&self.lock_key());
        }
        self.inner.properties.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_guard_truth_table() {
        // (connected, disconnected, current) -> decision
        let cases = [
            (Some(true), Some(true), false, None),
            (Some(true), Some(true), true, None),
            (Some(false), Some(false), true, None),
            (Some(true), Some(false), false, Some(true)),
            (Some(true), Some(false), true, None),
            (Some(false), Some(true), true, Some(false)),
            (Some(false), Some(true), false, None),
            (Some(true), None, false, Some(true)),
            (Some(true), None, true, None),
            (Some(false), None, false, None),
            (Some(false), None, true, None),
            (None, Some(true), true, Some(false)),
            (None, Some(true), false, None),
            (None, Some(false), true, None),
            (None, Some(false), false, None),
            (None, None, true, None),
        ];
        for (connected, disconnected, current, expected) in cases {
            assert_eq!(
                connection_target(connected, disconnected, current),
                expected,
                "connected={connected:?} disconnected={disconnected:?} current={current}"
            );
        }
    }

    #[test]
    fn select_is_exclusive() {
        let mut property = Property::switch(
            "Dev",
            names::CONNECTION,
            names::GROUP_MAIN,
            "Connection",
            PropertyState::Idle,
            Permission::ReadWrite,
            SwitchRule::OneOfMany,
            2,
        )
        .with_item(Item::switch(names::CONNECTION_CONNECTED, "Connected", false))
        .with_item(Item::switch(names::CONNECTION_DISCONNECTED, "Disconnected", true));
        select(&mut property, names::CONNECTION_CONNECTED);
        assert_eq!(property.selected(), Some(names::CONNECTION_CONNECTED));
    }
}
