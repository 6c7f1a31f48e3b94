//! End-to-end lifecycle tests: attach, connection guard, configuration
//! round trips, clone instances and hardware locks, all through the bus.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use starbus_core::{
    Bus, BusError, Item, Permission, Property, PropertyKind, PropertyRequest, PropertyState,
    RequestValue, Result,
};
use starbus_devices::{names, BaseDevice, ConfigStore, DeviceDescriptor, Driver, LockManager};
use tokio::sync::broadcast;

/// Driver that counts connection transitions and can be told to fail the
/// next one.
#[derive(Default)]
struct CountingDriver {
    transitions: AtomicUsize,
    fail_next: AtomicBool,
}

#[async_trait]
impl Driver for CountingDriver {
    async fn change_property(&self, _device: &BaseDevice, request: &PropertyRequest) -> Result<()> {
        if request.name == names::CONNECTION {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(BusError::failed("port open failed"));
            }
            self.transitions.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct Rig {
    bus: Bus,
    device: BaseDevice,
    driver: Arc<CountingDriver>,
    _config_dir: tempfile::TempDir,
    _lock_dir: tempfile::TempDir,
}

fn rig_with(descriptor: DeviceDescriptor) -> Rig {
    let bus = Bus::new("test");
    let config_dir = tempfile::tempdir().unwrap();
    let lock_dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(CountingDriver::default());
    let device = BaseDevice::new(
        descriptor,
        driver.clone(),
        bus.clone(),
        ConfigStore::new(config_dir.path(), 7624),
        Arc::new(LockManager::new(lock_dir.path())),
    );
    Rig {
        bus,
        device,
        driver,
        _config_dir: config_dir,
        _lock_dir: lock_dir,
    }
}

fn rig(name: &str) -> Rig {
    rig_with(DeviceDescriptor::new(name, "test_driver", "1.0").with_port("/dev/ttyUSB0"))
}

fn connection_request(device: &str, item: &str, on: bool) -> PropertyRequest {
    PropertyRequest::new(PropertyKind::Switch, device, names::CONNECTION)
        .with_item(item, RequestValue::Switch(on))
}

/// Driver that defines a property of its own and then fails to attach.
struct DefineThenFailDriver;

#[async_trait]
impl Driver for DefineThenFailDriver {
    async fn attach(&self, device: &BaseDevice) -> Result<()> {
        let temperature = Property::new(
            PropertyKind::Number,
            device.name(),
            "CCD_TEMPERATURE",
            "Main",
            "Temperature",
            PropertyState::Idle,
            Permission::ReadWrite,
            1,
        )
        .with_item(Item::number("TEMPERATURE", "Temperature", -50.0, 50.0, 0.5, 0.0));
        device.define_property(temperature, None).await?;
        Err(BusError::failed("sensor init failed"))
    }
}

/// Driver whose connect issues a second connection request through the
/// bus; the transition already in flight must shadow it.
#[derive(Default)]
struct NestedConnectDriver {
    driver_calls: AtomicUsize,
}

#[async_trait]
impl Driver for NestedConnectDriver {
    async fn change_property(&self, device: &BaseDevice, request: &PropertyRequest) -> Result<()> {
        if request.name == names::CONNECTION
            && self.driver_calls.fetch_add(1, Ordering::SeqCst) == 0
        {
            device
                .bus()
                .change_property(&connection_request(
                    device.name(),
                    names::CONNECTION_CONNECTED,
                    true,
                ))
                .await?;
        }
        Ok(())
    }
}

#[tokio::test]
async fn attach_defines_standard_properties_disconnected() {
    let rig = rig("CCD Imager");
    rig.device.attach_to_bus().await.unwrap();

    let connection = rig.device.property(names::CONNECTION).await.unwrap();
    assert_eq!(connection.selected(), Some(names::CONNECTION_DISCONNECTED));
    assert!(!rig.device.is_connected().await);

    let info = rig.device.property(names::INFO).await.unwrap();
    assert_eq!(
        info.item(names::INFO_DEVICE_NAME).map(|i| &i.value),
        Some(&starbus_core::ItemValue::Text("CCD Imager".into()))
    );

    // Hidden vectors exist but are never announced.
    let simulation = rig.device.property(names::SIMULATION).await.unwrap();
    assert!(simulation.hidden);
    let port = rig.device.property(names::DEVICE_PORT).await.unwrap();
    assert!(!port.hidden);
}

#[tokio::test]
async fn failed_attach_announces_nothing() {
    let bus = Bus::new("test");
    let config_dir = tempfile::tempdir().unwrap();
    let lock_dir = tempfile::tempdir().unwrap();
    let device = BaseDevice::new(
        DeviceDescriptor::new("CCD Imager", "test_driver", "1.0"),
        Arc::new(DefineThenFailDriver),
        bus.clone(),
        ConfigStore::new(config_dir.path(), 7624),
        Arc::new(LockManager::new(lock_dir.path())),
    );

    let mut rx = bus.subscribe();
    assert!(device.attach_to_bus().await.is_err());

    // Nothing registered, and no subscriber saw a definition.
    assert_eq!(bus.device_count().await, 0);
    assert!(device.property("CCD_TEMPERATURE").await.is_none());
    assert!(matches!(
        rx.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn connect_in_flight_shadows_a_second_request() {
    let bus = Bus::new("test");
    let config_dir = tempfile::tempdir().unwrap();
    let lock_dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(NestedConnectDriver::default());
    let device = BaseDevice::new(
        DeviceDescriptor::new("CCD Imager", "test_driver", "1.0"),
        driver.clone(),
        bus.clone(),
        ConfigStore::new(config_dir.path(), 7624),
        Arc::new(LockManager::new(lock_dir.path())),
    );
    device.attach_to_bus().await.unwrap();

    bus.change_property(&connection_request(
        "CCD Imager",
        names::CONNECTION_CONNECTED,
        true,
    ))
    .await
    .unwrap();

    // The nested request saw the Busy transition and never reached the
    // driver; the outer one completed normally.
    assert_eq!(driver.driver_calls.load(Ordering::SeqCst), 1);
    assert!(device.is_connected().await);
}

#[tokio::test]
async fn connect_then_redundant_connect_is_ignored() {
    let rig = rig("CCD Imager");
    rig.device.attach_to_bus().await.unwrap();

    rig.bus
        .change_property(&connection_request(
            "CCD Imager",
            names::CONNECTION_CONNECTED,
            true,
        ))
        .await
        .unwrap();
    assert!(rig.device.is_connected().await);
    assert_eq!(rig.driver.transitions.load(Ordering::SeqCst), 1);

    // Same request again: no transition, no driver call.
    rig.bus
        .change_property(&connection_request(
            "CCD Imager",
            names::CONNECTION_CONNECTED,
            true,
        ))
        .await
        .unwrap();
    assert_eq!(rig.driver.transitions.load(Ordering::SeqCst), 1);
    assert!(rig.device.is_connected().await);
}

#[tokio::test]
async fn contradictory_connection_request_is_ignored() {
    let rig = rig("CCD Imager");
    rig.device.attach_to_bus().await.unwrap();

    let request = PropertyRequest::new(PropertyKind::Switch, "CCD Imager", names::CONNECTION)
        .with_item(names::CONNECTION_CONNECTED, RequestValue::Switch(true))
        .with_item(names::CONNECTION_DISCONNECTED, RequestValue::Switch(true));
    rig.bus.change_property(&request).await.unwrap();

    assert!(!rig.device.is_connected().await);
    assert_eq!(rig.driver.transitions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn disconnected_false_alone_never_connects() {
    let rig = rig("CCD Imager");
    rig.device.attach_to_bus().await.unwrap();

    rig.bus
        .change_property(&connection_request(
            "CCD Imager",
            names::CONNECTION_DISCONNECTED,
            false,
        ))
        .await
        .unwrap();
    assert!(!rig.device.is_connected().await);
    assert_eq!(rig.driver.transitions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_connect_reports_alert_and_releases_lock() {
    let rig = rig("CCD Imager");
    rig.device.attach_to_bus().await.unwrap();
    rig.driver.fail_next.store(true, Ordering::SeqCst);

    rig.bus
        .change_property(&connection_request(
            "CCD Imager",
            names::CONNECTION_CONNECTED,
            true,
        ))
        .await
        .unwrap();

    let connection = rig.device.property(names::CONNECTION).await.unwrap();
    assert_eq!(connection.state, PropertyState::Alert);
    assert_eq!(connection.selected(), Some(names::CONNECTION_DISCONNECTED));

    // The lock was released, so the next attempt can succeed.
    rig.bus
        .change_property(&connection_request(
            "CCD Imager",
            names::CONNECTION_CONNECTED,
            true,
        ))
        .await
        .unwrap();
    assert!(rig.device.is_connected().await);
}

#[tokio::test]
async fn save_mutate_load_restores_values() {
    let rig = rig("CCD Imager");
    rig.device.attach_to_bus().await.unwrap();

    let config = |item: &str| {
        PropertyRequest::new(PropertyKind::Switch, "CCD Imager", names::CONFIG)
            .with_item(item, RequestValue::Switch(true))
    };
    rig.bus.change_property(&config(names::CONFIG_SAVE)).await.unwrap();

    // Mutate the port, then load the saved profile back.
    let set_port = PropertyRequest::new(PropertyKind::Text, "CCD Imager", names::DEVICE_PORT)
        .with_item(names::DEVICE_PORT_ITEM, RequestValue::Text("/dev/ttyUSB9".into()));
    rig.bus.change_property(&set_port).await.unwrap();
    let port = rig.device.property(names::DEVICE_PORT).await.unwrap();
    assert_eq!(
        port.item(names::DEVICE_PORT_ITEM).map(|i| &i.value),
        Some(&starbus_core::ItemValue::Text("/dev/ttyUSB9".into()))
    );

    rig.bus.change_property(&config(names::CONFIG_LOAD)).await.unwrap();
    let port = rig.device.property(names::DEVICE_PORT).await.unwrap();
    assert_eq!(
        port.item(names::DEVICE_PORT_ITEM).map(|i| &i.value),
        Some(&starbus_core::ItemValue::Text("/dev/ttyUSB0".into()))
    );

    // The action switches always come back off.
    let config_property = rig.device.property(names::CONFIG).await.unwrap();
    assert!(config_property.selected().is_none());
    assert_eq!(config_property.state, PropertyState::Ok);
}

#[tokio::test]
async fn load_of_missing_profile_sets_alert() {
    let rig = rig("CCD Imager");
    rig.device.attach_to_bus().await.unwrap();

    let load = PropertyRequest::new(PropertyKind::Switch, "CCD Imager", names::CONFIG)
        .with_item(names::CONFIG_LOAD, RequestValue::Switch(true));
    rig.bus.change_property(&load).await.unwrap();

    let config = rig.device.property(names::CONFIG).await.unwrap();
    assert_eq!(config.state, PropertyState::Alert);
}

#[tokio::test]
async fn instances_grow_and_connected_clone_blocks_shrink() {
    let rig = rig("CCD Imager");
    rig.device.attach_to_bus().await.unwrap();

    let count_request = |count: f64| {
        PropertyRequest::new(PropertyKind::Number, "CCD Imager", names::ADDITIONAL_INSTANCES)
            .with_item(names::ADDITIONAL_INSTANCES_COUNT, RequestValue::Number(count))
    };
    rig.bus.change_property(&count_request(3.0)).await.unwrap();
    assert_eq!(rig.device.instance_count().await, 3);
    assert_eq!(rig.bus.device_count().await, 4);
    assert!(rig.bus.device("CCD Imager #2").await.is_some());
    assert!(rig.bus.device("CCD Imager #4").await.is_some());

    // Connect the second clone, then try to shrink past it.
    rig.bus
        .change_property(&connection_request(
            "CCD Imager #3",
            names::CONNECTION_CONNECTED,
            true,
        ))
        .await
        .unwrap();
    rig.bus.change_property(&count_request(1.0)).await.unwrap();

    assert_eq!(rig.device.instance_count().await, 3);
    assert_eq!(rig.bus.device_count().await, 4);
    let instances = rig.device.property(names::ADDITIONAL_INSTANCES).await.unwrap();
    assert_eq!(instances.state, PropertyState::Alert);
    match &instances.item(names::ADDITIONAL_INSTANCES_COUNT).unwrap().value {
        starbus_core::ItemValue::Number(n) => assert_eq!(n.value, 3.0),
        other => panic!("unexpected value {other:?}"),
    }

    // Disconnecting unblocks the shrink.
    rig.bus
        .change_property(&connection_request(
            "CCD Imager #3",
            names::CONNECTION_DISCONNECTED,
            true,
        ))
        .await
        .unwrap();
    rig.bus.change_property(&count_request(1.0)).await.unwrap();
    assert_eq!(rig.device.instance_count().await, 1);
    assert_eq!(rig.bus.device_count().await, 2);
}

#[tokio::test]
async fn slave_failure_keeps_master_count_honest() {
    let bus = Bus::new("test");
    let config_dir = tempfile::tempdir().unwrap();
    let lock_dir = tempfile::tempdir().unwrap();
    let locks = Arc::new(LockManager::new(lock_dir.path()));
    let make = |name: &str| {
        BaseDevice::new(
            DeviceDescriptor::new(name, "test_driver", "1.0"),
            Arc::new(CountingDriver::default()),
            bus.clone(),
            ConfigStore::new(config_dir.path(), 7624),
            Arc::clone(&locks),
        )
    };
    let scope = make("Scope");
    let guider = make("Guider");
    scope.attach_to_bus().await.unwrap();
    guider.attach_to_bus().await.unwrap();
    scope.register_slave(guider.clone()).await;

    let count_request = |count: f64| {
        PropertyRequest::new(PropertyKind::Number, "Scope", names::ADDITIONAL_INSTANCES)
            .with_item(names::ADDITIONAL_INSTANCES_COUNT, RequestValue::Number(count))
    };
    bus.change_property(&count_request(2.0)).await.unwrap();
    assert_eq!(scope.instance_count().await, 2);
    assert_eq!(guider.instance_count().await, 2);
    assert_eq!(bus.device_count().await, 6);

    // A guider clone disappears behind the manager's back, so the next
    // shrink fails on the slave - before the master is touched.
    bus.detach("Guider #2").await.unwrap();
    bus.change_property(&count_request(0.0)).await.unwrap();

    assert_eq!(scope.instance_count().await, 2);
    let instances = scope.property(names::ADDITIONAL_INSTANCES).await.unwrap();
    assert_eq!(instances.state, PropertyState::Alert);
    match &instances.item(names::ADDITIONAL_INSTANCES_COUNT).unwrap().value {
        starbus_core::ItemValue::Number(n) => assert_eq!(n.value, 2.0),
        other => panic!("unexpected value {other:?}"),
    }
}

#[tokio::test]
async fn second_process_cannot_connect_locked_hardware() {
    let lock_dir = tempfile::tempdir().unwrap();
    let make = |bus_name: &str, device_name: &str| {
        let bus = Bus::new(bus_name.to_string());
        let config_dir = tempfile::tempdir().unwrap();
        let device = BaseDevice::new(
            DeviceDescriptor::new(device_name, "test_driver", "1.0").with_master("Shared Scope"),
            Arc::new(CountingDriver::default()),
            bus.clone(),
            ConfigStore::new(config_dir.path(), 7624),
            Arc::new(LockManager::new(lock_dir.path())),
        );
        (bus, device, config_dir)
    };

    // Two bus servers pointing at the same hardware.
    let (bus_a, device_a, _tmp_a) = make("a", "Mount");
    let (bus_b, device_b, _tmp_b) = make("b", "Mount");
    device_a.attach_to_bus().await.unwrap();
    device_b.attach_to_bus().await.unwrap();

    bus_a
        .change_property(&connection_request("Mount", names::CONNECTION_CONNECTED, true))
        .await
        .unwrap();
    assert!(device_a.is_connected().await);

    bus_b
        .change_property(&connection_request("Mount", names::CONNECTION_CONNECTED, true))
        .await
        .unwrap();
    assert!(!device_b.is_connected().await);
    let connection = device_b.property(names::CONNECTION).await.unwrap();
    assert_eq!(connection.state, PropertyState::Alert);

    // Disconnecting the first owner frees the hardware for the second.
    bus_a
        .change_property(&connection_request("Mount", names::CONNECTION_DISCONNECTED, true))
        .await
        .unwrap();
    bus_b
        .change_property(&connection_request("Mount", names::CONNECTION_CONNECTED, true))
        .await
        .unwrap();
    assert!(device_b.is_connected().await);
}

#[tokio::test]
async fn detach_removes_clones_and_clears_properties() {
    let rig = rig("CCD Imager");
    rig.device.attach_to_bus().await.unwrap();
    rig.bus
        .change_property(
            &PropertyRequest::new(PropertyKind::Number, "CCD Imager", names::ADDITIONAL_INSTANCES)
                .with_item(names::ADDITIONAL_INSTANCES_COUNT, RequestValue::Number(2.0)),
        )
        .await
        .unwrap();
    assert_eq!(rig.bus.device_count().await, 3);

    rig.bus.detach("CCD Imager").await.unwrap();
    assert_eq!(rig.bus.device_count().await, 0);
    assert!(rig.device.property(names::CONNECTION).await.is_none());
}
