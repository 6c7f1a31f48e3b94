//! The contract between the generic lifecycle and a concrete driver.

use async_trait::async_trait;
use starbus_core::{PropertyFilter, PropertyRequest, Result};

use crate::base::BaseDevice;

/// Hardware-specific half of a device.
///
/// [`BaseDevice`] owns the property table, the standard properties and all
/// bookkeeping (configuration, locks, clone instances); the driver is
/// called at the same four lifecycle points the bus calls the device at,
/// with a handle it uses to define, update and delete its own properties.
///
/// One driver value may back several devices at once: every clone created
/// through `ADDITIONAL_INSTANCES` shares the `Arc<dyn Driver>` of its base
/// device, so driver state is per-driver, keyed by device name where it
/// must be per-instance.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Called once when the device is attached to the bus, after the
    /// standard properties exist. Define driver properties here.
    async fn attach(&self, _device: &BaseDevice) -> Result<()> {
        Ok(())
    }

    /// Called for every enumeration request after the standard properties
    /// have been (re)defined. Most drivers define all their properties at
    /// attach and need nothing here.
    async fn enumerate_properties(
        &self,
        _device: &BaseDevice,
        _filter: &PropertyFilter,
    ) -> Result<()> {
        Ok(())
    }

    /// Called for change requests the generic dispatch does not consume,
    /// and once per accepted connection transition (the `CONNECTION`
    /// request is forwarded after the transition guard admits it, so this
    /// is where hardware is actually opened or closed).
    async fn change_property(&self, _device: &BaseDevice, _request: &PropertyRequest)
        -> Result<()> {
        Ok(())
    }

    /// Called once when the device is detached; release hardware here.
    /// Properties are deleted by the base device afterwards.
    async fn detach(&self, _device: &BaseDevice) -> Result<()> {
        Ok(())
    }
}
