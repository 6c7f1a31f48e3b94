//! Generic device lifecycle on top of the property bus.
//!
//! This crate provides the skeleton every concrete driver plugs into:
//!
//! - [`BaseDevice`] implements the bus [`Device`](starbus_core::Device)
//!   contract once, maintaining the standard property set (connection,
//!   info, configuration, profiles, ports, credentials, instance count)
//!   and delegating everything hardware-specific to a [`Driver`].
//! - [`ConfigStore`] persists writable properties as replayable wire
//!   messages, one profile file per device.
//! - [`LockManager`] arbitrates exclusive hardware access between
//!   processes with advisory lock files.
//!
//! Additional instances (clone devices sharing one driver) are managed by
//! the base device itself; see [`BaseDevice::set_instance_count`].

pub mod base;
pub mod config;
pub mod driver;
mod instances;
pub mod lock;
pub mod names;

pub use base::{BaseDevice, DeviceDescriptor};
pub use config::ConfigStore;
pub use driver::Driver;
pub use instances::MAX_ADDITIONAL_INSTANCES;
pub use lock::LockManager;

/// Default TCP port of the bus server; config file names carry a suffix
/// for any other port so several server instances keep separate profiles.
pub const DEFAULT_PORT: u16 = 7624;

/// Turn a device name into something safe for file names.
pub(crate) fn file_safe_name(name: &str) -> String {
    name.replace(' ', "_")
}
