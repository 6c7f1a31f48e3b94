//! Standard property and item names.
//!
//! These strings are part of the protocol contract; clients key their
//! behavior off them, so they are never localized or renamed.

/// Connection switch vector.
pub const CONNECTION: &str = "CONNECTION";
pub const CONNECTION_CONNECTED: &str = "CONNECTED";
pub const CONNECTION_DISCONNECTED: &str = "DISCONNECTED";

/// Read-only device identity vector.
pub const INFO: &str = "INFO";
pub const INFO_DEVICE_NAME: &str = "DEVICE_NAME";
pub const INFO_DEVICE_DRIVER: &str = "DEVICE_DRIVER";
pub const INFO_DEVICE_VERSION: &str = "DEVICE_VERSION";
pub const INFO_DEVICE_INTERFACE: &str = "DEVICE_INTERFACE";
pub const INFO_DEVICE_MODEL: &str = "DEVICE_MODEL";
pub const INFO_DEVICE_FIRMWARE: &str = "DEVICE_FIRMWARE_REVISION";
pub const INFO_DEVICE_SERIAL: &str = "DEVICE_SERIAL_NUMBER";

/// Simulation mode toggle; hidden unless the driver opts in.
pub const SIMULATION: &str = "SIMULATION";
pub const SIMULATION_ENABLED: &str = "ENABLED";
pub const SIMULATION_DISABLED: &str = "DISABLED";

/// Configuration action switches, write-once per request.
pub const CONFIG: &str = "CONFIG";
pub const CONFIG_LOAD: &str = "LOAD";
pub const CONFIG_SAVE: &str = "SAVE";
pub const CONFIG_REMOVE: &str = "REMOVE";

/// Active configuration profile selector.
pub const PROFILE: &str = "PROFILE";
pub const PROFILE_ITEM_PREFIX: &str = "PROFILE_";

/// Serial/network endpoint the driver talks to.
pub const DEVICE_PORT: &str = "DEVICE_PORT";
pub const DEVICE_PORT_ITEM: &str = "PORT";

/// Enumerated choice of known endpoints.
pub const DEVICE_PORTS: &str = "DEVICE_PORTS";

/// Serial line speed.
pub const DEVICE_BAUDRATE: &str = "DEVICE_BAUDRATE";
pub const DEVICE_BAUDRATE_ITEM: &str = "BAUD_RATE";

/// Write-only credentials vector.
pub const AUTHENTICATION: &str = "AUTHENTICATION";
pub const AUTHENTICATION_USER: &str = "USER";
pub const AUTHENTICATION_PASSWORD: &str = "PASSWORD";

/// Clone instance count.
pub const ADDITIONAL_INSTANCES: &str = "ADDITIONAL_INSTANCES";
pub const ADDITIONAL_INSTANCES_COUNT: &str = "COUNT";

/// Default UI group for the standard properties.
pub const GROUP_MAIN: &str = "Main";
