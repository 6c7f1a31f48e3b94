//! Property-bus core for heterogeneous instrument control.
//!
//! This crate defines the data model the whole middleware speaks: devices
//! expose named, typed **property vectors** made of **items**; clients
//! discover them via enumeration and mutate them with change requests; the
//! bus fans define/update/delete notifications out to every subscriber.
//!
//! ## Architecture
//!
//! - **Property model**: typed vectors (text/number/switch/light/blob) with
//!   per-vector state and per-item values ([`property`]).
//! - **Bus**: an explicit registry object owning attached devices and the
//!   event broadcast channel ([`bus`]); several buses coexist in one
//!   process, which keeps tests hermetic.
//! - **Device contract**: the four lifecycle entry points every device
//!   implementation provides ([`device`]).
//!
//! Wire encoding/decoding lives in `starbus-wire`; the generic device
//! lifecycle skeleton in `starbus-devices`.

pub mod bus;
pub mod client;
pub mod device;
pub mod error;
pub mod event;
pub mod property;
pub mod request;

pub use bus::{Bus, DEFAULT_CHANNEL_CAPACITY};
pub use client::{BlobMode, Client};
pub use device::Device;
pub use error::{BusError, Result};
pub use event::BusEvent;
pub use property::{
    Item, ItemValue, NumberValue, Permission, Property, PropertyFilter, PropertyKind,
    PropertyState, SwitchRule,
};
pub use request::{ItemRequest, PropertyRequest, RequestValue};

/// Protocol version announced in definitions and `getProperties`.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
