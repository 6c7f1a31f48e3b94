//! The wire message catalogue.
//!
//! Message-kind keys are bit-exact with the protocol: inbound
//! `getProperties` / `newXVector` / `enableBLOB`, outbound `defXVector` /
//! `setXVector` / `deleteProperty` / `message`.

use starbus_core::{BlobMode, PropertyKind, PropertyRequest};

/// A fully decoded inbound request, dispatched only once its top-level
/// object has closed.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Property discovery; empty device/name filter fields are wildcards.
    GetProperties {
        version: Option<String>,
        client: Option<String>,
        device: Option<String>,
        name: Option<String>,
    },
    /// A `newXVector` change request.
    Change(PropertyRequest),
    /// Per-client blob delivery negotiation.
    EnableBlob {
        device: String,
        name: Option<String>,
        mode: BlobMode,
    },
}

/// Map an inbound `newXVector` key to its vector kind.
pub fn new_vector_kind(key: &str) -> Option<PropertyKind> {
    match key {
        "newTextVector" => Some(PropertyKind::Text),
        "newNumberVector" => Some(PropertyKind::Number),
        "newSwitchVector" => Some(PropertyKind::Switch),
        _ => None,
    }
}

/// Inbound `newXVector` key for a vector kind; `None` for kinds clients
/// cannot write (lights, blobs).
pub fn new_vector_key(kind: PropertyKind) -> Option<&'static str> {
    match kind {
        PropertyKind::Text => Some("newTextVector"),
        PropertyKind::Number => Some("newNumberVector"),
        PropertyKind::Switch => Some("newSwitchVector"),
        PropertyKind::Light | PropertyKind::Blob => None,
    }
}

/// Outbound `defXVector` key for a vector kind.
pub fn def_vector_key(kind: PropertyKind) -> &'static str {
    match kind {
        PropertyKind::Text => "defTextVector",
        PropertyKind::Number => "defNumberVector",
        PropertyKind::Switch => "defSwitchVector",
        PropertyKind::Light => "defLightVector",
        PropertyKind::Blob => "defBLOBVector",
    }
}

/// Outbound `setXVector` key for a vector kind.
pub fn set_vector_key(kind: PropertyKind) -> &'static str {
    match kind {
        PropertyKind::Text => "setTextVector",
        PropertyKind::Number => "setNumberVector",
        PropertyKind::Switch => "setSwitchVector",
        PropertyKind::Light => "setLightVector",
        PropertyKind::Blob => "setBLOBVector",
    }
}
