//! Client-submitted change requests.
//!
//! A request proposes new values for a subset of one property's items. It
//! is produced by the wire decoder (or by config replay, which goes through
//! the same decoder) and consumed by a device's change handler via
//! [`Property::copy_values`](crate::property::Property::copy_values).

use serde::{Deserialize, Serialize};

use crate::property::PropertyKind;

/// Proposed value for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestValue {
    Text(String),
    Number(f64),
    Switch(bool),
}

impl RequestValue {
    /// Name of the payload kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Switch(_) => "switch",
        }
    }

    /// Switch payload, if this is one.
    pub fn as_switch(&self) -> Option<bool> {
        match self {
            Self::Switch(on) => Some(*on),
            _ => None,
        }
    }

    /// Numeric payload, accepting quoted numbers as well.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// One item of a change request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRequest {
    pub name: String,
    pub value: RequestValue,
}

/// A `newXVector` change request targeting one property of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRequest {
    pub device: String,
    pub name: String,
    /// Vector kind as stated by the message key.
    pub kind: PropertyKind,
    /// Coarse per-device authorization token.
    pub token: Option<u64>,
    pub items: Vec<ItemRequest>,
}

impl PropertyRequest {
    /// Create an empty request of the given kind.
    pub fn new(kind: PropertyKind, device: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            name: name.into(),
            kind,
            token: None,
            items: Vec::new(),
        }
    }

    /// Builder-style item append.
    pub fn with_item(mut self, name: impl Into<String>, value: RequestValue) -> Self {
        self.items.push(ItemRequest {
            name: name.into(),
            value,
        });
        self
    }

    /// Look up a proposed item value by name.
    pub fn item(&self, name: &str) -> Option<&RequestValue> {
        self.items.iter().find(|i| i.name == name).map(|i| &i.value)
    }
}
