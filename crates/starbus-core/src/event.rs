//! Bus events - the notifications a device publishes to clients.

use crate::property::{Property, PropertyFilter};

/// Notification published on the bus when a device's property lifecycle
/// advances. Events carry property snapshots so slow subscribers never
/// observe torn state.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// A property came into existence (or was redefined for a newly
    /// enumerating client; redefinition is idempotent).
    Define {
        property: Property,
        message: Option<String>,
    },
    /// A property's state or item values changed.
    Update {
        property: Property,
        message: Option<String>,
    },
    /// A property (or, with `name == None`, a whole device) went away.
    Delete {
        device: String,
        name: Option<String>,
        message: Option<String>,
    },
    /// Device-scoped or broadcast free-text note.
    Message {
        device: Option<String>,
        message: String,
    },
}

impl BusEvent {
    /// The device this event concerns, if any.
    pub fn device(&self) -> Option<&str> {
        match self {
            Self::Define { property, .. } | Self::Update { property, .. } => {
                Some(property.device.as_str())
            }
            Self::Delete { device, .. } => Some(device),
            Self::Message { device, .. } => device.as_deref(),
        }
    }

    /// Whether a client with the given subscription filter should see this
    /// event. Deletes and messages match on the device field alone.
    pub fn matches(&self, filter: &PropertyFilter) -> bool {
        match self {
            Self::Define { property, .. } | Self::Update { property, .. } => {
                property.matches(filter)
            }
            Self::Delete { device, name, .. } => {
                (filter.device.is_empty() || filter.device == *device)
                    && (filter.name.is_empty()
                        || name.as_deref().is_none_or(|n| n == filter.name))
            }
            Self::Message { device, .. } => {
                filter.device.is_empty()
                    || device.as_deref().is_none_or(|d| d == filter.device)
            }
        }
    }
}
