//! Typed property vectors - the vocabulary every bus component speaks.
//!
//! A device exposes its state as named, typed **properties**. Each property
//! is an ordered collection of named **items** plus per-vector metadata:
//! state, permission and (for switches) a selection rule. Clients never set
//! property state directly; they propose item values and the owning device's
//! change handler drives the state machine.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{BusError, Result};
use crate::request::{PropertyRequest, RequestValue};

// Binary payloads serialize as base64 strings.
mod blob_serde {
    use std::result::Result;

    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        match s {
            Some(s) => Ok(Some(STANDARD.decode(&s).map_err(serde::de::Error::custom)?)),
            None => Ok(None),
        }
    }
}

/// Settledness/outcome indicator carried by every property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PropertyState {
    /// Value is not yet meaningful.
    #[default]
    Idle,
    /// Settled; the last requested change succeeded.
    Ok,
    /// A change is in progress.
    Busy,
    /// The last requested change failed.
    Alert,
}

impl PropertyState {
    /// Wire token for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Ok => "Ok",
            Self::Busy => "Busy",
            Self::Alert => "Alert",
        }
    }
}

impl std::fmt::Display for PropertyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client access level for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Permission {
    /// Clients may only observe.
    ReadOnly,
    /// Clients may observe and propose item values.
    #[default]
    ReadWrite,
    /// Clients may propose values but never read them back (credentials).
    WriteOnly,
}

impl Permission {
    /// Wire token for this permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
            Self::WriteOnly => "wo",
        }
    }
}

/// Selection rule for switch-typed vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SwitchRule {
    /// Exactly one item is on at any time.
    #[default]
    OneOfMany,
    /// At most one item is on.
    AtMostOne,
    /// Items toggle independently.
    AnyOfMany,
}

impl SwitchRule {
    /// Wire token for this rule.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneOfMany => "OneOfMany",
            Self::AtMostOne => "AtMostOne",
            Self::AnyOfMany => "AnyOfMany",
        }
    }
}

/// Property type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Text,
    Number,
    Switch,
    Light,
    Blob,
}

/// Bounded, stepped numeric value with a desired/confirmed pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NumberValue {
    /// Printf-style presentation hint (opaque to the bus).
    pub format: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Desired value, as last proposed by a client.
    pub target: f64,
    /// Confirmed value, as last reported by the device.
    pub value: f64,
}

/// One value slot inside a property.
///
/// The interpretation depends on the owning property's kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemValue {
    /// Free text.
    Text(String),
    /// Bounded numeric value.
    Number(NumberValue),
    /// Boolean switch.
    Switch(bool),
    /// Read-only indicator mirroring a property state.
    Light(PropertyState),
    /// Opaque binary payload with a format tag; carried either inline or
    /// behind a previously negotiated URL.
    Blob {
        /// Format tag, e.g. ".fits" or ".jpeg".
        format: String,
        /// Negotiated download URL, if any.
        url: Option<String>,
        /// Inline payload bytes, base64 in serialized form.
        #[serde(with = "blob_serde", default)]
        data: Option<Vec<u8>>,
    },
}

impl ItemValue {
    /// The property kind this value belongs to.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Text(_) => PropertyKind::Text,
            Self::Number(_) => PropertyKind::Number,
            Self::Switch(_) => PropertyKind::Switch,
            Self::Light(_) => PropertyKind::Light,
            Self::Blob { .. } => PropertyKind::Blob,
        }
    }

    /// An empty value of the given kind, used when a vector grows.
    pub fn empty(kind: PropertyKind) -> Self {
        match kind {
            PropertyKind::Text => Self::Text(String::new()),
            PropertyKind::Number => Self::Number(NumberValue::default()),
            PropertyKind::Switch => Self::Switch(false),
            PropertyKind::Light => Self::Light(PropertyState::Idle),
            PropertyKind::Blob => Self::Blob {
                format: String::new(),
                url: None,
                data: None,
            },
        }
    }
}

/// One named value slot inside a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Item name, unique within its property.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Presentation metadata, opaque to the bus.
    #[serde(default)]
    pub hints: String,
    /// The value slot.
    pub value: ItemValue,
}

impl Item {
    /// Create a text item.
    pub fn text(name: impl Into<String>, label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            hints: String::new(),
            value: ItemValue::Text(value.into()),
        }
    }

    /// Create a number item; `target` starts equal to `value`.
    pub fn number(
        name: impl Into<String>,
        label: impl Into<String>,
        min: f64,
        max: f64,
        step: f64,
        value: f64,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            hints: String::new(),
            value: ItemValue::Number(NumberValue {
                format: "%g".to_string(),
                min,
                max,
                step,
                target: value,
                value,
            }),
        }
    }

    /// Create a switch item.
    pub fn switch(name: impl Into<String>, label: impl Into<String>, on: bool) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            hints: String::new(),
            value: ItemValue::Switch(on),
        }
    }

    /// Create a light item.
    pub fn light(name: impl Into<String>, label: impl Into<String>, state: PropertyState) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            hints: String::new(),
            value: ItemValue::Light(state),
        }
    }

    /// Create a blob item with a format tag and no payload yet.
    pub fn blob(name: impl Into<String>, label: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            hints: String::new(),
            value: ItemValue::Blob {
                format: format.into(),
                url: None,
                data: None,
            },
        }
    }

    /// Whether the switch item is on. `false` for non-switch items.
    pub fn is_on(&self) -> bool {
        matches!(self.value, ItemValue::Switch(true))
    }
}

/// Subscription filter: a two-field equality test where an empty device
/// or name is a wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyFilter {
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub name: String,
}

impl PropertyFilter {
    /// The match-everything filter.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter on a device name only.
    pub fn device(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            name: String::new(),
        }
    }
}

/// A named, typed, ordered collection of items belonging to exactly one
/// device - the unit of publish/subscribe on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Owning device name.
    pub device: String,
    /// Property name, unique within its device.
    pub name: String,
    pub kind: PropertyKind,
    /// Group for UI organization.
    pub group: String,
    /// Human-readable label.
    pub label: String,
    pub state: PropertyState,
    pub perm: Permission,
    /// Selection rule; meaningful for switch vectors only.
    pub rule: SwitchRule,
    /// Coarse per-device authorization token; 0 means none.
    #[serde(default)]
    pub token: u64,
    /// Presentation metadata, opaque to the bus.
    #[serde(default)]
    pub hints: String,
    /// Hidden properties are never defined to clients.
    #[serde(default)]
    pub hidden: bool,
    pub items: Vec<Item>,
}

impl Property {
    /// Create an empty property with room for `capacity` items.
    pub fn new(
        kind: PropertyKind,
        device: impl Into<String>,
        name: impl Into<String>,
        group: impl Into<String>,
        label: impl Into<String>,
        state: PropertyState,
        perm: Permission,
        capacity: usize,
    ) -> Self {
        Self {
            device: device.into(),
            name: name.into(),
            kind,
            group: group.into(),
            label: label.into(),
            state,
            perm,
            rule: SwitchRule::AnyOfMany,
            token: 0,
            hints: String::new(),
            hidden: false,
            items: Vec::with_capacity(capacity),
        }
    }

    /// Create an empty switch property with a selection rule.
    #[allow(clippy::too_many_arguments)]
    pub fn switch(
        device: impl Into<String>,
        name: impl Into<String>,
        group: impl Into<String>,
        label: impl Into<String>,
        state: PropertyState,
        perm: Permission,
        rule: SwitchRule,
        capacity: usize,
    ) -> Self {
        let mut property = Self::new(
            PropertyKind::Switch,
            device,
            name,
            group,
            label,
            state,
            perm,
            capacity,
        );
        property.rule = rule;
        property
    }

    /// Append an item. Item names must stay unique within the property.
    pub fn push(&mut self, item: Item) -> &mut Self {
        debug_assert_eq!(item.value.kind(), self.kind);
        self.items.push(item);
        self
    }

    /// Builder-style `push`.
    pub fn with_item(mut self, item: Item) -> Self {
        self.push(item);
        self
    }

    /// Look up an item by name.
    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.name == name)
    }

    /// Look up an item by name, mutably.
    pub fn item_mut(&mut self, name: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.name == name)
    }

    /// Grow or shrink the item vector while preserving index-addressed
    /// items: after `resize(m)` with `m < len`, items `[0..m)` are unchanged
    /// in name and value. Growth appends empty items of the vector's kind.
    ///
    /// Taking `&mut self` is the synchronization point that makes
    /// truncation safe; index identity of surviving items never changes.
    pub fn resize(&mut self, count: usize) {
        if count <= self.items.len() {
            self.items.truncate(count);
        } else {
            let kind = self.kind;
            self.items.resize_with(count, || Item {
                name: String::new(),
                label: String::new(),
                hints: String::new(),
                value: ItemValue::empty(kind),
            });
        }
    }

    /// Apply a client-submitted subset of items onto this property, never
    /// touching items the request omits. Unknown item names are skipped.
    ///
    /// With `validate_only` the property is left untouched and only the
    /// request's type compatibility is checked.
    ///
    /// Switch vectors honor their selection rule: for `OneOfMany` and
    /// `AtMostOne`, turning an item on clears every other item first (the
    /// last `true` in the request wins).
    pub fn copy_values(&mut self, request: &PropertyRequest, validate_only: bool) -> Result<()> {
        // Validation pass runs in both modes and must catch everything the
        // mutation pass could trip over, so a rejected request leaves the
        // property untouched rather than half-applied.
        for req in &request.items {
            let Some(item) = self.item(&req.name) else {
                continue;
            };
            let compatible = match (&item.value, &req.value) {
                (ItemValue::Text(_), RequestValue::Text(_))
                | (ItemValue::Number(_), RequestValue::Number(_))
                | (ItemValue::Switch(_), RequestValue::Switch(_)) => true,
                // Some clients send numbers as quoted strings.
                (ItemValue::Number(_), RequestValue::Text(text)) => {
                    if text.trim().parse::<f64>().is_err() {
                        return Err(BusError::failed(format!(
                            "item '{}' of '{}': invalid number '{text}'",
                            req.name, self.name
                        )));
                    }
                    true
                }
                _ => false,
            };
            if !compatible {
                return Err(BusError::failed(format!(
                    "item '{}' of '{}' does not accept a {} value",
                    req.name,
                    self.name,
                    req.value.kind_name()
                )));
            }
        }
        if validate_only {
            return Ok(());
        }

        for req in &request.items {
            let rule = self.rule;
            // Exclusive switch rules: a set bit clears the rest first.
            if let RequestValue::Switch(true) = req.value {
                if rule != SwitchRule::AnyOfMany && self.item(&req.name).is_some() {
                    for item in &mut self.items {
                        if let ItemValue::Switch(on) = &mut item.value {
                            *on = false;
                        }
                    }
                }
            }
            let Some(item) = self.item_mut(&req.name) else {
                continue;
            };
            match (&mut item.value, &req.value) {
                (ItemValue::Text(text), RequestValue::Text(value)) => {
                    *text = value.clone();
                }
                (ItemValue::Number(number), RequestValue::Number(value)) => {
                    number.target = *value;
                    number.value = *value;
                }
                (ItemValue::Number(number), RequestValue::Text(value)) => {
                    // Vetted by the validation pass above.
                    if let Ok(parsed) = value.trim().parse::<f64>() {
                        number.target = parsed;
                        number.value = parsed;
                    }
                }
                (ItemValue::Switch(on), RequestValue::Switch(value)) => {
                    *on = *value;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Two-field match against a subscription filter; empty filter fields
    /// are wildcards.
    pub fn matches(&self, filter: &PropertyFilter) -> bool {
        (filter.device.is_empty() || filter.device == self.device)
            && (filter.name.is_empty() || filter.name == self.name)
    }

    /// Check the item-name uniqueness invariant.
    pub fn names_unique(&self) -> bool {
        let mut seen = HashSet::new();
        self.items.iter().all(|i| seen.insert(i.name.as_str()))
    }

    /// Name of the switch item currently on, if any.
    pub fn selected(&self) -> Option<&str> {
        self.items.iter().find(|i| i.is_on()).map(|i| i.name.as_str())
    }
}
