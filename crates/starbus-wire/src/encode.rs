//! Outbound message encoder.
//!
//! The encoder streams variable-length JSON through one shared growable
//! scratch buffer; all encodes on a process are serialized by the buffer's
//! mutex, which doubles as the global codec-output lock (a WebSocket frame
//! write must never interleave with another frame write on one socket).

use std::sync::Mutex;

use starbus_core::{
    BlobMode, BusEvent, ItemValue, Permission, Property, PropertyKind, PROTOCOL_VERSION,
};

use crate::escape::Escaper;
use crate::message::{def_vector_key, new_vector_key, set_vector_key};

/// Encoder for outbound notifications.
pub struct Encoder {
    scratch: Mutex<String>,
    escaper: Escaper,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            scratch: Mutex::new(String::with_capacity(1024)),
            escaper: Escaper::default(),
        }
    }

    /// Encode a bus event as one wire message.
    pub fn event(&self, event: &BusEvent, blob_mode: BlobMode) -> String {
        match event {
            BusEvent::Define { property, message } => self.define(property, message.as_deref()),
            BusEvent::Update { property, message } => {
                self.update(property, message.as_deref(), blob_mode)
            }
            BusEvent::Delete {
                device,
                name,
                message,
            } => self.delete(device, name.as_deref(), message.as_deref()),
            BusEvent::Message { device, message } => self.message(device.as_deref(), message),
        }
    }

    /// Encode a `defXVector` definition.
    pub fn define(&self, property: &Property, message: Option<&str>) -> String {
        let mut out = self.lock_scratch();
        self.begin(&mut out, def_vector_key(property.kind));
        let mut first = true;
        self.str_field(&mut out, &mut first, "version", PROTOCOL_VERSION);
        self.str_field(&mut out, &mut first, "device", &property.device);
        self.str_field(&mut out, &mut first, "name", &property.name);
        self.str_field(&mut out, &mut first, "group", &property.group);
        self.str_field(&mut out, &mut first, "label", &property.label);
        self.str_field(&mut out, &mut first, "perm", property.perm.as_str());
        self.str_field(&mut out, &mut first, "state", property.state.as_str());
        if property.kind == PropertyKind::Switch {
            self.str_field(&mut out, &mut first, "rule", property.rule.as_str());
        }
        if !property.hints.is_empty() {
            self.str_field(&mut out, &mut first, "hints", &property.hints);
        }
        if let Some(message) = message {
            self.str_field(&mut out, &mut first, "message", message);
        }
        self.items(&mut out, &mut first, property, true, BlobMode::Also);
        Self::end(&mut out);
        out.clone()
    }

    /// Encode a `setXVector` update (no group/label/perm/rule).
    pub fn update(&self, property: &Property, message: Option<&str>, blob_mode: BlobMode) -> String {
        let mut out = self.lock_scratch();
        self.begin(&mut out, set_vector_key(property.kind));
        let mut first = true;
        self.str_field(&mut out, &mut first, "device", &property.device);
        self.str_field(&mut out, &mut first, "name", &property.name);
        self.str_field(&mut out, &mut first, "state", property.state.as_str());
        if let Some(message) = message {
            self.str_field(&mut out, &mut first, "message", message);
        }
        self.items(&mut out, &mut first, property, false, blob_mode);
        Self::end(&mut out);
        out.clone()
    }

    /// Encode a `deleteProperty` notification; without a property name it
    /// deletes the whole device.
    pub fn delete(&self, device: &str, name: Option<&str>, message: Option<&str>) -> String {
        let mut out = self.lock_scratch();
        self.begin(&mut out, "deleteProperty");
        let mut first = true;
        self.str_field(&mut out, &mut first, "device", device);
        if let Some(name) = name {
            self.str_field(&mut out, &mut first, "name", name);
        }
        if let Some(message) = message {
            self.str_field(&mut out, &mut first, "message", message);
        }
        Self::end(&mut out);
        out.clone()
    }

    /// Encode a free-text `message` note, stamped with send time.
    pub fn message(&self, device: Option<&str>, message: &str) -> String {
        let mut out = self.lock_scratch();
        self.begin(&mut out, "message");
        let mut first = true;
        if let Some(device) = device {
            self.str_field(&mut out, &mut first, "device", device);
        }
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        self.str_field(&mut out, &mut first, "timestamp", &timestamp);
        self.str_field(&mut out, &mut first, "message", message);
        Self::end(&mut out);
        out.clone()
    }

    /// Encode a property's current values as the `newXVector` request that
    /// would reproduce them - the persisted config format. Lights and blobs
    /// have no client-writable form and return `None`.
    pub fn new_vector(&self, property: &Property) -> Option<String> {
        let key = new_vector_key(property.kind)?;
        let mut out = self.lock_scratch();
        self.begin(&mut out, key);
        let mut first = true;
        self.str_field(&mut out, &mut first, "device", &property.device);
        self.str_field(&mut out, &mut first, "name", &property.name);
        Self::sep(&mut out, &mut first);
        out.push_str("\"items\": [ ");
        let mut first_item = true;
        for item in &property.items {
            Self::sep(&mut out, &mut first_item);
            out.push_str("{ ");
            let mut f = true;
            self.str_field(&mut out, &mut f, "name", &item.name);
            match &item.value {
                ItemValue::Text(text) => self.str_field(&mut out, &mut f, "value", text),
                ItemValue::Number(number) => {
                    Self::num_field(&mut out, &mut f, "value", number.value)
                }
                ItemValue::Switch(on) => Self::bool_field(&mut out, &mut f, "value", *on),
                ItemValue::Light(_) | ItemValue::Blob { .. } => {}
            }
            out.push_str(" }");
        }
        out.push_str(" ]");
        Self::end(&mut out);
        Some(out.clone())
    }

    fn items(
        &self,
        out: &mut String,
        first: &mut bool,
        property: &Property,
        define: bool,
        blob_mode: BlobMode,
    ) {
        Self::sep(out, first);
        out.push_str("\"items\": [ ");
        let mut first_item = true;
        for item in &property.items {
            Self::sep(out, &mut first_item);
            out.push_str("{ ");
            let mut f = true;
            self.str_field(out, &mut f, "name", &item.name);
            if define {
                self.str_field(out, &mut f, "label", &item.label);
                if !item.hints.is_empty() {
                    self.str_field(out, &mut f, "hints", &item.hints);
                }
            }
            match &item.value {
                ItemValue::Text(text) => self.str_field(out, &mut f, "value", text),
                ItemValue::Number(number) => {
                    if define {
                        self.str_field(out, &mut f, "format", &number.format);
                        Self::num_field(out, &mut f, "min", number.min);
                        Self::num_field(out, &mut f, "max", number.max);
                        Self::num_field(out, &mut f, "step", number.step);
                    }
                    // Writable numbers expose the desired/confirmed pair.
                    if property.perm != Permission::ReadOnly {
                        Self::num_field(out, &mut f, "target", number.target);
                    }
                    Self::num_field(out, &mut f, "value", number.value);
                }
                ItemValue::Switch(on) => Self::bool_field(out, &mut f, "value", *on),
                ItemValue::Light(state) => self.str_field(out, &mut f, "value", state.as_str()),
                ItemValue::Blob { format, url, data } => {
                    self.str_field(out, &mut f, "format", format);
                    if !define {
                        // Never raw bytes inline: a reference token, or the
                        // URL the client negotiated via enableBLOB.
                        let value = match (blob_mode, url) {
                            (BlobMode::Url, Some(url)) => url.clone(),
                            _ => {
                                let address = data
                                    .as_ref()
                                    .map(|d| format!("{:p}", d.as_ptr()))
                                    .unwrap_or_else(|| "0x0".to_string());
                                format!("/blob/{address}{format}")
                            }
                        };
                        self.str_field(out, &mut f, "value", &value);
                    }
                }
            }
            out.push_str(" }");
        }
        out.push_str(" ]");
    }

    fn lock_scratch(&self) -> std::sync::MutexGuard<'_, String> {
        let mut out = self
            .scratch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        out.clear();
        out
    }

    fn begin(&self, out: &mut String, key: &str) {
        out.push_str("{ \"");
        out.push_str(key);
        out.push_str("\": { ");
    }

    fn end(out: &mut String) {
        out.push_str(" } }");
    }

    fn sep(out: &mut String, first: &mut bool) {
        if *first {
            *first = false;
        } else {
            out.push_str(", ");
        }
    }

    fn str_field(&self, out: &mut String, first: &mut bool, key: &str, value: &str) {
        Self::sep(out, first);
        out.push('"');
        out.push_str(key);
        out.push_str("\": \"");
        let escaped = self.escaper.escape(value);
        out.push_str(&escaped);
        out.push('"');
    }

    fn num_field(out: &mut String, first: &mut bool, key: &str, value: f64) {
        Self::sep(out, first);
        out.push('"');
        out.push_str(key);
        out.push_str("\": ");
        // Shortest round-trip decimal rendering.
        out.push_str(&value.to_string());
    }

    fn bool_field(out: &mut String, first: &mut bool, key: &str, value: bool) {
        Self::sep(out, first);
        out.push('"');
        out.push_str(key);
        out.push_str("\": ");
        out.push_str(if value { "true" } else { "false" });
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
