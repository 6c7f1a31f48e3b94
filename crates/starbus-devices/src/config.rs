//! Property configuration persistence.
//!
//! A saved configuration is a sequence of `newXVector` messages, one per
//! writable property, in the exact wire syntax. Loading replays the file
//! through the ordinary request decoder, so a loaded configuration is
//! indistinguishable from the same change requests arriving over the
//! network, and the file format can never drift from the protocol.
//!
//! Files live under one directory, named
//! `<device>_profile_<n>[_<port>].config` with spaces replaced by
//! underscores; the port suffix keeps servers on non-default ports from
//! trampling each other's profiles.

use std::fs;
use std::path::{Path, PathBuf};

use starbus_core::{BusError, Property, PropertyRequest, Result};
use starbus_wire::{Encoder, Request, RequestDecoder};
use tracing::{debug, warn};

use crate::{file_safe_name, DEFAULT_PORT};

/// Writes and reads per-device profile files.
#[derive(Clone)]
pub struct ConfigStore {
    dir: PathBuf,
    port: u16,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            dir: dir.into(),
            port,
        }
    }

    /// The conventional per-user configuration directory.
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".starbus")
    }

    /// Directory the store writes into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, device: &str, profile: usize) -> PathBuf {
        let name = file_safe_name(device);
        let file = if self.port == DEFAULT_PORT {
            format!("{name}_profile_{profile}.config")
        } else {
            format!("{name}_profile_{profile}_{}.config", self.port)
        };
        self.dir.join(file)
    }

    /// Serialize `properties` into the profile file, replacing any previous
    /// content. Properties that cannot be written back (lights, blobs) are
    /// skipped.
    pub fn save(&self, device: &str, profile: usize, properties: &[Property]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let encoder = Encoder::new();
        let mut out = String::new();
        let mut count = 0usize;
        for property in properties {
            if let Some(line) = encoder.new_vector(property) {
                out.push_str(&line);
                out.push('\n');
                count += 1;
            }
        }
        fs::write(self.path(device, profile), out)?;
        debug!(device, profile, properties = count, "configuration saved");
        Ok(())
    }

    /// Parse the profile file back into change requests, in file order.
    pub fn load(&self, device: &str, profile: usize) -> Result<Vec<PropertyRequest>> {
        let path = self.path(device, profile);
        let text = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BusError::NotFound(format!("no saved configuration for '{device}'"))
            } else {
                e.into()
            }
        })?;
        let mut decoder = RequestDecoder::new();
        let requests = decoder
            .feed(&text)
            .map_err(|e| BusError::failed(format!("corrupt configuration {path:?}: {e}")))?;
        let mut changes = Vec::with_capacity(requests.len());
        for request in requests {
            match request {
                Request::Change(change) => changes.push(change),
                other => {
                    // Hand-edited files may contain stray messages.
                    warn!(device, profile, ?other, "ignoring non-change request in configuration");
                }
            }
        }
        debug!(device, profile, requests = changes.len(), "configuration loaded");
        Ok(changes)
    }

    /// Delete the profile file. Missing files are not an error.
    pub fn remove(&self, device: &str, profile: usize) -> Result<()> {
        match fs::remove_file(self.path(device, profile)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a saved profile exists.
    pub fn exists(&self, device: &str, profile: usize) -> bool {
        self.path(device, profile).exists()
    }
}

#[cfg(test)]
mod tests {
    use starbus_core::{Item, Permission, Property, PropertyKind, PropertyState};

    use super::*;

    fn port_property(value: &str) -> Property {
        Property::new(
            PropertyKind::Text,
            "CCD Imager",
            "DEVICE_PORT",
            "Main",
            "Port",
            PropertyState::Idle,
            Permission::ReadWrite,
            1,
        )
        .with_item(Item::text("PORT", "Port", value))
    }

    #[test]
    fn save_then_load_round_trips_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), DEFAULT_PORT);

        store
            .save("CCD Imager", 0, &[port_property("/dev/ttyUSB0")])
            .unwrap();
        assert!(store.exists("CCD Imager", 0));
        assert!(dir.path().join("CCD_Imager_profile_0.config").exists());

        let changes = store.load("CCD Imager", 0).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].device, "CCD Imager");
        assert_eq!(changes[0].name, "DEVICE_PORT");
        assert_eq!(
            changes[0].item("PORT"),
            Some(&starbus_core::RequestValue::Text("/dev/ttyUSB0".into()))
        );
    }

    #[test]
    fn non_default_port_gets_its_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), 7625);
        store.save("CCD Imager", 2, &[port_property("x")]).unwrap();
        assert!(dir.path().join("CCD_Imager_profile_2_7625.config").exists());
    }

    #[test]
    fn load_of_missing_profile_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path(), DEFAULT_PORT);
        assert!(matches!(
            store.load("Nobody", 0),
            Err(BusError::NotFound(_))
        ));
        // Removing a missing profile is fine.
        store.remove("Nobody", 0).unwrap();
    }
}
