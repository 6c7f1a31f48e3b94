//! Clone instances.
//!
//! A device exposing `ADDITIONAL_INSTANCES` can be multiplied: each clone
//! is a full bus device named `<base> #<n>` sharing the base device's
//! driver. Drivers keep per-instance state keyed by device name. A device
//! that fronts internal slave devices fans the same count change out to
//! every registered slave so the whole family grows and shrinks together.

use std::sync::Arc;

use starbus_core::{BusError, ItemValue, PropertyRequest, PropertyState, RequestValue, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::base::{BaseDevice, Inner};
use crate::names;

/// Upper bound on clone instances per device.
pub const MAX_ADDITIONAL_INSTANCES: usize = 8;

impl BaseDevice {
    /// Register an internal slave device that must follow this device's
    /// instance count.
    pub async fn register_slave(&self, slave: BaseDevice) {
        self.inner.slaves.lock().await.push(slave);
    }

    fn clone_instance(&self, ordinal: usize) -> BaseDevice {
        let name = format!("{} #{ordinal}", self.inner.descriptor.name);
        let mut descriptor = self.inner.descriptor.clone();
        descriptor.name = name.clone();
        BaseDevice {
            inner: Arc::new(Inner {
                name,
                base: Some(self.inner.name.clone()),
                descriptor,
                bus: self.inner.bus.clone(),
                driver: Arc::clone(&self.inner.driver),
                config: self.inner.config.clone(),
                locks: Arc::clone(&self.inner.locks),
                properties: tokio::sync::RwLock::new(Vec::new()),
                config_gate: Mutex::new(()),
                instances: Mutex::new(Vec::new()),
                slaves: Mutex::new(Vec::new()),
                saved_extra: std::sync::Mutex::new(Vec::new()),
                live: std::sync::atomic::AtomicBool::new(false),
            }),
        }
    }

    /// Number of clone instances currently attached.
    pub async fn instance_count(&self) -> usize {
        self.inner.instances.lock().await.len()
    }

    /// Grow or shrink the clone set to `requested`, fanning the change out
    /// to registered slaves.
    ///
    /// Shrinking is refused wholesale while any instance that would
    /// disappear is connected: the check runs across the whole family
    /// before anything is detached, so a refusal leaves every member
    /// unchanged.
    pub async fn set_instance_count(&self, requested: usize) -> Result<()> {
        if requested > MAX_ADDITIONAL_INSTANCES {
            return Err(BusError::failed(format!(
                "at most {MAX_ADDITIONAL_INSTANCES} additional instances"
            )));
        }
        let slaves: Vec<BaseDevice> = self.inner.slaves.lock().await.clone();
        self.refuse_shrink_if_connected(requested).await?;
        for slave in &slaves {
            slave.refuse_shrink_if_connected(requested).await?;
        }
        // Slaves first: if one of them fails mid-change, the master count
        // (the one reported back to clients) still reflects reality.
        for slave in &slaves {
            slave.apply_instance_count(requested).await?;
        }
        self.apply_instance_count(requested).await
    }

    async fn refuse_shrink_if_connected(&self, requested: usize) -> Result<()> {
        let instances = self.inner.instances.lock().await;
        for clone in instances.iter().skip(requested) {
            if clone.is_connected().await {
                return Err(BusError::InstanceRefused(format!(
                    "'{}' is still connected",
                    clone.name()
                )));
            }
        }
        Ok(())
    }

    async fn apply_instance_count(&self, requested: usize) -> Result<()> {
        let mut instances = self.inner.instances.lock().await;
        while instances.len() > requested {
            // Re-checked here: a clone may have connected since the
            // family-wide check.
            let Some(clone) = instances.last() else { break };
            if clone.is_connected().await {
                return Err(BusError::InstanceRefused(format!(
                    "'{}' is still connected",
                    clone.name()
                )));
            }
            let clone = instances.pop().ok_or_else(|| BusError::failed("instance list raced"))?;
            self.inner.bus.detach(clone.name()).await?;
            info!(device = %clone.name(), "instance removed");
        }
        while instances.len() < requested {
            // Instance ordinals are user-visible and start at #2, the base
            // device being #1 in spirit.
            let clone = self.clone_instance(instances.len() + 2);
            self.inner.bus.attach(Arc::new(clone.clone())).await?;
            info!(device = %clone.name(), "instance added");
            instances.push(clone);
        }
        Ok(())
    }

    pub(crate) async fn handle_instances(&self, request: &PropertyRequest) -> Result<()> {
        let count = request
            .item(names::ADDITIONAL_INSTANCES_COUNT)
            .and_then(RequestValue::as_number);
        let requested = match count {
            Some(c) if c >= 0.0 && c <= MAX_ADDITIONAL_INSTANCES as f64 && c.fract() == 0.0 => {
                c as usize
            }
            _ => {
                self.set_state(
                    names::ADDITIONAL_INSTANCES,
                    PropertyState::Alert,
                    Some(format!(
                        "instance count must be an integer in 0..={MAX_ADDITIONAL_INSTANCES}"
                    )),
                )
                .await?;
                return Ok(());
            }
        };

        let result = self.set_instance_count(requested).await;
        let actual = self.instance_count().await as f64;
        let (state, message) = match result {
            Ok(()) => (PropertyState::Ok, None),
            Err(e) => {
                warn!(device = %self.name(), error = %e, "instance count change refused");
                (PropertyState::Alert, Some(e.to_string()))
            }
        };
        self.update_property(names::ADDITIONAL_INSTANCES, message, |p| {
            if let Some(item) = p.item_mut(names::ADDITIONAL_INSTANCES_COUNT) {
                if let ItemValue::Number(n) = &mut item.value {
                    n.target = actual;
                    n.value = actual;
                }
            }
            p.state = state;
        })
        .await
    }
}
