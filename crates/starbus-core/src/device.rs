//! The device contract the bus routes requests to.

use async_trait::async_trait;

use crate::error::Result;
use crate::property::PropertyFilter;
use crate::request::PropertyRequest;

/// A device attached to the bus.
///
/// The four entry points mirror the device lifecycle: attach creates the
/// device's properties, enumerate defines them to clients, change applies
/// client requests, detach releases everything. Implementations are driven
/// from multiple tasks and guard their own state.
#[async_trait]
pub trait Device: Send + Sync {
    /// Device name; unique on the bus and used as the lock-file key.
    fn name(&self) -> String;

    /// Allocate the device's properties. Must fail atomically: when this
    /// returns an error no property of the device is visible on the bus.
    async fn attach(&self) -> Result<()>;

    /// Redefine every non-hidden property matching the filter to clients.
    /// Idempotent from a client's perspective.
    async fn enumerate_properties(&self, filter: &PropertyFilter) -> Result<()>;

    /// Apply a client change request. Rejections are reported through the
    /// property's state, not through the returned error.
    async fn change_property(&self, request: &PropertyRequest) -> Result<()>;

    /// Release every property. Called once, when the device leaves the bus.
    async fn detach(&self) -> Result<()>;
}
