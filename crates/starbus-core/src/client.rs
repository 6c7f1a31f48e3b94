//! Client identity and blob delivery negotiation.

use serde::{Deserialize, Serialize};

use crate::property::PropertyFilter;

/// How blob payloads are delivered to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlobMode {
    /// Blob updates are suppressed for this client.
    #[default]
    Never,
    /// Blob updates are interleaved with other property traffic.
    Also,
    /// Blob items carry a download URL instead of inline references.
    Url,
}

impl BlobMode {
    /// Parse the wire token ("Never"/"Also"/"URL").
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "Never" => Some(Self::Never),
            "Also" => Some(Self::Also),
            "URL" => Some(Self::Url),
            _ => None,
        }
    }
}

/// A remote or local subscriber.
///
/// Clients are identified by a name and protocol version and receive
/// define/update/delete notifications for properties they have matched via
/// `getProperties`. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct Client {
    /// Client name, as announced in `getProperties`.
    pub name: String,
    /// Protocol version, as announced in `getProperties`.
    pub version: String,
    /// Subscription filter; updated by each `getProperties`.
    pub filter: PropertyFilter,
    /// Blob delivery mode, negotiated via `enableBLOB`.
    pub blob_mode: BlobMode,
}

impl Client {
    /// Create an anonymous client with the match-everything filter.
    pub fn new() -> Self {
        Self::default()
    }
}
