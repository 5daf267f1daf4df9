//! Chain identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a monitored chain, e.g. `osmosis-1` or `cosmoshub-4`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Static description of one monitored chain.
///
/// Immutable within a process run; loaded from configuration at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub chain_id: ChainId,
    /// Human-readable name used in notification subjects, e.g. `Osmosis`.
    pub name: String,
    /// Ordered REST endpoint URLs; the client rotates through them.
    pub endpoints: Vec<String>,
}

impl ChainDescriptor {
    /// A descriptor is usable only if it has at least one endpoint and a
    /// non-empty id.
    pub fn validate(&self) -> Result<(), String> {
        if self.chain_id.as_str().is_empty() {
            return Err("chain_id must not be empty".to_string());
        }
        if self.name.is_empty() {
            return Err(format!("chain {}: name must not be empty", self.chain_id));
        }
        if self.endpoints.is_empty() {
            return Err(format!(
                "chain {}: at least one endpoint is required",
                self.chain_id
            ));
        }
        Ok(())
    }
}
