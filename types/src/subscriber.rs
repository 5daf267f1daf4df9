//! Subscribers and their advice-shaping policies.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::analysis::RiskLevel;
use crate::chain::ChainId;
use crate::time::Timestamp;

/// Stable subscriber identifier, e.g. `sub-A`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tolerance accepted when checking that criteria weights sum to 1.0.
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// A subscriber's declared preferences for advice shaping.
///
/// Opaque to the analyzer beyond being rendered into the prompt; the
/// analyzer incorporates it but never alters it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub risk_tolerance: RiskLevel,
    /// Criterion name → non-negative weight; weights sum to 1.0.
    #[serde(default)]
    pub criteria: BTreeMap<String, f64>,
    /// Short free-form policy statements.
    #[serde(default)]
    pub blurbs: Vec<String>,
}

impl Policy {
    pub fn validate(&self) -> Result<(), String> {
        if self.criteria.is_empty() {
            return Ok(());
        }
        let mut sum = 0.0;
        for (name, weight) in &self.criteria {
            if *weight < 0.0 {
                return Err(format!("criterion '{name}' has negative weight {weight}"));
            }
            sum += weight;
        }
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(format!("criteria weights sum to {sum}, expected 1.0"));
        }
        Ok(())
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            risk_tolerance: RiskLevel::Medium,
            criteria: BTreeMap::new(),
            blurbs: Vec::new(),
        }
    }
}

/// An entity that receives notifications.
///
/// Created and updated by external subscription management; read-only within
/// the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub subscriber_id: SubscriberId,
    /// Delivery address, opaque to the pipeline (email, webhook slug, ...).
    pub address: String,
    /// Watched chains; must be non-empty.
    pub chains: BTreeSet<ChainId>,
    pub policy: Policy,
    pub active: bool,
    pub active_until: Timestamp,
}

impl Subscriber {
    /// Delivery requires `active` and `now < active_until`.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.active && now < self.active_until
    }

    pub fn watches(&self, chain: &ChainId) -> bool {
        self.chains.contains(chain)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.chains.is_empty() {
            return Err(format!(
                "subscriber {}: watched chain set must be non-empty",
                self.subscriber_id
            ));
        }
        self.policy
            .validate()
            .map_err(|e| format!("subscriber {}: {e}", self.subscriber_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber(active: bool, until: u64) -> Subscriber {
        Subscriber {
            subscriber_id: SubscriberId::new("sub-A"),
            address: "govops@example.com".to_string(),
            chains: [ChainId::new("osmosis-1")].into_iter().collect(),
            policy: Policy::default(),
            active,
            active_until: Timestamp::new(until),
        }
    }

    #[test]
    fn activity_requires_flag_and_window() {
        let now = Timestamp::new(1000);
        assert!(subscriber(true, 2000).is_active_at(now));
        assert!(!subscriber(false, 2000).is_active_at(now));
        assert!(!subscriber(true, 1000).is_active_at(now));
    }

    #[test]
    fn empty_chain_set_fails_validation() {
        let mut s = subscriber(true, 2000);
        s.chains.clear();
        assert!(s.validate().is_err());
    }

    #[test]
    fn criteria_weights_must_sum_to_one() {
        let mut p = Policy::default();
        p.criteria.insert("security".to_string(), 0.5);
        p.criteria.insert("economics".to_string(), 0.5);
        assert!(p.validate().is_ok());

        p.criteria.insert("community".to_string(), 0.5);
        assert!(p.validate().is_err());
    }
}
