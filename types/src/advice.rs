//! Per-subscriber advice and delivery idempotency records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analysis::Recommendation;
use crate::chain::ChainId;
use crate::subscriber::SubscriberId;
use crate::time::Timestamp;

/// Delivered-advice vocabulary (distinct from the provider-facing
/// [`Recommendation`]; the mapping between the two is fixed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Yes,
    No,
    Abstain,
}

impl From<Recommendation> for Decision {
    fn from(r: Recommendation) -> Self {
        match r {
            Recommendation::Approve => Self::Yes,
            Recommendation::Reject => Self::No,
            Recommendation::Abstain => Self::Abstain,
        }
    }
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
            Self::Abstain => "ABSTAIN",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The per-subscriber materialization of an analysis for one proposal.
///
/// Transient: produced by the fan-out, consumed by the delivery gate.
/// Regenerating from the same analysis and policy yields byte-identical
/// fields except `created_at`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    pub chain_id: ChainId,
    pub proposal_id: u64,
    pub subscriber_id: SubscriberId,
    pub decision: Decision,
    pub rationale: String,
    pub confidence: f64,
    pub created_at: Timestamp,
}

impl Advice {
    pub fn delivery_key(&self) -> DeliveryKey {
        DeliveryKey {
            chain_id: self.chain_id.clone(),
            proposal_id: self.proposal_id,
            subscriber_id: self.subscriber_id.clone(),
        }
    }
}

/// The at-most-once delivery key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeliveryKey {
    pub chain_id: ChainId,
    pub proposal_id: u64,
    pub subscriber_id: SubscriberId,
}

impl fmt::Display for DeliveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.chain_id, self.proposal_id, self.subscriber_id
        )
    }
}

/// Idempotency record proving that advice for a key was accepted by the
/// notifier. Created at successful dispatch; never updated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryMark {
    pub key: DeliveryKey,
    pub sent_at: Timestamp,
    /// Provider message identifier, opaque.
    pub message_id: String,
}
