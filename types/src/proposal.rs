//! Governance proposal state as observed on a chain.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::chain::ChainId;
use crate::time::Timestamp;

/// Lifecycle status of a governance proposal.
///
/// Transitions only move forward along the partial order
/// `Deposit < Voting < {Passed, Rejected, Failed}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    Deposit,
    Voting,
    Passed,
    Rejected,
    Failed,
}

impl ProposalStatus {
    /// Whether the proposal can no longer change status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Passed | Self::Rejected | Self::Failed)
    }

    /// Rank in the forward partial order; used for same-tick tie-breaking.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Deposit => 0,
            Self::Voting => 1,
            Self::Passed | Self::Rejected | Self::Failed => 2,
        }
    }

    /// Stable tag used in fingerprints and prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Voting => "VOTING",
            Self::Passed => "PASSED",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal view returned by the chain's active-proposal listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSummary {
    pub proposal_id: u64,
    pub status: ProposalStatus,
}

/// Full observed state of one governance proposal.
///
/// Keyed by `(chain_id, proposal_id)`. Materialized by the watcher on first
/// observation and updated in place on status changes; never deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub chain_id: ChainId,
    pub proposal_id: u64,
    pub title: String,
    pub description: String,
    pub status: ProposalStatus,
    pub submit_time: Timestamp,
    pub voting_start: Option<Timestamp>,
    pub voting_end: Option<Timestamp>,
    pub proposer: String,
    /// Proposal type tag as reported by the chain, e.g.
    /// `/cosmos.gov.v1beta1.TextProposal`.
    pub proposal_type: String,
}

impl Proposal {
    /// Whether any field relevant to change detection differs.
    pub fn differs_from(&self, other: &Proposal) -> bool {
        self.status != other.status
            || self.title != other.title
            || self.description != other.description
            || self.voting_end != other.voting_end
    }
}

/// Per-chain watcher watermark.
///
/// `highest_seen` is non-decreasing across ticks; `tracked` holds the
/// proposal ids currently in a non-terminal status, re-polled every tick.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCursor {
    pub highest_seen: u64,
    pub tracked: BTreeSet<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!ProposalStatus::Deposit.is_terminal());
        assert!(!ProposalStatus::Voting.is_terminal());
        assert!(ProposalStatus::Passed.is_terminal());
        assert!(ProposalStatus::Rejected.is_terminal());
        assert!(ProposalStatus::Failed.is_terminal());
    }

    #[test]
    fn rank_orders_deposit_before_voting_before_terminal() {
        assert!(ProposalStatus::Deposit.rank() < ProposalStatus::Voting.rank());
        assert!(ProposalStatus::Voting.rank() < ProposalStatus::Failed.rank());
        assert_eq!(ProposalStatus::Passed.rank(), ProposalStatus::Rejected.rank());
    }

    fn sample() -> Proposal {
        Proposal {
            chain_id: ChainId::new("osmosis-1"),
            proposal_id: 848,
            title: "Increase taker fees".to_string(),
            description: "Raise the taker fee".to_string(),
            status: ProposalStatus::Voting,
            submit_time: Timestamp::new(1_700_000_000),
            voting_start: Some(Timestamp::new(1_700_000_100)),
            voting_end: Some(Timestamp::new(1_700_400_000)),
            proposer: String::new(),
            proposal_type: "/cosmos.gov.v1beta1.TextProposal".to_string(),
        }
    }

    #[test]
    fn differs_from_tracks_the_watched_fields() {
        let a = sample();
        let mut b = a.clone();
        assert!(!a.differs_from(&b));

        b.status = ProposalStatus::Passed;
        assert!(a.differs_from(&b));

        let mut c = a.clone();
        c.voting_end = None;
        assert!(a.differs_from(&c));

        // Proposer changes alone do not count as a change event.
        let mut d = a.clone();
        d.proposer = "osmo1abc".to_string();
        assert!(!a.differs_from(&d));
    }
}
