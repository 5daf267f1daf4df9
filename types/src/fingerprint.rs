//! Content fingerprint identifying a unique analyzable proposal snapshot.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::chain::ChainId;
use crate::proposal::{Proposal, ProposalStatus};

/// A 128-bit content hash over `(chain_id, proposal_id, title, status)`.
///
/// Two proposals with the same fingerprint are the same analyzable input; a
/// change in status or title yields a new fingerprint (and thus a fresh
/// analysis), while description edits alone do not.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Compute the fingerprint for a proposal snapshot.
    ///
    /// Fields are length-prefixed before hashing so that no two distinct
    /// inputs can collide by concatenation.
    pub fn compute(
        chain_id: &ChainId,
        proposal_id: u64,
        title: &str,
        status: ProposalStatus,
    ) -> Self {
        let mut hasher = Sha256::new();
        for field in [chain_id.as_str().as_bytes(), title.as_bytes()] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field);
        }
        hasher.update(proposal_id.to_be_bytes());
        hasher.update([status.rank_tag()]);
        let digest = hasher.finalize();

        let mut out = [0u8; 16];
        out.copy_from_slice(&digest[..16]);
        Self(out)
    }

    pub fn of(proposal: &Proposal) -> Self {
        Self::compute(
            &proposal.chain_id,
            proposal.proposal_id,
            &proposal.title,
            proposal.status,
        )
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl ProposalStatus {
    /// Distinct single-byte tag per status for fingerprint input.
    fn rank_tag(&self) -> u8 {
        match self {
            Self::Deposit => 0,
            Self::Voting => 1,
            Self::Passed => 2,
            Self::Rejected => 3,
            Self::Failed => 4,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint(")?;
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}
