//! Proposal storage trait.

use crate::StoreError;
use govwatch_types::{ChainId, Proposal};

/// Last-observed proposal bodies, keyed by `(chain_id, proposal_id)`.
///
/// Append/update only; the watcher diffs fresh observations against these
/// records to decide between NEW and CHANGED events.
pub trait ProposalStore: Send + Sync {
    fn get_proposal(&self, chain: &ChainId, proposal_id: u64)
        -> Result<Option<Proposal>, StoreError>;

    fn put_proposal(&self, proposal: &Proposal) -> Result<(), StoreError>;

    fn proposal_count(&self) -> Result<u64, StoreError>;
}
