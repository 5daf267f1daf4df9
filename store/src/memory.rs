//! In-memory store backing all four traits.
//!
//! Used by the test suites and usable as a volatile backend for local runs.
//! Mutexes are std (no awaits occur while held); poisoned locks are
//! recovered since the maps cannot be left half-written.

use std::collections::HashMap;
use std::sync::Mutex;

use govwatch_types::{
    Analysis, ChainCursor, ChainId, DeliveryKey, DeliveryMark, Fingerprint, Proposal, Timestamp,
};

use crate::{
    AnalysisStore, CursorStore, DeliveryMarkStore, ProposalStore, StoreError,
};

/// One struct implementing every store trait over plain hash maps.
#[derive(Default)]
pub struct MemoryStore {
    cursors: Mutex<HashMap<ChainId, ChainCursor>>,
    proposals: Mutex<HashMap<(ChainId, u64), Proposal>>,
    analyses: Mutex<HashMap<Fingerprint, Analysis>>,
    marks: Mutex<HashMap<DeliveryKey, DeliveryMark>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl CursorStore for MemoryStore {
    fn get_cursor(&self, chain: &ChainId) -> Result<Option<ChainCursor>, StoreError> {
        Ok(lock(&self.cursors).get(chain).cloned())
    }

    fn put_cursor(&self, chain: &ChainId, cursor: &ChainCursor) -> Result<(), StoreError> {
        lock(&self.cursors).insert(chain.clone(), cursor.clone());
        Ok(())
    }
}

impl ProposalStore for MemoryStore {
    fn get_proposal(
        &self,
        chain: &ChainId,
        proposal_id: u64,
    ) -> Result<Option<Proposal>, StoreError> {
        Ok(lock(&self.proposals)
            .get(&(chain.clone(), proposal_id))
            .cloned())
    }

    fn put_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        lock(&self.proposals).insert(
            (proposal.chain_id.clone(), proposal.proposal_id),
            proposal.clone(),
        );
        Ok(())
    }

    fn proposal_count(&self) -> Result<u64, StoreError> {
        Ok(lock(&self.proposals).len() as u64)
    }
}

impl AnalysisStore for MemoryStore {
    fn get_analysis(&self, fingerprint: &Fingerprint) -> Result<Option<Analysis>, StoreError> {
        Ok(lock(&self.analyses).get(fingerprint).cloned())
    }

    fn put_analysis(&self, analysis: &Analysis) -> Result<(), StoreError> {
        lock(&self.analyses).insert(analysis.fingerprint, analysis.clone());
        Ok(())
    }

    fn purge_created_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut analyses = lock(&self.analyses);
        let before = analyses.len();
        analyses.retain(|_, a| a.created_at >= cutoff);
        Ok((before - analyses.len()) as u64)
    }

    fn analysis_count(&self) -> Result<u64, StoreError> {
        Ok(lock(&self.analyses).len() as u64)
    }
}

impl DeliveryMarkStore for MemoryStore {
    fn get_mark(&self, key: &DeliveryKey) -> Result<Option<DeliveryMark>, StoreError> {
        Ok(lock(&self.marks).get(key).cloned())
    }

    fn insert_mark_if_absent(&self, mark: &DeliveryMark) -> Result<bool, StoreError> {
        let mut marks = lock(&self.marks);
        if marks.contains_key(&mark.key) {
            return Ok(false);
        }
        marks.insert(mark.key.clone(), mark.clone());
        Ok(true)
    }

    fn mark_count(&self) -> Result<u64, StoreError> {
        Ok(lock(&self.marks).len() as u64)
    }
}
