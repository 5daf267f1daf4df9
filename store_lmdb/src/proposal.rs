//! LMDB implementation of ProposalStore — binary serialized, keyed by
//! `chain_id \0 proposal_id_be` so per-chain scans are ordered by id.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use govwatch_store::proposal::ProposalStore;
use govwatch_store::StoreError;
use govwatch_types::{ChainId, Proposal};

use crate::LmdbError;

pub struct LmdbProposalStore {
    pub(crate) env: Arc<Env>,
    pub(crate) proposals_db: Database<Bytes, Bytes>,
}

pub(crate) fn proposal_key(chain: &ChainId, proposal_id: u64) -> Vec<u8> {
    let mut key = chain.as_str().as_bytes().to_vec();
    key.push(0);
    key.extend_from_slice(&proposal_id.to_be_bytes());
    key
}

impl ProposalStore for LmdbProposalStore {
    fn get_proposal(
        &self,
        chain: &ChainId,
        proposal_id: u64,
    ) -> Result<Option<Proposal>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .proposals_db
            .get(&rtxn, &proposal_key(chain, proposal_id))
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => {
                let proposal: Proposal = bincode::deserialize(bytes).map_err(LmdbError::from)?;
                Ok(Some(proposal))
            }
            None => Ok(None),
        }
    }

    fn put_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        let bytes = bincode::serialize(proposal).map_err(LmdbError::from)?;
        let key = proposal_key(&proposal.chain_id, proposal.proposal_id);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.proposals_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn proposal_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self.proposals_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}
