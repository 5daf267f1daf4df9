//! LMDB implementation of AnalysisStore — keyed by raw fingerprint bytes.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use govwatch_store::analysis::AnalysisStore;
use govwatch_store::StoreError;
use govwatch_types::{Analysis, Fingerprint, Timestamp};

use crate::LmdbError;

pub struct LmdbAnalysisStore {
    pub(crate) env: Arc<Env>,
    pub(crate) analyses_db: Database<Bytes, Bytes>,
}

impl AnalysisStore for LmdbAnalysisStore {
    fn get_analysis(&self, fingerprint: &Fingerprint) -> Result<Option<Analysis>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .analyses_db
            .get(&rtxn, fingerprint.as_bytes())
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => {
                let analysis: Analysis = bincode::deserialize(bytes).map_err(LmdbError::from)?;
                Ok(Some(analysis))
            }
            None => Ok(None),
        }
    }

    fn put_analysis(&self, analysis: &Analysis) -> Result<(), StoreError> {
        let bytes = bincode::serialize(analysis).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.analyses_db
            .put(&mut wtxn, analysis.fingerprint.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn purge_created_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        // Collect stale keys under a read view first; LMDB forbids
        // mutating a database while iterating it.
        let mut stale: Vec<[u8; 16]> = Vec::new();
        {
            let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
            let iter = self.analyses_db.iter(&rtxn).map_err(LmdbError::from)?;
            for result in iter {
                let (key, val) = result.map_err(LmdbError::from)?;
                let analysis: Analysis = bincode::deserialize(val).map_err(LmdbError::from)?;
                if analysis.created_at < cutoff {
                    let mut k = [0u8; 16];
                    k.copy_from_slice(&key[..16]);
                    stale.push(k);
                }
            }
        }

        if stale.is_empty() {
            return Ok(0);
        }

        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut purged = 0u64;
        for key in &stale {
            if self
                .analyses_db
                .delete(&mut wtxn, key.as_slice())
                .map_err(LmdbError::from)?
            {
                purged += 1;
            }
        }
        wtxn.commit().map_err(LmdbError::from)?;

        tracing::debug!(purged, "analysis purge complete");
        Ok(purged)
    }

    fn analysis_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self.analyses_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}
