//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::analysis::LmdbAnalysisStore;
use crate::cursor::LmdbCursorStore;
use crate::delivery::LmdbDeliveryMarkStore;
use crate::proposal::LmdbProposalStore;
use crate::LmdbError;

/// Default LMDB map size: 1 GiB.
const DEFAULT_MAP_SIZE: usize = 1 << 30;
/// Number of named LMDB databases.
const MAX_DBS: u32 = 4;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    pub(crate) env: Arc<Env>,
    pub(crate) cursors_db: Database<Bytes, Bytes>,
    pub(crate) proposals_db: Database<Bytes, Bytes>,
    pub(crate) analyses_db: Database<Bytes, Bytes>,
    pub(crate) marks_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path with the
    /// default map size.
    pub fn open(path: &Path) -> Result<Self, LmdbError> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)
            .map_err(|e| LmdbError::Heed(format!("create data dir {}: {e}", path.display())))?;

        // SAFETY: the path is a dedicated data directory owned by this
        // process; no other environment is opened on it.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let cursors_db = env.create_database(&mut wtxn, Some("cursors"))?;
        let proposals_db = env.create_database(&mut wtxn, Some("proposals"))?;
        let analyses_db = env.create_database(&mut wtxn, Some("analyses"))?;
        let marks_db = env.create_database(&mut wtxn, Some("delivery_marks"))?;
        wtxn.commit()?;

        Ok(Self {
            env: Arc::new(env),
            cursors_db,
            proposals_db,
            analyses_db,
            marks_db,
        })
    }

    pub fn cursor_store(&self) -> LmdbCursorStore {
        LmdbCursorStore {
            env: Arc::clone(&self.env),
            cursors_db: self.cursors_db,
        }
    }

    pub fn proposal_store(&self) -> LmdbProposalStore {
        LmdbProposalStore {
            env: Arc::clone(&self.env),
            proposals_db: self.proposals_db,
        }
    }

    pub fn analysis_store(&self) -> LmdbAnalysisStore {
        LmdbAnalysisStore {
            env: Arc::clone(&self.env),
            analyses_db: self.analyses_db,
        }
    }

    pub fn delivery_mark_store(&self) -> LmdbDeliveryMarkStore {
        LmdbDeliveryMarkStore {
            env: Arc::clone(&self.env),
            marks_db: self.marks_db,
        }
    }
}
