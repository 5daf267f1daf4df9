//! LMDB implementation of CursorStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use govwatch_store::cursor::CursorStore;
use govwatch_store::StoreError;
use govwatch_types::{ChainCursor, ChainId};

use crate::LmdbError;

pub struct LmdbCursorStore {
    pub(crate) env: Arc<Env>,
    pub(crate) cursors_db: Database<Bytes, Bytes>,
}

impl CursorStore for LmdbCursorStore {
    fn get_cursor(&self, chain: &ChainId) -> Result<Option<ChainCursor>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .cursors_db
            .get(&rtxn, chain.as_str().as_bytes())
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => {
                let cursor: ChainCursor = bincode::deserialize(bytes).map_err(LmdbError::from)?;
                Ok(Some(cursor))
            }
            None => Ok(None),
        }
    }

    fn put_cursor(&self, chain: &ChainId, cursor: &ChainCursor) -> Result<(), StoreError> {
        let bytes = bincode::serialize(cursor).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.cursors_db
            .put(&mut wtxn, chain.as_str().as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
