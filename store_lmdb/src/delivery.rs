//! LMDB implementation of DeliveryMarkStore.
//!
//! `insert_mark_if_absent` performs the get and the put inside one write
//! transaction, which is the compare-and-insert primitive the delivery
//! gate's double-check relies on.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use govwatch_store::delivery::DeliveryMarkStore;
use govwatch_store::StoreError;
use govwatch_types::{DeliveryKey, DeliveryMark};

use crate::LmdbError;

pub struct LmdbDeliveryMarkStore {
    pub(crate) env: Arc<Env>,
    pub(crate) marks_db: Database<Bytes, Bytes>,
}

pub(crate) fn mark_key(key: &DeliveryKey) -> Vec<u8> {
    let mut k = key.chain_id.as_str().as_bytes().to_vec();
    k.push(0);
    k.extend_from_slice(&key.proposal_id.to_be_bytes());
    k.push(0);
    k.extend_from_slice(key.subscriber_id.as_str().as_bytes());
    k
}

impl DeliveryMarkStore for LmdbDeliveryMarkStore {
    fn get_mark(&self, key: &DeliveryKey) -> Result<Option<DeliveryMark>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .marks_db
            .get(&rtxn, &mark_key(key))
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => {
                let mark: DeliveryMark = bincode::deserialize(bytes).map_err(LmdbError::from)?;
                Ok(Some(mark))
            }
            None => Ok(None),
        }
    }

    fn insert_mark_if_absent(&self, mark: &DeliveryMark) -> Result<bool, StoreError> {
        let key = mark_key(&mark.key);
        let bytes = bincode::serialize(mark).map_err(LmdbError::from)?;

        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let exists = self
            .marks_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
            .is_some();
        if exists {
            return Ok(false);
        }
        self.marks_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn mark_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let count = self.marks_db.len(&rtxn).map_err(LmdbError::from)?;
        Ok(count)
    }
}
