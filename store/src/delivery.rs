//! Delivery-mark storage trait.

use crate::StoreError;
use govwatch_types::{DeliveryKey, DeliveryMark};

/// Append-only idempotency records, one per `(chain, proposal, subscriber)`.
pub trait DeliveryMarkStore: Send + Sync {
    /// Lock-free read; used for the cheap pre-lock probe.
    fn get_mark(&self, key: &DeliveryKey) -> Result<Option<DeliveryMark>, StoreError>;

    /// Compare-and-insert: persist the mark only if the key is absent.
    /// Returns `true` if the mark was inserted, `false` if one already
    /// existed (the existing record is left untouched).
    fn insert_mark_if_absent(&self, mark: &DeliveryMark) -> Result<bool, StoreError>;

    fn mark_count(&self) -> Result<u64, StoreError>;
}
