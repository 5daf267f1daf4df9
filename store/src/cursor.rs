//! Cursor storage trait.

use crate::StoreError;
use govwatch_types::{ChainCursor, ChainId};

/// Per-chain watcher watermarks, one record per chain.
///
/// `put_cursor` replaces the whole record atomically; a reader never
/// observes a cursor with `highest_seen` from one tick and `tracked` from
/// another.
pub trait CursorStore: Send + Sync {
    /// The cursor for a chain, or `None` before the first successful tick.
    fn get_cursor(&self, chain: &ChainId) -> Result<Option<ChainCursor>, StoreError>;

    /// Atomically replace the cursor for a chain.
    fn put_cursor(&self, chain: &ChainId, cursor: &ChainCursor) -> Result<(), StoreError>;
}
