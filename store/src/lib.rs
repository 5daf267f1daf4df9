//! Abstract storage traits for the GovWatch pipeline.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits. All four
//! stores guarantee atomic single-record writes; the delivery-mark store
//! additionally provides a compare-and-insert primitive used by the
//! delivery gate's double-check.

pub mod analysis;
pub mod cursor;
pub mod delivery;
pub mod error;
pub mod memory;
pub mod proposal;

pub use analysis::AnalysisStore;
pub use cursor::CursorStore;
pub use delivery::DeliveryMarkStore;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use proposal::ProposalStore;
