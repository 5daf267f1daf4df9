//! LMDB storage backend for the GovWatch pipeline.
//!
//! Implements all storage traits from `govwatch-store` using the `heed`
//! LMDB bindings. Each logical store maps to one LMDB database within a
//! single environment; every trait operation is one LMDB transaction, which
//! gives the atomic single-record write the stores must guarantee.

pub mod analysis;
pub mod cursor;
pub mod delivery;
pub mod environment;
pub mod error;
pub mod proposal;

pub use analysis::LmdbAnalysisStore;
pub use cursor::LmdbCursorStore;
pub use delivery::LmdbDeliveryMarkStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use proposal::LmdbProposalStore;

/// Convenience alias — the unified LMDB store wrapping all sub-stores.
pub type LmdbStore = LmdbEnvironment;
