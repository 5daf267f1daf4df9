//! Analysis storage trait.

use crate::StoreError;
use govwatch_types::{Analysis, Fingerprint, Timestamp};

/// Content-addressed analyses, one record per fingerprint (latest wins).
pub trait AnalysisStore: Send + Sync {
    fn get_analysis(&self, fingerprint: &Fingerprint) -> Result<Option<Analysis>, StoreError>;

    /// Insert or replace the analysis for its fingerprint.
    fn put_analysis(&self, analysis: &Analysis) -> Result<(), StoreError>;

    /// Delete analyses with `created_at < cutoff`; returns how many were
    /// removed. Driven by the hourly sweep.
    fn purge_created_before(&self, cutoff: Timestamp) -> Result<u64, StoreError>;

    fn analysis_count(&self) -> Result<u64, StoreError>;
}
