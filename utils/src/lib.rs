//! Shared utilities for GovWatch binaries.

pub mod logging;

pub use logging::init_tracing;
