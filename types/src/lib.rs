//! Fundamental types for the GovWatch pipeline.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: chain identities, proposals, fingerprints, analyses, advice,
//! subscribers, and timestamps.

pub mod advice;
pub mod analysis;
pub mod chain;
pub mod fingerprint;
pub mod proposal;
pub mod subscriber;
pub mod time;

pub use advice::{Advice, Decision, DeliveryKey, DeliveryMark};
pub use analysis::{Analysis, Recommendation, RiskLevel, Verdict};
pub use chain::{ChainDescriptor, ChainId};
pub use fingerprint::Fingerprint;
pub use proposal::{ChainCursor, Proposal, ProposalStatus, ProposalSummary};
pub use subscriber::{Policy, Subscriber, SubscriberId};
pub use time::Timestamp;
