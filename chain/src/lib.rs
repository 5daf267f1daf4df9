//! Uniform client for one Cosmos-SDK chain's governance REST endpoints.
//!
//! The rest of the pipeline depends only on [`ChainClient::list_active`] and
//! [`ChainClient::fetch`]; wire decoding and retry behavior live here.

pub mod client;
pub mod error;
pub mod models;
pub mod source;

pub use client::{ChainClient, RetryPolicy};
pub use error::ChainError;
pub use source::ProposalSource;
