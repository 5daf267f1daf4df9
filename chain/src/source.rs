//! The abstract operations the rest of the pipeline needs from a chain.
//!
//! `ChainClient` is the production implementation; test suites substitute
//! scripted sources.

use async_trait::async_trait;

use govwatch_types::{ChainId, Proposal, ProposalSummary};

use crate::client::ChainClient;
use crate::error::ChainError;

#[async_trait]
pub trait ProposalSource: Send + Sync {
    fn chain_id(&self) -> &ChainId;

    /// Proposals currently in a non-terminal status.
    async fn list_active(&self) -> Result<Vec<ProposalSummary>, ChainError>;

    /// The full body of one proposal.
    async fn fetch(&self, proposal_id: u64) -> Result<Proposal, ChainError>;
}

#[async_trait]
impl ProposalSource for ChainClient {
    fn chain_id(&self) -> &ChainId {
        ChainClient::chain_id(self)
    }

    async fn list_active(&self) -> Result<Vec<ProposalSummary>, ChainError> {
        ChainClient::list_active(self).await
    }

    async fn fetch(&self, proposal_id: u64) -> Result<Proposal, ChainError> {
        ChainClient::fetch(self, proposal_id).await
    }
}
