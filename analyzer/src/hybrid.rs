//! The hybrid provider chain: ordered fallback, not a voting ensemble.

use std::sync::Arc;

use govwatch_types::{Policy, Proposal, Verdict};

use crate::prompt::build_prompt;
use crate::provider::AnalysisProvider;

/// Tries providers in their configured order and degrades to the
/// deterministic fallback verdict when all of them fail.
///
/// Transient and permanent provider errors are handled the same way at this
/// level — skip to the next provider — the distinction matters for
/// operators reading the logs, not for control flow.
pub struct HybridAnalyzer {
    providers: Vec<Arc<dyn AnalysisProvider>>,
}

impl HybridAnalyzer {
    pub fn new(providers: Vec<Arc<dyn AnalysisProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Analyze one proposal under one policy. Never errors: total provider
    /// failure yields [`Verdict::fallback`].
    pub async fn analyze(&self, proposal: &Proposal, policy: &Policy) -> Verdict {
        let prompt = build_prompt(proposal, policy);

        for provider in &self.providers {
            match provider.analyze(&prompt).await {
                Ok(verdict) => {
                    tracing::debug!(
                        provider = provider.name(),
                        chain = %proposal.chain_id,
                        proposal_id = proposal.proposal_id,
                        recommendation = %verdict.recommendation,
                        "analysis produced"
                    );
                    return verdict;
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        provider = provider.name(),
                        chain = %proposal.chain_id,
                        proposal_id = proposal.proposal_id,
                        error = %e,
                        "provider transiently failed, trying next"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        chain = %proposal.chain_id,
                        proposal_id = proposal.proposal_id,
                        error = %e,
                        "provider permanently failed for this call, skipping"
                    );
                }
            }
        }

        tracing::warn!(
            chain = %proposal.chain_id,
            proposal_id = proposal.proposal_id,
            "all providers failed, emitting fallback analysis"
        );
        Verdict::fallback()
    }
}
