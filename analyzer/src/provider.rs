//! The provider abstraction the hybrid analyzer dispatches over.

use async_trait::async_trait;
use thiserror::Error;

use govwatch_types::Verdict;

use crate::prompt::Prompt;

/// Provider call errors, classified by retry behavior.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited")]
    RateLimited,

    #[error("remote error: HTTP {0}")]
    Http(u16),

    #[error("malformed output after repair: {0}")]
    Malformed(String),

    #[error("provider misconfigured: {0}")]
    Config(String),
}

impl ProviderError {
    /// Transient errors let the hybrid chain move on and may succeed on a
    /// later pass; permanent errors mean this provider cannot answer this
    /// call at all. Either way the next provider in the list is tried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) | Self::RateLimited => true,
            Self::Http(status) => *status >= 500 || *status == 429,
            Self::Malformed(_) | Self::Config(_) => false,
        }
    }
}

/// One analysis backend. Implementations must be safe to call concurrently;
/// sampling settings are fixed at construction so identical prompts are
/// reproducible up to provider nondeterminism.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Tag recorded on verdicts this provider produces.
    fn name(&self) -> &str;

    async fn analyze(&self, prompt: &Prompt) -> Result<Verdict, ProviderError>;
}
