use thiserror::Error;

/// Chain client errors, classified by retry behavior.
///
/// Transient errors (timeouts, 5xx, connection resets, rate limits) are
/// retried across the endpoint rotation; permanent errors surface
/// immediately.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("transport error from {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("rate limited by {endpoint}")]
    RateLimited { endpoint: String },

    #[error("permanent error from {endpoint}: HTTP {status}")]
    Permanent { endpoint: String, status: u16 },

    #[error("proposal {proposal_id} not found on {chain_id}")]
    NotFound { chain_id: String, proposal_id: u64 },

    #[error("failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("all attempts exhausted after {attempts} tries: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("listing timed out after {secs}s")]
    ListDeadline { secs: u64 },
}

impl ChainError {
    /// Whether another attempt (possibly on a different endpoint) may
    /// succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Transport { .. }
                | Self::RateLimited { .. }
                | Self::Decode { .. }
        )
    }
}
