//! The chain client: governance queries with backoff and endpoint rotation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;

use govwatch_types::{ChainDescriptor, ChainId, Proposal, ProposalSummary};

use crate::error::ChainError;
use crate::models::{ProposalResponse, ProposalsResponse};

/// Cosmos numeric status filters accepted by the proposals listing.
const DEPOSIT_PERIOD_FILTER: u8 = 1;
const VOTING_PERIOD_FILTER: u8 = 2;
/// Page size for the proposals listing.
const LIST_PAGE_LIMIT: u32 = 200;

/// Retry/backoff parameters for one logical chain operation.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts per logical operation, cycling endpoints round-robin.
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt.
    pub initial_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
    /// Minimum wait after an HTTP 429.
    pub rate_limit_delay: Duration,
    /// Deadline for a single HTTP attempt.
    pub attempt_timeout: Duration,
    /// Deadline for a full active-proposal listing.
    pub list_deadline: Duration,
    /// Relative jitter applied to every backoff delay (0.2 = ±20%).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            rate_limit_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(10),
            list_deadline: Duration::from_secs(60),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt` (1-based; no delay before the
    /// first), jittered.
    fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(2).min(31);
        let base = self
            .initial_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        jittered(base, self.jitter)
    }
}

/// Multiply a duration by a random factor in `[1-jitter, 1+jitter]`.
pub fn jittered(base: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return base;
    }
    let factor = rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter);
    base.mul_f64(factor)
}

/// Client for one chain's governance REST endpoints.
///
/// Stateless beyond the endpoint rotation counter; safe to share across
/// tasks.
pub struct ChainClient {
    descriptor: ChainDescriptor,
    http: reqwest::Client,
    policy: RetryPolicy,
    rotation: AtomicUsize,
}

impl ChainClient {
    pub fn new(descriptor: ChainDescriptor) -> Result<Self, ChainError> {
        Self::with_policy(descriptor, RetryPolicy::default())
    }

    pub fn with_policy(
        descriptor: ChainDescriptor,
        policy: RetryPolicy,
    ) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(policy.attempt_timeout)
            .build()
            .map_err(|e| ChainError::Transport {
                endpoint: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            descriptor,
            http,
            policy,
            rotation: AtomicUsize::new(0),
        })
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.descriptor.chain_id
    }

    /// Next endpoint in round-robin order.
    fn next_endpoint(&self) -> &str {
        let idx = self.rotation.fetch_add(1, Ordering::Relaxed);
        let endpoint = &self.descriptor.endpoints[idx % self.descriptor.endpoints.len()];
        endpoint.trim_end_matches('/')
    }

    /// One GET with retry, backoff, and endpoint rotation.
    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, ChainError> {
        let mut last_error: Option<ChainError> = None;

        for attempt in 1..=self.policy.max_attempts {
            let mut delay = self.policy.backoff(attempt);
            if matches!(last_error, Some(ChainError::RateLimited { .. })) {
                delay = delay.max(self.policy.rate_limit_delay);
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let endpoint = self.next_endpoint();
            let url = format!("{endpoint}{path_and_query}");

            let error = match self.http.get(&url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        match resp.json::<T>().await {
                            Ok(body) => return Ok(body),
                            Err(e) => ChainError::Decode {
                                endpoint: endpoint.to_string(),
                                message: e.to_string(),
                            },
                        }
                    } else if status.as_u16() == 429 {
                        ChainError::RateLimited {
                            endpoint: endpoint.to_string(),
                        }
                    } else if status.is_client_error() {
                        // Permanent: surface immediately, no more attempts.
                        return Err(ChainError::Permanent {
                            endpoint: endpoint.to_string(),
                            status: status.as_u16(),
                        });
                    } else {
                        ChainError::Transport {
                            endpoint: endpoint.to_string(),
                            message: format!("HTTP {}", status.as_u16()),
                        }
                    }
                }
                Err(e) if e.is_timeout() => ChainError::Timeout {
                    endpoint: endpoint.to_string(),
                },
                Err(e) => ChainError::Transport {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                },
            };

            tracing::debug!(
                chain = %self.descriptor.chain_id,
                attempt,
                max_attempts = self.policy.max_attempts,
                error = %error,
                "chain request failed"
            );
            last_error = Some(error);
        }

        let last = last_error.expect("at least one attempt was made");
        Err(ChainError::Exhausted {
            attempts: self.policy.max_attempts,
            last: last.to_string(),
        })
    }

    async fn list_by_status(&self, filter: u8) -> Result<Vec<ProposalSummary>, ChainError> {
        let path = format!(
            "/cosmos/gov/v1beta1/proposals?proposal_status={filter}&pagination.limit={LIST_PAGE_LIMIT}"
        );
        let response: ProposalsResponse = self.get_json(&path).await?;
        response
            .proposals
            .iter()
            .map(|p| p.to_summary(self.descriptor.chain_id.as_str()))
            .collect()
    }

    /// Proposals whose status is not terminal (deposit or voting period).
    ///
    /// If the endpoint reports the same id under both filters, the status
    /// later in the forward partial order wins.
    pub async fn list_active(&self) -> Result<Vec<ProposalSummary>, ChainError> {
        let deadline = self.policy.list_deadline;
        let listing = async {
            let mut merged: BTreeMap<u64, ProposalSummary> = BTreeMap::new();
            for filter in [DEPOSIT_PERIOD_FILTER, VOTING_PERIOD_FILTER] {
                for summary in self.list_by_status(filter).await? {
                    match merged.get(&summary.proposal_id) {
                        Some(existing) if existing.status.rank() >= summary.status.rank() => {}
                        _ => {
                            merged.insert(summary.proposal_id, summary);
                        }
                    }
                }
            }
            Ok::<Vec<ProposalSummary>, ChainError>(merged.into_values().collect())
        };

        tokio::time::timeout(deadline, listing)
            .await
            .map_err(|_| ChainError::ListDeadline {
                secs: deadline.as_secs(),
            })?
    }

    /// Fetch the full proposal body.
    pub async fn fetch(&self, proposal_id: u64) -> Result<Proposal, ChainError> {
        let path = format!("/cosmos/gov/v1beta1/proposals/{proposal_id}");
        let response: Result<ProposalResponse, ChainError> = self.get_json(&path).await;
        match response {
            Ok(body) => body
                .proposal
                .into_proposal(&self.descriptor.chain_id, self.descriptor.chain_id.as_str()),
            Err(ChainError::Permanent { status: 404, .. }) => Err(ChainError::NotFound {
                chain_id: self.descriptor.chain_id.to_string(),
                proposal_id,
            }),
            Err(e) => Err(e),
        }
    }
}
