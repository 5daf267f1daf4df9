//! Content-addressed analysis cache with status-aware TTLs and per-
//! fingerprint single-flight.
//!
//! The central invariant: an analysis computation for a given fingerprint is
//! never in flight twice concurrently. Concurrent callers attach to the one
//! running computation and share its result; failures propagate to every
//! waiter and are never stored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use thiserror::Error;
use tokio::sync::watch;

use govwatch_store::AnalysisStore;
use govwatch_types::{Analysis, Fingerprint, ProposalStatus, Timestamp, Verdict};

use crate::metrics::GovMetrics;

/// TTL for analyses of proposals still in their voting period.
pub const VOTING_TTL_SECS: u64 = 24 * 3600;
/// TTL for analyses of proposals still in their deposit period.
pub const DEPOSIT_TTL_SECS: u64 = 24 * 3600;
/// TTL for analyses of proposals in a terminal status.
pub const TERMINAL_TTL_SECS: u64 = 7 * 24 * 3600;
/// Hard age limit: the sweep purges anything older regardless of status.
pub const MAX_AGE_SECS: u64 = 30 * 24 * 3600;

/// Status-aware TTL policy.
pub fn ttl_for(status: ProposalStatus) -> u64 {
    match status {
        ProposalStatus::Voting => VOTING_TTL_SECS,
        ProposalStatus::Deposit => DEPOSIT_TTL_SECS,
        ProposalStatus::Passed | ProposalStatus::Rejected | ProposalStatus::Failed => {
            TERMINAL_TTL_SECS
        }
    }
}

/// Cache errors are cloneable so one failure can fan out to every waiter.
#[derive(Clone, Debug, Error)]
pub enum CacheError {
    #[error("analysis compute failed: {0}")]
    Compute(String),

    #[error("analysis store error: {0}")]
    Store(String),
}

type FlightResult = Result<Analysis, CacheError>;
type FlightState = Option<FlightResult>;

pub struct AnalysisCache {
    store: Arc<dyn AnalysisStore>,
    inflight: Mutex<HashMap<Fingerprint, watch::Receiver<FlightState>>>,
    metrics: Arc<GovMetrics>,
}

fn lock<'a>(
    m: &'a Mutex<HashMap<Fingerprint, watch::Receiver<FlightState>>>,
) -> MutexGuard<'a, HashMap<Fingerprint, watch::Receiver<FlightState>>> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Removes the in-flight marker when the leader finishes or is cancelled.
struct FlightGuard<'a> {
    cache: &'a AnalysisCache,
    fingerprint: Fingerprint,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        lock(&self.cache.inflight).remove(&self.fingerprint);
    }
}

enum Role {
    Leader(watch::Sender<FlightState>),
    Waiter(watch::Receiver<FlightState>),
}

impl AnalysisCache {
    pub fn new(store: Arc<dyn AnalysisStore>, metrics: Arc<GovMetrics>) -> Self {
        Self {
            store,
            inflight: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// Return the cached analysis for `fingerprint`, or compute one.
    ///
    /// `status` decides the TTL stamped on a freshly computed analysis;
    /// `now` is the cache's view of the clock for both freshness checks and
    /// timestamps.
    pub async fn get_or_compute<F, Fut>(
        &self,
        fingerprint: Fingerprint,
        status: ProposalStatus,
        now: Timestamp,
        compute: F,
    ) -> Result<Analysis, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Verdict, String>>,
    {
        // 1. A fresh stored analysis answers immediately.
        if let Some(analysis) = self
            .store
            .get_analysis(&fingerprint)
            .map_err(|e| CacheError::Store(e.to_string()))?
        {
            if analysis.is_fresh(now) {
                self.metrics.cache_hits_total.inc();
                return Ok(analysis);
            }
        }

        // 2./3. Attach to an in-flight computation, or become the leader.
        let role = {
            let mut inflight = lock(&self.inflight);
            match inflight.get(&fingerprint) {
                Some(rx) => Role::Waiter(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(fingerprint, rx);
                    Role::Leader(tx)
                }
            }
        };
        self.metrics.cache_misses_total.inc();

        match role {
            Role::Waiter(mut rx) => loop {
                if let Some(result) = rx.borrow().clone() {
                    return result;
                }
                if rx.changed().await.is_err() {
                    // Leader vanished without publishing (cancelled).
                    return Err(CacheError::Compute(
                        "in-flight analysis aborted".to_string(),
                    ));
                }
            },
            Role::Leader(tx) => {
                let guard = FlightGuard {
                    cache: self,
                    fingerprint,
                };

                let started = Instant::now();
                let result = match compute().await {
                    Ok(verdict) => {
                        self.metrics.analyses_total.inc();
                        if verdict.is_fallback() {
                            self.metrics.analysis_fallbacks_total.inc();
                        }
                        self.metrics
                            .analysis_duration_ms
                            .observe(started.elapsed().as_millis() as f64);

                        let analysis = Analysis {
                            fingerprint,
                            verdict,
                            created_at: now,
                            expires_at: now.plus(ttl_for(status)),
                        };
                        match self.store.put_analysis(&analysis) {
                            Ok(()) => Ok(analysis),
                            Err(e) => Err(CacheError::Store(e.to_string())),
                        }
                    }
                    // Failures are propagated, never stored as negative
                    // entries.
                    Err(message) => Err(CacheError::Compute(message)),
                };

                // Remove the marker before releasing waiters so late
                // arrivals read the stored result instead of a dead flight.
                drop(guard);
                let _ = tx.send(Some(result.clone()));
                result
            }
        }
    }

    /// Purge analyses older than [`MAX_AGE_SECS`]; run at most hourly by
    /// the scheduler's sweep task.
    pub fn purge(&self, now: Timestamp) -> Result<u64, CacheError> {
        let cutoff = Timestamp::new(now.as_secs().saturating_sub(MAX_AGE_SECS));
        self.store
            .purge_created_before(cutoff)
            .map_err(|e| CacheError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govwatch_store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Notify;

    fn cache() -> Arc<AnalysisCache> {
        let store = Arc::new(MemoryStore::new());
        Arc::new(AnalysisCache::new(store, Arc::new(GovMetrics::new())))
    }

    fn verdict() -> Verdict {
        Verdict {
            provider: "primary".to_string(),
            recommendation: govwatch_types::Recommendation::Approve,
            confidence: 0.85,
            reasoning: "sound".to_string(),
            risk_assessment: govwatch_types::RiskLevel::Low,
            sections: Default::default(),
        }
    }

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::new([byte; 16])
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_compute() {
        let cache = cache();
        let now = Timestamp::new(1_000);

        let first = cache
            .get_or_compute(fp(1), ProposalStatus::Voting, now, || async {
                Ok(verdict())
            })
            .await
            .unwrap();

        let calls = AtomicU32::new(0);
        let second = cache
            .get_or_compute(fp(1), ProposalStatus::Voting, now.plus(10), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(verdict())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0, "must not recompute while fresh");
        assert_eq!(first, second);
        assert_eq!(cache.metrics.cache_hits_total.get(), 1);
        assert_eq!(cache.metrics.analyses_total.get(), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_recomputed() {
        let cache = cache();
        let now = Timestamp::new(1_000);

        cache
            .get_or_compute(fp(1), ProposalStatus::Voting, now, || async {
                Ok(verdict())
            })
            .await
            .unwrap();

        let later = now.plus(VOTING_TTL_SECS); // exactly at expiry
        let calls = AtomicU32::new(0);
        cache
            .get_or_compute(fp(1), ProposalStatus::Voting, later, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(verdict())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn voting_ttl_is_shorter_than_terminal_ttl() {
        let cache = cache();
        let now = Timestamp::new(1_000);

        let voting = cache
            .get_or_compute(fp(1), ProposalStatus::Voting, now, || async {
                Ok(verdict())
            })
            .await
            .unwrap();
        let passed = cache
            .get_or_compute(fp(2), ProposalStatus::Passed, now, || async {
                Ok(verdict())
            })
            .await
            .unwrap();

        assert!(voting.expires_at < passed.expires_at);
        assert_eq!(voting.expires_at, now.plus(VOTING_TTL_SECS));
        assert_eq!(passed.expires_at, now.plus(TERMINAL_TTL_SECS));
        assert!(voting.expires_at > voting.created_at);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_compute() {
        let cache = cache();
        let now = Timestamp::new(1_000);
        let calls = Arc::new(AtomicU32::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..20 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let release = Arc::clone(&release);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(fp(7), ProposalStatus::Voting, now, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        release.notified().await;
                        Ok(verdict())
                    })
                    .await
            }));
        }

        // Give every task a chance to enqueue before releasing the leader.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        release.notify_waiters();
        release.notify_one();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_propagates_to_waiters_and_stores_nothing() {
        let cache = cache();
        let now = Timestamp::new(1_000);
        let release = Arc::new(Notify::new());

        let leader = {
            let cache = Arc::clone(&cache);
            let release = Arc::clone(&release);
            tokio::spawn(async move {
                cache
                    .get_or_compute(fp(9), ProposalStatus::Voting, now, move || async move {
                        release.notified().await;
                        Err("provider chain exploded".to_string())
                    })
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute(fp(9), ProposalStatus::Voting, now, || async {
                        Err("waiter must not compute".to_string())
                    })
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        release.notify_waiters();
        release.notify_one();

        assert!(matches!(
            leader.await.unwrap(),
            Err(CacheError::Compute(_))
        ));
        assert!(matches!(
            waiter.await.unwrap(),
            Err(CacheError::Compute(_))
        ));

        // No negative entry: the next call recomputes and can succeed.
        let calls = AtomicU32::new(0);
        let result = cache
            .get_or_compute(fp(9), ProposalStatus::Voting, now, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(verdict())
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn purge_respects_the_hard_age_limit() {
        let store = Arc::new(MemoryStore::new());
        let cache = AnalysisCache::new(store.clone(), Arc::new(GovMetrics::new()));

        let created = Timestamp::new(1_000);
        cache
            .get_or_compute(fp(1), ProposalStatus::Passed, created, || async {
                Ok(verdict())
            })
            .await
            .unwrap();

        // Just inside the limit: kept.
        let almost = created.plus(MAX_AGE_SECS);
        assert_eq!(cache.purge(almost).unwrap(), 0);

        // Past the limit: purged.
        let past = created.plus(MAX_AGE_SECS + 1_001);
        assert_eq!(cache.purge(past).unwrap(), 1);
    }
}
