//! The scheduler: owns every long-running task and the concurrency bounds.
//!
//! One periodic watcher task per chain (jittered ±10%), a deduplicating
//! analysis queue, a delivery queue, semaphores capping concurrent LLM
//! calls and notifier sends, and the hourly cache sweep. Shutdown stops
//! watcher ticks first, drains the analysis queue within its grace period,
//! then the delivery queue, then cancels whatever remains.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinHandle;

use govwatch_analyzer::HybridAnalyzer;
use govwatch_chain::ProposalSource;
use govwatch_store::{CursorStore, ProposalStore};
use govwatch_types::{
    Advice, ChainDescriptor, ChainId, Fingerprint, Proposal, Subscriber, Timestamp,
};

use crate::cache::AnalysisCache;
use crate::config::NodeConfig;
use crate::delivery::{DeliveryGate, DeliveryOutcome};
use crate::fanout::{render_advice, render_body, subject_line};
use crate::matcher::SubscriberMatcher;
use crate::metrics::GovMetrics;
use crate::shutdown::ShutdownController;
use crate::watcher::Watcher;
use crate::NodeError;

/// Relative jitter on the watcher interval.
const TICK_JITTER: f64 = 0.1;
/// Capacity of each per-chain force-tick command channel.
const FORCE_TICK_CAPACITY: usize = 4;
/// Grace period for watcher tasks to notice shutdown.
const WATCHER_STOP_GRACE: Duration = Duration::from_secs(5);

/// Runtime knobs, derived from [`NodeConfig`] (or built directly in tests).
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    pub analysis_queue_capacity: usize,
    pub delivery_queue_capacity: usize,
    pub max_concurrent_llm: usize,
    pub max_concurrent_sends: usize,
    pub analysis_drain_grace: Duration,
    pub delivery_drain_grace: Duration,
    pub sweep_interval: Duration,
    /// First backoff after a transient delivery failure.
    pub delivery_retry_initial: Duration,
    /// Backoff ceiling for transient delivery failures.
    pub delivery_retry_max: Duration,
    /// Retries after the initial delivery attempt.
    pub delivery_retry_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3600),
            analysis_queue_capacity: 256,
            delivery_queue_capacity: 1024,
            max_concurrent_llm: 3,
            max_concurrent_sends: 8,
            analysis_drain_grace: Duration::from_secs(60),
            delivery_drain_grace: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(3600),
            delivery_retry_initial: Duration::from_secs(1),
            delivery_retry_max: Duration::from_secs(16),
            delivery_retry_attempts: 3,
        }
    }
}

impl From<&NodeConfig> for SchedulerConfig {
    fn from(config: &NodeConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            analysis_queue_capacity: config.analysis_queue_capacity,
            delivery_queue_capacity: config.delivery_queue_capacity,
            max_concurrent_llm: config.max_concurrent_llm,
            max_concurrent_sends: config.max_concurrent_sends,
            ..SchedulerConfig::default()
        }
    }
}

/// One chain to watch: its static descriptor plus a proposal source.
pub struct ChainEntry {
    pub descriptor: ChainDescriptor,
    pub source: Arc<dyn ProposalSource>,
}

pub(crate) struct AnalysisJob {
    pub proposal: Proposal,
    pub fingerprint: Fingerprint,
}

pub(crate) struct DeliveryJob {
    pub advice: Advice,
    pub subscriber: Subscriber,
    pub subject: String,
    pub body: String,
}

/// Bounded analysis intake with fingerprint dedup: enqueueing a fingerprint
/// that is already queued is a no-op, and a full queue drops the job with a
/// counter rather than blocking the watcher.
pub(crate) struct AnalysisQueue {
    tx: mpsc::Sender<AnalysisJob>,
    pending: Mutex<HashSet<Fingerprint>>,
    metrics: Arc<GovMetrics>,
}

impl AnalysisQueue {
    fn new(tx: mpsc::Sender<AnalysisJob>, metrics: Arc<GovMetrics>) -> Self {
        Self {
            tx,
            pending: Mutex::new(HashSet::new()),
            metrics,
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashSet<Fingerprint>> {
        self.pending.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn push(&self, proposal: Proposal) {
        let fingerprint = Fingerprint::of(&proposal);
        {
            let mut pending = self.lock_pending();
            if !pending.insert(fingerprint) {
                return; // duplicate enqueue is a no-op
            }
        }
        match self.tx.try_send(AnalysisJob {
            proposal,
            fingerprint,
        }) {
            Ok(()) => {
                self.metrics.analysis_queue_depth.inc();
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.lock_pending().remove(&job.fingerprint);
                self.metrics.analysis_jobs_dropped_total.inc();
                tracing::warn!(
                    chain = %job.proposal.chain_id,
                    proposal_id = job.proposal.proposal_id,
                    "analysis queue full, dropping job"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Called by a worker once it has taken the job; later change events
    /// for the same fingerprint may enqueue again.
    pub(crate) fn taken(&self, fingerprint: &Fingerprint) {
        self.lock_pending().remove(fingerprint);
        self.metrics.analysis_queue_depth.dec();
    }
}

/// Everything an analysis worker needs to turn one job into delivery jobs.
struct PipelineCtx {
    cache: Arc<AnalysisCache>,
    analyzer: Arc<HybridAnalyzer>,
    matcher: Arc<SubscriberMatcher>,
    metrics: Arc<GovMetrics>,
    llm_permits: Arc<Semaphore>,
    chain_names: HashMap<ChainId, String>,
    delivery_tx: mpsc::Sender<DeliveryJob>,
}

pub struct Scheduler {
    config: SchedulerConfig,
    chains: Vec<ChainEntry>,
    cursors: Arc<dyn CursorStore>,
    proposals: Arc<dyn ProposalStore>,
    cache: Arc<AnalysisCache>,
    analyzer: Arc<HybridAnalyzer>,
    matcher: Arc<SubscriberMatcher>,
    gate: Arc<DeliveryGate>,
    metrics: Arc<GovMetrics>,
    shutdown: Arc<ShutdownController>,

    force_ticks: HashMap<ChainId, mpsc::Sender<()>>,
    force_rxs: HashMap<ChainId, mpsc::Receiver<()>>,
    analysis_tx: Option<mpsc::Sender<AnalysisJob>>,
    analysis_rx: Option<mpsc::Receiver<AnalysisJob>>,

    watcher_handles: Vec<JoinHandle<()>>,
    analysis_handles: Vec<JoinHandle<()>>,
    delivery_handles: Vec<JoinHandle<()>>,
    sweep_handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SchedulerConfig,
        chains: Vec<ChainEntry>,
        cursors: Arc<dyn CursorStore>,
        proposals: Arc<dyn ProposalStore>,
        cache: Arc<AnalysisCache>,
        analyzer: Arc<HybridAnalyzer>,
        matcher: Arc<SubscriberMatcher>,
        gate: Arc<DeliveryGate>,
        metrics: Arc<GovMetrics>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        let mut force_ticks = HashMap::new();
        let mut force_rxs = HashMap::new();
        for entry in &chains {
            let (tx, rx) = mpsc::channel(FORCE_TICK_CAPACITY);
            force_ticks.insert(entry.descriptor.chain_id.clone(), tx);
            force_rxs.insert(entry.descriptor.chain_id.clone(), rx);
        }
        let (analysis_tx, analysis_rx) = mpsc::channel(config.analysis_queue_capacity);

        Self {
            config,
            chains,
            cursors,
            proposals,
            cache,
            analyzer,
            matcher,
            gate,
            metrics,
            shutdown,
            force_ticks,
            force_rxs,
            analysis_tx: Some(analysis_tx),
            analysis_rx: Some(analysis_rx),
            watcher_handles: Vec::new(),
            analysis_handles: Vec::new(),
            delivery_handles: Vec::new(),
            sweep_handle: None,
        }
    }

    /// Per-chain manual tick senders, for the admin surface.
    pub fn force_tick_senders(&self) -> HashMap<ChainId, mpsc::Sender<()>> {
        self.force_ticks.clone()
    }

    /// Spawn every background task. Call once.
    pub fn start(&mut self) {
        let analysis_tx = self
            .analysis_tx
            .clone()
            .expect("scheduler started after stop");
        let analysis_queue = Arc::new(AnalysisQueue::new(analysis_tx, Arc::clone(&self.metrics)));
        let analysis_rx = Arc::new(AsyncMutex::new(
            self.analysis_rx.take().expect("scheduler started twice"),
        ));

        let (delivery_tx, delivery_rx) = mpsc::channel(self.config.delivery_queue_capacity);
        let delivery_rx = Arc::new(AsyncMutex::new(delivery_rx));

        let chain_names: HashMap<ChainId, String> = self
            .chains
            .iter()
            .map(|e| (e.descriptor.chain_id.clone(), e.descriptor.name.clone()))
            .collect();

        let ctx = Arc::new(PipelineCtx {
            cache: Arc::clone(&self.cache),
            analyzer: Arc::clone(&self.analyzer),
            matcher: Arc::clone(&self.matcher),
            metrics: Arc::clone(&self.metrics),
            llm_permits: Arc::new(Semaphore::new(self.config.max_concurrent_llm)),
            chain_names,
            delivery_tx,
        });

        // ── Watcher task per chain ──────────────────────────────────────
        for entry in self.chains.drain(..) {
            let chain_id = entry.descriptor.chain_id.clone();
            let watcher = Watcher::new(
                entry.source,
                Arc::clone(&self.cursors),
                Arc::clone(&self.proposals),
                Arc::clone(&self.metrics),
            );
            let queue = Arc::clone(&analysis_queue);
            let shutdown = Arc::clone(&self.shutdown);
            let mut shutdown_rx = shutdown.subscribe();
            let mut force_rx = self
                .force_rxs
                .remove(&chain_id)
                .expect("force channel exists for every chain");
            let interval = self.config.poll_interval;

            self.watcher_handles.push(tokio::spawn(async move {
                let mut first = true;
                loop {
                    let delay = if first {
                        Duration::ZERO
                    } else {
                        govwatch_chain::client::jittered(interval, TICK_JITTER)
                    };
                    first = false;

                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => {
                            tracing::info!(chain = %chain_id, "watcher task shutting down");
                            break;
                        }
                        _ = force_rx.recv() => {
                            tracing::info!(chain = %chain_id, "manual tick forced");
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    // A forced tick can race the stop sequence; the flag is
                    // authoritative where the broadcast is not replayed.
                    if shutdown.is_triggered() {
                        break;
                    }

                    match watcher.tick().await {
                        Ok(events) => {
                            for event in events {
                                queue.push(event.proposal().clone());
                            }
                        }
                        Err(NodeError::CursorCorrupt { chain, message }) => {
                            // Unrecoverable without operator intervention;
                            // halt this chain until restart.
                            tracing::error!(
                                chain = %chain,
                                error = %message,
                                "cursor corrupted, halting this chain's watcher"
                            );
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(
                                chain = %chain_id,
                                error = %e,
                                "tick failed, retrying next interval"
                            );
                        }
                    }
                }
            }));
        }

        // ── Analysis workers ────────────────────────────────────────────
        let analysis_workers = self.config.max_concurrent_llm.max(2);
        for _ in 0..analysis_workers {
            let rx = Arc::clone(&analysis_rx);
            let queue = Arc::clone(&analysis_queue);
            let ctx = Arc::clone(&ctx);
            self.analysis_handles.push(tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else { break };
                    queue.taken(&job.fingerprint);
                    process_analysis(&ctx, job).await;
                }
            }));
        }

        // ── Delivery workers ────────────────────────────────────────────
        let send_permits = Arc::new(Semaphore::new(self.config.max_concurrent_sends));
        for _ in 0..self.config.max_concurrent_sends {
            let rx = Arc::clone(&delivery_rx);
            let gate = Arc::clone(&self.gate);
            let metrics = Arc::clone(&self.metrics);
            let permits = Arc::clone(&send_permits);
            let config = self.config.clone();
            self.delivery_handles.push(tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else { break };
                    metrics.delivery_queue_depth.dec();
                    let _permit = permits.acquire().await.expect("semaphore never closed");
                    deliver_with_retries(&gate, &metrics, &config, job).await;
                }
            }));
        }

        // ── Cache sweep ─────────────────────────────────────────────────
        {
            let cache = Arc::clone(&self.cache);
            let shutdown = Arc::clone(&self.shutdown);
            let mut shutdown_rx = shutdown.subscribe();
            let interval = self.config.sweep_interval;
            self.sweep_handle = Some(tokio::spawn(async move {
                loop {
                    if shutdown.is_triggered() {
                        break;
                    }
                    match cache.purge(Timestamp::now()) {
                        Ok(purged) if purged > 0 => {
                            tracing::info!(purged, "cache sweep purged stale analyses");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %e, "cache sweep failed"),
                    }
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
            }));
        }

        tracing::info!(
            chains = self.watcher_handles.len(),
            analysis_workers,
            delivery_workers = self.config.max_concurrent_sends,
            "scheduler started"
        );
    }

    /// Graceful shutdown: stop ticks, drain analysis, drain delivery,
    /// cancel the rest.
    pub async fn stop(&mut self) {
        self.shutdown.trigger();

        join_with_grace(&mut self.watcher_handles, WATCHER_STOP_GRACE).await;

        // Closing the analysis queue lets workers drain it and exit; their
        // delivery senders drop with them, which closes the delivery queue
        // in turn.
        self.analysis_tx.take();
        join_with_grace(&mut self.analysis_handles, self.config.analysis_drain_grace).await;
        join_with_grace(&mut self.delivery_handles, self.config.delivery_drain_grace).await;

        if let Some(mut handle) = self.sweep_handle.take() {
            join_with_grace_one(&mut handle, Duration::from_secs(1)).await;
        }
        tracing::info!("scheduler stopped");
    }
}

async fn join_with_grace(handles: &mut Vec<JoinHandle<()>>, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    for mut handle in handles.drain(..) {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if tokio::time::timeout(remaining, &mut handle).await.is_err() {
            handle.abort();
        }
    }
}

async fn join_with_grace_one(handle: &mut JoinHandle<()>, grace: Duration) {
    if tokio::time::timeout(grace, &mut *handle).await.is_err() {
        handle.abort();
    }
}

/// One analysis job: resolve subscribers, get-or-compute the analysis, fan
/// out delivery jobs.
async fn process_analysis(ctx: &Arc<PipelineCtx>, job: AnalysisJob) {
    let proposal = job.proposal;
    let now = Timestamp::now();

    let subscribers = match ctx.matcher.subscribers_for(&proposal.chain_id, now).await {
        Ok(subscribers) => subscribers,
        Err(e) => {
            tracing::warn!(
                chain = %proposal.chain_id,
                proposal_id = proposal.proposal_id,
                error = %e,
                "subscriber resolution failed, skipping analysis"
            );
            return;
        }
    };
    if subscribers.is_empty() {
        tracing::debug!(
            chain = %proposal.chain_id,
            proposal_id = proposal.proposal_id,
            "no active subscribers, skipping analysis"
        );
        return;
    }

    // Analysis is per proposal; the first matched subscriber's policy
    // shapes the prompt for everyone (the cache key is the proposal
    // fingerprint alone).
    let policy = subscribers[0].policy.clone();
    let analyzer = Arc::clone(&ctx.analyzer);
    let permits = Arc::clone(&ctx.llm_permits);
    let prompt_proposal = proposal.clone();

    let analysis = ctx
        .cache
        .get_or_compute(job.fingerprint, proposal.status, now, move || async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| format!("llm semaphore closed: {e}"))?;
            Ok(analyzer.analyze(&prompt_proposal, &policy).await)
        })
        .await;

    let analysis = match analysis {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::warn!(
                chain = %proposal.chain_id,
                proposal_id = proposal.proposal_id,
                error = %e,
                "analysis unavailable, no advice produced"
            );
            return;
        }
    };

    let chain_name = ctx
        .chain_names
        .get(&proposal.chain_id)
        .map(String::as_str)
        .unwrap_or_else(|| proposal.chain_id.as_str());
    let subject = subject_line(chain_name, &proposal);

    for subscriber in subscribers {
        let advice = render_advice(&proposal, &analysis, &subscriber, now);
        let body = render_body(&proposal, &advice);
        let job = DeliveryJob {
            advice,
            subscriber,
            subject: subject.clone(),
            body,
        };
        if ctx.delivery_tx.send(job).await.is_ok() {
            ctx.metrics.delivery_queue_depth.inc();
        }
    }
}

/// Drive one delivery job through the gate, retrying transient failures
/// with exponential backoff.
async fn deliver_with_retries(
    gate: &DeliveryGate,
    metrics: &GovMetrics,
    config: &SchedulerConfig,
    job: DeliveryJob,
) {
    let mut retries = 0u32;
    let mut delay = config.delivery_retry_initial;
    loop {
        match gate
            .deliver(&job.advice, &job.subscriber, &job.subject, &job.body)
            .await
        {
            DeliveryOutcome::TransientFailure(message) => {
                if retries >= config.delivery_retry_attempts {
                    metrics.delivery_failures_total.inc();
                    tracing::warn!(
                        key = %job.advice.delivery_key(),
                        error = %message,
                        retries,
                        "delivery retries exhausted"
                    );
                    return;
                }
                retries += 1;
                tokio::time::sleep(delay).await;
                delay = (delay * 4).min(config.delivery_retry_max);
            }
            _ => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govwatch_types::ProposalStatus;

    fn proposal(id: u64) -> Proposal {
        Proposal {
            chain_id: ChainId::new("osmosis-1"),
            proposal_id: id,
            title: format!("Proposal {id}"),
            description: String::new(),
            status: ProposalStatus::Voting,
            submit_time: Timestamp::new(0),
            voting_start: None,
            voting_end: None,
            proposer: String::new(),
            proposal_type: String::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_fingerprints_enqueue_once() {
        let (tx, mut rx) = mpsc::channel(16);
        let queue = AnalysisQueue::new(tx, Arc::new(GovMetrics::new()));

        queue.push(proposal(848));
        queue.push(proposal(848));
        queue.push(proposal(849));

        assert_eq!(rx.recv().await.unwrap().proposal.proposal_id, 848);
        assert_eq!(rx.recv().await.unwrap().proposal.proposal_id, 849);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn taken_allows_reenqueue() {
        let (tx, mut rx) = mpsc::channel(16);
        let queue = AnalysisQueue::new(tx, Arc::new(GovMetrics::new()));

        queue.push(proposal(848));
        let job = rx.recv().await.unwrap();
        queue.taken(&job.fingerprint);

        queue.push(proposal(848));
        assert_eq!(rx.recv().await.unwrap().proposal.proposal_id, 848);
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        let (tx, _rx) = mpsc::channel(1);
        let metrics = Arc::new(GovMetrics::new());
        let queue = AnalysisQueue::new(tx, Arc::clone(&metrics));

        queue.push(proposal(1));
        queue.push(proposal(2)); // queue is full, dropped
        assert_eq!(metrics.analysis_jobs_dropped_total.get(), 1);

        // The dropped fingerprint is not stuck in the dedup set.
        queue.push(proposal(2));
        assert_eq!(metrics.analysis_jobs_dropped_total.get(), 2);
    }
}
