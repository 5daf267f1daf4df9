//! Prometheus metrics for the GovWatch node.
//!
//! Covers watcher ticks, change events, analysis activity, cache behavior,
//! and delivery outcomes. The [`GovMetrics`] struct owns a dedicated
//! [`Registry`] that the admin `/metrics` endpoint encodes into the
//! Prometheus text exposition format; [`Stats`] snapshots the same counters
//! for the programmatic admin surface.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, HistogramOpts, IntCounter, IntGauge, Opts,
    Registry,
};
use serde::Serialize;

/// Central collection of all node-level Prometheus metrics.
pub struct GovMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Total watcher ticks completed (all chains).
    pub ticks_total: IntCounter,
    /// Total NEW proposal events emitted.
    pub events_new_total: IntCounter,
    /// Total CHANGED proposal events emitted (including synthetic ones).
    pub events_changed_total: IntCounter,
    /// Total analyses computed (cache misses that ran a provider chain).
    pub analyses_total: IntCounter,
    /// Analyses that degraded to the deterministic fallback.
    pub analysis_fallbacks_total: IntCounter,
    /// Cache lookups answered from a fresh stored analysis.
    pub cache_hits_total: IntCounter,
    /// Cache lookups that had to compute (or join an in-flight compute).
    pub cache_misses_total: IntCounter,
    /// Notifications accepted by the notifier.
    pub deliveries_total: IntCounter,
    /// Permanent delivery failures.
    pub delivery_failures_total: IntCounter,
    /// Delivery attempts suppressed by an existing mark.
    pub duplicates_suppressed_total: IntCounter,
    /// Analysis jobs dropped because the queue was full.
    pub analysis_jobs_dropped_total: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Proposals currently tracked (non-terminal) across all chains.
    pub tracked_proposals: IntGauge,
    /// Jobs waiting in the analysis queue.
    pub analysis_queue_depth: IntGauge,
    /// Jobs waiting in the delivery queue.
    pub delivery_queue_depth: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of one watcher tick, in milliseconds.
    pub tick_duration_ms: Histogram,
    /// Wall time of one analysis computation, in milliseconds.
    pub analysis_duration_ms: Histogram,
}

impl GovMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        macro_rules! counter {
            ($name:expr, $help:expr) => {
                register_int_counter_with_registry!(Opts::new($name, $help), registry)
                    .unwrap_or_else(|_| panic!("failed to register {}", $name))
            };
        }
        macro_rules! gauge {
            ($name:expr, $help:expr) => {
                register_int_gauge_with_registry!(Opts::new($name, $help), registry)
                    .unwrap_or_else(|_| panic!("failed to register {}", $name))
            };
        }

        let ticks_total = counter!("govwatch_ticks_total", "Watcher ticks completed");
        let events_new_total = counter!("govwatch_events_new_total", "NEW proposal events");
        let events_changed_total =
            counter!("govwatch_events_changed_total", "CHANGED proposal events");
        let analyses_total = counter!("govwatch_analyses_total", "Analyses computed");
        let analysis_fallbacks_total = counter!(
            "govwatch_analysis_fallbacks_total",
            "Analyses that degraded to the deterministic fallback"
        );
        let cache_hits_total = counter!("govwatch_cache_hits_total", "Analysis cache hits");
        let cache_misses_total = counter!("govwatch_cache_misses_total", "Analysis cache misses");
        let deliveries_total =
            counter!("govwatch_deliveries_total", "Notifications accepted by the notifier");
        let delivery_failures_total = counter!(
            "govwatch_delivery_failures_total",
            "Permanent delivery failures"
        );
        let duplicates_suppressed_total = counter!(
            "govwatch_duplicates_suppressed_total",
            "Deliveries suppressed by an existing mark"
        );
        let analysis_jobs_dropped_total = counter!(
            "govwatch_analysis_jobs_dropped_total",
            "Analysis jobs dropped on a full queue"
        );

        let tracked_proposals =
            gauge!("govwatch_tracked_proposals", "Non-terminal proposals being tracked");
        let analysis_queue_depth =
            gauge!("govwatch_analysis_queue_depth", "Jobs waiting in the analysis queue");
        let delivery_queue_depth =
            gauge!("govwatch_delivery_queue_depth", "Jobs waiting in the delivery queue");

        // Exponential buckets covering 1 ms → ~16 s.
        let tick_duration_ms = register_histogram_with_registry!(
            HistogramOpts::new("govwatch_tick_duration_ms", "Watcher tick duration in ms")
                .buckets(prometheus::exponential_buckets(1.0, 2.0, 15).unwrap()),
            registry
        )
        .expect("failed to register tick_duration_ms histogram");

        let analysis_duration_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "govwatch_analysis_duration_ms",
                "Analysis computation duration in ms"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 18).unwrap()),
            registry
        )
        .expect("failed to register analysis_duration_ms histogram");

        Self {
            registry,
            ticks_total,
            events_new_total,
            events_changed_total,
            analyses_total,
            analysis_fallbacks_total,
            cache_hits_total,
            cache_misses_total,
            deliveries_total,
            delivery_failures_total,
            duplicates_suppressed_total,
            analysis_jobs_dropped_total,
            tracked_proposals,
            analysis_queue_depth,
            delivery_queue_depth,
            tick_duration_ms,
            analysis_duration_ms,
        }
    }

    /// Snapshot the counters for the programmatic admin surface.
    pub fn stats(&self) -> Stats {
        Stats {
            ticks: self.ticks_total.get(),
            events_new: self.events_new_total.get(),
            events_changed: self.events_changed_total.get(),
            analyses: self.analyses_total.get(),
            analysis_fallbacks: self.analysis_fallbacks_total.get(),
            cache_hits: self.cache_hits_total.get(),
            cache_misses: self.cache_misses_total.get(),
            deliveries: self.deliveries_total.get(),
            delivery_failures: self.delivery_failures_total.get(),
            duplicates_suppressed: self.duplicates_suppressed_total.get(),
            tracked_proposals: self.tracked_proposals.get(),
        }
    }
}

impl Default for GovMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time counter snapshot returned by the admin `Stats()` call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub ticks: u64,
    pub events_new: u64,
    pub events_changed: u64,
    pub analyses: u64,
    pub analysis_fallbacks: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub duplicates_suppressed: u64,
    pub tracked_proposals: i64,
}
