//! Pipeline shutdown signal.
//!
//! One controller is shared by every long-running stage: the per-chain
//! watcher tasks and the cache sweep `select!` on it and exit as soon as it
//! fires, while the analysis and delivery workers keep draining their
//! queues until the scheduler closes them (the queues get their grace
//! periods, the ticks do not). The admin server uses it for graceful
//! HTTP shutdown, and delivery-gate invariants make it safe to fire at any
//! point: an interrupted delivery is either marked (and suppressed on the
//! next pass) or unmarked (and re-attempted).

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tokio::sync::broadcast;

pub struct ShutdownController {
    notify: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self {
            notify,
            triggered: AtomicBool::new(false),
        }
    }

    /// Receiver for one stage's `select!` arm.
    ///
    /// Stages that may start after shutdown has already fired (a forced
    /// tick racing a stop, a late-spawned worker) must check
    /// [`is_triggered`](Self::is_triggered) before waiting: a broadcast
    /// sent before `subscribe` is not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify.subscribe()
    }

    /// Begin shutdown. Idempotent: the scheduler's `stop`, the daemon's
    /// signal handler, and tests may all call it; only the first call
    /// notifies.
    pub fn trigger(&self) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("pipeline shutdown triggered");
        let _ = self.notify.send(());
    }

    /// Whether shutdown has begun. Watcher ticks and sweep runs started
    /// after this returns `true` are wasted work; stages poll it at their
    /// suspension points.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, stopping the pipeline"); }
            _ = terminate => { tracing::info!("received SIGTERM, stopping the pipeline"); }
        }

        self.trigger();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
