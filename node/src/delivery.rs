//! The delivery gate: at-most-once dispatch per
//! `(chain, proposal, subscriber)`.
//!
//! Probe → per-key lock → re-probe → send → persist mark. Mark persistence
//! after an accepted send retries until it succeeds, while the per-key lock
//! is still held; an accepted-but-unmarked advice would otherwise be
//! re-sent on the next pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;

use govwatch_store::DeliveryMarkStore;
use govwatch_types::{Advice, DeliveryKey, DeliveryMark, Subscriber, Timestamp};

use crate::metrics::GovMetrics;
use crate::notifier::{Notifier, NotifyError};

/// Initial backoff for the mark-persistence retry loop.
const MARK_RETRY_INITIAL: Duration = Duration::from_millis(500);
/// Backoff ceiling for the mark-persistence retry loop.
const MARK_RETRY_MAX: Duration = Duration::from_secs(8);

/// What happened to one delivery attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the notifier; a mark now exists.
    Sent { message_id: String },
    /// A mark already existed; dropped silently.
    AlreadySent,
    /// Process-wide pause is on; the advice was not consumed.
    Paused,
    /// The notifier failed transiently; the caller may retry with backoff.
    TransientFailure(String),
    /// The notifier rejected the send; not retried automatically.
    PermanentFailure(String),
}

pub struct DeliveryGate {
    marks: Arc<dyn DeliveryMarkStore>,
    notifier: Arc<dyn Notifier>,
    locks: Mutex<HashMap<DeliveryKey, Arc<AsyncMutex<()>>>>,
    paused: AtomicBool,
    metrics: Arc<GovMetrics>,
}

impl DeliveryGate {
    pub fn new(
        marks: Arc<dyn DeliveryMarkStore>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<GovMetrics>,
    ) -> Self {
        Self {
            marks,
            notifier,
            locks: Mutex::new(HashMap::new()),
            paused: AtomicBool::new(false),
            metrics,
        }
    }

    /// Process-wide delivery pause; toggled by the admin surface.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
        tracing::info!(paused, "delivery pause toggled");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn key_lock(&self, key: &DeliveryKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Dispatch one advice, enforcing the at-most-once invariant.
    pub async fn deliver(
        &self,
        advice: &Advice,
        subscriber: &Subscriber,
        subject: &str,
        body: &str,
    ) -> DeliveryOutcome {
        if self.is_paused() {
            return DeliveryOutcome::Paused;
        }

        let key = advice.delivery_key();

        // Cheap lock-free probe before taking the per-key lock.
        if let Ok(Some(_)) = self.marks.get_mark(&key) {
            self.metrics.duplicates_suppressed_total.inc();
            return DeliveryOutcome::AlreadySent;
        }

        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        // Double-check under the lock: a concurrent deliverer may have won.
        match self.marks.get_mark(&key) {
            Ok(Some(_)) => {
                self.metrics.duplicates_suppressed_total.inc();
                return DeliveryOutcome::AlreadySent;
            }
            Ok(None) => {}
            Err(e) => {
                return DeliveryOutcome::TransientFailure(format!("mark probe failed: {e}"));
            }
        }

        match self.notifier.send(&subscriber.address, subject, body).await {
            Ok(accepted) => {
                let mark = DeliveryMark {
                    key: key.clone(),
                    sent_at: Timestamp::now(),
                    message_id: accepted.message_id.clone(),
                };
                self.persist_mark(&mark).await;
                self.metrics.deliveries_total.inc();
                tracing::info!(
                    key = %key,
                    message_id = %accepted.message_id,
                    "notification delivered"
                );
                DeliveryOutcome::Sent {
                    message_id: accepted.message_id,
                }
            }
            Err(NotifyError::Transient(message)) => {
                tracing::warn!(key = %key, error = %message, "transient delivery failure");
                DeliveryOutcome::TransientFailure(message)
            }
            Err(NotifyError::Permanent(message)) => {
                self.metrics.delivery_failures_total.inc();
                tracing::error!(key = %key, error = %message, "permanent delivery failure");
                DeliveryOutcome::PermanentFailure(message)
            }
        }
    }

    /// Persist the mark, retrying forever with capped backoff.
    ///
    /// The notifier has already accepted; releasing the per-key lock before
    /// a mark exists would allow a duplicate send.
    async fn persist_mark(&self, mark: &DeliveryMark) {
        let mut delay = MARK_RETRY_INITIAL;
        loop {
            match self.marks.insert_mark_if_absent(mark) {
                // `false` means another writer got there first; either way
                // a mark now exists for this key.
                Ok(_) => return,
                Err(e) => {
                    tracing::error!(
                        key = %mark.key,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "failed to persist delivery mark, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MARK_RETRY_MAX);
                }
            }
        }
    }
}
