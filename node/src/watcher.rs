//! Per-chain proposal watcher.
//!
//! One tick lists the chain's active proposals, re-fetches everything the
//! previous cursor still tracked, diffs each observation against the stored
//! proposal body, and emits NEW/CHANGED events. The cursor is persisted
//! atomically at the end of the tick; a tick that fails outright leaves it
//! untouched.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use govwatch_chain::ProposalSource;
use govwatch_store::{CursorStore, ProposalStore};
use govwatch_types::{ChainCursor, Proposal, ProposalStatus};

use crate::error::NodeError;
use crate::metrics::GovMetrics;

/// A change observed on one chain, in per-proposal observation order.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeEvent {
    New(Proposal),
    Changed {
        proposal: Proposal,
        old_status: ProposalStatus,
    },
}

impl ChangeEvent {
    pub fn proposal(&self) -> &Proposal {
        match self {
            Self::New(p) => p,
            Self::Changed { proposal, .. } => proposal,
        }
    }
}

/// Fold one confirmed observation into the next-cursor state.
///
/// `highest_seen` only ever grows; terminal observations leave the tracked
/// set, non-terminal ones (re-)enter it.
fn advance_cursor(next: &mut ChainCursor, proposal_id: u64, terminal: bool) {
    next.highest_seen = next.highest_seen.max(proposal_id);
    if terminal {
        next.tracked.remove(&proposal_id);
    } else {
        next.tracked.insert(proposal_id);
    }
}

pub struct Watcher {
    source: Arc<dyn ProposalSource>,
    cursors: Arc<dyn CursorStore>,
    proposals: Arc<dyn ProposalStore>,
    metrics: Arc<GovMetrics>,
}

impl Watcher {
    pub fn new(
        source: Arc<dyn ProposalSource>,
        cursors: Arc<dyn CursorStore>,
        proposals: Arc<dyn ProposalStore>,
        metrics: Arc<GovMetrics>,
    ) -> Self {
        Self {
            source,
            cursors,
            proposals,
            metrics,
        }
    }

    /// Run one tick and return the events it observed.
    ///
    /// `highest_seen` only advances for ids whose fetch succeeded; a fetch
    /// failure leaves that id tracked for the next tick.
    pub async fn tick(&self) -> Result<Vec<ChangeEvent>, NodeError> {
        let chain = self.source.chain_id();
        let started = Instant::now();

        let cursor = self
            .cursors
            .get_cursor(chain)
            .map_err(|e| match e {
                govwatch_store::StoreError::Corruption(m)
                | govwatch_store::StoreError::Serialization(m) => NodeError::CursorCorrupt {
                    chain: chain.to_string(),
                    message: m,
                },
                other => NodeError::Store(other),
            })?
            .unwrap_or_default();

        // A listing failure fails the whole tick; the cursor is untouched
        // and the next interval retries.
        let active = self.source.list_active().await?;

        let mut candidates: BTreeSet<u64> = active.iter().map(|s| s.proposal_id).collect();
        candidates.extend(cursor.tracked.iter().copied());

        let mut events = Vec::new();
        let mut next = ChainCursor {
            highest_seen: cursor.highest_seen,
            tracked: cursor.tracked.clone(),
        };
        let mut fetch_failures = 0u32;

        for proposal_id in candidates {
            let observed = match self.source.fetch(proposal_id).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(
                        chain = %chain,
                        proposal_id,
                        error = %e,
                        "proposal fetch failed, will retry next tick"
                    );
                    fetch_failures += 1;
                    continue;
                }
            };

            let stored = self.proposals.get_proposal(chain, proposal_id)?;
            match stored {
                None => {
                    self.proposals.put_proposal(&observed)?;
                    self.metrics.events_new_total.inc();
                    events.push(ChangeEvent::New(observed.clone()));
                    if observed.status.is_terminal() {
                        // First observation is already terminal: follow the
                        // NEW with a synthetic CHANGED so downstream stages
                        // see a uniform sequence.
                        self.metrics.events_changed_total.inc();
                        events.push(ChangeEvent::Changed {
                            proposal: observed.clone(),
                            old_status: observed.status,
                        });
                    }
                }
                Some(previous) => {
                    if previous.status.is_terminal() && !observed.status.is_terminal() {
                        // Terminal is forever; a backward report is a
                        // transient read error on the provider side.
                        tracing::warn!(
                            chain = %chain,
                            proposal_id,
                            stored = %previous.status,
                            reported = %observed.status,
                            "ignoring terminal-to-non-terminal status regression"
                        );
                        continue;
                    }
                    if observed.differs_from(&previous) {
                        self.proposals.put_proposal(&observed)?;
                        self.metrics.events_changed_total.inc();
                        events.push(ChangeEvent::Changed {
                            proposal: observed.clone(),
                            old_status: previous.status,
                        });
                    }
                }
            }

            advance_cursor(&mut next, proposal_id, observed.status.is_terminal());
        }

        self.cursors.put_cursor(chain, &next)?;
        self.metrics.ticks_total.inc();
        self.metrics.tracked_proposals.set(next.tracked.len() as i64);
        self.metrics
            .tick_duration_ms
            .observe(started.elapsed().as_millis() as f64);

        tracing::info!(
            chain = %chain,
            events = events.len(),
            tracked = next.tracked.len(),
            highest_seen = next.highest_seen,
            fetch_failures,
            "watcher tick complete"
        );
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use govwatch_chain::ChainError;
    use govwatch_store::MemoryStore;
    use govwatch_types::{ChainId, ProposalSummary, Timestamp};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted chain source: programmable listing and per-id fetch
    /// results.
    struct ScriptedSource {
        chain: ChainId,
        active: Mutex<Vec<ProposalSummary>>,
        bodies: Mutex<HashMap<u64, Proposal>>,
        failing: Mutex<BTreeSet<u64>>,
        fail_listing: Mutex<bool>,
    }

    impl ScriptedSource {
        fn new(chain: &str) -> Arc<Self> {
            Arc::new(Self {
                chain: ChainId::new(chain),
                active: Mutex::new(Vec::new()),
                bodies: Mutex::new(HashMap::new()),
                failing: Mutex::new(BTreeSet::new()),
                fail_listing: Mutex::new(false),
            })
        }

        fn set_proposal(&self, proposal: Proposal, listed: bool) {
            let id = proposal.proposal_id;
            let status = proposal.status;
            self.bodies.lock().unwrap().insert(id, proposal);
            let mut active = self.active.lock().unwrap();
            active.retain(|s| s.proposal_id != id);
            if listed {
                active.push(ProposalSummary {
                    proposal_id: id,
                    status,
                });
            }
        }

        fn fail_fetch(&self, id: u64) {
            self.failing.lock().unwrap().insert(id);
        }

        fn fail_listing(&self, fail: bool) {
            *self.fail_listing.lock().unwrap() = fail;
        }
    }

    #[async_trait]
    impl ProposalSource for ScriptedSource {
        fn chain_id(&self) -> &ChainId {
            &self.chain
        }

        async fn list_active(&self) -> Result<Vec<ProposalSummary>, ChainError> {
            if *self.fail_listing.lock().unwrap() {
                return Err(ChainError::ListDeadline { secs: 60 });
            }
            Ok(self.active.lock().unwrap().clone())
        }

        async fn fetch(&self, proposal_id: u64) -> Result<Proposal, ChainError> {
            if self.failing.lock().unwrap().contains(&proposal_id) {
                return Err(ChainError::Timeout {
                    endpoint: "scripted".to_string(),
                });
            }
            self.bodies
                .lock()
                .unwrap()
                .get(&proposal_id)
                .cloned()
                .ok_or(ChainError::NotFound {
                    chain_id: self.chain.to_string(),
                    proposal_id,
                })
        }
    }

    fn proposal(chain: &str, id: u64, status: ProposalStatus) -> Proposal {
        Proposal {
            chain_id: ChainId::new(chain),
            proposal_id: id,
            title: format!("Proposal {id}"),
            description: "body".to_string(),
            status,
            submit_time: Timestamp::new(1_700_000_000),
            voting_start: None,
            voting_end: None,
            proposer: String::new(),
            proposal_type: String::new(),
        }
    }

    fn watcher(source: Arc<ScriptedSource>) -> (Watcher, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let watcher = Watcher::new(
            source,
            store.clone(),
            store.clone(),
            Arc::new(GovMetrics::new()),
        );
        (watcher, store)
    }

    #[tokio::test]
    async fn first_observation_emits_new() {
        let source = ScriptedSource::new("osmosis-1");
        source.set_proposal(proposal("osmosis-1", 848, ProposalStatus::Voting), true);
        let (watcher, store) = watcher(source);

        let events = watcher.tick().await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ChangeEvent::New(p) if p.proposal_id == 848));

        let cursor = store
            .get_cursor(&ChainId::new("osmosis-1"))
            .unwrap()
            .unwrap();
        assert_eq!(cursor.highest_seen, 848);
        assert!(cursor.tracked.contains(&848));
    }

    #[tokio::test]
    async fn unchanged_proposal_emits_nothing() {
        let source = ScriptedSource::new("osmosis-1");
        source.set_proposal(proposal("osmosis-1", 848, ProposalStatus::Voting), true);
        let (watcher, _store) = watcher(source);

        watcher.tick().await.unwrap();
        let events = watcher.tick().await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn status_transition_emits_changed_and_untracks_terminal() {
        let source = ScriptedSource::new("osmosis-1");
        source.set_proposal(proposal("osmosis-1", 848, ProposalStatus::Voting), true);
        let (watcher, store) = watcher(source.clone());
        watcher.tick().await.unwrap();

        // Proposal passes and drops off the active list; the tracked set
        // still drives a fetch.
        source.set_proposal(proposal("osmosis-1", 848, ProposalStatus::Passed), false);
        let events = watcher.tick().await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ChangeEvent::Changed { proposal, old_status: ProposalStatus::Voting }
                if proposal.status == ProposalStatus::Passed
        ));

        let cursor = store
            .get_cursor(&ChainId::new("osmosis-1"))
            .unwrap()
            .unwrap();
        assert!(cursor.tracked.is_empty());
        assert_eq!(cursor.highest_seen, 848);
    }

    #[tokio::test]
    async fn first_seen_terminal_emits_new_then_synthetic_changed() {
        let source = ScriptedSource::new("osmosis-1");
        source.set_proposal(proposal("osmosis-1", 700, ProposalStatus::Failed), true);
        let (watcher, _store) = watcher(source);

        let events = watcher.tick().await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ChangeEvent::New(_)));
        assert!(matches!(
            &events[1],
            ChangeEvent::Changed { old_status: ProposalStatus::Failed, .. }
        ));
    }

    #[tokio::test]
    async fn terminal_regression_is_ignored() {
        let source = ScriptedSource::new("osmosis-1");
        source.set_proposal(proposal("osmosis-1", 848, ProposalStatus::Passed), true);
        let (watcher, store) = watcher(source.clone());
        watcher.tick().await.unwrap();

        source.set_proposal(proposal("osmosis-1", 848, ProposalStatus::Voting), true);
        let events = watcher.tick().await.unwrap();
        assert!(events.is_empty());

        let stored = store
            .get_proposal(&ChainId::new("osmosis-1"), 848)
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ProposalStatus::Passed);
    }

    #[tokio::test]
    async fn listing_failure_leaves_the_cursor_unchanged() {
        let source = ScriptedSource::new("osmosis-1");
        source.set_proposal(proposal("osmosis-1", 848, ProposalStatus::Voting), true);
        let (watcher, store) = watcher(source.clone());
        watcher.tick().await.unwrap();
        let before = store
            .get_cursor(&ChainId::new("osmosis-1"))
            .unwrap()
            .unwrap();

        source.fail_listing(true);
        assert!(watcher.tick().await.is_err());
        let after = store
            .get_cursor(&ChainId::new("osmosis-1"))
            .unwrap()
            .unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_the_id_tracked_and_persists_the_rest() {
        let source = ScriptedSource::new("osmosis-1");
        source.set_proposal(proposal("osmosis-1", 846, ProposalStatus::Voting), true);
        source.set_proposal(proposal("osmosis-1", 848, ProposalStatus::Voting), true);
        let (watcher, store) = watcher(source.clone());
        watcher.tick().await.unwrap();

        // 846 passes but its fetch fails this tick; 848 keeps working.
        source.set_proposal(proposal("osmosis-1", 846, ProposalStatus::Passed), false);
        source.fail_fetch(846);
        let events = watcher.tick().await.unwrap();
        assert!(events.is_empty());

        let cursor = store
            .get_cursor(&ChainId::new("osmosis-1"))
            .unwrap()
            .unwrap();
        assert!(cursor.tracked.contains(&846), "failed fetch stays tracked");
        assert!(cursor.tracked.contains(&848));
        assert_eq!(cursor.highest_seen, 848);
    }

    #[tokio::test]
    async fn highest_seen_never_decreases() {
        let source = ScriptedSource::new("osmosis-1");
        source.set_proposal(proposal("osmosis-1", 900, ProposalStatus::Passed), true);
        let (watcher, store) = watcher(source.clone());
        watcher.tick().await.unwrap();

        // Terminal proposal leaves the listing; only a lower id remains.
        source.set_proposal(proposal("osmosis-1", 900, ProposalStatus::Passed), false);
        source.set_proposal(proposal("osmosis-1", 850, ProposalStatus::Voting), true);
        watcher.tick().await.unwrap();

        let cursor = store
            .get_cursor(&ChainId::new("osmosis-1"))
            .unwrap()
            .unwrap();
        assert_eq!(cursor.highest_seen, 900);
    }

    mod cursor_properties {
        use super::super::advance_cursor;
        use govwatch_types::ChainCursor;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn highest_seen_is_non_decreasing(
                start in 0u64..10_000,
                observations in proptest::collection::vec((0u64..10_000, any::<bool>()), 0..64),
            ) {
                let mut cursor = ChainCursor {
                    highest_seen: start,
                    tracked: Default::default(),
                };
                let mut previous = cursor.highest_seen;
                for (id, terminal) in observations {
                    advance_cursor(&mut cursor, id, terminal);
                    prop_assert!(cursor.highest_seen >= previous);
                    previous = cursor.highest_seen;
                }
            }

            #[test]
            fn tracked_reflects_the_last_observation_per_id(
                observations in proptest::collection::vec((0u64..64, any::<bool>()), 0..128),
            ) {
                let mut cursor = ChainCursor::default();
                let mut last = std::collections::HashMap::new();
                for (id, terminal) in observations {
                    advance_cursor(&mut cursor, id, terminal);
                    last.insert(id, terminal);
                }
                for (id, terminal) in last {
                    prop_assert_eq!(cursor.tracked.contains(&id), !terminal);
                }
            }
        }
    }

    #[tokio::test]
    async fn title_change_without_status_change_emits_changed() {
        let source = ScriptedSource::new("osmosis-1");
        source.set_proposal(proposal("osmosis-1", 848, ProposalStatus::Voting), true);
        let (watcher, _store) = watcher(source.clone());
        watcher.tick().await.unwrap();

        let mut retitled = proposal("osmosis-1", 848, ProposalStatus::Voting);
        retitled.title = "Increase taker fees (rev 2)".to_string();
        source.set_proposal(retitled, true);

        let events = watcher.tick().await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ChangeEvent::Changed { old_status: ProposalStatus::Voting, .. }
        ));
    }
}
