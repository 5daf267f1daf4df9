//! Subscriber matcher with a per-chain read cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use govwatch_types::{ChainId, Subscriber, Timestamp};

use crate::directory::{DirectoryError, SubscriberDirectory};

/// How long a directory read may be served from cache.
const CACHE_TTL_SECS: u64 = 300;

struct CachedListing {
    fetched_at: Timestamp,
    subscribers: Vec<Subscriber>,
}

/// Resolves the active subscribers for a chain, caching directory reads for
/// up to five minutes per chain. Activity is re-checked against `now` on
/// every call, so a subscriber expiring mid-window stops matching even
/// while the listing itself is cached.
pub struct SubscriberMatcher {
    directory: Arc<dyn SubscriberDirectory>,
    cache: Mutex<HashMap<ChainId, CachedListing>>,
}

impl SubscriberMatcher {
    pub fn new(directory: Arc<dyn SubscriberDirectory>) -> Self {
        Self {
            directory,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn subscribers_for(
        &self,
        chain: &ChainId,
        now: Timestamp,
    ) -> Result<Vec<Subscriber>, DirectoryError> {
        {
            let cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(cached) = cache.get(chain) {
                if !cached.fetched_at.has_expired(CACHE_TTL_SECS, now) {
                    return Ok(filter(&cached.subscribers, chain, now));
                }
            }
        }

        let subscribers = self.directory.list_subscribers_for(chain, now).await?;
        let result = filter(&subscribers, chain, now);
        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        cache.insert(
            chain.clone(),
            CachedListing {
                fetched_at: now,
                subscribers,
            },
        );
        Ok(result)
    }
}

fn filter(subscribers: &[Subscriber], chain: &ChainId, now: Timestamp) -> Vec<Subscriber> {
    subscribers
        .iter()
        .filter(|s| s.watches(chain) && s.is_active_at(now))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use govwatch_types::{Policy, SubscriberId};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingDirectory {
        calls: AtomicU32,
        subscribers: Vec<Subscriber>,
    }

    #[async_trait]
    impl SubscriberDirectory for CountingDirectory {
        async fn list_subscribers_for(
            &self,
            _chain: &ChainId,
            _now: Timestamp,
        ) -> Result<Vec<Subscriber>, DirectoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.subscribers.clone())
        }
    }

    fn subscriber(id: &str, until: u64) -> Subscriber {
        Subscriber {
            subscriber_id: SubscriberId::new(id),
            address: format!("{id}@example.com"),
            chains: BTreeSet::from([ChainId::new("osmosis-1")]),
            policy: Policy::default(),
            active: true,
            active_until: Timestamp::new(until),
        }
    }

    #[tokio::test]
    async fn reads_are_cached_within_the_window() {
        let directory = Arc::new(CountingDirectory {
            calls: AtomicU32::new(0),
            subscribers: vec![subscriber("sub-A", 2_000_000_000)],
        });
        let matcher = SubscriberMatcher::new(directory.clone());
        let chain = ChainId::new("osmosis-1");

        let now = Timestamp::new(1_000);
        matcher.subscribers_for(&chain, now).await.unwrap();
        matcher.subscribers_for(&chain, now.plus(200)).await.unwrap();
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);

        // Past the five-minute window the directory is consulted again.
        matcher.subscribers_for(&chain, now.plus(301)).await.unwrap();
        assert_eq!(directory.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expiry_is_rechecked_against_cached_listings() {
        let directory = Arc::new(CountingDirectory {
            calls: AtomicU32::new(0),
            subscribers: vec![subscriber("sub-A", 1_100)],
        });
        let matcher = SubscriberMatcher::new(directory);
        let chain = ChainId::new("osmosis-1");

        let matched = matcher
            .subscribers_for(&chain, Timestamp::new(1_000))
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);

        // Still inside the cache window, but the subscription has lapsed.
        let matched = matcher
            .subscribers_for(&chain, Timestamp::new(1_150))
            .await
            .unwrap();
        assert!(matched.is_empty());
    }
}
