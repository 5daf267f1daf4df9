//! Subscriber directory — the read-only view of the external subscription
//! manager.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use govwatch_types::{ChainId, Subscriber, Timestamp};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory read failed: {0}")]
    Read(String),

    #[error("invalid subscriber record: {0}")]
    Invalid(String),
}

/// `ListSubscribersFor(chainID, now)`: subscribers whose watched set
/// contains the chain and who are active at `now`. Stale results up to five
/// minutes are acceptable; the matcher provides that caching.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    async fn list_subscribers_for(
        &self,
        chain: &ChainId,
        now: Timestamp,
    ) -> Result<Vec<Subscriber>, DirectoryError>;
}

/// In-memory directory for tests and embedded use.
#[derive(Default)]
pub struct StaticDirectory {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl StaticDirectory {
    pub fn new(subscribers: Vec<Subscriber>) -> Self {
        Self {
            subscribers: Mutex::new(subscribers),
        }
    }

    pub fn replace(&self, subscribers: Vec<Subscriber>) {
        *self.subscribers.lock().unwrap_or_else(|p| p.into_inner()) = subscribers;
    }
}

#[async_trait]
impl SubscriberDirectory for StaticDirectory {
    async fn list_subscribers_for(
        &self,
        chain: &ChainId,
        now: Timestamp,
    ) -> Result<Vec<Subscriber>, DirectoryError> {
        let subscribers = self.subscribers.lock().unwrap_or_else(|p| p.into_inner());
        Ok(subscribers
            .iter()
            .filter(|s| s.watches(chain) && s.is_active_at(now))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SubscribersFile {
    #[serde(default)]
    subscribers: Vec<Subscriber>,
}

/// TOML-file-backed directory. Reads the file on every call; the matcher's
/// five-minute cache bounds how often that actually happens.
pub struct FileDirectory {
    path: PathBuf,
}

impl FileDirectory {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SubscriberDirectory for FileDirectory {
    async fn list_subscribers_for(
        &self,
        chain: &ChainId,
        now: Timestamp,
    ) -> Result<Vec<Subscriber>, DirectoryError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DirectoryError::Read(format!("{}: {e}", self.path.display())))?;
        let file: SubscribersFile =
            toml::from_str(&content).map_err(|e| DirectoryError::Read(e.to_string()))?;
        for subscriber in &file.subscribers {
            subscriber.validate().map_err(DirectoryError::Invalid)?;
        }
        Ok(file
            .subscribers
            .into_iter()
            .filter(|s| s.watches(chain) && s.is_active_at(now))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govwatch_types::{Policy, SubscriberId};
    use std::collections::BTreeSet;
    use std::io::Write;

    fn subscriber(id: &str, chain: &str, active: bool) -> Subscriber {
        Subscriber {
            subscriber_id: SubscriberId::new(id),
            address: format!("{id}@example.com"),
            chains: BTreeSet::from([ChainId::new(chain)]),
            policy: Policy::default(),
            active,
            active_until: Timestamp::new(2_000_000_000),
        }
    }

    #[tokio::test]
    async fn static_directory_filters_by_chain_and_activity() {
        let directory = StaticDirectory::new(vec![
            subscriber("sub-A", "osmosis-1", true),
            subscriber("sub-B", "cosmoshub-4", true),
            subscriber("sub-C", "osmosis-1", false),
        ]);

        let now = Timestamp::new(1_700_000_000);
        let matched = directory
            .list_subscribers_for(&ChainId::new("osmosis-1"), now)
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].subscriber_id.as_str(), "sub-A");
    }

    #[tokio::test]
    async fn file_directory_parses_and_filters() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
                [[subscribers]]
                subscriber_id = "sub-A"
                address = "govops@example.com"
                chains = ["osmosis-1"]
                active = true
                active_until = 2000000000

                [subscribers.policy]
                risk_tolerance = "LOW"
            "#
        )
        .unwrap();

        let directory = FileDirectory::new(file.path().to_path_buf());
        let now = Timestamp::new(1_700_000_000);
        let matched = directory
            .list_subscribers_for(&ChainId::new("osmosis-1"), now)
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(
            matched[0].policy.risk_tolerance,
            govwatch_types::RiskLevel::Low
        );

        let none = directory
            .list_subscribers_for(&ChainId::new("juno-1"), now)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn file_directory_rejects_invalid_records() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
                [[subscribers]]
                subscriber_id = "sub-A"
                address = "govops@example.com"
                chains = []
                active = true
                active_until = 2000000000

                [subscribers.policy]
                risk_tolerance = "LOW"
            "#
        )
        .unwrap();

        let directory = FileDirectory::new(file.path().to_path_buf());
        let err = directory
            .list_subscribers_for(&ChainId::new("osmosis-1"), Timestamp::new(0))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Invalid(_)));
    }
}
