//! The GovWatch node — wires the proposal watcher, analysis cache, hybrid
//! analyzer, subscriber fan-out, and delivery gate into one supervised
//! pipeline.
//!
//! Dataflow: scheduler → watcher → change events → analysis cache → hybrid
//! analyzer → subscriber matcher → advice fan-out → delivery gate → notifier.

pub mod admin;
pub mod cache;
pub mod config;
pub mod delivery;
pub mod directory;
pub mod error;
pub mod fanout;
pub mod matcher;
pub mod metrics;
pub mod node;
pub mod notifier;
pub mod scheduler;
pub mod shutdown;
pub mod watcher;

pub use admin::{admin_router, serve_admin, AdminHandle};
pub use cache::{AnalysisCache, CacheError};
pub use config::NodeConfig;
pub use delivery::{DeliveryGate, DeliveryOutcome};
pub use directory::{FileDirectory, StaticDirectory, SubscriberDirectory};
pub use error::NodeError;
pub use matcher::SubscriberMatcher;
pub use metrics::{GovMetrics, Stats};
pub use node::{GovNode, PipelineStores};
pub use notifier::{Accepted, Notifier, NotifyError, WebhookNotifier};
pub use scheduler::{ChainEntry, Scheduler, SchedulerConfig};
pub use shutdown::ShutdownController;
pub use watcher::{ChangeEvent, Watcher};
