//! The GovWatch node — opens the stores and wires all pipeline stages
//! together.

use std::path::Path;
use std::sync::Arc;

use govwatch_analyzer::{AnalysisProvider, ChatCompletionsProvider, HybridAnalyzer};
use govwatch_chain::ChainClient;
use govwatch_store::{
    AnalysisStore, CursorStore, DeliveryMarkStore, MemoryStore, ProposalStore,
};
use govwatch_store_lmdb::LmdbEnvironment;

use crate::admin::AdminHandle;
use crate::cache::AnalysisCache;
use crate::config::NodeConfig;
use crate::delivery::DeliveryGate;
use crate::directory::SubscriberDirectory;
use crate::matcher::SubscriberMatcher;
use crate::metrics::GovMetrics;
use crate::notifier::Notifier;
use crate::scheduler::{ChainEntry, Scheduler, SchedulerConfig};
use crate::shutdown::ShutdownController;
use crate::NodeError;

/// The four durable stores the pipeline depends on.
pub struct PipelineStores {
    pub cursors: Arc<dyn CursorStore>,
    pub proposals: Arc<dyn ProposalStore>,
    pub analyses: Arc<dyn AnalysisStore>,
    pub marks: Arc<dyn DeliveryMarkStore>,
}

impl PipelineStores {
    /// Open all stores inside one LMDB environment.
    pub fn open_lmdb(path: &Path) -> Result<Self, NodeError> {
        let env = LmdbEnvironment::open(path)
            .map_err(|e| NodeError::Config(format!("failed to open LMDB at {}: {e}", path.display())))?;
        Ok(Self {
            cursors: Arc::new(env.cursor_store()),
            proposals: Arc::new(env.proposal_store()),
            analyses: Arc::new(env.analysis_store()),
            marks: Arc::new(env.delivery_mark_store()),
        })
    }

    /// Volatile stores; used by tests and dry runs.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            cursors: store.clone(),
            proposals: store.clone(),
            analyses: store.clone(),
            marks: store,
        }
    }
}

/// A running GovWatch node.
pub struct GovNode {
    pub config: NodeConfig,
    pub metrics: Arc<GovMetrics>,
    pub shutdown: Arc<ShutdownController>,
    admin: AdminHandle,
    scheduler: Scheduler,
}

impl GovNode {
    /// Create a node with LMDB stores, real chain clients, and providers
    /// built from the configuration. Call [`start`](Self::start) to begin
    /// watching.
    pub fn new(
        config: NodeConfig,
        directory: Arc<dyn SubscriberDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let stores = PipelineStores::open_lmdb(&config.data_dir)?;

        let mut providers: Vec<Arc<dyn AnalysisProvider>> = Vec::new();
        for provider_config in &config.providers {
            let provider = ChatCompletionsProvider::new(provider_config.clone())
                .map_err(|e| NodeError::Config(e.to_string()))?;
            providers.push(Arc::new(provider));
        }

        Self::with_stores(config, stores, directory, notifier, providers)
    }

    /// Create a node over caller-supplied stores and providers.
    pub fn with_stores(
        config: NodeConfig,
        stores: PipelineStores,
        directory: Arc<dyn SubscriberDirectory>,
        notifier: Arc<dyn Notifier>,
        providers: Vec<Arc<dyn AnalysisProvider>>,
    ) -> Result<Self, NodeError> {
        config.validate()?;

        let metrics = Arc::new(GovMetrics::new());
        let shutdown = Arc::new(ShutdownController::new());
        let cache = Arc::new(AnalysisCache::new(stores.analyses, Arc::clone(&metrics)));
        let analyzer = Arc::new(HybridAnalyzer::new(providers));
        let matcher = Arc::new(SubscriberMatcher::new(directory));
        let gate = Arc::new(DeliveryGate::new(
            stores.marks,
            notifier,
            Arc::clone(&metrics),
        ));

        let mut chains = Vec::new();
        for descriptor in &config.chains {
            let client = ChainClient::new(descriptor.clone())
                .map_err(|e| NodeError::Config(e.to_string()))?;
            chains.push(ChainEntry {
                descriptor: descriptor.clone(),
                source: Arc::new(client),
            });
        }

        let scheduler = Scheduler::new(
            SchedulerConfig::from(&config),
            chains,
            stores.cursors,
            stores.proposals,
            cache,
            analyzer,
            matcher,
            Arc::clone(&gate),
            Arc::clone(&metrics),
            Arc::clone(&shutdown),
        );
        let admin = AdminHandle::new(gate, Arc::clone(&metrics), scheduler.force_tick_senders());

        tracing::info!(
            chains = config.chains.len(),
            providers = config.providers.len(),
            "node constructed"
        );

        Ok(Self {
            config,
            metrics,
            shutdown,
            admin,
            scheduler,
        })
    }

    /// Spawn all background tasks.
    pub fn start(&mut self) {
        self.scheduler.start();
    }

    /// Graceful shutdown: drain the queues within their grace periods.
    pub async fn stop(&mut self) {
        self.scheduler.stop().await;
    }

    pub fn admin(&self) -> AdminHandle {
        self.admin.clone()
    }
}
