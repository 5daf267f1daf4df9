//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use govwatch_analyzer::ProviderConfig;
use govwatch_types::ChainDescriptor;

use crate::NodeError;

/// Configuration for a GovWatch node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Misconfiguration is fatal at
/// startup; nothing here is reloadable at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for the LMDB stores.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Nominal watcher interval per chain, jittered ±10% at runtime.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Analysis work queue capacity.
    #[serde(default = "default_analysis_queue_capacity")]
    pub analysis_queue_capacity: usize,

    /// Delivery work queue capacity.
    #[serde(default = "default_delivery_queue_capacity")]
    pub delivery_queue_capacity: usize,

    /// Concurrent LLM call cap.
    #[serde(default = "default_max_concurrent_llm")]
    pub max_concurrent_llm: usize,

    /// Concurrent notifier send cap.
    #[serde(default = "default_max_concurrent_sends")]
    pub max_concurrent_sends: usize,

    /// Admin/metrics HTTP port; 0 disables the admin server.
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,

    /// TOML file the subscriber directory reads.
    #[serde(default = "default_subscribers_file")]
    pub subscribers_file: PathBuf,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Opt-in to running with zero providers (every analysis becomes the
    /// deterministic fallback).
    #[serde(default)]
    pub allow_no_providers: bool,

    /// Monitored chains.
    #[serde(default)]
    pub chains: Vec<ChainDescriptor>,

    /// LLM providers, tried in order.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Webhook notifier settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// URL notifications are POSTed to.
    #[serde(default)]
    pub webhook_url: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./govwatch_data")
}

fn default_poll_interval_secs() -> u64 {
    3600
}

fn default_analysis_queue_capacity() -> usize {
    256
}

fn default_delivery_queue_capacity() -> usize {
    1024
}

fn default_max_concurrent_llm() -> usize {
    3
}

fn default_max_concurrent_sends() -> usize {
    8
}

fn default_admin_port() -> u16 {
    7087
}

fn default_subscribers_file() -> PathBuf {
    PathBuf::from("./subscribers.toml")
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    /// Startup validation; any failure here is fatal.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.chains.is_empty() {
            return Err(NodeError::Config(
                "at least one chain must be configured".to_string(),
            ));
        }
        for chain in &self.chains {
            chain.validate().map_err(NodeError::Config)?;
        }
        if self.providers.is_empty() && !self.allow_no_providers {
            return Err(NodeError::Config(
                "no providers configured; set allow_no_providers = true to run \
                 in fallback-only mode"
                    .to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(NodeError::Config(
                "poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.analysis_queue_capacity == 0 || self.delivery_queue_capacity == 0 {
            return Err(NodeError::Config(
                "queue capacities must be positive".to_string(),
            ));
        }
        if self.max_concurrent_llm == 0 || self.max_concurrent_sends == 0 {
            return Err(NodeError::Config(
                "concurrency caps must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            poll_interval_secs: default_poll_interval_secs(),
            analysis_queue_capacity: default_analysis_queue_capacity(),
            delivery_queue_capacity: default_delivery_queue_capacity(),
            max_concurrent_llm: default_max_concurrent_llm(),
            max_concurrent_sends: default_max_concurrent_sends(),
            admin_port: default_admin_port(),
            subscribers_file: default_subscribers_file(),
            log_level: default_log_level(),
            chains: Vec::new(),
            providers: Vec::new(),
            allow_no_providers: false,
            notifier: NotifierConfig::default(),
        }
    }
}
