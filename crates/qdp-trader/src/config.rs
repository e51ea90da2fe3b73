//! Session configuration.

use std::path::PathBuf;
use std::time::Duration;

use qdp_cache::RetentionPolicy;
use qdp_gateway::ResumeMode;
use serde::{Deserialize, Serialize};

use crate::error::{TraderError, TraderResult};

/// Query dispatcher timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Minimum gap between two query dispatch starts (ms). Default: 1,000.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// A dispatched query with no terminal record after this long is
    /// abandoned (ms). Default: 30,000.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    /// Upper bound on waiting for the dispatcher task at shutdown (ms).
    /// Default: 5,000.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_min_interval_ms() -> u64 {
    1_000
}

fn default_query_timeout_ms() -> u64 {
    30_000
}

fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            query_timeout_ms: default_query_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl DispatcherConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Tag cache settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub retention: RetentionPolicy,
}

/// Trading session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderConfig {
    /// Front address, e.g. `tcp://180.168.146.187:30005`.
    pub front: String,
    pub broker: String,
    pub user: String,
    #[serde(default)]
    pub pass: String,
    /// Authentication is performed only when both are non-empty.
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub auth_code: String,
    #[serde(default = "default_product_info")]
    pub product_info: String,
    /// Root for gateway flow files and tag caches.
    #[serde(default = "default_flow_dir")]
    pub flow_dir: PathBuf,
    /// Subscribe streams from the current point instead of resuming.
    #[serde(default)]
    pub quick_start: bool,
    /// Log in with the configured credentials on every connect.
    #[serde(default = "default_auto_login")]
    pub auto_login: bool,
    /// Gateway plugin name.
    #[serde(default = "default_gateway")]
    pub gateway: String,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_product_info() -> String {
    "qdp-trader".to_string()
}

fn default_flow_dir() -> PathBuf {
    PathBuf::from("QDPTDFlow")
}

fn default_auto_login() -> bool {
    true
}

fn default_gateway() -> String {
    "sim".to_string()
}

impl TraderConfig {
    /// Minimal config with defaults for everything optional.
    pub fn new(front: impl Into<String>, broker: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            broker: broker.into(),
            user: user.into(),
            pass: String::new(),
            app_id: String::new(),
            auth_code: String::new(),
            product_info: default_product_info(),
            flow_dir: default_flow_dir(),
            quick_start: false,
            auto_login: default_auto_login(),
            gateway: default_gateway(),
            dispatcher: DispatcherConfig::default(),
            cache: CacheConfig::default(),
        }
    }

    pub fn validate(&self) -> TraderResult<()> {
        for (name, value) in [("front", &self.front), ("broker", &self.broker), ("user", &self.user)] {
            if value.trim().is_empty() {
                return Err(TraderError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        if self.dispatcher.query_timeout_ms == 0 {
            return Err(TraderError::InvalidConfig(
                "dispatcher.query_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn requires_authentication(&self) -> bool {
        !self.app_id.is_empty() && !self.auth_code.is_empty()
    }

    #[must_use]
    pub fn resume_mode(&self) -> ResumeMode {
        if self.quick_start {
            ResumeMode::Quick
        } else {
            ResumeMode::Resume
        }
    }

    /// `{flow_dir}/flows/{broker}/{user}/`
    #[must_use]
    pub fn flow_path(&self) -> PathBuf {
        self.flow_dir.join("flows").join(&self.broker).join(&self.user)
    }

    /// `{flow_dir}/local/{broker}/{user}_eid.jsonl`
    #[must_use]
    pub fn eid_cache_path(&self) -> PathBuf {
        self.local_dir().join(format!("{}_eid.jsonl", self.user))
    }

    /// `{flow_dir}/local/{broker}/{user}_oid.jsonl`
    #[must_use]
    pub fn oid_cache_path(&self) -> PathBuf {
        self.local_dir().join(format!("{}_oid.jsonl", self.user))
    }

    fn local_dir(&self) -> PathBuf {
        self.flow_dir.join("local").join(&self.broker)
    }
}
