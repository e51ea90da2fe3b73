//! Application configuration.

use std::path::Path;
use std::time::Duration;

use qdp_core::ContractInfo;
use qdp_gateway::SimConfig;
use qdp_trader::TraderConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub trader: TraderConfig,
    /// Static contract table used to enrich gateway records.
    #[serde(default)]
    pub contracts: Vec<ContractInfo>,
    /// Settings for the `sim` gateway.
    #[serde(default)]
    pub sim: SimConfig,
    /// Seconds between account/position/order/trade polls. 0 disables.
    #[serde(default = "default_query_interval_secs")]
    pub query_interval_secs: u64,
    /// Seconds to wait for login to complete.
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

fn default_query_interval_secs() -> u64 {
    60
}

fn default_ready_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.trader.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn query_interval(&self) -> Option<Duration> {
        (self.query_interval_secs > 0).then(|| Duration::from_secs(self.query_interval_secs))
    }

    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        query_interval_secs = 0

        [trader]
        front = "tcp://sim:30005"
        broker = "9999"
        user = "AB1234567"
        pass = "secret"

        [[contracts]]
        code = "IF2403"
        exchange = "CFFEX"
        vol_scale = 300

        [sim]
        session_id = 3

        [[sim.instruments]]
        code = "IF2403"
        exchange = "CFFEX"
        num = 11
    "#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.trader.gateway, "sim");
        assert_eq!(config.contracts[0].vol_scale, 300);
        assert_eq!(config.contracts[0].currency, "CNY");
        assert_eq!(config.sim.session_id, 3);
        assert_eq!(config.sim.instruments[0].volume_multiple, 1);
        assert_eq!(config.query_interval(), None);
        assert_eq!(config.ready_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_trader_section_rejected() {
        let err = AppConfig::from_toml(&SAMPLE.replace(r#"broker = "9999""#, r#"broker = """#))
            .unwrap_err();
        assert!(matches!(err, AppError::Trader(_)));
    }

    #[test]
    fn test_shipped_default_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/default.toml");
        let config = AppConfig::from_file(path).unwrap();
        assert_eq!(config.contracts.len(), 2);
        assert_eq!(config.sim.instruments.len(), 2);
        assert_eq!(config.query_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            AppConfig::from_file("/nonexistent/qdp.toml"),
            Err(AppError::Config(_))
        ));
    }
}
