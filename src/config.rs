//! Engine configuration surface (§6).
//!
//! Loaded the way the corpus loads its own TOML configuration (see the
//! teacher's assertion-config parser): `from_toml_str`/`from_file` return a
//! typed error immediately rather than silently coercing bad values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub max_rules: usize,
    pub eval_timeout_ms: u64,
    pub trace_window_secs: u64,
    pub trace_max_spans: usize,
    pub ingest_queue: usize,
    pub ingest_block_ms: u64,
    pub error_budget: u32,
    pub signing_secret: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rules: 1000,
            eval_timeout_ms: 100,
            trace_window_secs: 30,
            trace_max_spans: 10_000,
            ingest_queue: 10_000,
            ingest_block_ms: 10,
            error_budget: 100,
            signing_secret: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.as_ref().display()))?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.max_rules > 0, "max_rules must be positive");
        anyhow::ensure!(self.eval_timeout_ms > 0, "eval_timeout_ms must be positive");
        anyhow::ensure!(self.trace_max_spans > 0, "trace_max_spans must be positive");
        anyhow::ensure!(self.ingest_queue > 0, "ingest_queue must be positive");
        Ok(())
    }

    pub fn trace_window(&self) -> Duration {
        Duration::from_secs(self.trace_window_secs)
    }

    pub fn eval_timeout(&self) -> Duration {
        Duration::from_millis(self.eval_timeout_ms)
    }

    pub fn ingest_block(&self) -> Duration {
        Duration::from_millis(self.ingest_block_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_rules, 1000);
        assert_eq!(cfg.eval_timeout_ms, 100);
        assert_eq!(cfg.trace_window_secs, 30);
        assert_eq!(cfg.ingest_block_ms, 10);
    }

    #[test]
    fn parses_partial_toml_over_defaults() {
        let cfg = EngineConfig::from_toml_str("max_rules = 50\n").unwrap();
        assert_eq!(cfg.max_rules, 50);
        assert_eq!(cfg.eval_timeout_ms, 100);
    }

    #[test]
    fn rejects_zero_max_rules() {
        let result = EngineConfig::from_toml_str("max_rules = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_malformed_toml() {
        let result = EngineConfig::from_toml_str("max_rules = [this is not valid");
        assert!(result.is_err());
    }
}
