//! Farm configuration stored in `farmer.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::backoff::RetryPolicy;
use crate::io::transport::HttpConnector;
use crate::pacing::Pacing;

/// Process-wide tunables (TOML).
///
/// Every field is optional in the file; missing ones fall back to the values
/// the tool has always used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FarmConfig {
    /// Default per-profile delay between iterations.
    pub base_delay_secs: f64,

    /// Floor for every jittered wait and every per-profile delay.
    pub min_delay_secs: f64,

    /// Symmetric jitter amplitude.
    pub jitter_secs: f64,

    /// Retries beyond the first attempt.
    pub max_retries: u32,

    pub backoff_cap_secs: f64,
    pub status_backoff_base_secs: f64,
    pub transport_backoff_base_secs: f64,

    /// Dashboard redraw and command drain interval.
    pub refresh_interval_ms: u64,

    /// Poll interval while a profile is paused.
    pub pause_poll_ms: u64,

    pub http_timeout_secs: u64,
    pub user_agent: String,

    pub service: ServiceConfig,
    pub bridge: BridgeConfig,
}

/// Remote service endpoints and reward constants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    pub api_base: String,
    pub stories_base: String,
    pub reward_id: String,
    /// Currency credited per accepted reward redemption.
    pub currency_per_reward: u64,
    pub story_slug: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.duolingo.com/2017-06-30".to_string(),
            stories_base: "https://stories.duolingo.com/api2".to_string(),
            reward_id: "SKILL_COMPLETION_BALANCED-dd2495f4_d44e_3fc3_8ac8_94e2191506f0-2-GEMS"
                .to_string(),
            currency_per_reward: 30,
            story_slug: "the-passport".to_string(),
        }
    }
}

/// HTTP control bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 0.8,
            min_delay_secs: 0.4,
            jitter_secs: 0.1,
            max_retries: 4,
            backoff_cap_secs: 7.5,
            status_backoff_base_secs: 0.7,
            transport_backoff_base_secs: 0.5,
            refresh_interval_ms: 300,
            pause_poll_ms: 200,
            http_timeout_secs: 30,
            user_agent: "AutoFarmRust".to_string(),
            service: ServiceConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

impl FarmConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("base_delay_secs", self.base_delay_secs),
            ("min_delay_secs", self.min_delay_secs),
            ("backoff_cap_secs", self.backoff_cap_secs),
            ("status_backoff_base_secs", self.status_backoff_base_secs),
            ("transport_backoff_base_secs", self.transport_backoff_base_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(anyhow!("{name} must be > 0"));
            }
        }
        if !self.jitter_secs.is_finite() || self.jitter_secs < 0.0 {
            return Err(anyhow!("jitter_secs must be >= 0"));
        }
        if self.status_backoff_base_secs > self.backoff_cap_secs
            || self.transport_backoff_base_secs > self.backoff_cap_secs
        {
            return Err(anyhow!("backoff bases must not exceed backoff_cap_secs"));
        }
        if self.refresh_interval_ms == 0 {
            return Err(anyhow!("refresh_interval_ms must be > 0"));
        }
        if self.pause_poll_ms == 0 {
            return Err(anyhow!("pause_poll_ms must be > 0"));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("http_timeout_secs must be > 0"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(anyhow!("user_agent must be non-empty"));
        }
        if self.service.api_base.trim().is_empty() || self.service.stories_base.trim().is_empty() {
            return Err(anyhow!("service endpoints must be non-empty"));
        }
        if self.service.currency_per_reward == 0 {
            return Err(anyhow!("service.currency_per_reward must be > 0"));
        }
        if self.bridge.port == 0 {
            return Err(anyhow!("bridge.port must be > 0"));
        }
        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        millis(self.base_delay_secs)
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            min_delay: millis(self.min_delay_secs),
            jitter: millis(self.jitter_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            status_base: millis(self.status_backoff_base_secs),
            transport_base: millis(self.transport_backoff_base_secs),
            cap: millis(self.backoff_cap_secs),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    pub fn connector(&self) -> HttpConnector {
        HttpConnector {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.http_timeout_secs),
        }
    }
}

// Whole milliseconds, so `0.7` reads back as exactly 700ms.
fn millis(secs: f64) -> Duration {
    Duration::from_millis((secs * 1000.0).round() as u64)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `FarmConfig::default()`.
pub fn load_config(path: &Path) -> Result<FarmConfig> {
    if !path.exists() {
        let cfg = FarmConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: FarmConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, FarmConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("farmer.toml");
        fs::write(
            &path,
            "base_delay_secs = 1.5\n\n[bridge]\nenabled = true\nport = 9000\n",
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");

        assert_eq!(cfg.base_delay_secs, 1.5);
        assert!(cfg.bridge.enabled);
        assert_eq!(cfg.bridge.port, 9000);
        assert_eq!(cfg.bridge.bind, "127.0.0.1");
        assert_eq!(cfg.max_retries, 4);
        assert_eq!(cfg.service, ServiceConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("farmer.toml");
        fs::write(&path, "min_delay_secs = 0\n").expect("write");

        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("min_delay_secs must be > 0"));
    }

    #[test]
    fn unparseable_file_names_the_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("farmer.toml");
        fs::write(&path, "base_delay_secs = \"soon\"\n").expect("write");

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn derived_settings_follow_fields() {
        let cfg = FarmConfig::default();
        let policy = cfg.retry_policy();
        assert_eq!(policy, RetryPolicy::default());
        assert_eq!(cfg.pacing(), Pacing::default());
        assert_eq!(cfg.base_delay(), Duration::from_millis(800));
        assert_eq!(cfg.pause_poll(), Duration::from_millis(200));
    }
}
