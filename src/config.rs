use crate::models::Marketplace;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "publisher.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub browser: BrowserConfig,
    pub timing: TimingConfig,
    pub pricing: PricingConfig,
    pub photos: PhotoConfig,
    pub grailed: GrailedConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// DevTools endpoint of an already running, logged-in browser. When unset a
    /// browser is launched with `profile_dir`.
    pub debug_url: Option<String>,
    pub profile_dir: Option<PathBuf>,
    pub headless: bool,
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub resolver_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub settle_ms: u64,
    pub settle_jitter_ms: u64,
    pub step_retries: u32,
    pub login_wait_secs: u64,
    pub login_poll_secs: u64,
    pub upload_wait_secs: u64,
    pub submit_wait_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            resolver_timeout_ms: 4_000,
            poll_interval_ms: 250,
            settle_ms: 600,
            settle_jitter_ms: 400,
            step_retries: 1,
            login_wait_secs: 300,
            login_poll_secs: 5,
            upload_wait_secs: 60,
            submit_wait_secs: 30,
        }
    }
}

impl TimingConfig {
    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn login_wait(&self) -> Duration {
        Duration::from_secs(self.login_wait_secs)
    }

    pub fn login_poll(&self) -> Duration {
        Duration::from_secs(self.login_poll_secs.max(1))
    }

    pub fn upload_wait(&self) -> Duration {
        Duration::from_secs(self.upload_wait_secs)
    }

    pub fn submit_wait(&self) -> Duration {
        Duration::from_secs(self.submit_wait_secs)
    }

    /// Near-zero timings for scripted pages in tests.
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            resolver_timeout_ms: 20,
            poll_interval_ms: 5,
            settle_ms: 0,
            settle_jitter_ms: 0,
            step_retries: 1,
            login_wait_secs: 1,
            login_poll_secs: 1,
            upload_wait_secs: 1,
            submit_wait_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub exchange_rate_url: Option<String>,
    pub fallback_rate: f64,
    pub markup_percent: f64,
    pub floor_fraction: f64,
    pub cache_ttl_secs: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            exchange_rate_url: None,
            fallback_rate: 0.25,
            markup_percent: 30.0,
            floor_fraction: 0.8,
            cache_ttl_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhotoConfig {
    /// Parent of the per-advertisement scratch directories. Defaults to the
    /// system temp dir.
    pub scratch_root: Option<PathBuf>,
    pub vinted_max: usize,
    pub grailed_max: usize,
    pub download_retries: u32,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            scratch_root: None,
            vinted_max: 20,
            grailed_max: 16,
            download_retries: 1,
        }
    }
}

impl PhotoConfig {
    /// Configured ceiling, never above what the marketplace accepts.
    pub fn max_for(&self, marketplace: Marketplace) -> usize {
        let configured = match marketplace {
            Marketplace::Vinted => self.vinted_max,
            Marketplace::Grailed => self.grailed_max,
        };
        configured.min(marketplace.max_photos())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrailedConfig {
    pub country_of_origin: Option<String>,
    pub fill_floor_price: bool,
}

impl Default for GrailedConfig {
    fn default() -> Self {
        Self {
            country_of_origin: None,
            fill_floor_price: true,
        }
    }
}

impl AppConfig {
    /// Reads the YAML file (missing file means defaults), then applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("PUBLISHER_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = match std::fs::read_to_string(&path) {
            Ok(text) => Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    fn apply_env(&mut self) {
        if let Some(url) = env_nonempty("BROWSER_DEBUG_URL") {
            self.browser.debug_url = Some(url);
        }
        if let Some(url) = env_nonempty("EXCHANGE_RATE_URL") {
            self.pricing.exchange_rate_url = Some(url);
        }
        if let Some(root) = env_nonempty("PHOTO_SCRATCH_DIR") {
            self.photos.scratch_root = Some(PathBuf::from(root));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.pricing.fallback_rate.is_finite() && self.pricing.fallback_rate > 0.0) {
            return Err(ConfigError::Invalid {
                field: "pricing.fallback_rate",
                message: "must be a positive number".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.pricing.floor_fraction) {
            return Err(ConfigError::Invalid {
                field: "pricing.floor_fraction",
                message: "must be between 0 and 1".into(),
            });
        }
        if self.photos.vinted_max == 0 || self.photos.grailed_max == 0 {
            return Err(ConfigError::Invalid {
                field: "photos",
                message: "photo ceilings must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = AppConfig::from_yaml("").expect("defaults");
        assert_eq!(config.timing.resolver_timeout_ms, 4_000);
        assert_eq!(config.timing.login_wait_secs, 300);
        assert_eq!(config.pricing.fallback_rate, 0.25);
        assert_eq!(config.photos.grailed_max, 16);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = AppConfig::from_yaml(
            "timing:\n  settle_ms: 100\npricing:\n  markup_percent: 15\n",
        )
        .expect("yaml");
        assert_eq!(config.timing.settle_ms, 100);
        assert_eq!(config.timing.poll_interval_ms, 250);
        assert_eq!(config.pricing.markup_percent, 15.0);
        assert_eq!(config.pricing.floor_fraction, 0.8);
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::load(Some(&dir.path().join("absent.yaml"))).expect("load");
        assert_eq!(config.photos.vinted_max, 20);
    }

    #[test]
    fn invalid_floor_fraction_is_rejected() {
        let config = AppConfig::from_yaml("pricing:\n  floor_fraction: 1.5\n").expect("yaml");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "pricing.floor_fraction",
                ..
            })
        ));
    }
}
