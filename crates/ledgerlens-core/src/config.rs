//! Quota, entitlement and model-call configuration
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, or the override in the data dir
//!    (~/.local/share/ledgerlens/config/quotas.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! `LEDGERLENS_MODEL_TIMEOUT_SECS` overrides the model timeout from either layer.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{Feature, SubscriptionTier};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/quotas.toml");

/// Environment variable overriding the model call timeout
pub const MODEL_TIMEOUT_ENV: &str = "LEDGERLENS_MODEL_TIMEOUT_SECS";

/// Daily limits per tier and feature
///
/// A feature absent from a tier's table is not available on that tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaLimits {
    tiers: HashMap<SubscriptionTier, HashMap<Feature, u32>>,
}

impl QuotaLimits {
    pub fn new() -> Self {
        Self {
            tiers: HashMap::new(),
        }
    }

    /// Builder-style limit assignment, mostly for tests and embedders
    pub fn with_limit(mut self, tier: SubscriptionTier, feature: Feature, limit: u32) -> Self {
        self.set_limit(tier, feature, limit);
        self
    }

    pub fn set_limit(&mut self, tier: SubscriptionTier, feature: Feature, limit: u32) {
        self.tiers.entry(tier).or_default().insert(feature, limit);
    }

    /// Daily limit, or `None` when the tier is not entitled to the feature
    pub fn limit_for(&self, tier: SubscriptionTier, feature: Feature) -> Option<u32> {
        self.tiers.get(&tier)?.get(&feature).copied()
    }

    pub fn is_entitled(&self, tier: SubscriptionTier, feature: Feature) -> bool {
        self.limit_for(tier, feature).is_some()
    }
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self::new()
            .with_limit(SubscriptionTier::Free, Feature::Search, 20)
            .with_limit(SubscriptionTier::Pro, Feature::Search, 1000)
    }
}

/// Model call time budget and retry pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSettings {
    pub timeout: Duration,
    pub retry_backoff: Duration,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Everything loaded from `quotas.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerlensConfig {
    pub quotas: QuotaLimits,
    pub model: ModelSettings,
}

impl LedgerlensConfig {
    /// Load from the data-dir override or the embedded default
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from an explicit path when given, otherwise as [`LedgerlensConfig::load`]
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(path) => read_config(path)?,
            None => match default_config_path() {
                Some(default_path) if default_path.exists() => read_config(&default_path)?,
                _ => DEFAULT_CONFIG.to_string(),
            },
        };

        let mut config = parse_config(&content)?;
        apply_env_overrides(&mut config);
        Ok(config)
    }

    /// The embedded defaults, ignoring override files and environment
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("ledgerlens").join("config").join("quotas.toml"))
}

fn read_config(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "Loading quota config");
    fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))
}

fn apply_env_overrides(config: &mut LedgerlensConfig) {
    if let Ok(raw) = std::env::var(MODEL_TIMEOUT_ENV) {
        match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => config.model.timeout = Duration::from_secs(secs),
            _ => warn!(value = %raw, "Ignoring invalid {}", MODEL_TIMEOUT_ENV),
        }
    }
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    tiers: Option<HashMap<String, HashMap<String, u32>>>,
    model: Option<RawModel>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    timeout_secs: Option<u64>,
    retry_backoff_ms: Option<u64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<LedgerlensConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid quota config TOML: {}", e)))?;

    let mut config = LedgerlensConfig {
        quotas: QuotaLimits::new(),
        model: ModelSettings::default(),
    };

    for (tier_name, features) in raw.tiers.unwrap_or_default() {
        let tier: SubscriptionTier = tier_name.parse().map_err(Error::Config)?;
        for (feature_name, limit) in features {
            match feature_name.parse::<Feature>() {
                Ok(feature) => config.quotas.set_limit(tier, feature, limit),
                Err(_) => warn!(tier = %tier, feature = %feature_name, "Skipping unknown feature"),
            }
        }
    }

    if let Some(model) = raw.model {
        if let Some(secs) = model.timeout_secs.filter(|s| *s > 0) {
            config.model.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = model.retry_backoff_ms {
            config.model.retry_backoff = Duration::from_millis(ms);
        }
    }

    Ok(config)
}
