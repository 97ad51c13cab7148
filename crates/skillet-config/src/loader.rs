use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::schema::SkilletConfig;

/// Loads the skillet configuration.
pub struct ConfigLoader {
    config: SkilletConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > SKILLET_CONFIG env > ~/.skillet/skillet.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("SKILLET_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".skillet")
            .join("skillet.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> skillet_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = Self::read(&config_path)?;
        let config = Self::apply_env_overrides(config, |key| std::env::var(key).ok());

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => return Err(skillet_core::SkilletError::Config(e)),
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn read(config_path: &Path) -> skillet_core::Result<SkilletConfig> {
        if !config_path.exists() {
            debug!(?config_path, "config file not found, using defaults");
            return Ok(SkilletConfig::default());
        }
        info!(?config_path, "loading configuration");
        let raw = std::fs::read_to_string(config_path)?;
        toml::from_str::<SkilletConfig>(&raw).map_err(|e| {
            skillet_core::SkilletError::Config(format!(
                "failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })
    }

    /// Get a snapshot of the current config.
    pub fn get(&self) -> SkilletConfig {
        self.config.clone()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (SKILLET_CACHE_DIR, SKILLET_CACHE_TTL_HOURS,
    /// SKILLET_LOG_LEVEL). `lookup` is injected so tests never touch the real
    /// process environment.
    pub fn apply_env_overrides(
        mut config: SkilletConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> SkilletConfig {
        if let Some(v) = lookup("SKILLET_CACHE_DIR").filter(|v| !v.is_empty()) {
            config.cache.dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("SKILLET_CACHE_TTL_HOURS") {
            match v.parse::<u64>() {
                Ok(hours) => config.cache.ttl_hours = hours,
                Err(_) => warn!(value = %v, "ignoring invalid SKILLET_CACHE_TTL_HOURS"),
            }
        }
        if let Some(v) = lookup("SKILLET_LOG_LEVEL") {
            config.logging.level = v;
        }
        config
    }
}
