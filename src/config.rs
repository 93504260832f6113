use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{ModelErr, Result};

const DEFAULT_CACHE_SIZE: usize = 10_000;

/// Settings of the score cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether `LinearModel::score` goes through the cache at all.
    pub enabled: bool,
    /// Amount of distinct feature sequences cached per epoch.
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: DEFAULT_CACHE_SIZE,
        }
    }
}

/// Construction parameters of a `LinearModel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// Amount of output classes, must be positive.
    pub nr_class: usize,
    /// Expected amount of feature templates per example, used to size
    /// the gather buffer. Longer feature lists are still accepted.
    #[serde(default)]
    pub nr_templates: usize,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl LearnerConfig {
    /// Creates a new `LearnerConfig` with the default cache settings.
    ///
    /// # Arguments
    /// * `nr_class` - The amount of output classes.
    /// * `nr_templates` - The expected amount of feature templates.
    pub fn new(nr_class: usize, nr_templates: usize) -> Self {
        Self {
            nr_class,
            nr_templates,
            cache: CacheConfig::default(),
        }
    }

    /// Replaces the cache settings.
    pub fn with_cache(mut self, enabled: bool, max_size: usize) -> Self {
        self.cache = CacheConfig { enabled, max_size };
        self
    }

    /// Parses a configuration from a JSON document and validates it.
    ///
    /// # Errors
    /// `ModelErr::InvalidConfig` if the document doesn't parse or describes an unusable model.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    ///
    /// # Errors
    /// `ModelErr::Io` if the file can't be read, otherwise as `from_json_str`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Checks the configuration describes a usable model.
    ///
    /// # Errors
    /// `ModelErr::InvalidConfig` if there are no classes or the cache is enabled without capacity.
    pub fn validate(&self) -> Result<()> {
        if self.nr_class == 0 {
            return Err(ModelErr::InvalidConfig("nr_class must be positive".into()));
        }

        if self.cache.enabled && self.cache.max_size == 0 {
            return Err(ModelErr::InvalidConfig(
                "the score cache is enabled but max_size is 0".into(),
            ));
        }

        Ok(())
    }
}
