//! Application configuration
//!
//! Carries everything that is tunable rather than constant:
//! scoring thresholds, the badge tier table and the rank thresholds.
//! Stored as JSON under the platform config directory; first load writes
//! the defaults back so users have a file to edit.

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::progress::badges::{BadgeTier, DEFAULT_BADGE_TIERS, DEFAULT_RANK_TIERS, RankTier};
use crate::progress::scoring::ScoringConfig;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion thresholds and session weights
    pub scoring: ScoringConfig,

    /// Badge milestones, ascending by threshold
    pub badge_tiers: Vec<BadgeTier>,

    /// Rank thresholds, ascending
    pub rank_tiers: Vec<RankTier>,

    /// Seed new aggregates with a zero entry per catalog topic
    pub seed_topics_on_init: bool,

    /// Echo topic completions into the legacy row file
    pub mirror_legacy: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            badge_tiers: DEFAULT_BADGE_TIERS.clone(),
            rank_tiers: DEFAULT_RANK_TIERS.clone(),
            seed_topics_on_init: false,
            mirror_legacy: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, or create default if not exists
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse config.json")
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs =
            ProjectDirs::from("", "", "ulpan").context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.json"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let proj_dirs =
            ProjectDirs::from("", "", "ulpan").context("Failed to determine data directory")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Directory holding one progress document per user
    pub fn progress_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("progress"))
    }

    /// Path to the topic/level/task catalog
    pub fn catalog_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("catalog.json"))
    }

    /// Path to the legacy mirror row file
    pub fn legacy_mirror_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("legacy_topics.json"))
    }
}
