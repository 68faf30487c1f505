use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use stride_core::progress::Goal;
use stride_core::storage::DEFAULT_QUOTA_BYTES;

pub struct Config {
    pub db_path: PathBuf,
    pub settings: Settings,
}

/// Optional overrides read from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub start_weight_kg: f64,
    pub goal_weight_kg: f64,
    pub height_m: f64,
    pub storage_quota_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let goal = Goal::default();
        Self {
            start_weight_kg: goal.start_kg,
            goal_weight_kg: goal.goal_kg,
            height_m: goal.height_m,
            storage_quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("start_weight_kg", self.start_weight_kg),
            ("goal_weight_kg", self.goal_weight_kg),
            ("height_m", self.height_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                anyhow::bail!("{name} must be a positive number");
            }
        }
        if self.storage_quota_bytes == 0 {
            anyhow::bail!("storage_quota_bytes must be greater than 0");
        }
        Ok(())
    }

    pub fn goal(&self) -> Goal {
        Goal {
            start_kg: self.start_weight_kg,
            goal_kg: self.goal_weight_kg,
            height_m: self.height_m,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "stride").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = std::env::var_os("STRIDE_DB")
            .map_or_else(|| data_dir.join("stride.db"), PathBuf::from);
        let settings = Settings::from_file(&proj_dirs.config_dir().join("config.toml"))?;

        Ok(Config { db_path, settings })
    }
}
