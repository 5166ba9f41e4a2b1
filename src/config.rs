// src/config.rs
use anyhow::{Context, Result};
use serde::Deserialize;

use crate::holidays::FederalState;
use crate::profile::ValidationProfile;

fn default_region() -> String {
    "NW".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Settings read from `WORKTIME_*` environment variables (and `.env`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_region")]
    pub default_region: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub mandatory_pause_under6: Option<u32>,
    #[serde(default)]
    pub requires_meal_flag: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_region: default_region(),
            log_level: default_log_level(),
            mandatory_pause_under6: None,
            requires_meal_flag: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        let config = envy::prefixed("WORKTIME_")
            .from_env::<AppConfig>()
            .context("Reading WORKTIME_* configuration failed")?;
        config.region()?;
        Ok(config)
    }

    pub fn region(&self) -> Result<FederalState> {
        self.default_region
            .parse::<FederalState>()
            .with_context(|| format!("WORKTIME_DEFAULT_REGION '{}' is invalid", self.default_region))
    }

    /// Profile for employees without their own settings.
    pub fn default_profile(&self) -> Result<ValidationProfile> {
        Ok(ValidationProfile {
            federal_state: self.region()?,
            min_pause_under6_minutes: self.mandatory_pause_under6,
            requires_meal_flag: self.requires_meal_flag,
        })
    }
}
