use serde::{Deserialize, Serialize};

use crate::error::LoveLinkError;
use crate::premium::entitlements::FREE_MOMENTS_LIMIT;
use crate::premium::trial::TRIAL_DAYS;
use crate::utils::{get_env_with_prefix, parse_env_with_prefix};

/// Longest accepted trial, in days.
const MAX_TRIAL_DAYS: u32 = 3650;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub premium: PremiumConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Entitlement policy knobs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PremiumConfig {
    /// Length of the free trial in days.
    #[serde(default = "default_trial_days")]
    pub trial_days: u32,
    /// Photo ceiling shared by a free couple.
    #[serde(default = "default_free_moments_limit")]
    pub free_moments_limit: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for PremiumConfig {
    fn default() -> Self {
        Self {
            trial_days: default_trial_days(),
            free_moments_limit: default_free_moments_limit(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_trial_days() -> u32 {
    TRIAL_DAYS
}

fn default_free_moments_limit() -> u32 {
    FREE_MOMENTS_LIMIT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_trial_days(mut self, days: u32) -> Self {
        self.config.premium.trial_days = days;
        self
    }

    pub fn with_free_moments_limit(mut self, limit: u32) -> Self {
        self.config.premium.free_moments_limit = limit;
        self
    }

    pub fn with_premium(mut self, premium: PremiumConfig) -> Self {
        self.config.premium = premium;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    /// Override settings from `LOVELINK_`-prefixed environment variables.
    ///
    /// Unparseable values are ignored. Range checks happen in `build()`.
    pub fn from_env(mut self) -> Self {
        if let Some(days) = parse_env_with_prefix("TRIAL_DAYS") {
            self.config.premium.trial_days = days;
        }
        if let Some(limit) = parse_env_with_prefix("FREE_MOMENTS_LIMIT") {
            self.config.premium.free_moments_limit = limit;
        }
        if let Some(level) = get_env_with_prefix("LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Some(json) = parse_env_with_prefix("LOG_JSON") {
            self.config.logging.json = json;
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration is invalid:
    /// - Trial length of zero days or more than ten years
    /// - Free moments limit of zero
    /// - Invalid log level
    pub fn build(self) -> crate::error::Result<Config> {
        if self.config.premium.trial_days == 0 {
            return Err(LoveLinkError::bad_request("Trial days must be greater than 0"));
        }

        if self.config.premium.trial_days > MAX_TRIAL_DAYS {
            return Err(LoveLinkError::bad_request(format!(
                "Trial days must be at most {}",
                MAX_TRIAL_DAYS
            )));
        }

        if self.config.premium.free_moments_limit == 0 {
            return Err(LoveLinkError::bad_request(
                "Free moments limit must be greater than 0",
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.config.logging.level.to_lowercase().as_str()) {
            return Err(LoveLinkError::bad_request(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
