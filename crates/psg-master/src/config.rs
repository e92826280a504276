//! Player configuration, read from TOML.

use psg_engine::NTSC_CLOCK;
use psg_formats::Validation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Playback settings shared by realtime and offline rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Length of one tick in microseconds. The only tempo control.
    #[serde(default = "PlayerConfig::default_tick_period_us")]
    pub tick_period_us: u64,
    /// Output sample rate for offline renders.
    #[serde(default = "PlayerConfig::default_sample_rate")]
    pub sample_rate: u32,
    /// Master clock of the emulated chip.
    #[serde(default = "PlayerConfig::default_psg_clock_hz")]
    pub psg_clock_hz: u32,
    /// Check stream invariants when loading.
    #[serde(default = "PlayerConfig::default_validate")]
    pub validate: bool,
}

impl PlayerConfig {
    fn default_tick_period_us() -> u64 {
        16_667
    }

    fn default_sample_rate() -> u32 {
        44_100
    }

    fn default_psg_clock_hz() -> u32 {
        NTSC_CLOCK
    }

    fn default_validate() -> bool {
        true
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(self.tick_period_us)
    }

    pub fn validation(&self) -> Validation {
        if self.validate {
            Validation::Strict
        } else {
            Validation::Trusted
        }
    }

    /// Output frames per tick at `sample_rate`, possibly fractional.
    pub fn frames_per_tick(&self) -> f64 {
        self.sample_rate as f64 * self.tick_period_us as f64 / 1_000_000.0
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text)?;
        cfg.check()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load `path`, falling back to defaults if it is missing or unusable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(path = %path.display(), "{err}. Using defaults.");
                Self::default()
            }
        }
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.tick_period_us == 0 {
            return Err(ConfigError::Invalid("tick_period_us must be positive"));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive"));
        }
        if self.psg_clock_hz == 0 {
            return Err(ConfigError::Invalid("psg_clock_hz must be positive"));
        }
        Ok(())
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick_period_us: Self::default_tick_period_us(),
            sample_rate: Self::default_sample_rate(),
            psg_clock_hz: Self::default_psg_clock_hz(),
            validate: Self::default_validate(),
        }
    }
}
