use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;

use controller::MpcConfig;
use prelude::*;

pub static CONFIG_FILE: &str = "controller.toml";

/// Command used when a solve does not succeed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fallback {
    /// Repeat the last emitted command, or brake with the wheels straight if there is none.
    HoldPrevious,
    /// Straighten the wheels and apply `throttle`.
    Brake { throttle: float },
}

impl Default for Fallback {
    fn default() -> Fallback {
        Fallback::HoldPrevious
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read the configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse the configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub mpc: MpcConfig,
    pub fallback: Fallback,
}

impl ControllerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ControllerConfig, ConfigError> {
        let s = read_to_string(path)?;
        ControllerConfig::from_toml(&s)
    }

    /// Parses and validates a configuration. Missing values take their defaults.
    pub fn from_toml(s: &str) -> Result<ControllerConfig, ConfigError> {
        let config: ControllerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mpc.validate().map_err(ConfigError::Invalid)?;
        if let Fallback::Brake { throttle } = self.fallback {
            let b = &self.mpc.bounds;
            if !(throttle >= b.acceleration_min && throttle <= b.acceleration_max) {
                return Err(ConfigError::Invalid(format!(
                    "fallback throttle {} is outside [{}, {}]",
                    throttle, b.acceleration_min, b.acceleration_max
                )));
            }
        }
        Ok(())
    }
}
