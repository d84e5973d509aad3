use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use andio_domain::DomainError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock length of one tick.
    pub tick_interval_ms: u64,
    pub correct_flash_ms: u64,
    pub wrong_flash_ms: u64,
    /// Capacity of the ring buffer behind `QueueLedDriver`.
    pub led_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 150,
            correct_flash_ms: 300,
            wrong_flash_ms: 2000,
            led_queue_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).context("parse engine config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let text = std::fs::read_to_string(path_ref)
            .with_context(|| format!("read engine config {:?}", path_ref))?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.tick_interval_ms == 0 {
            return Err(DomainError::configuration("tick interval must be positive"));
        }
        if self.led_queue_capacity == 0 {
            return Err(DomainError::configuration(
                "led queue capacity must be positive",
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn correct_flash(&self) -> Duration {
        Duration::from_millis(self.correct_flash_ms)
    }

    pub fn wrong_flash(&self) -> Duration {
        Duration::from_millis(self.wrong_flash_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str("tick_interval_ms: 100\n").unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.correct_flash(), Duration::from_millis(300));
        assert_eq!(config.wrong_flash(), Duration::from_secs(2));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        assert!(EngineConfig::from_yaml_str("tick_interval_ms: 0\n").is_err());
        let config = EngineConfig {
            led_queue_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration(_))
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(EngineConfig::from_yaml_path("missing-config.yaml").is_err());
    }
}
