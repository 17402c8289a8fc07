use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WardenError;

/// Periodic audit settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Time between audit rounds in milliseconds.
    pub interval_ms: u64,
    /// Ledgers to audit each round; `None` audits every ledger in the repository.
    pub ledgers: Option<Vec<String>>,
}

impl WardenConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), WardenError> {
        if self.interval_ms == 0 {
            return Err(WardenError::InvalidConfig(
                "interval_ms must be at least 1".into(),
            ));
        }
        if let Some(ledgers) = &self.ledgers {
            if ledgers.iter().any(|name| name.trim().is_empty()) {
                return Err(WardenError::InvalidConfig(
                    "ledger selection contains an empty name".into(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            interval_ms: 60_000,
            ledgers: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_audits_everything_every_minute() {
        let config = WardenConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(60));
        assert!(config.ledgers.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = WardenConfig {
            interval_ms: 0,
            ledgers: None,
        };
        assert!(matches!(
            config.validate(),
            Err(WardenError::InvalidConfig(_))
        ));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: WardenConfig = serde_json::from_str(r#"{"ledgers":["audit"]}"#).unwrap();
        assert_eq!(config.interval_ms, 60_000);
        assert_eq!(config.ledgers, Some(vec!["audit".to_string()]));
    }
}
