//! TOML configuration for the `folio` binary.
//!
//! ```toml
//! [[ledgers]]
//! name = "payments"
//! entries_per_page = 4
//! hash_algorithm = "SHA-256"
//!
//! [warden]
//! interval_ms = 5000
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context};
use folio_crypto::StandardHashProvider;
use folio_ledger::LedgerConfig;
use folio_warden::WardenConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration, parsed from TOML.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    /// One table per ledger.
    pub ledgers: Vec<LedgerConfig>,
    /// Periodic audit settings.
    pub warden: WardenConfig,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            ledgers: vec![LedgerConfig::default()],
            warden: WardenConfig::default(),
        }
    }
}

impl FolioConfig {
    /// Read `path`, or fall back to defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read config {}", p.display()))?;
                Self::from_toml(&content)
                    .with_context(|| format!("invalid config {}", p.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.ledgers.is_empty() {
            bail!("at least one [[ledgers]] table is required");
        }
        let mut seen = BTreeSet::new();
        for ledger in &self.ledgers {
            if !seen.insert(ledger.name.as_str()) {
                bail!("ledger {} is configured twice", ledger.name);
            }
            ledger.validate(&StandardHashProvider)?;
        }
        self.warden.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = FolioConfig::load(None).unwrap();
        assert_eq!(config.ledgers, vec![LedgerConfig::default()]);
        assert_eq!(config.warden.interval_ms, 60_000);
    }

    #[test]
    fn parse_full_config() {
        let config = FolioConfig::from_toml(
            r#"
            [[ledgers]]
            name = "payments"
            entries_per_page = 4
            hash_algorithm = "SHA-256"

            [[ledgers]]
            name = "contracts"

            [warden]
            interval_ms = 250
            ledgers = ["payments"]
            "#,
        )
        .unwrap();
        assert_eq!(config.ledgers.len(), 2);
        assert_eq!(config.ledgers[0], LedgerConfig::new("payments", 4, "SHA-256"));
        assert_eq!(config.ledgers[1].entries_per_page, 8);
        assert_eq!(config.ledgers[1].hash_algorithm, "BLAKE3");
        assert_eq!(config.warden.interval_ms, 250);
        assert_eq!(config.warden.ledgers, Some(vec!["payments".to_string()]));
    }

    #[test]
    fn warden_section_is_optional() {
        let config = FolioConfig::from_toml(
            r#"
            [[ledgers]]
            name = "payments"
            "#,
        )
        .unwrap();
        assert_eq!(config.warden, WardenConfig::default());
    }

    #[test]
    fn rejects_invalid_configs() {
        let duplicate = r#"
            [[ledgers]]
            name = "a"
            [[ledgers]]
            name = "a"
        "#;
        let bad_algorithm = r#"
            [[ledgers]]
            name = "a"
            hash_algorithm = "MD5"
        "#;
        let zero_capacity = r#"
            [[ledgers]]
            name = "a"
            entries_per_page = 0
        "#;
        let zero_interval = r#"
            [warden]
            interval_ms = 0
        "#;
        for toml in ["ledgers = []", duplicate, bad_algorithm, zero_capacity, zero_interval] {
            assert!(FolioConfig::from_toml(toml).is_err(), "accepted: {toml}");
        }
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[[ledgers]]\nname = \"audit\"\nentries_per_page = 2").unwrap();

        let config = FolioConfig::load(Some(&path)).unwrap();
        assert_eq!(config.ledgers[0].name, "audit");
        assert_eq!(config.ledgers[0].entries_per_page, 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FolioConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
