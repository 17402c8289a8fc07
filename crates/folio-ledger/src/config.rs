use folio_crypto::HashProvider;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Immutable per-ledger settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub name: String,
    pub entries_per_page: usize,
    pub hash_algorithm: String,
}

impl LedgerConfig {
    pub fn new(
        name: impl Into<String>,
        entries_per_page: usize,
        hash_algorithm: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            entries_per_page,
            hash_algorithm: hash_algorithm.into(),
        }
    }

    /// Reject configs that could not produce well-formed pages.
    pub fn validate(&self, hasher: &dyn HashProvider) -> Result<(), LedgerError> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::InvalidConfig("ledger name is empty".into()));
        }
        // The name is a raw field of the page hash preimage.
        if self.name.contains('|') {
            return Err(LedgerError::InvalidConfig(format!(
                "ledger name {:?} contains '|'",
                self.name
            )));
        }
        if self.entries_per_page == 0 {
            return Err(LedgerError::InvalidConfig(
                "entries_per_page must be at least 1".into(),
            ));
        }
        if !hasher.supports(&self.hash_algorithm) {
            return Err(LedgerError::InvalidConfig(format!(
                "unsupported hash algorithm {}",
                self.hash_algorithm
            )));
        }
        Ok(())
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            name: "main".into(),
            entries_per_page: 8,
            hash_algorithm: "BLAKE3".into(),
        }
    }
}
