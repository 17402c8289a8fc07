use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use folio_types::{Digest, EntryId, TemporalAnchor};

use crate::config::LedgerConfig;
use crate::entry::Entry;
use crate::error::LedgerError;
use crate::page::Page;
use crate::traits::{LedgerReader, LedgerWriter};

/// In-memory repository for tests, local demos, and embedding.
///
/// Pages are stored as headers plus entry-id lists; each entry is stored
/// once, so an entry update is visible through every page that lists it.
#[derive(Default)]
pub struct InMemoryRepository {
    inner: RwLock<RepositoryState>,
}

#[derive(Default)]
struct RepositoryState {
    ledgers: BTreeMap<String, LedgerRecord>,
    entries: HashMap<EntryId, Entry>,
}

struct LedgerRecord {
    config: LedgerConfig,
    pages: Vec<StoredPage>,
}

struct StoredPage {
    ledger_name: String,
    number: u64,
    timestamp: TemporalAnchor,
    previous_hash: Option<Digest>,
    merkle_root: Digest,
    hash: Digest,
    entry_ids: Vec<EntryId>,
}

impl StoredPage {
    fn from_page(page: &Page) -> Self {
        Self {
            ledger_name: page.ledger_name.clone(),
            number: page.number,
            timestamp: page.timestamp,
            previous_hash: page.previous_hash.clone(),
            merkle_root: page.merkle_root.clone(),
            hash: page.hash.clone(),
            entry_ids: page.entries.iter().map(|e| e.id).collect(),
        }
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, RepositoryState>, LedgerError> {
        self.inner.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, RepositoryState>, LedgerError> {
        self.inner.write().map_err(|_| LedgerError::LockPoisoned)
    }

    fn assemble(state: &RepositoryState, stored: &StoredPage) -> Result<Page, LedgerError> {
        let entries = stored
            .entry_ids
            .iter()
            .map(|id| {
                state.entries.get(id).cloned().ok_or_else(|| {
                    LedgerError::Repository(format!(
                        "page {} references missing entry {id}",
                        stored.number
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            ledger_name: stored.ledger_name.clone(),
            number: stored.number,
            timestamp: stored.timestamp,
            previous_hash: stored.previous_hash.clone(),
            merkle_root: stored.merkle_root.clone(),
            hash: stored.hash.clone(),
            entries,
        })
    }
}

impl LedgerReader for InMemoryRepository {
    fn read_ledger(&self, name: &str) -> Result<Option<LedgerConfig>, LedgerError> {
        let state = self.read_state()?;
        Ok(state.ledgers.get(name).map(|record| record.config.clone()))
    }

    fn ledger_names(&self) -> Result<Vec<String>, LedgerError> {
        let state = self.read_state()?;
        Ok(state.ledgers.keys().cloned().collect())
    }

    fn read_page(&self, ledger: &str, number: u64) -> Result<Option<Page>, LedgerError> {
        let state = self.read_state()?;
        let record = state
            .ledgers
            .get(ledger)
            .ok_or_else(|| LedgerError::LedgerNotFound(ledger.to_string()))?;
        let Some(stored) = usize::try_from(number)
            .ok()
            .and_then(|index| record.pages.get(index))
        else {
            return Ok(None);
        };
        Self::assemble(&state, stored).map(Some)
    }

    fn page_count(&self, ledger: &str) -> Result<u64, LedgerError> {
        let state = self.read_state()?;
        state
            .ledgers
            .get(ledger)
            .map(|record| record.pages.len() as u64)
            .ok_or_else(|| LedgerError::LedgerNotFound(ledger.to_string()))
    }

    fn read_entry(&self, id: &EntryId) -> Result<Option<Entry>, LedgerError> {
        let state = self.read_state()?;
        Ok(state.entries.get(id).cloned())
    }
}

impl LedgerWriter for InMemoryRepository {
    fn create_ledger(&self, config: &LedgerConfig) -> Result<(), LedgerError> {
        let mut state = self.write_state()?;
        if state.ledgers.contains_key(&config.name) {
            return Err(LedgerError::LedgerExists(config.name.clone()));
        }
        state.ledgers.insert(
            config.name.clone(),
            LedgerRecord {
                config: config.clone(),
                pages: Vec::new(),
            },
        );
        Ok(())
    }

    fn create_page(&self, page: &Page) -> Result<(), LedgerError> {
        let mut state = self.write_state()?;
        let record = state
            .ledgers
            .get_mut(&page.ledger_name)
            .ok_or_else(|| LedgerError::LedgerNotFound(page.ledger_name.clone()))?;
        let expected = record.pages.len() as u64;
        if page.number != expected {
            return Err(LedgerError::Repository(format!(
                "ledger {} expects page {expected}, got {}",
                page.ledger_name, page.number
            )));
        }
        record.pages.push(StoredPage::from_page(page));
        for entry in &page.entries {
            state.entries.insert(entry.id, entry.clone());
        }
        Ok(())
    }

    fn create_entry(&self, entry: &Entry) -> Result<(), LedgerError> {
        let mut state = self.write_state()?;
        if !state.ledgers.contains_key(&entry.ledger_name) {
            return Err(LedgerError::LedgerNotFound(entry.ledger_name.clone()));
        }
        if state.entries.contains_key(&entry.id) {
            return Err(LedgerError::Repository(format!(
                "entry {} already exists",
                entry.id
            )));
        }
        state.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    fn update_entry(&self, entry: &Entry) -> Result<(), LedgerError> {
        let mut state = self.write_state()?;
        let stored = state
            .entries
            .get_mut(&entry.id)
            .ok_or(LedgerError::EntryNotFound(entry.id))?;
        *stored = entry.clone();
        Ok(())
    }

    fn update_page_for_tamper_evidence_testing(&self, page: &Page) -> Result<(), LedgerError> {
        let mut state = self.write_state()?;
        let record = state
            .ledgers
            .get_mut(&page.ledger_name)
            .ok_or_else(|| LedgerError::LedgerNotFound(page.ledger_name.clone()))?;
        let slot = usize::try_from(page.number)
            .ok()
            .and_then(|index| record.pages.get_mut(index))
            .ok_or_else(|| LedgerError::Repository(format!("no stored page {}", page.number)))?;
        *slot = StoredPage::from_page(page);
        for entry in &page.entries {
            state.entries.insert(entry.id, entry.clone());
        }
        Ok(())
    }
}
