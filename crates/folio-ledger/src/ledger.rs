use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use folio_crypto::MerkleProof;
use folio_types::{Digest, EntryId, HybridLogicalClock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::entry::{Entry, EntryFields, EntrySignature};
use crate::error::LedgerError;
use crate::identity::SystemIdentity;
use crate::page::Page;
use crate::providers::CryptoProviders;
use crate::receipt::Receipt;
use crate::traits::LedgerRepository;

/// Lifecycle position of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Pending,
    Verified,
    Sealed { page: u64 },
}

/// Point-in-time view of a ledger's counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub name: String,
    pub entries_per_page: usize,
    pub hash_algorithm: String,
    pub page_count: u64,
    pub pending: usize,
    pub verified: usize,
    pub last_page_hash: Option<Digest>,
}

#[derive(Default)]
struct LedgerState {
    pages: Vec<Page>,
    holding_area: BTreeMap<EntryId, Entry>,
    verified_entries: BTreeMap<EntryId, Entry>,
}

impl LedgerState {
    /// The live copy of `id`, wherever it sits.
    fn entry_mut(&mut self, id: &EntryId) -> Option<&mut Entry> {
        if self.holding_area.contains_key(id) {
            return self.holding_area.get_mut(id);
        }
        if self.verified_entries.contains_key(id) {
            return self.verified_entries.get_mut(id);
        }
        self.pages.iter_mut().find_map(|page| page.entry_mut(id))
    }

    fn sealed(&self, id: &EntryId) -> Option<(&Page, &Entry)> {
        self.pages
            .iter()
            .find_map(|page| page.entry(id).map(|entry| (page, entry)))
    }

    /// Like [`Self::sealed`], distinguishing unsealed entries from unknown ones.
    fn require_sealed(&self, id: EntryId) -> Result<(&Page, &Entry), LedgerError> {
        if let Some(found) = self.sealed(&id) {
            return Ok(found);
        }
        if self.holding_area.contains_key(&id) || self.verified_entries.contains_key(&id) {
            return Err(LedgerError::EntryNotInPage(id));
        }
        Err(LedgerError::EntryNotFound(id))
    }
}

/// The ledger aggregate.
///
/// Every entry is in exactly one of the holding area (pending signatures),
/// the verified pool, or a sealed page. All mutations run under one write
/// lock, so "accept signature, move pools, seal if full" is atomic with
/// respect to other callers. When a repository is attached, each mutation
/// is written through before the in-memory state changes.
pub struct Ledger {
    config: LedgerConfig,
    providers: CryptoProviders,
    identity: Arc<SystemIdentity>,
    clock: HybridLogicalClock,
    repository: Option<Arc<dyn LedgerRepository>>,
    inner: RwLock<LedgerState>,
}

impl Ledger {
    pub fn new(
        config: LedgerConfig,
        providers: CryptoProviders,
        identity: Arc<SystemIdentity>,
    ) -> Result<Self, LedgerError> {
        config.validate(providers.hasher())?;
        info!(
            ledger = %config.name,
            entries_per_page = config.entries_per_page,
            algorithm = %config.hash_algorithm,
            "ledger created"
        );
        Ok(Self {
            config,
            providers,
            identity,
            clock: HybridLogicalClock::default(),
            repository: None,
            inner: RwLock::new(LedgerState::default()),
        })
    }

    /// Stamp timestamps with `node_id` instead of node 0.
    pub fn with_node_id(mut self, node_id: u16) -> Self {
        self.clock = HybridLogicalClock::new(node_id);
        self
    }

    /// Register this ledger in `repository` and write through to it from now on.
    pub fn attach_repository(
        mut self,
        repository: Arc<dyn LedgerRepository>,
    ) -> Result<Self, LedgerError> {
        repository.create_ledger(&self.config)?;
        self.repository = Some(repository);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn providers(&self) -> &CryptoProviders {
        &self.providers
    }

    pub fn identity(&self) -> &SystemIdentity {
        &self.identity
    }

    // -- Entry lifecycle --

    /// Create a pending entry in the holding area.
    pub fn create_entry(
        &self,
        content: impl Into<String>,
        senders: Vec<String>,
        recipients: Vec<String>,
        related_entries: &[EntryId],
        keywords: &[String],
    ) -> Result<Entry, LedgerError> {
        let entry = Entry::build(
            EntryFields {
                id: EntryId::new(),
                timestamp: self.clock.now(),
                content: content.into(),
                senders,
                recipients,
                ledger_name: self.config.name.clone(),
            },
            self.providers.hasher(),
            &self.config.hash_algorithm,
        )?
        .with_related_entries(related_entries)
        .with_keywords(keywords);

        let mut state = self.write()?;
        self.persist(|repo| repo.create_entry(&entry))?;
        state.holding_area.insert(entry.id, entry.clone());

        debug!(
            ledger = %self.config.name,
            entry = %entry.id,
            senders = entry.senders.len(),
            hash = %entry.hash.short_hex(),
            "entry created"
        );
        Ok(entry)
    }

    /// Accept one sender's signature.
    ///
    /// A second signature from a signer already present leaves the entry
    /// unchanged. Once every sender has signed the entry moves to the
    /// verified pool, and a page is sealed whenever that pool reaches
    /// capacity. Returns the entry as it stands afterwards, sealed if it was
    /// part of a page sealed by this call.
    ///
    /// Sealing runs after the signature is committed. If it fails the
    /// signature still stands, the call succeeds with the unsealed entry, and
    /// the seal is retried by the next signature that completes an entry.
    pub fn add_signature(
        &self,
        entry_id: EntryId,
        signature: EntrySignature,
    ) -> Result<Entry, LedgerError> {
        let signer = self.providers.signer();
        let mut state = self.write()?;

        let entry = state
            .holding_area
            .get(&entry_id)
            .or_else(|| state.verified_entries.get(&entry_id))
            .cloned()
            .ok_or(LedgerError::EntryNotFound(entry_id))?;

        if entry.is_erased() {
            return Err(LedgerError::EntryDeleted(entry_id));
        }
        if !entry.is_sender(&signature.signer_id) {
            warn!(entry = %entry_id, signer = %signature.signer_id, "signature from non-sender rejected");
            return Err(LedgerError::NotASender {
                entry: entry_id,
                signer: signature.signer_id,
            });
        }
        if entry.signature_for(&signature.signer_id).is_some() {
            debug!(entry = %entry_id, signer = %signature.signer_id, "duplicate signature ignored");
            return Ok(entry);
        }
        if !signature.is_valid_for(&entry.hash, signer) {
            warn!(entry = %entry_id, signer = %signature.signer_id, "invalid signature rejected");
            return Err(LedgerError::SignatureInvalid {
                entry: entry_id,
                signer: signature.signer_id,
            });
        }

        let signer_id = signature.signer_id.clone();
        let updated = entry.with_signature(signature);
        self.persist(|repo| repo.update_entry(&updated))?;

        state.holding_area.remove(&entry_id);
        let verified = updated.verify(signer);
        if verified {
            state.verified_entries.insert(entry_id, updated.clone());
        } else {
            state.holding_area.insert(entry_id, updated.clone());
        }
        debug!(
            entry = %entry_id,
            signer = %signer_id,
            signatures = updated.signatures.len(),
            verified,
            "signature accepted"
        );

        let mut latest = updated;
        while state.verified_entries.len() >= self.config.entries_per_page {
            match self.seal_page(&mut state) {
                Ok(page) => {
                    if let Some(sealed) = page.entry(&entry_id) {
                        latest = sealed.clone();
                    }
                }
                Err(e) => {
                    warn!(
                        ledger = %self.config.name,
                        verified = state.verified_entries.len(),
                        error = %e,
                        "page seal deferred"
                    );
                    break;
                }
            }
        }
        Ok(latest)
    }

    /// Seal the oldest `entries_per_page` verified entries into the next page.
    fn seal_page(&self, state: &mut LedgerState) -> Result<Page, LedgerError> {
        let capacity = self.config.entries_per_page;
        let available = state.verified_entries.len();
        if available < capacity {
            return Err(LedgerError::InsufficientEntries {
                required: capacity,
                available,
            });
        }

        let mut oldest: Vec<&Entry> = state.verified_entries.values().collect();
        oldest.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        let batch: Vec<Entry> = oldest.into_iter().take(capacity).cloned().collect();

        let number = state.pages.len() as u64;
        let previous_hash = state.pages.last().map(|page| page.hash.clone());
        let page = Page::build(
            &self.config,
            number,
            self.clock.now(),
            previous_hash,
            batch,
            self.providers.hasher(),
        )?;
        self.persist(|repo| repo.create_page(&page))?;

        for entry in &page.entries {
            state.verified_entries.remove(&entry.id);
        }
        state.pages.push(page.clone());

        info!(
            ledger = %self.config.name,
            page = number,
            entries = page.entries.len(),
            merkle_root = %page.merkle_root.short_hex(),
            hash = %page.hash.short_hex(),
            "page sealed"
        );
        Ok(page)
    }

    /// Erase an entry's content, keeping its hash. Works in any lifecycle state.
    pub fn delete_entry(&self, entry_id: EntryId) -> Result<Entry, LedgerError> {
        let alg = &self.config.hash_algorithm;
        self.replace_entry(entry_id, |entry| {
            entry.erase_content(self.providers.hasher(), alg)
        })
        .inspect(|_| info!(ledger = %self.config.name, entry = %entry_id, "entry content erased"))
    }

    /// Put back erased content after checking it against the erasure markers.
    pub fn restore_entry(&self, entry_id: EntryId, original: &str) -> Result<Entry, LedgerError> {
        let alg = &self.config.hash_algorithm;
        let result = self.replace_entry(entry_id, |entry| {
            entry.restore_content(original, self.providers.hasher(), alg)
        });
        match &result {
            Ok(_) => info!(ledger = %self.config.name, entry = %entry_id, "entry content restored"),
            Err(LedgerError::RestoreMismatch { reason, .. }) => {
                warn!(ledger = %self.config.name, entry = %entry_id, %reason, "restore rejected")
            }
            Err(_) => {}
        }
        result
    }

    /// Append cross references to another set of entries.
    pub fn add_related_entries(
        &self,
        entry_id: EntryId,
        related: &[EntryId],
    ) -> Result<Entry, LedgerError> {
        self.replace_entry(entry_id, |entry| Ok(entry.with_related_entries(related)))
    }

    pub fn add_keywords(&self, entry_id: EntryId, keywords: &[String]) -> Result<Entry, LedgerError> {
        self.replace_entry(entry_id, |entry| Ok(entry.with_keywords(keywords)))
    }

    /// Record an entry whose sole sender is the system identity, signed on
    /// the spot.
    pub fn append_system_entry(
        &self,
        content: impl Into<String>,
        recipients: Vec<String>,
    ) -> Result<Entry, LedgerError> {
        let entry = self.create_entry(
            content,
            vec![self.identity.id().to_string()],
            recipients,
            &[],
            &[],
        )?;
        let signature = self.identity.sign(&entry.hash, self.providers.signer())?;
        self.add_signature(entry.id, signature)
    }

    /// Swap the live copy of an entry for `change(entry)`, in whichever pool
    /// or page holds it. The entry's lifecycle state is unchanged.
    fn replace_entry(
        &self,
        entry_id: EntryId,
        change: impl FnOnce(&Entry) -> Result<Entry, LedgerError>,
    ) -> Result<Entry, LedgerError> {
        let mut state = self.write()?;
        let current = state
            .entry_mut(&entry_id)
            .ok_or(LedgerError::EntryNotFound(entry_id))?;
        let next = change(current)?;
        self.persist(|repo| repo.update_entry(&next))?;
        *current = next.clone();
        Ok(next)
    }

    // -- Queries --

    /// Holding area first, then the verified pool, then sealed pages.
    pub fn get_entry_by_id(&self, entry_id: EntryId) -> Result<Option<Entry>, LedgerError> {
        let state = self.read()?;
        Ok(state
            .holding_area
            .get(&entry_id)
            .or_else(|| state.verified_entries.get(&entry_id))
            .or_else(|| state.sealed(&entry_id).map(|(_, entry)| entry))
            .cloned())
    }

    pub fn entry_state(&self, entry_id: EntryId) -> Result<Option<EntryState>, LedgerError> {
        let state = self.read()?;
        if state.holding_area.contains_key(&entry_id) {
            return Ok(Some(EntryState::Pending));
        }
        if state.verified_entries.contains_key(&entry_id) {
            return Ok(Some(EntryState::Verified));
        }
        Ok(state
            .sealed(&entry_id)
            .map(|(page, _)| EntryState::Sealed { page: page.number }))
    }

    /// Merkle inclusion proof for a sealed entry.
    pub fn get_inclusion_proof(&self, entry_id: EntryId) -> Result<MerkleProof, LedgerError> {
        let state = self.read()?;
        let (page, entry) = state.require_sealed(entry_id)?;
        page.inclusion_proof(entry, self.providers.hasher(), &self.config.hash_algorithm)
    }

    /// Issue a system-signed receipt proving a sealed entry's inclusion.
    pub fn issue_receipt(
        &self,
        entry_id: EntryId,
        requester_id: &str,
    ) -> Result<Receipt, LedgerError> {
        let state = self.read()?;
        let (page, entry) = state.require_sealed(entry_id)?;
        let receipt = Receipt::issue(
            entry,
            page,
            requester_id,
            self.clock.now(),
            &self.identity,
            &self.providers,
            &self.config.hash_algorithm,
        )?;
        debug!(entry = %entry_id, requester = requester_id, page = page.number, "receipt issued");
        Ok(receipt)
    }

    /// Accept a receipt only if this ledger's system identity signed it and
    /// the page it names holds the entry under the stated merkle root.
    pub fn verify_receipt(&self, receipt: &Receipt) -> bool {
        if !receipt.is_signed_by(&self.identity)
            || !receipt.verify(&self.providers, &self.config.hash_algorithm)
        {
            return false;
        }
        let Ok(state) = self.read() else {
            return false;
        };
        usize::try_from(receipt.page_number)
            .ok()
            .and_then(|index| state.pages.get(index))
            .is_some_and(|page| {
                page.merkle_root == receipt.merkle_root
                    && page
                        .entry(&receipt.entry.id)
                        .is_some_and(|entry| entry.hash == receipt.entry.hash)
            })
    }

    pub fn pages(&self) -> Result<Vec<Page>, LedgerError> {
        Ok(self.read()?.pages.clone())
    }

    pub fn page(&self, number: u64) -> Result<Option<Page>, LedgerError> {
        let state = self.read()?;
        Ok(usize::try_from(number)
            .ok()
            .and_then(|index| state.pages.get(index))
            .cloned())
    }

    /// Pending entries, oldest first.
    pub fn pending_entries(&self) -> Result<Vec<Entry>, LedgerError> {
        let state = self.read()?;
        Ok(by_timestamp(state.holding_area.values()))
    }

    /// Verified, not yet sealed entries, oldest first.
    pub fn verified_entries(&self) -> Result<Vec<Entry>, LedgerError> {
        let state = self.read()?;
        Ok(by_timestamp(state.verified_entries.values()))
    }

    pub fn summary(&self) -> Result<LedgerSummary, LedgerError> {
        let state = self.read()?;
        Ok(LedgerSummary {
            name: self.config.name.clone(),
            entries_per_page: self.config.entries_per_page,
            hash_algorithm: self.config.hash_algorithm.clone(),
            page_count: state.pages.len() as u64,
            pending: state.holding_area.len(),
            verified: state.verified_entries.len(),
            last_page_hash: state.pages.last().map(|page| page.hash.clone()),
        })
    }

    // -- Internals --

    fn persist(
        &self,
        write: impl FnOnce(&dyn LedgerRepository) -> Result<(), LedgerError>,
    ) -> Result<(), LedgerError> {
        match &self.repository {
            Some(repository) => write(repository.as_ref()),
            None => Ok(()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.inner.read().map_err(|_| LedgerError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.inner.write().map_err(|_| LedgerError::LockPoisoned)
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .field("identity", &self.identity.id())
            .field("persistent", &self.repository.is_some())
            .finish()
    }
}

fn by_timestamp<'a>(entries: impl Iterator<Item = &'a Entry>) -> Vec<Entry> {
    let mut sorted: Vec<Entry> = entries.cloned().collect();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    sorted
}
