use folio_crypto::{CryptoError, HashProvider, MerkleProof, MerkleTree};
use folio_types::{Digest, EntryId, TemporalAnchor};
use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;
use crate::entry::Entry;
use crate::error::LedgerError;

/// Build the Merkle tree over entry hashes in the given order.
pub fn compute_merkle_tree(
    entry_hashes: Vec<Digest>,
    hasher: &dyn HashProvider,
    algorithm: &str,
) -> Result<MerkleTree, LedgerError> {
    MerkleTree::build(entry_hashes, hasher, algorithm).map_err(|e| match e {
        CryptoError::EmptyTree => LedgerError::EmptyPage,
        other => LedgerError::Crypto(other),
    })
}

/// A sealed, hash-linked batch of fully signed entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub ledger_name: String,
    pub number: u64,
    pub timestamp: TemporalAnchor,
    /// `None` only for page 0.
    pub previous_hash: Option<Digest>,
    pub merkle_root: Digest,
    pub hash: Digest,
    /// Ordered by entry timestamp, ascending.
    pub entries: Vec<Entry>,
}

impl Page {
    /// Seal `entries` into page `number`.
    ///
    /// Entries are ordered by timestamp and stamped with the page number
    /// before the Merkle root and page hash are computed.
    pub fn build(
        config: &LedgerConfig,
        number: u64,
        timestamp: TemporalAnchor,
        previous_hash: Option<Digest>,
        entries: Vec<Entry>,
        hasher: &dyn HashProvider,
    ) -> Result<Self, LedgerError> {
        if entries.is_empty() {
            return Err(LedgerError::InvalidPage("a page needs at least one entry".into()));
        }
        if number == 0 && previous_hash.is_some() {
            return Err(LedgerError::InvalidPage(
                "page 0 cannot reference a previous page".into(),
            ));
        }
        if number > 0 && previous_hash.is_none() {
            return Err(LedgerError::InvalidPage(format!(
                "page {number} must reference the previous page hash"
            )));
        }
        if let Some(stray) = entries.iter().find(|e| e.ledger_name != config.name) {
            return Err(LedgerError::InvalidPage(format!(
                "entry {} belongs to ledger {}, not {}",
                stray.id, stray.ledger_name, config.name
            )));
        }

        let mut entries: Vec<Entry> = entries.iter().map(|e| e.with_page(number)).collect();
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

        let mut page = Self {
            ledger_name: config.name.clone(),
            number,
            timestamp,
            previous_hash,
            merkle_root: Digest::from_bytes(Vec::new()),
            hash: Digest::from_bytes(Vec::new()),
            entries,
        };
        page.merkle_root = page.recompute_merkle_root(hasher, &config.hash_algorithm)?;
        page.hash = page.recompute_hash(hasher, &config.hash_algorithm)?;
        Ok(page)
    }

    /// Merkle tree over the stored entries' hashes.
    pub fn merkle_tree(
        &self,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> Result<MerkleTree, LedgerError> {
        let leaves = self.entries.iter().map(|e| e.hash.clone()).collect();
        compute_merkle_tree(leaves, hasher, algorithm)
    }

    pub fn recompute_merkle_root(
        &self,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> Result<Digest, LedgerError> {
        Ok(self.merkle_tree(hasher, algorithm)?.root().clone())
    }

    /// `H(ledger_name | number | timestamp | previous_hash-or-empty | merkle_root)`
    /// over the stored header fields.
    pub fn recompute_hash(
        &self,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> Result<Digest, LedgerError> {
        let previous = self
            .previous_hash
            .as_ref()
            .map(Digest::to_hex)
            .unwrap_or_default();
        let preimage = format!(
            "{}|{}|{}|{}|{}",
            self.ledger_name,
            self.number,
            self.timestamp,
            previous,
            self.merkle_root.to_hex()
        );
        Ok(hasher.hash_str(&preimage, algorithm)?)
    }

    pub fn position_of(&self, entry_id: &EntryId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == entry_id)
    }

    pub fn entry(&self, entry_id: &EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| &e.id == entry_id)
    }

    pub fn entry_mut(&mut self, entry_id: &EntryId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| &e.id == entry_id)
    }

    /// Inclusion proof for `entry` against this page's Merkle root.
    pub fn inclusion_proof(
        &self,
        entry: &Entry,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> Result<MerkleProof, LedgerError> {
        if entry.page_number != Some(self.number) {
            return Err(LedgerError::EntryNotInPage(entry.id));
        }
        let index = self
            .position_of(&entry.id)
            .ok_or(LedgerError::EntryNotInPage(entry.id))?;
        self.merkle_tree(hasher, algorithm)?
            .proof(index)
            .ok_or(LedgerError::EntryNotInPage(entry.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryFields;
    use folio_crypto::StandardHashProvider;

    fn config() -> LedgerConfig {
        LedgerConfig::new("audit", 3, "SHA-256")
    }

    fn entry(content: &str, ms: u64) -> Entry {
        Entry::build(
            EntryFields {
                id: EntryId::new(),
                timestamp: TemporalAnchor::new(ms, 0, 0),
                content: content.into(),
                senders: vec!["alice".into()],
                recipients: vec![],
                ledger_name: "audit".into(),
            },
            &StandardHashProvider,
            "SHA-256",
        )
        .unwrap()
    }

    fn seal(number: u64, previous: Option<Digest>, entries: Vec<Entry>) -> Page {
        Page::build(
            &config(),
            number,
            TemporalAnchor::new(10_000, 0, 0),
            previous,
            entries,
            &StandardHashProvider,
        )
        .unwrap()
    }

    #[test]
    fn empty_page_is_rejected() {
        let err = Page::build(
            &config(),
            0,
            TemporalAnchor::new(1, 0, 0),
            None,
            vec![],
            &StandardHashProvider,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPage(_)));
        assert_eq!(
            compute_merkle_tree(vec![], &StandardHashProvider, "SHA-256").unwrap_err(),
            LedgerError::EmptyPage
        );
    }

    #[test]
    fn entries_are_sorted_and_stamped() {
        let (late, early) = (entry("late", 300), entry("early", 100));
        let page = seal(0, None, vec![late.clone(), early.clone()]);
        assert_eq!(page.entries[0].id, early.id);
        assert_eq!(page.entries[1].id, late.id);
        assert!(page.entries.iter().all(|e| e.page_number == Some(0)));
    }

    #[test]
    fn merkle_root_matches_tree_of_three() {
        let hasher = StandardHashProvider;
        let es = vec![entry("a", 1), entry("b", 2), entry("c", 3)];
        let (h1, h2, h3) = (es[0].hash.clone(), es[1].hash.clone(), es[2].hash.clone());
        let page = seal(0, None, es);

        let combine = |l: &Digest, r: &Digest| {
            MerkleTree::combine(l, r, &hasher, "SHA-256").unwrap()
        };
        let expected = combine(&combine(&h1, &h2), &combine(&h3, &h3));
        assert_eq!(page.merkle_root, expected);
    }

    #[test]
    fn page_hash_covers_header_fields() {
        let hasher = StandardHashProvider;
        let page = seal(0, None, vec![entry("a", 1)]);
        let expected = hasher
            .hash_str(
                &format!("audit|0|{}||{}", page.timestamp, page.merkle_root.to_hex()),
                "SHA-256",
            )
            .unwrap();
        assert_eq!(page.hash, expected);
        assert_eq!(page.recompute_hash(&hasher, "SHA-256").unwrap(), page.hash);
    }

    #[test]
    fn chain_linkage_is_enforced_at_build() {
        let genesis = seal(0, None, vec![entry("a", 1)]);
        let err = Page::build(
            &config(),
            1,
            TemporalAnchor::new(20_000, 0, 0),
            None,
            vec![entry("b", 2)],
            &StandardHashProvider,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPage(_)));

        let next = seal(1, Some(genesis.hash.clone()), vec![entry("b", 2)]);
        assert_eq!(next.previous_hash, Some(genesis.hash));
    }

    #[test]
    fn foreign_entries_are_rejected() {
        let mut stray = entry("a", 1);
        stray.ledger_name = "other".into();
        let err = Page::build(
            &config(),
            0,
            TemporalAnchor::new(1, 0, 0),
            None,
            vec![stray],
            &StandardHashProvider,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPage(_)));
    }

    #[test]
    fn inclusion_proofs_verify_for_every_entry() {
        let hasher = StandardHashProvider;
        let page = seal(0, None, (0..5).map(|i| entry("x", i)).collect());
        for e in &page.entries {
            let proof = page.inclusion_proof(e, &hasher, "SHA-256").unwrap();
            assert!(proof.verify(&e.hash, &page.merkle_root, &hasher, "SHA-256"));
        }
    }

    #[test]
    fn proof_for_foreign_entry_fails() {
        let hasher = StandardHashProvider;
        let page = seal(0, None, vec![entry("a", 1)]);
        let outsider = entry("b", 2);
        assert_eq!(
            page.inclusion_proof(&outsider, &hasher, "SHA-256").unwrap_err(),
            LedgerError::EntryNotInPage(outsider.id)
        );
    }
}
