use std::sync::Arc;

use folio_ledger::{CryptoProviders, Entry, LedgerConfig, LedgerError, LedgerReader, Page};
use folio_types::Digest;
use tracing::{debug, info, warn};

use crate::error::WardenError;
use crate::report::{AuditField, TamperContext, WardenReport};

/// Read-only integrity auditor.
///
/// Recomputes every page hash, Merkle root, entry hash and signature of a
/// persisted ledger and reports the first discrepancy. Reads only through
/// [`LedgerReader`]; never repairs.
pub struct LedgerWarden {
    reader: Arc<dyn LedgerReader>,
    providers: CryptoProviders,
}

type Check = Result<Option<TamperContext>, LedgerError>;

impl LedgerWarden {
    pub fn new(reader: Arc<dyn LedgerReader>, providers: CryptoProviders) -> Self {
        Self { reader, providers }
    }

    /// Audit one ledger. Failures to read or recompute are captured in the
    /// report as `Error`, not returned.
    pub fn validate_ledger(&self, name: &str) -> WardenReport {
        let report = self
            .audit(name)
            .unwrap_or_else(|e| WardenReport::failed(name, e.to_string()));
        match (&report.context, &report.error) {
            (Some(ctx), _) => warn!(ledger = name, field = %ctx.field, "{}", ctx.message),
            (None, Some(error)) => warn!(ledger = name, %error, "audit could not complete"),
            (None, None) => info!(ledger = name, last_page = ?report.last_page, "ledger intact"),
        }
        report
    }

    /// Audit every ledger in the repository.
    pub fn validate_all(&self) -> Result<Vec<WardenReport>, WardenError> {
        let names = self.reader.ledger_names()?;
        Ok(names.iter().map(|name| self.validate_ledger(name)).collect())
    }

    /// Audit `selection`, or every ledger when `None`.
    pub fn validate_selected(
        &self,
        selection: Option<&[String]>,
    ) -> Result<Vec<WardenReport>, WardenError> {
        match selection {
            Some(names) => Ok(names.iter().map(|name| self.validate_ledger(name)).collect()),
            None => self.validate_all(),
        }
    }

    fn audit(&self, name: &str) -> Result<WardenReport, LedgerError> {
        let config = self
            .reader
            .read_ledger(name)?
            .ok_or_else(|| LedgerError::LedgerNotFound(name.to_string()))?;
        let pages = self.reader.read_pages(name)?;

        let (Some(first), Some(last)) = (pages.first(), pages.last()) else {
            debug!(ledger = name, "no sealed pages");
            return Ok(WardenReport::ok(name, None, None));
        };
        let (first_page, last_page) = (Some(first.number), Some(last.number));

        for (index, page) in pages.iter().enumerate() {
            let previous = index.checked_sub(1).and_then(|i| pages.get(i));
            let next = pages.get(index + 1);
            if let Some(ctx) = self.check_page(&config, index as u64, page, previous, next)? {
                return Ok(WardenReport::tampered(name, first_page, last_page, ctx));
            }
        }
        Ok(WardenReport::ok(name, first_page, last_page))
    }

    /// Header, then entries, then Merkle root, then page hash, so that a
    /// tampered entry is reported as itself rather than as a root mismatch.
    fn check_page(
        &self,
        config: &LedgerConfig,
        position: u64,
        page: &Page,
        previous: Option<&Page>,
        next: Option<&Page>,
    ) -> Check {
        let tamper = |field: AuditField, expected: String, actual: String| -> Check {
            Ok(Some(TamperContext::new(position, None, field, expected, actual)))
        };

        if page.ledger_name != config.name {
            return tamper(AuditField::LedgerName, config.name.clone(), page.ledger_name.clone());
        }
        if page.number != position {
            return tamper(
                AuditField::PageNumber,
                position.to_string(),
                page.number.to_string(),
            );
        }
        if let Some(previous) = previous {
            if page.timestamp <= previous.timestamp {
                return tamper(
                    AuditField::PageTimestamp,
                    format!("> {}", previous.timestamp),
                    page.timestamp.to_string(),
                );
            }
        }
        if let Some(next) = next {
            if page.timestamp >= next.timestamp {
                return tamper(
                    AuditField::PageTimestamp,
                    format!("< {}", next.timestamp),
                    page.timestamp.to_string(),
                );
            }
        }
        let expected_previous = previous.map(|p| p.hash.clone());
        if page.previous_hash != expected_previous {
            return tamper(
                AuditField::PreviousHash,
                hex_or_none(expected_previous.as_ref()),
                hex_or_none(page.previous_hash.as_ref()),
            );
        }

        for entry in &page.entries {
            if let Some(ctx) = self.check_entry(config, position, page, entry)? {
                return Ok(Some(ctx));
            }
        }

        if page.entries.is_empty() {
            return tamper(
                AuditField::MerkleRoot,
                "root over at least one entry".into(),
                "page without entries".into(),
            );
        }
        let algorithm = &config.hash_algorithm;
        let root = page.recompute_merkle_root(self.providers.hasher(), algorithm)?;
        if root != page.merkle_root {
            return tamper(AuditField::MerkleRoot, root.to_hex(), page.merkle_root.to_hex());
        }
        let hash = page.recompute_hash(self.providers.hasher(), algorithm)?;
        if hash != page.hash {
            return tamper(AuditField::PageHash, hash.to_hex(), page.hash.to_hex());
        }
        Ok(None)
    }

    fn check_entry(
        &self,
        config: &LedgerConfig,
        position: u64,
        page: &Page,
        entry: &Entry,
    ) -> Check {
        let tamper = |field: AuditField, expected: String, actual: String| -> Check {
            Ok(Some(TamperContext::new(
                position,
                Some(entry.id),
                field,
                expected,
                actual,
            )))
        };

        if entry.ledger_name != page.ledger_name {
            return tamper(
                AuditField::EntryLedgerName,
                page.ledger_name.clone(),
                entry.ledger_name.clone(),
            );
        }
        if entry.page_number != Some(page.number) {
            return tamper(
                AuditField::EntryPageNumber,
                page.number.to_string(),
                entry
                    .page_number
                    .map_or_else(|| "none".to_string(), |n| n.to_string()),
            );
        }
        if entry.timestamp >= page.timestamp {
            return tamper(
                AuditField::EntryTimestamp,
                format!("< {}", page.timestamp),
                entry.timestamp.to_string(),
            );
        }

        // Erased content cannot be rehashed; its marker must carry the pinned hash.
        if entry.is_erased() {
            match entry.erasure_markers() {
                Some(markers) if markers.entry_hash == entry.hash => {}
                Some(markers) => {
                    return tamper(
                        AuditField::ErasureMarker,
                        entry.hash.to_hex(),
                        markers.entry_hash.to_hex(),
                    )
                }
                None => {
                    return tamper(
                        AuditField::ErasureMarker,
                        "well-formed erasure markers".into(),
                        "malformed erasure markers".into(),
                    )
                }
            }
        } else {
            let hash = entry.recompute_hash(self.providers.hasher(), &config.hash_algorithm)?;
            if hash != entry.hash {
                return tamper(AuditField::EntryHash, hash.to_hex(), entry.hash.to_hex());
            }
        }

        for sender in &entry.senders {
            let count = entry
                .signatures
                .iter()
                .filter(|sig| &sig.signer_id == sender)
                .count();
            if count != 1 {
                return tamper(
                    AuditField::Signatures,
                    format!("one signature from {sender}"),
                    format!("{count} signatures from {sender}"),
                );
            }
        }
        if let Some(orphan) = entry
            .signatures
            .iter()
            .find(|sig| !entry.is_sender(&sig.signer_id))
        {
            return tamper(
                AuditField::Signatures,
                format!("signers among {}", entry.senders.join(",")),
                format!("signature from {}", orphan.signer_id),
            );
        }
        if let Some(invalid) = entry
            .signatures
            .iter()
            .find(|sig| !sig.is_valid_for(&entry.hash, self.providers.signer()))
        {
            return tamper(
                AuditField::Signature,
                format!("valid {} signature from {}", invalid.algorithm, invalid.signer_id),
                invalid.signature.clone(),
            );
        }
        Ok(None)
    }
}

fn hex_or_none(digest: Option<&Digest>) -> String {
    digest.map_or_else(|| "none".to_string(), Digest::to_hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::AuditResult;
    use folio_crypto::KeyPair;
    use folio_ledger::{EntrySignature, InMemoryRepository, Ledger, LedgerWriter, SystemIdentity};
    use folio_types::TemporalAnchor;

    const SENDERS: [&str; 2] = ["alice", "bob"];

    struct Fixture {
        repo: Arc<InMemoryRepository>,
        ledger: Ledger,
        warden: LedgerWarden,
    }

    /// A ledger of two sealed pages, two entries each, every entry signed
    /// by both senders.
    fn sealed_ledger() -> Fixture {
        let providers = CryptoProviders::standard();
        let identity = SystemIdentity::generate("system", providers.signer()).unwrap();
        let repo = Arc::new(InMemoryRepository::new());
        let ledger = Ledger::new(
            LedgerConfig::new("audit", 2, "BLAKE3"),
            providers.clone(),
            Arc::new(identity),
        )
        .unwrap()
        .attach_repository(repo.clone())
        .unwrap();

        let keys: Vec<KeyPair> = SENDERS
            .iter()
            .map(|_| providers.signer().generate_key_pair("Ed25519").unwrap())
            .collect();
        for i in 0..4 {
            let entry = ledger
                .create_entry(
                    format!("transfer #{i}"),
                    SENDERS.iter().map(|s| s.to_string()).collect(),
                    vec!["carol".into()],
                    &[],
                    &[],
                )
                .unwrap();
            for (sender, key) in SENDERS.iter().zip(&keys) {
                let sig =
                    EntrySignature::sign(*sender, &entry.hash, key, providers.signer()).unwrap();
                ledger.add_signature(entry.id, sig).unwrap();
            }
        }
        assert_eq!(ledger.pages().unwrap().len(), 2);

        let warden = LedgerWarden::new(repo.clone(), providers);
        Fixture {
            repo,
            ledger,
            warden,
        }
    }

    impl Fixture {
        fn stored(&self, number: u64) -> Page {
            self.repo.read_page("audit", number).unwrap().unwrap()
        }

        fn tamper(&self, page: Page) -> TamperContext {
            self.repo
                .update_page_for_tamper_evidence_testing(&page)
                .unwrap();
            let report = self.warden.validate_ledger("audit");
            assert_eq!(report.result, AuditResult::Tampered);
            report.context.unwrap()
        }
    }

    fn flip_char(s: &str) -> String {
        let mut chars: Vec<char> = s.chars().collect();
        chars[0] = if chars[0] == 'a' { 'b' } else { 'a' };
        chars.into_iter().collect()
    }

    fn flip(digest: &Digest) -> Digest {
        Digest::from_hex(&flip_char(&digest.to_hex())).unwrap()
    }

    #[test]
    fn intact_ledger_passes() {
        let fx = sealed_ledger();
        let report = fx.warden.validate_ledger("audit");
        assert!(report.is_ok(), "{report:?}");
        assert_eq!(report.first_page, Some(0));
        assert_eq!(report.last_page, Some(1));
        assert!(report.context.is_none());
    }

    #[test]
    fn ledger_without_pages_passes() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.create_ledger(&LedgerConfig::new("empty", 4, "SHA-256"))
            .unwrap();
        let warden = LedgerWarden::new(repo, CryptoProviders::standard());
        let report = warden.validate_ledger("empty");
        assert_eq!(report, WardenReport::ok("empty", None, None));
    }

    #[test]
    fn detects_page_hash_tamper() {
        let fx = sealed_ledger();
        let mut page = fx.stored(0);
        page.hash = flip(&page.hash);
        let ctx = fx.tamper(page);
        assert_eq!((ctx.page, ctx.entry, ctx.field), (0, None, AuditField::PageHash));
    }

    #[test]
    fn detects_merkle_root_tamper() {
        let fx = sealed_ledger();
        let mut page = fx.stored(1);
        page.merkle_root = flip(&page.merkle_root);
        let ctx = fx.tamper(page);
        assert_eq!((ctx.page, ctx.field), (1, AuditField::MerkleRoot));
    }

    #[test]
    fn detects_previous_hash_tamper() {
        let fx = sealed_ledger();
        let mut page = fx.stored(1);
        let original = page.previous_hash.clone().unwrap();
        page.previous_hash = Some(flip(&original));
        let ctx = fx.tamper(page);
        assert_eq!((ctx.page, ctx.field), (1, AuditField::PreviousHash));
        assert_eq!(ctx.expected, original.to_hex());
    }

    #[test]
    fn detects_entry_hash_tamper() {
        let fx = sealed_ledger();
        let mut page = fx.stored(0);
        page.entries[1].hash = flip(&page.entries[1].hash);
        let id = page.entries[1].id;
        let ctx = fx.tamper(page);
        assert_eq!((ctx.page, ctx.entry, ctx.field), (0, Some(id), AuditField::EntryHash));
    }

    #[test]
    fn detects_content_tamper() {
        let fx = sealed_ledger();
        let mut page = fx.stored(1);
        page.entries[0].content = flip_char(&page.entries[0].content);
        let id = page.entries[0].id;
        let ctx = fx.tamper(page);
        assert_eq!((ctx.page, ctx.entry, ctx.field), (1, Some(id), AuditField::EntryHash));
    }

    #[test]
    fn detects_signature_tamper() {
        let fx = sealed_ledger();
        let mut page = fx.stored(0);
        let sig = &mut page.entries[0].signatures[1];
        sig.signature = flip_char(&sig.signature);
        let id = page.entries[0].id;
        let ctx = fx.tamper(page);
        assert_eq!((ctx.entry, ctx.field), (Some(id), AuditField::Signature));
    }

    #[test]
    fn detects_orphan_and_duplicate_signatures() {
        let fx = sealed_ledger();
        let mut page = fx.stored(0);
        let extra = page.entries[0].signatures[0].clone();
        page.entries[0].signatures.push(extra);
        let ctx = fx.tamper(page);
        assert_eq!(ctx.field, AuditField::Signatures);

        let mut page = fx.stored(0);
        page.entries[0].signatures.pop();
        let mut orphan = page.entries[0].signatures[0].clone();
        orphan.signer_id = "mallory".into();
        page.entries[0].signatures.push(orphan);
        let ctx = fx.tamper(page);
        assert_eq!(ctx.field, AuditField::Signatures);
    }

    #[test]
    fn detects_out_of_order_page_timestamp() {
        let fx = sealed_ledger();
        let mut page = fx.stored(0);
        page.timestamp = TemporalAnchor::new(u64::MAX, 0, 0);
        let ctx = fx.tamper(page);
        assert_eq!((ctx.page, ctx.field), (0, AuditField::PageTimestamp));
    }

    #[test]
    fn detects_misfiled_entry() {
        let fx = sealed_ledger();
        let mut page = fx.stored(1);
        page.entries[1].page_number = Some(0);
        let ctx = fx.tamper(page);
        assert_eq!((ctx.page, ctx.field), (1, AuditField::EntryPageNumber));
    }

    #[test]
    fn erased_entries_remain_valid() {
        let fx = sealed_ledger();
        let target = fx.stored(0).entries[0].id;
        fx.ledger.delete_entry(target).unwrap();
        assert!(fx.warden.validate_ledger("audit").is_ok());

        let mut page = fx.stored(0);
        let other = page.entries[1].hash.to_hex();
        let content = page.entries[0].content.clone();
        let (head, _) = content.rsplit_once("entry_hash:").unwrap();
        page.entries[0].content = format!("{head}entry_hash:{other}");
        let ctx = fx.tamper(page);
        assert_eq!((ctx.entry, ctx.field), (Some(target), AuditField::ErasureMarker));
    }

    #[test]
    fn unknown_ledgers_are_reported_and_scanning_continues() {
        let fx = sealed_ledger();
        let selection = vec!["ghost".to_string(), "audit".to_string()];
        let reports = fx.warden.validate_selected(Some(&selection)).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].result, AuditResult::Error);
        assert!(reports[0].error.as_deref().unwrap().contains("ghost"));
        assert!(reports[1].is_ok());
    }

    #[test]
    fn validate_all_covers_every_ledger() {
        let fx = sealed_ledger();
        fx.repo
            .create_ledger(&LedgerConfig::new("spare", 2, "SHA-512"))
            .unwrap();
        let reports = fx.warden.validate_all().unwrap();
        let names: Vec<&str> = reports.iter().map(|r| r.ledger.as_str()).collect();
        assert_eq!(names, vec!["audit", "spare"]);
        assert!(reports.iter().all(WardenReport::is_ok));
    }
}
