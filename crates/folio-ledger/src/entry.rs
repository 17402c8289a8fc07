use std::borrow::Cow;

use folio_crypto::{HashProvider, KeyPair, SignatureProvider};
use folio_types::{Digest, EntryId, TemporalAnchor};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Reserved content prefix marking a tombstoned entry.
pub const DELETED_ENTRY: &str = "DELETED_ENTRY";

const CONTENT_HASH_MARKER: &str = "content_hash:";
const ENTRY_HASH_MARKER: &str = "entry_hash:";

/// A countersignature over an entry's hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySignature {
    pub signer_id: String,
    /// Hex-encoded public key.
    pub public_key: String,
    /// Hex-encoded signature bytes.
    pub signature: String,
    pub algorithm: String,
}

impl EntrySignature {
    pub fn new(
        signer_id: impl Into<String>,
        public_key: impl Into<String>,
        signature: impl Into<String>,
        algorithm: impl Into<String>,
    ) -> Self {
        Self {
            signer_id: signer_id.into(),
            public_key: public_key.into(),
            signature: signature.into(),
            algorithm: algorithm.into(),
        }
    }

    /// Sign `entry_hash` on behalf of `signer_id`.
    pub fn sign(
        signer_id: impl Into<String>,
        entry_hash: &Digest,
        key_pair: &KeyPair,
        signer: &dyn SignatureProvider,
    ) -> Result<Self, LedgerError> {
        let bytes = signer.sign(
            entry_hash.as_bytes(),
            key_pair.private_key(),
            key_pair.algorithm(),
        )?;
        Ok(Self::new(
            signer_id,
            key_pair.public_key_hex(),
            signer.encode_hex(&bytes),
            key_pair.algorithm(),
        ))
    }

    /// Returns `true` if this signature validates over `entry_hash`.
    pub fn is_valid_for(&self, entry_hash: &Digest, signer: &dyn SignatureProvider) -> bool {
        signer.verify(
            entry_hash.as_bytes(),
            &self.signature,
            &self.public_key,
            &self.algorithm,
        )
    }
}

/// Hashes recorded in erased content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErasureMarkers {
    pub content_hash: Digest,
    pub entry_hash: Digest,
}

/// Inputs fixed at entry construction.
#[derive(Clone, Debug)]
pub struct EntryFields {
    pub id: EntryId,
    pub timestamp: TemporalAnchor,
    pub content: String,
    pub senders: Vec<String>,
    pub recipients: Vec<String>,
    pub ledger_name: String,
}

/// Atomic signed record.
///
/// `hash` is computed once in [`Entry::build`] and pinned: erasure and
/// restoration substitute `content` without recomputing it. State changes
/// produce a new value rather than editing in place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub timestamp: TemporalAnchor,
    pub content: String,
    pub senders: Vec<String>,
    pub recipients: Vec<String>,
    pub hash: Digest,
    pub signatures: Vec<EntrySignature>,
    pub ledger_name: String,
    pub page_number: Option<u64>,
    pub related_entries: Vec<EntryId>,
    pub keywords: Vec<String>,
}

impl Entry {
    /// Validate inputs and compute the content hash.
    pub fn build(
        fields: EntryFields,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> Result<Self, LedgerError> {
        if fields.content.is_empty() {
            return Err(LedgerError::InvalidEntry("content is empty".into()));
        }
        if fields.content.starts_with(DELETED_ENTRY) {
            return Err(LedgerError::InvalidEntry(format!(
                "content may not start with the reserved prefix {DELETED_ENTRY}"
            )));
        }
        if fields.ledger_name.trim().is_empty() {
            return Err(LedgerError::InvalidEntry("ledger name is empty".into()));
        }
        if fields.senders.is_empty() {
            return Err(LedgerError::InvalidEntry("at least one sender is required".into()));
        }
        if let Some(blank) = fields
            .senders
            .iter()
            .chain(&fields.recipients)
            .find(|p| p.trim().is_empty())
        {
            return Err(LedgerError::InvalidEntry(format!(
                "participant identity {blank:?} is blank"
            )));
        }
        for (i, sender) in fields.senders.iter().enumerate() {
            if fields.senders[..i].contains(sender) {
                return Err(LedgerError::InvalidEntry(format!(
                    "sender {sender} is listed twice"
                )));
            }
        }

        let hash = hasher.hash_str(
            &hash_preimage(
                &fields.id,
                &fields.timestamp,
                &fields.content,
                &fields.senders,
                &fields.recipients,
            ),
            algorithm,
        )?;

        Ok(Self {
            id: fields.id,
            timestamp: fields.timestamp,
            content: fields.content,
            senders: fields.senders,
            recipients: fields.recipients,
            hash,
            signatures: Vec::new(),
            ledger_name: fields.ledger_name,
            page_number: None,
            related_entries: Vec::new(),
            keywords: Vec::new(),
        })
    }

    /// Hash this entry's fields as they would be with `content`.
    pub fn hash_with_content(
        &self,
        content: &str,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> Result<Digest, LedgerError> {
        let preimage = hash_preimage(
            &self.id,
            &self.timestamp,
            content,
            &self.senders,
            &self.recipients,
        );
        Ok(hasher.hash_str(&preimage, algorithm)?)
    }

    /// Recompute the hash from current fields, ignoring the pinned value.
    pub fn recompute_hash(
        &self,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> Result<Digest, LedgerError> {
        self.hash_with_content(&self.content, hasher, algorithm)
    }

    /// Quorum check: every sender has a signature that validates over `hash`.
    pub fn verify(&self, signer: &dyn SignatureProvider) -> bool {
        self.senders.iter().all(|sender| {
            self.signatures
                .iter()
                .any(|sig| &sig.signer_id == sender && sig.is_valid_for(&self.hash, signer))
        })
    }

    pub fn is_sender(&self, identity: &str) -> bool {
        self.senders.iter().any(|s| s == identity)
    }

    pub fn signature_for(&self, signer_id: &str) -> Option<&EntrySignature> {
        self.signatures.iter().find(|sig| sig.signer_id == signer_id)
    }

    pub fn is_erased(&self) -> bool {
        self.content.starts_with(DELETED_ENTRY)
    }

    pub fn is_sealed(&self) -> bool {
        self.page_number.is_some()
    }

    /// Parse the markers of erased content. `None` if the content is not a
    /// well-formed tombstone.
    pub fn erasure_markers(&self) -> Option<ErasureMarkers> {
        let mut lines = self.content.lines();
        if lines.next()? != DELETED_ENTRY {
            return None;
        }
        let content_hash = lines.next()?.strip_prefix(CONTENT_HASH_MARKER)?;
        let entry_hash = lines.next()?.strip_prefix(ENTRY_HASH_MARKER)?;
        if lines.next().is_some() {
            return None;
        }
        Some(ErasureMarkers {
            content_hash: Digest::from_hex(content_hash).ok()?,
            entry_hash: Digest::from_hex(entry_hash).ok()?,
        })
    }

    /// Replace content with a tombstone that commits to the original content
    /// and to the pinned entry hash.
    pub fn erase_content(
        &self,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> Result<Self, LedgerError> {
        if self.is_erased() {
            return Err(LedgerError::EntryDeleted(self.id));
        }
        let content_hash = hasher.hash_str(&self.content, algorithm)?;
        let mut erased = self.clone();
        erased.content = format!(
            "{DELETED_ENTRY}\n{CONTENT_HASH_MARKER}{}\n{ENTRY_HASH_MARKER}{}",
            content_hash.to_hex(),
            self.hash.to_hex()
        );
        Ok(erased)
    }

    /// Put back the original content of an erased entry.
    ///
    /// Fails with `RestoreMismatch` unless `original` hashes to the recorded
    /// content hash and rebuilding the entry with it reproduces the recorded
    /// entry hash, which must also be the pinned hash.
    pub fn restore_content(
        &self,
        original: &str,
        hasher: &dyn HashProvider,
        algorithm: &str,
    ) -> Result<Self, LedgerError> {
        if !self.is_erased() {
            return Err(LedgerError::NotErased(self.id));
        }
        let mismatch = |reason: &str| LedgerError::RestoreMismatch {
            entry: self.id,
            reason: reason.to_string(),
        };

        let markers = self
            .erasure_markers()
            .ok_or_else(|| mismatch("erasure markers are malformed"))?;

        if hasher.hash_str(original, algorithm)? != markers.content_hash {
            return Err(mismatch("content hash differs"));
        }
        if self.hash_with_content(original, hasher, algorithm)? != markers.entry_hash {
            return Err(mismatch("entry hash differs"));
        }
        if markers.entry_hash != self.hash {
            return Err(mismatch("recorded entry hash differs from pinned hash"));
        }

        let mut restored = self.clone();
        restored.content = original.to_string();
        Ok(restored)
    }

    pub fn with_signature(&self, signature: EntrySignature) -> Self {
        let mut next = self.clone();
        next.signatures.push(signature);
        next
    }

    pub fn with_page(&self, page_number: u64) -> Self {
        let mut next = self.clone();
        next.page_number = Some(page_number);
        next
    }

    /// Append cross references, skipping ones already present.
    pub fn with_related_entries(&self, related: &[EntryId]) -> Self {
        let mut next = self.clone();
        for id in related {
            if !next.related_entries.contains(id) {
                next.related_entries.push(*id);
            }
        }
        next
    }

    /// Append keywords, skipping ones already present.
    pub fn with_keywords(&self, keywords: &[String]) -> Self {
        let mut next = self.clone();
        for keyword in keywords {
            if !next.keywords.contains(keyword) {
                next.keywords.push(keyword.clone());
            }
        }
        next
    }
}

/// `id|timestamp|content|senders|recipients`, lists joined by `,`.
///
/// `\`, `|` and `,` inside a field are backslash-escaped so distinct field
/// tuples never share a preimage.
fn hash_preimage(
    id: &EntryId,
    timestamp: &TemporalAnchor,
    content: &str,
    senders: &[String],
    recipients: &[String],
) -> String {
    let join = |items: &[String]| {
        items
            .iter()
            .map(|s| escape_field(s))
            .collect::<Vec<_>>()
            .join(",")
    };
    format!(
        "{}|{}|{}|{}|{}",
        id,
        timestamp,
        escape_field(content),
        join(senders),
        join(recipients)
    )
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if !field.contains(['\\', '|', ',']) {
        return Cow::Borrowed(field);
    }
    let mut escaped = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        if matches!(c, '\\' | '|' | ',') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}
