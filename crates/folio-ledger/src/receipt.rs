use folio_crypto::MerkleProof;
use folio_types::{Digest, TemporalAnchor};
use serde::{Deserialize, Serialize};

use crate::entry::{Entry, EntrySignature};
use crate::error::LedgerError;
use crate::identity::SystemIdentity;
use crate::page::Page;
use crate::providers::CryptoProviders;

/// System-signed attestation that an entry is sealed in a page.
///
/// Generated on demand and never stored as ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub entry: Entry,
    pub timestamp: TemporalAnchor,
    pub requester_id: String,
    pub page_number: u64,
    pub merkle_root: Digest,
    pub proof: MerkleProof,
    /// `H(entry hash | timestamp | requester | page number | merkle root |
    /// proof siblings joined by ',')`.
    pub hash: Digest,
    /// System identity's signature over `hash`.
    pub signature: EntrySignature,
}

impl Receipt {
    /// Issue a receipt for `entry`, which must be sealed in `page`.
    pub fn issue(
        entry: &Entry,
        page: &Page,
        requester_id: &str,
        timestamp: TemporalAnchor,
        identity: &SystemIdentity,
        providers: &CryptoProviders,
        algorithm: &str,
    ) -> Result<Self, LedgerError> {
        let proof = page.inclusion_proof(entry, providers.hasher(), algorithm)?;
        let hash = receipt_hash(
            &entry.hash,
            &timestamp,
            requester_id,
            page.number,
            &page.merkle_root,
            &proof,
            providers,
            algorithm,
        )?;
        let signature = identity.sign(&hash, providers.signer())?;

        Ok(Self {
            entry: entry.clone(),
            timestamp,
            requester_id: requester_id.to_string(),
            page_number: page.number,
            merkle_root: page.merkle_root.clone(),
            proof,
            hash,
            signature,
        })
    }

    /// Check the hash, the inclusion proof, and that the signature is valid
    /// for the key it names. Who holds that key is checked by
    /// [`is_signed_by`](Self::is_signed_by).
    pub fn verify(&self, providers: &CryptoProviders, algorithm: &str) -> bool {
        let Ok(hash) = receipt_hash(
            &self.entry.hash,
            &self.timestamp,
            &self.requester_id,
            self.page_number,
            &self.merkle_root,
            &self.proof,
            providers,
            algorithm,
        ) else {
            return false;
        };
        hash == self.hash
            && self.proof.verify(
                &self.entry.hash,
                &self.merkle_root,
                providers.hasher(),
                algorithm,
            )
            && self.signature.is_valid_for(&self.hash, providers.signer())
    }

    /// Whether the signature claims to come from `identity`'s id and key.
    pub fn is_signed_by(&self, identity: &SystemIdentity) -> bool {
        let key_pair = identity.key_pair();
        self.signature.signer_id == identity.id()
            && self.signature.public_key == key_pair.public_key_hex()
            && self.signature.algorithm == key_pair.algorithm()
    }
}

#[allow(clippy::too_many_arguments)]
fn receipt_hash(
    entry_hash: &Digest,
    timestamp: &TemporalAnchor,
    requester_id: &str,
    page_number: u64,
    merkle_root: &Digest,
    proof: &MerkleProof,
    providers: &CryptoProviders,
    algorithm: &str,
) -> Result<Digest, LedgerError> {
    let siblings = proof
        .siblings()
        .map(Digest::to_hex)
        .collect::<Vec<_>>()
        .join(",");
    let preimage = format!(
        "{}|{}|{}|{}|{}|{}",
        entry_hash.to_hex(),
        timestamp,
        requester_id,
        page_number,
        merkle_root.to_hex(),
        siblings
    );
    Ok(providers.hasher().hash_str(&preimage, algorithm)?)
}
