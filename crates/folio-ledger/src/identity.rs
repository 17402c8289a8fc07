use folio_crypto::{KeyPair, SignatureProvider};
use folio_types::Digest;

use crate::entry::EntrySignature;
use crate::error::LedgerError;

/// The ledger operator's own identity: signs receipts and system entries.
#[derive(Clone, Debug)]
pub struct SystemIdentity {
    id: String,
    key_pair: KeyPair,
}

impl SystemIdentity {
    pub const DEFAULT_ID: &'static str = "system";

    pub fn new(id: impl Into<String>, key_pair: KeyPair) -> Self {
        Self {
            id: id.into(),
            key_pair,
        }
    }

    /// Generate a fresh identity with the provider's default algorithm.
    pub fn generate(
        id: impl Into<String>,
        signer: &dyn SignatureProvider,
    ) -> Result<Self, LedgerError> {
        let key_pair = signer.generate_key_pair(signer.default_algorithm())?;
        Ok(Self::new(id, key_pair))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Countersign `digest` as this identity.
    pub fn sign(
        &self,
        digest: &Digest,
        signer: &dyn SignatureProvider,
    ) -> Result<EntrySignature, LedgerError> {
        EntrySignature::sign(self.id.clone(), digest, &self.key_pair, signer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_crypto::Ed25519SignatureProvider;

    #[test]
    fn generated_identity_signs_verifiably() {
        let signer = Ed25519SignatureProvider;
        let identity = SystemIdentity::generate(SystemIdentity::DEFAULT_ID, &signer).unwrap();
        let digest = Digest::from_bytes(vec![9; 32]);
        let sig = identity.sign(&digest, &signer).unwrap();
        assert_eq!(sig.signer_id, "system");
        assert_eq!(sig.public_key, identity.key_pair().public_key_hex());
        assert!(sig.is_valid_for(&digest, &signer));
    }
}
