use std::sync::Arc;

use folio_crypto::{Ed25519SignatureProvider, HashProvider, SignatureProvider, StandardHashProvider};

/// The hash and signature collaborators every ledger operation consults.
#[derive(Clone)]
pub struct CryptoProviders {
    pub hasher: Arc<dyn HashProvider>,
    pub signer: Arc<dyn SignatureProvider>,
}

impl CryptoProviders {
    pub fn new(hasher: Arc<dyn HashProvider>, signer: Arc<dyn SignatureProvider>) -> Self {
        Self { hasher, signer }
    }

    /// BLAKE3/SHA-2 hashing with Ed25519 signatures.
    pub fn standard() -> Self {
        Self::new(
            Arc::new(StandardHashProvider::new()),
            Arc::new(Ed25519SignatureProvider::new()),
        )
    }

    pub fn hasher(&self) -> &dyn HashProvider {
        self.hasher.as_ref()
    }

    pub fn signer(&self) -> &dyn SignatureProvider {
        self.signer.as_ref()
    }
}

impl Default for CryptoProviders {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for CryptoProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoProviders")
            .field("hash_default", &self.hasher.default_algorithm())
            .field("signature_default", &self.signer.default_algorithm())
            .finish()
    }
}
