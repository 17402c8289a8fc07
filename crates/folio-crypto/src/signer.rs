use std::collections::BTreeSet;
use std::fmt;

use crate::error::CryptoError;

/// Private key bytes for a named signature algorithm.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(<redacted>)")
    }
}

/// A generated key pair tagged with the algorithm that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPair {
    algorithm: String,
    public_key: Vec<u8>,
    private_key: PrivateKey,
}

impl KeyPair {
    pub fn new(algorithm: impl Into<String>, public_key: Vec<u8>, private_key: PrivateKey) -> Self {
        Self {
            algorithm: algorithm.into(),
            public_key,
            private_key,
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key)
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

/// Named signature scheme.
///
/// `verify` answers a question: mismatched algorithm, malformed key, or
/// malformed signature all yield `false`, never an error.
pub trait SignatureProvider: Send + Sync {
    /// Generate a fresh key pair for `algorithm`.
    fn generate_key_pair(&self, algorithm: &str) -> Result<KeyPair, CryptoError>;

    /// Sign `digest` with `private_key`.
    fn sign(
        &self,
        digest: &[u8],
        private_key: &PrivateKey,
        algorithm: &str,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Verify a hex signature over `digest` against a hex public key.
    fn verify(
        &self,
        digest: &[u8],
        hex_signature: &str,
        hex_public_key: &str,
        algorithm: &str,
    ) -> bool;

    fn default_algorithm(&self) -> &str;

    fn supported_algorithms(&self) -> BTreeSet<String>;

    fn encode_hex(&self, bytes: &[u8]) -> String {
        hex::encode(bytes)
    }

    fn decode_hex(&self, s: &str) -> Result<Vec<u8>, CryptoError> {
        hex::decode(s).map_err(|e| CryptoError::InvalidHex(e.to_string()))
    }
}

/// Ed25519 signatures via `ed25519-dalek`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519SignatureProvider;

impl Ed25519SignatureProvider {
    pub const ALGORITHM: &'static str = "Ed25519";

    pub fn new() -> Self {
        Self
    }

    fn check_algorithm(algorithm: &str) -> Result<(), CryptoError> {
        if algorithm.eq_ignore_ascii_case(Self::ALGORITHM) {
            Ok(())
        } else {
            Err(CryptoError::UnsupportedAlgorithm(algorithm.to_string()))
        }
    }

    fn signing_key(private_key: &PrivateKey) -> Result<ed25519_dalek::SigningKey, CryptoError> {
        let bytes: [u8; 32] = private_key
            .as_bytes()
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("expected 32-byte Ed25519 secret".into()))?;
        Ok(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }
}

impl SignatureProvider for Ed25519SignatureProvider {
    fn generate_key_pair(&self, algorithm: &str) -> Result<KeyPair, CryptoError> {
        Self::check_algorithm(algorithm)?;
        let mut csprng = rand::thread_rng();
        let sk = ed25519_dalek::SigningKey::generate(&mut csprng);
        Ok(KeyPair::new(
            Self::ALGORITHM,
            sk.verifying_key().to_bytes().to_vec(),
            PrivateKey::from_bytes(sk.to_bytes().to_vec()),
        ))
    }

    fn sign(
        &self,
        digest: &[u8],
        private_key: &PrivateKey,
        algorithm: &str,
    ) -> Result<Vec<u8>, CryptoError> {
        use ed25519_dalek::Signer;
        Self::check_algorithm(algorithm)?;
        let sk = Self::signing_key(private_key)?;
        Ok(sk.sign(digest).to_bytes().to_vec())
    }

    fn verify(
        &self,
        digest: &[u8],
        hex_signature: &str,
        hex_public_key: &str,
        algorithm: &str,
    ) -> bool {
        use ed25519_dalek::Verifier;
        if Self::check_algorithm(algorithm).is_err() {
            return false;
        }
        let Ok(key_bytes) = self.decode_hex(hex_public_key) else {
            return false;
        };
        let Ok(sig_bytes) = self.decode_hex(hex_signature) else {
            return false;
        };
        let Ok(key_arr) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
            return false;
        };
        let Ok(sig_arr) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
            return false;
        };
        let Ok(vk) = ed25519_dalek::VerifyingKey::from_bytes(&key_arr) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(&sig_arr);
        vk.verify(digest, &signature).is_ok()
    }

    fn default_algorithm(&self) -> &str {
        Self::ALGORITHM
    }

    fn supported_algorithms(&self) -> BTreeSet<String> {
        BTreeSet::from([Self::ALGORITHM.to_string()])
    }
}
