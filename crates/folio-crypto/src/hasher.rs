use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use folio_types::Digest;

use crate::error::CryptoError;

/// Named digest producer.
///
/// Implementations must be deterministic and collision-resistant per
/// algorithm name.
pub trait HashProvider: Send + Sync {
    /// Digest raw bytes with the named algorithm.
    fn hash(&self, data: &[u8], algorithm: &str) -> Result<Digest, CryptoError>;

    /// Digest a UTF-8 string with the named algorithm.
    fn hash_str(&self, data: &str, algorithm: &str) -> Result<Digest, CryptoError> {
        self.hash(data.as_bytes(), algorithm)
    }

    /// Hex encoding of a digest.
    fn to_hex(&self, digest: &Digest) -> String {
        digest.to_hex()
    }

    /// Name of the algorithm used when none is configured.
    fn default_algorithm(&self) -> &str;

    /// Names of every algorithm this provider accepts.
    fn supported_algorithms(&self) -> BTreeSet<String>;

    /// Returns `true` if `algorithm` is accepted by [`Self::hash`].
    fn supports(&self, algorithm: &str) -> bool {
        self.supported_algorithms().contains(algorithm)
    }
}

/// Hash algorithms known to [`StandardHashProvider`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashAlgorithm {
    Blake3,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [Self; 3] = [Self::Blake3, Self::Sha256, Self::Sha512];

    /// Canonical name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Blake3 => "BLAKE3",
            Self::Sha256 => "SHA-256",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Digest `data` with this algorithm.
    pub fn digest(&self, data: &[u8]) -> Digest {
        match self {
            Self::Blake3 => Digest::from_bytes(blake3::hash(data).as_bytes().to_vec()),
            Self::Sha256 => {
                use sha2::Digest as _;
                Digest::from_bytes(sha2::Sha256::new().chain_update(data).finalize().to_vec())
            }
            Self::Sha512 => {
                use sha2::Digest as _;
                Digest::from_bytes(sha2::Sha512::new().chain_update(data).finalize().to_vec())
            }
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = CryptoError;

    /// Accepts canonical names and their common lowercase spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('_', "-").as_str() {
            "BLAKE3" => Ok(Self::Blake3),
            "SHA-256" | "SHA256" => Ok(Self::Sha256),
            "SHA-512" | "SHA512" => Ok(Self::Sha512),
            _ => Err(CryptoError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// BLAKE3 / SHA-2 provider. BLAKE3 is the default.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardHashProvider;

impl StandardHashProvider {
    pub fn new() -> Self {
        Self
    }
}

impl HashProvider for StandardHashProvider {
    fn hash(&self, data: &[u8], algorithm: &str) -> Result<Digest, CryptoError> {
        let algorithm: HashAlgorithm = algorithm.parse()?;
        Ok(algorithm.digest(data))
    }

    fn default_algorithm(&self) -> &str {
        HashAlgorithm::Blake3.as_str()
    }

    fn supported_algorithms(&self) -> BTreeSet<String> {
        HashAlgorithm::ALL
            .iter()
            .map(|a| a.as_str().to_string())
            .collect()
    }

    fn supports(&self, algorithm: &str) -> bool {
        algorithm.parse::<HashAlgorithm>().is_ok()
    }
}
