/// Errors from hashing, signing, and tree construction.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("cannot build a Merkle tree from zero leaves")]
    EmptyTree,
}
