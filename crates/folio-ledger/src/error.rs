use folio_crypto::CryptoError;
use folio_types::EntryId;

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    #[error("invalid page: {0}")]
    InvalidPage(String),

    #[error("cannot build a Merkle tree for an empty page")]
    EmptyPage,

    #[error("entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("entry {0} is not sealed in a page")]
    EntryNotInPage(EntryId),

    #[error("{signer} is not a sender of entry {entry}")]
    NotASender { entry: EntryId, signer: String },

    #[error("entry {0} content has been erased")]
    EntryDeleted(EntryId),

    #[error("entry {0} content is not erased")]
    NotErased(EntryId),

    #[error("signature from {signer} does not validate for entry {entry}")]
    SignatureInvalid { entry: EntryId, signer: String },

    #[error("restored content does not match erased entry {entry}: {reason}")]
    RestoreMismatch { entry: EntryId, reason: String },

    #[error("page seal requires {required} verified entries, found {available}")]
    InsufficientEntries { required: usize, available: usize },

    #[error("invalid ledger config: {0}")]
    InvalidConfig(String),

    #[error("ledger already exists: {0}")]
    LedgerExists(String),

    #[error("ledger not found: {0}")]
    LedgerNotFound(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("ledger lock poisoned")]
    LockPoisoned,
}
