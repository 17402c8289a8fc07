//! Tamper-evident ledger core for Folio.
//!
//! This crate is the heart of Folio. It provides:
//! - `Entry`: content-addressed, multiply-signed records with
//!   tamper-evident erasure and restoration
//! - `Page`: hash-chained batches sealed under a Merkle root
//! - `Ledger`: the pending → verified → sealed state machine
//! - `Receipt`: system-signed inclusion attestations
//! - `LedgerReader` / `LedgerWriter` repository boundaries
//! - `InMemoryRepository` implementation for tests and embedding

pub mod config;
pub mod entry;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod memory;
pub mod page;
pub mod providers;
pub mod receipt;
pub mod traits;

pub use config::LedgerConfig;
pub use entry::{Entry, EntryFields, EntrySignature, ErasureMarkers, DELETED_ENTRY};
pub use error::LedgerError;
pub use identity::SystemIdentity;
pub use ledger::{EntryState, Ledger, LedgerSummary};
pub use memory::InMemoryRepository;
pub use page::{compute_merkle_tree, Page};
pub use providers::CryptoProviders;
pub use receipt::Receipt;
pub use traits::{LedgerReader, LedgerRepository, LedgerWriter};
