//! Foundation types for the Folio ledger.
//!
//! Every other Folio crate depends on `folio-types`.
//!
//! # Key Types
//!
//! - [`Digest`]: Algorithm-agnostic hash output with hex encoding
//! - [`EntryId`]: UUID v7 entry identifier
//! - [`TemporalAnchor`]: Hybrid Logical Clock timestamp
//! - [`HybridLogicalClock`]: Monotonic per-ledger timestamp source

pub mod clock;
pub mod digest;
pub mod entry_id;
pub mod error;
pub mod temporal;

pub use clock::HybridLogicalClock;
pub use digest::Digest;
pub use entry_id::EntryId;
pub use error::TypeError;
pub use temporal::TemporalAnchor;
