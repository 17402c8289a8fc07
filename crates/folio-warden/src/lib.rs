//! Independent integrity auditor for Folio ledgers.
//!
//! The [`LedgerWarden`] reads persisted ledgers through
//! [`folio_ledger::LedgerReader`], recomputes the hash chain, Merkle roots,
//! entry hashes and signatures, and reports the first discrepancy per ledger
//! as a [`WardenReport`]. [`WardenSchedule`] runs it on a tokio interval.

pub mod config;
pub mod error;
pub mod report;
pub mod schedule;
pub mod warden;

pub use config::WardenConfig;
pub use error::WardenError;
pub use report::{AuditField, AuditResult, TamperContext, WardenReport};
pub use schedule::{AuditRound, WardenSchedule};
pub use warden::LedgerWarden;
