use std::fmt;

use folio_types::EntryId;
use serde::{Deserialize, Serialize};

/// Verdict of one ledger audit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditResult {
    Ok,
    Tampered,
    /// The ledger could not be read or recomputed.
    Error,
}

impl fmt::Display for AuditResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Tampered => write!(f, "TAMPERED"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// The field whose recomputed or expected value disagreed with storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditField {
    LedgerName,
    PageNumber,
    PageTimestamp,
    PreviousHash,
    MerkleRoot,
    PageHash,
    EntryLedgerName,
    EntryPageNumber,
    EntryTimestamp,
    EntryHash,
    ErasureMarker,
    /// Signer set does not match the senders one-to-one.
    Signatures,
    /// A signature fails cryptographic verification.
    Signature,
}

impl fmt::Display for AuditField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LedgerName => "ledger_name",
            Self::PageNumber => "page_number",
            Self::PageTimestamp => "page_timestamp",
            Self::PreviousHash => "previous_hash",
            Self::MerkleRoot => "merkle_root",
            Self::PageHash => "page_hash",
            Self::EntryLedgerName => "entry_ledger_name",
            Self::EntryPageNumber => "entry_page_number",
            Self::EntryTimestamp => "entry_timestamp",
            Self::EntryHash => "entry_hash",
            Self::ErasureMarker => "erasure_marker",
            Self::Signatures => "signatures",
            Self::Signature => "signature",
        };
        f.write_str(name)
    }
}

/// Where and how the first discrepancy showed up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TamperContext {
    /// Position of the page in the stored sequence.
    pub page: u64,
    pub entry: Option<EntryId>,
    pub field: AuditField,
    pub expected: String,
    pub actual: String,
    pub message: String,
}

impl TamperContext {
    pub fn new(
        page: u64,
        entry: Option<EntryId>,
        field: AuditField,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        let (expected, actual) = (expected.into(), actual.into());
        let location = match entry {
            Some(id) => format!("page {page}, entry {id}"),
            None => format!("page {page}"),
        };
        let message = format!("{location}: {field} mismatch (expected {expected}, found {actual})");
        Self {
            page,
            entry,
            field,
            expected,
            actual,
            message,
        }
    }
}

/// Outcome of auditing one ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardenReport {
    pub ledger: String,
    pub first_page: Option<u64>,
    pub last_page: Option<u64>,
    pub result: AuditResult,
    pub context: Option<TamperContext>,
    /// Set when `result` is `Error`.
    pub error: Option<String>,
}

impl WardenReport {
    pub fn ok(ledger: impl Into<String>, first_page: Option<u64>, last_page: Option<u64>) -> Self {
        Self {
            ledger: ledger.into(),
            first_page,
            last_page,
            result: AuditResult::Ok,
            context: None,
            error: None,
        }
    }

    pub fn tampered(
        ledger: impl Into<String>,
        first_page: Option<u64>,
        last_page: Option<u64>,
        context: TamperContext,
    ) -> Self {
        Self {
            ledger: ledger.into(),
            first_page,
            last_page,
            result: AuditResult::Tampered,
            context: Some(context),
            error: None,
        }
    }

    pub fn failed(ledger: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ledger: ledger.into(),
            first_page: None,
            last_page: None,
            result: AuditResult::Error,
            context: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result == AuditResult::Ok
    }

    pub fn is_tampered(&self) -> bool {
        self.result == AuditResult::Tampered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_message_names_location_and_values() {
        let id = EntryId::new();
        let ctx = TamperContext::new(3, Some(id), AuditField::EntryHash, "aa", "bb");
        assert_eq!(
            ctx.message,
            format!("page 3, entry {id}: entry_hash mismatch (expected aa, found bb)")
        );
        let ctx = TamperContext::new(0, None, AuditField::PageHash, "aa", "bb");
        assert!(ctx.message.starts_with("page 0: page_hash"));
    }

    #[test]
    fn verdicts_serialize_in_upper_case() {
        let report = WardenReport::failed("audit", "ledger not found: audit");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["result"], "ERROR");
        assert!(!report.is_ok());
        assert!(!report.is_tampered());
        assert_eq!(AuditResult::Tampered.to_string(), "TAMPERED");
    }
}
