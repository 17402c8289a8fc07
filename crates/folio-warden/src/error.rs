use folio_ledger::LedgerError;

/// Errors raised around an audit run. A tampered ledger is a report
/// verdict, never an error.
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    #[error("repository error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("invalid warden config: {0}")]
    InvalidConfig(String),

    #[error("warden task failed: {0}")]
    Task(String),
}
