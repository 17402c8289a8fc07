use folio_types::EntryId;

use crate::config::LedgerConfig;
use crate::entry::Entry;
use crate::error::LedgerError;
use crate::page::Page;

/// Read boundary for persisted ledgers. The Warden audits through this alone.
pub trait LedgerReader: Send + Sync {
    fn read_ledger(&self, name: &str) -> Result<Option<LedgerConfig>, LedgerError>;

    fn ledger_names(&self) -> Result<Vec<String>, LedgerError>;

    fn read_page(&self, ledger: &str, number: u64) -> Result<Option<Page>, LedgerError>;

    fn page_count(&self, ledger: &str) -> Result<u64, LedgerError>;

    fn read_entry(&self, id: &EntryId) -> Result<Option<Entry>, LedgerError>;

    /// All pages of `ledger` in ascending number order.
    fn read_pages(&self, ledger: &str) -> Result<Vec<Page>, LedgerError> {
        let count = self.page_count(ledger)?;
        (0..count)
            .map(|number| {
                self.read_page(ledger, number)?.ok_or_else(|| {
                    LedgerError::Repository(format!("ledger {ledger} is missing page {number}"))
                })
            })
            .collect()
    }
}

/// Write boundary for persisted ledgers.
pub trait LedgerWriter: Send + Sync {
    fn create_ledger(&self, config: &LedgerConfig) -> Result<(), LedgerError>;

    /// Append a sealed page; `page.number` must equal the current page count.
    fn create_page(&self, page: &Page) -> Result<(), LedgerError>;

    fn create_entry(&self, entry: &Entry) -> Result<(), LedgerError>;

    fn update_entry(&self, entry: &Entry) -> Result<(), LedgerError>;

    /// Overwrite a stored page and its entries without any validation.
    ///
    /// Fault injection only: no ledger operation calls this.
    fn update_page_for_tamper_evidence_testing(&self, page: &Page) -> Result<(), LedgerError>;
}

/// A full repository: both boundaries behind one handle.
pub trait LedgerRepository: LedgerReader + LedgerWriter {}

impl<T: LedgerReader + LedgerWriter + ?Sized> LedgerRepository for T {}
