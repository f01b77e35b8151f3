//! Record Store Adapters
//!
//! The spreadsheet-backed table is an external collaborator reached through
//! the `RecordStore` seam, so the duplicate cache and the service never care
//! whether rows live in Google Sheets or in a test vector. The relational
//! sink (`SqliteStore`) is a separate, independent store: it is written
//! best-effort alongside the sheet, never read for duplicate detection.

mod memory;
mod sheets;
mod sqlite;

pub use memory::MemoryStore;
pub use sheets::SheetsStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::record::SheetRow;

/// Append/read capability over the spreadsheet-backed table.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch every data row currently in the table.
    async fn fetch_rows(&self) -> Result<Vec<SheetRow>>;

    /// Append one row to the tail of the table.
    async fn append_row(&self, row: SheetRow) -> Result<()>;
}
