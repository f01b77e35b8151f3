//! In-Memory Record Store
//!
//! Stand-in for the spreadsheet table in tests. Rows live in a mutex-guarded
//! vector; `push_external` simulates another process writing to the sheet
//! behind this process's back.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

use super::RecordStore;
use crate::record::SheetRow;

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<SheetRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<SheetRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    /// Append a row as if written by another process or session.
    pub fn push_external(&self, row: SheetRow) {
        self.rows.lock().unwrap().push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_rows(&self) -> Result<Vec<SheetRow>> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn append_row(&self, row: SheetRow) -> Result<()> {
        self.rows.lock().unwrap().push(row);
        Ok(())
    }
}
