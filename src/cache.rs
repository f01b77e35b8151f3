//! Duplicate Detection Cache
//!
//! In-memory mirror of the spreadsheet table: the raw rows plus the set of
//! composite keys derived from them. Loaded lazily on the first duplicate
//! check, extended by one entry per successful write, and fully replaced on
//! an explicit admin refresh. Never pruned; it grows for the life of the
//! process.
//!
//! Consistency contract: every mirrored row has its key in the set. A cache
//! populated only by `append` (no full load yet) is a strict subset of the
//! real table — rows written by other processes or prior sessions stay
//! invisible until a full reload. That gap is deliberate: a cold cache must
//! not force a full sheet read before every first write.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::RegistrationError;
use crate::record::{Registration, SheetRow};
use crate::store::RecordStore;

/// Result of a full cache load, returned by the admin refresh endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub total_rows: usize,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct DuplicateCache {
    rows: Vec<SheetRow>,
    keys: HashSet<String>,
    loaded_at: Option<DateTime<Utc>>,
}

impl DuplicateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Load the full table once per process unless force-refreshed.
    ///
    /// A non-empty mirror is taken as loaded — including one populated only
    /// by appends. Load failures are not cached; the next call retries.
    pub async fn ensure_loaded(
        &mut self,
        store: &dyn RecordStore,
    ) -> Result<(), RegistrationError> {
        if !self.rows.is_empty() {
            return Ok(());
        }
        self.reload(store).await?;
        Ok(())
    }

    /// Whether an identical record is already in the mirror.
    pub async fn contains(
        &mut self,
        store: &dyn RecordStore,
        registration: &Registration,
    ) -> Result<bool, RegistrationError> {
        let target = registration.key();
        self.ensure_loaded(store).await?;

        let found = self.keys.contains(&target);
        debug!("🔍 búsqueda de duplicado {} → {}", target, found);
        Ok(found)
    }

    /// Record one row the caller already wrote to the backing store.
    ///
    /// Updates rows and keys only; `loaded_at` is untouched because this is
    /// not a full reload. Works on a never-loaded cache too, so writes alone
    /// can populate it.
    pub fn append(&mut self, row: SheetRow) {
        self.keys.insert(row.key());
        self.rows.push(row);
    }

    /// Unconditional full reload, for externally-triggered consistency
    /// repair (someone edited the sheet directly).
    pub async fn force_reload(
        &mut self,
        store: &dyn RecordStore,
    ) -> Result<CacheStatus, RegistrationError> {
        info!("🔄 Forzando recarga de caché desde la hoja de cálculo...");
        self.reload(store).await
    }

    async fn reload(&mut self, store: &dyn RecordStore) -> Result<CacheStatus, RegistrationError> {
        let rows = store
            .fetch_rows()
            .await
            .map_err(RegistrationError::StoreUnavailable)?;

        let keys: HashSet<String> = rows.iter().map(|r| r.key()).collect();
        let loaded_at = Utc::now();

        self.rows = rows;
        self.keys = keys;
        self.loaded_at = Some(loaded_at);

        info!("📖 Caché recargada: {} filas", self.rows.len());
        Ok(CacheStatus {
            total_rows: self.rows.len(),
            loaded_at,
        })
    }
}
