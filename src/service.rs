//! Registration Service
//!
//! The linear validate → duplicate-check → write sequence behind the HTTP
//! surface. No retries and no partial-success recovery: the two sinks are
//! written independently, best-effort, and a spreadsheet failure after a
//! successful relational insert is reported as exactly that.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::{CacheStatus, DuplicateCache};
use crate::error::RegistrationError;
use crate::record::Registration;
use crate::store::{RecordStore, SqliteStore};

/// Raw request fields as they arrive from the query string, after alias
/// resolution (`tamali` → `tamano`) at the input boundary.
#[derive(Debug, Default, Clone)]
pub struct RawSubmission {
    pub id: Option<String>,
    pub variedad: Option<String>,
    pub bloque: Option<String>,
    pub tallos: Option<String>,
    pub tamano: Option<String>,
    pub fecha: Option<String>,
    pub etapa: Option<String>,
}

pub struct RegistrationService {
    sheet: Arc<dyn RecordStore>,
    db: Option<SqliteStore>,
    cache: Mutex<DuplicateCache>,
}

impl RegistrationService {
    pub fn new(sheet: Arc<dyn RecordStore>, db: Option<SqliteStore>) -> Self {
        Self {
            sheet,
            db,
            cache: Mutex::new(DuplicateCache::new()),
        }
    }

    /// Validate, check for duplicates (unless bypassed), then write through
    /// to the configured stores. Returns the stored registration.
    pub async fn register(
        &self,
        submission: RawSubmission,
        bypass_duplicate_check: bool,
    ) -> Result<Registration, RegistrationError> {
        let registration = validate(submission)?;

        if !bypass_duplicate_check {
            // Lock held for the membership check only. Two interleaved
            // requests for the same key can both pass here; accepted for
            // this low-concurrency field use, and the relational table's
            // uniqueness constraint is a weak backstop.
            let mut cache = self.cache.lock().await;
            if cache.contains(self.sheet.as_ref(), &registration).await? {
                info!("⚠️ Registro duplicado rechazado: {}", registration.key());
                return Err(RegistrationError::DuplicateRecord);
            }
        }

        // Relational sink first, when configured. Independent of the sheet
        // write; no rollback on a later failure.
        let mut stored_in_db = false;
        if let Some(db) = &self.db {
            db.insert(&registration)
                .await
                .map_err(RegistrationError::StoreUnavailable)?;
            stored_in_db = true;
        }

        let row = registration.to_sheet_row(&Utc::now().to_rfc3339());
        match self.sheet.append_row(row.clone()).await {
            Ok(()) => {
                self.cache.lock().await.append(row);
                info!("✅ Registrado correctamente: {}", registration.key());
                Ok(registration)
            }
            Err(e) if stored_in_db => {
                warn!("Escritura parcial: registros OK, Sheets falló: {e:#}");
                Err(RegistrationError::PartialWrite {
                    stored: "la tabla registros",
                    detail: format!("{e:#}"),
                })
            }
            Err(e) => Err(RegistrationError::StoreUnavailable(e)),
        }
    }

    /// Admin escape hatch: unconditionally rebuild the duplicate cache from
    /// the backing table.
    pub async fn refresh_cache(&self) -> Result<CacheStatus, RegistrationError> {
        self.cache
            .lock()
            .await
            .force_reload(self.sheet.as_ref())
            .await
    }
}

fn validate(sub: RawSubmission) -> Result<Registration, RegistrationError> {
    let id = require(sub.id, "id")?;
    let variedad = require(sub.variedad, "variedad")?;
    let bloque_raw = require(sub.bloque, "bloque")?;
    let tallos_raw = require(sub.tallos, "tallos")?;
    let tamano = require(sub.tamano, "tamano")?;

    let tallos: u32 = tallos_raw
        .trim()
        .parse()
        .map_err(|_| RegistrationError::InvalidNumber(tallos_raw.clone()))?;

    let bloque = bloque_raw.trim().to_string();
    if bloque.is_empty() {
        return Err(RegistrationError::InvalidField("bloque"));
    }

    // Provided dates pass through verbatim; absent ones default to today.
    let fecha = match sub.fecha.filter(|f| !f.is_empty()) {
        Some(f) => f,
        None => Utc::now().format("%Y-%m-%d").to_string(),
    };

    Ok(Registration {
        id,
        variedad,
        bloque,
        tallos,
        tamano,
        fecha,
        etapa: sub.etapa.filter(|e| !e.trim().is_empty()),
    })
}

fn require(value: Option<String>, name: &'static str) -> Result<String, RegistrationError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RegistrationError::MissingField(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use crate::record::SheetRow;
    use tempfile::NamedTempFile;

    fn submission() -> RawSubmission {
        RawSubmission {
            id: Some("1".to_string()),
            variedad: Some("Freedom".to_string()),
            bloque: Some("6".to_string()),
            tallos: Some("20".to_string()),
            tamano: Some("Largo".to_string()),
            fecha: Some("2026-08-30".to_string()),
            etapa: None,
        }
    }

    fn sheet_only() -> (Arc<MemoryStore>, RegistrationService) {
        let store = Arc::new(MemoryStore::new());
        let service = RegistrationService::new(store.clone(), None);
        (store, service)
    }

    struct FailingSheet;

    #[async_trait]
    impl RecordStore for FailingSheet {
        async fn fetch_rows(&self) -> anyhow::Result<Vec<SheetRow>> {
            Ok(Vec::new())
        }

        async fn append_row(&self, _row: SheetRow) -> anyhow::Result<()> {
            Err(anyhow!("cuota de la API agotada"))
        }
    }

    #[tokio::test]
    async fn second_submission_is_a_duplicate() {
        let (store, service) = sheet_only();

        let stored = service.register(submission(), false).await.unwrap();
        assert_eq!(stored.variedad, "Freedom");
        assert_eq!(stored.bloque, "6");
        assert_eq!(stored.tallos, 20);

        let err = service.register(submission(), false).await.unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn bypass_forces_a_second_row() {
        let (store, service) = sheet_only();

        service.register(submission(), false).await.unwrap();
        service.register(submission(), true).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn missing_fields_are_named_in_order() {
        let (_store, service) = sheet_only();

        let mut sub = submission();
        sub.id = None;
        match service.register(sub, false).await.unwrap_err() {
            RegistrationError::MissingField(name) => assert_eq!(name, "id"),
            other => panic!("unexpected: {other}"),
        }

        let mut sub = submission();
        sub.variedad = Some(String::new());
        match service.register(sub, false).await.unwrap_err() {
            RegistrationError::MissingField(name) => assert_eq!(name, "variedad"),
            other => panic!("unexpected: {other}"),
        }

        let mut sub = submission();
        sub.tamano = None;
        match service.register(sub, false).await.unwrap_err() {
            RegistrationError::MissingField(name) => assert_eq!(name, "tamano"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn non_numeric_tallos_is_rejected() {
        let (store, service) = sheet_only();

        let mut sub = submission();
        sub.tallos = Some("veinte".to_string());
        let err = service.register(sub, false).await.unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidNumber(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn whitespace_bloque_is_invalid() {
        let (_store, service) = sheet_only();

        let mut sub = submission();
        sub.bloque = Some("   ".to_string());
        let err = service.register(sub, false).await.unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidField("bloque")));
    }

    #[tokio::test]
    async fn missing_fecha_defaults_to_today() {
        let (_store, service) = sheet_only();

        let mut sub = submission();
        sub.fecha = None;
        let stored = service.register(sub, false).await.unwrap();
        assert_eq!(stored.fecha, Utc::now().format("%Y-%m-%d").to_string());
    }

    #[tokio::test]
    async fn dual_write_hits_both_stores() -> anyhow::Result<()> {
        let temp = NamedTempFile::new()?;
        let db = SqliteStore::new(temp.path()).await?;
        let sheet = Arc::new(MemoryStore::new());
        let service = RegistrationService::new(sheet.clone(), Some(db.clone()));

        service.register(submission(), false).await.unwrap();
        assert_eq!(sheet.len(), 1);
        assert_eq!(db.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn sheet_failure_after_db_write_is_partial() -> anyhow::Result<()> {
        let temp = NamedTempFile::new()?;
        let db = SqliteStore::new(temp.path()).await?;
        let service = RegistrationService::new(Arc::new(FailingSheet), Some(db.clone()));

        let err = service.register(submission(), false).await.unwrap_err();
        assert!(matches!(err, RegistrationError::PartialWrite { .. }));
        // The record survived in the relational sink despite the error.
        assert_eq!(db.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_reports_row_count() {
        let (store, service) = sheet_only();

        service.register(submission(), false).await.unwrap();
        store.push_external(
            Registration {
                id: "99".to_string(),
                variedad: "Vendela".to_string(),
                bloque: "2".to_string(),
                tallos: 10,
                tamano: "Corto".to_string(),
                fecha: "2026-08-29".to_string(),
                etapa: None,
            }
            .to_sheet_row("2026-08-29T08:00:00Z"),
        );

        let status = service.refresh_cache().await.unwrap();
        assert_eq!(status.total_rows, 2);
    }
}
