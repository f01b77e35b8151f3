//! SQLite Relational Sink
//!
//! Stores each registration in a `registros` table with a composite
//! uniqueness constraint. Inserts use conflict-ignore semantics: a colliding
//! row is silently dropped. This is a weak backstop behind the duplicate
//! cache, not a substitute for it.

use anyhow::Result;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::info;

use crate::record::Registration;

#[derive(Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let path_clone = path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&path_clone)?;

            // bloque is declared REAL: SQLite's column affinity converts
            // decimal-valued strings ("1.1") to numbers on insert.
            conn.execute(
                r#"
                CREATE TABLE IF NOT EXISTS registros (
                    id TEXT NOT NULL,
                    variedad TEXT NOT NULL,
                    bloque REAL NOT NULL,
                    tallos INTEGER NOT NULL,
                    tamano TEXT NOT NULL,
                    fecha TEXT NOT NULL,
                    etapa TEXT
                );
                "#,
                [],
            )?;

            // SQLite treats NULLs as distinct inside UNIQUE constraints, so
            // two identical rows without an etapa would never collide. The
            // uniqueness constraint is an expression index instead, with
            // NULL etapa collapsed to the empty string — the same
            // normalization the composite key uses.
            conn.execute(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_registros_identidad
                 ON registros(id, variedad, bloque, tallos, tamano, fecha, COALESCE(etapa, ''));",
                [],
            )?;

            conn.execute("CREATE INDEX IF NOT EXISTS idx_fecha ON registros(fecha);", [])?;

            Ok::<_, anyhow::Error>(())
        })
        .await??;

        Ok(Self { db_path: path })
    }

    /// Insert one registration with conflict-ignore semantics.
    pub async fn insert(&self, registration: &Registration) -> Result<()> {
        let path = self.db_path.clone();
        let reg = registration.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;

            let inserted = conn.execute(
                "INSERT OR IGNORE INTO registros (id, variedad, bloque, tallos, tamano, fecha, etapa)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    &reg.id,
                    &reg.variedad,
                    &reg.bloque,
                    reg.tallos,
                    &reg.tamano,
                    &reg.fecha,
                    reg.etapa.as_deref(),
                ],
            )?;

            if inserted == 0 {
                info!("Fila duplicada ignorada por la tabla registros: {}", reg.key());
            }

            Ok::<_, anyhow::Error>(())
        })
        .await?
    }

    /// Total stored rows.
    pub async fn count(&self) -> Result<i64> {
        let path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&path)?;
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM registros", [], |row| row.get(0))?;
            Ok::<_, anyhow::Error>(count)
        })
        .await?
    }
}
