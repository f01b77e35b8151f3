//! Flower-Harvest Registration Service
//!
//! QR scanners in the field hit a single GET endpoint; submissions are
//! validated, checked against an in-memory duplicate cache mirroring the
//! Google Sheet, and written best-effort to SQLite and the sheet.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use flora_registry::config::Config;
use flora_registry::server::{run_server, AppState};
use flora_registry::service::RegistrationService;
use flora_registry::store::{RecordStore, SheetsStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    println!("\n{}", "═".repeat(60));
    println!("🌹 Sistema de Registro de Flores v0.2.0");
    println!("{}\n", "═".repeat(60));

    let config = Config::from_env()?;

    let sheet: Arc<dyn RecordStore> = Arc::new(SheetsStore::new(
        &config.spreadsheet_id,
        &config.sheet_name,
        &config.sheets_token,
    ));
    info!("📄 Hoja de cálculo configurada: {}", config.sheet_name);

    let db = match &config.sqlite_path {
        Some(path) => {
            let store = SqliteStore::new(path).await?;
            info!("💾 Tabla registros lista en {}", path.display());
            Some(store)
        }
        None => {
            info!("💾 Sin SQLITE_PATH: solo se escribirá la hoja de cálculo");
            None
        }
    };

    let service = Arc::new(RegistrationService::new(sheet, db));

    let state = AppState {
        service,
        allowed_ips: Arc::new(config.allowed_ips.clone()),
        admin_token: Arc::new(config.admin_token.clone()),
    };

    println!("🔐 IPs autorizadas: {}", config.allowed_ips.len());
    run_server(state, config.port).await
}
