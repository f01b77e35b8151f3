//! Google Sheets Adapter
//!
//! Talks to the Sheets REST API (v4) values endpoints: one full-range read
//! for cache loads, one append per registration. Errors are surfaced to the
//! caller; nothing here retries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::RecordStore;
use crate::record::SheetRow;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Adapter over one named sheet inside one spreadsheet document.
pub struct SheetsStore {
    client: Client,
    spreadsheet_id: String,
    sheet_name: String,
    /// OAuth bearer token for the spreadsheets scope.
    token: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsStore {
    pub fn new(spreadsheet_id: &str, sheet_name: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_name: sheet_name.to_string(),
            token: token.to_string(),
        }
    }

    fn values_url(&self, suffix: &str) -> String {
        format!(
            "{}/{}/values/{}{}",
            SHEETS_API_BASE, self.spreadsheet_id, self.sheet_name, suffix
        )
    }
}

#[async_trait]
impl RecordStore for SheetsStore {
    async fn fetch_rows(&self) -> Result<Vec<SheetRow>> {
        debug!("Leyendo hoja completa: {}", self.sheet_name);

        let response = self
            .client
            .get(self.values_url(""))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("no se pudo leer la hoja de cálculo")?
            .error_for_status()
            .context("la API de Sheets rechazó la lectura")?;

        let range: ValueRange = response
            .json()
            .await
            .context("respuesta de Sheets no es JSON válido")?;

        // First row is the header (id, variedad, bloque, tallos, tamali,
        // fecha, etapa, creado_iso); data starts at row two.
        let rows: Vec<SheetRow> = range
            .values
            .iter()
            .skip(1)
            .map(|cells| SheetRow::from_cells(cells))
            .collect();

        info!("📖 Hoja leída: {} filas", rows.len());
        Ok(rows)
    }

    async fn append_row(&self, row: SheetRow) -> Result<()> {
        let body = json!({ "values": [row.to_cells()] });

        self.client
            .post(self.values_url(":append?valueInputOption=RAW"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("no se pudo escribir en la hoja de cálculo")?
            .error_for_status()
            .context("la API de Sheets rechazó la escritura")?;

        info!("✅ Fila escrita en Sheets: {}", row.key());
        Ok(())
    }
}
