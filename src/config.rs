//! Environment Configuration
//!
//! Everything comes from environment variables (a `.env` file is honored via
//! `dotenv` in main). The allow-list ships with the field deployment's known
//! addresses and can be overridden wholesale with `ALLOWED_IPS`.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::PathBuf;

/// Source addresses authorized to submit registrations.
const DEFAULT_ALLOWED_IPS: &[&str] = &[
    "190.60.35.50",
    "186.102.115.133",
    "186.102.47.124",
    "186.102.51.69",
    "190.61.45.230",
    "192.168.10.23",
    "192.168.10.1",
    "186.102.62.30",
    "186.102.25.201",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub allowed_ips: HashSet<String>,
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub sheets_token: String,
    /// Relational sink is optional; absent path means sheet-only operation.
    pub sqlite_path: Option<PathBuf>,
    /// Shared secret for the cache-refresh endpoint. Absent disables it.
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(p) => p.parse().context("PORT no es un número de puerto")?,
            Err(_) => 8080,
        };

        let allowed_ips: HashSet<String> = match std::env::var("ALLOWED_IPS") {
            Ok(list) => list
                .split(',')
                .map(|ip| ip.trim().to_string())
                .filter(|ip| !ip.is_empty())
                .collect(),
            Err(_) => DEFAULT_ALLOWED_IPS.iter().map(|s| s.to_string()).collect(),
        };

        let spreadsheet_id = std::env::var("SHEETS_SPREADSHEET_ID")
            .context("ENV SHEETS_SPREADSHEET_ID no está definida")?;
        let sheet_name =
            std::env::var("SHEETS_SHEET_NAME").unwrap_or_else(|_| "Ingreso P1".to_string());
        let sheets_token = std::env::var("SHEETS_API_TOKEN")
            .context("ENV SHEETS_API_TOKEN no está definida")?;

        let sqlite_path = std::env::var("SQLITE_PATH").ok().map(PathBuf::from);
        let admin_token = std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty());

        Ok(Self {
            port,
            allowed_ips,
            spreadsheet_id,
            sheet_name,
            sheets_token,
            sqlite_path,
            admin_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allow_list_is_non_empty() {
        assert!(!DEFAULT_ALLOWED_IPS.is_empty());
        assert!(DEFAULT_ALLOWED_IPS.contains(&"192.168.10.1"));
    }
}
