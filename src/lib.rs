//! Flower-Harvest Registration Service
//!
//! A small HTTP endpoint for QR-scanned harvest registrations with:
//! - Composite-key duplicate detection over an in-memory sheet mirror
//! - Best-effort dual write (SQLite + Google Sheets)
//! - Source-address allow-listing
//! - Admin-triggered cache refresh

pub mod cache;
pub mod config;
pub mod error;
pub mod record;
pub mod server;
pub mod service;
pub mod store;

// Re-exports for convenience
pub use cache::DuplicateCache;
pub use error::RegistrationError;
pub use record::{Registration, SheetRow};
pub use service::RegistrationService;
pub use store::RecordStore;
