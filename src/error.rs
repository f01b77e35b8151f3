//! Registration Error Taxonomy
//!
//! Every failure a request can hit, from validation through the store writes.
//! Nothing here is fatal to the process; the server renders each kind and
//! keeps serving.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrationError {
    /// A required request parameter is absent. Carries the name of the
    /// first missing field so the operator knows what the scanner dropped.
    #[error("falta el parámetro obligatorio: {0}")]
    MissingField(&'static str),

    /// `tallos` did not parse as a non-negative integer.
    #[error("el parámetro tallos debe ser numérico (recibido: '{0}')")]
    InvalidNumber(String),

    /// A field was present but empty after trimming.
    #[error("el parámetro {0} está vacío")]
    InvalidField(&'static str),

    /// The exact same record was already registered. Recoverable: the
    /// operator can re-submit with the bypass flag set.
    #[error("este código ya fue registrado antes")]
    DuplicateRecord,

    /// The relational insert succeeded but the spreadsheet mirror write
    /// failed. The record IS durably stored; the mirror and the duplicate
    /// cache were not updated.
    #[error("registro guardado en {stored}, pero falló la hoja de cálculo: {detail}")]
    PartialWrite {
        stored: &'static str,
        detail: String,
    },

    /// A backing store could not be read or written (network, auth, I/O).
    /// Never cached; the next request retries the operation.
    #[error("almacén no disponible: {0}")]
    StoreUnavailable(anyhow::Error),

    /// The source address is not on the allow-list.
    #[error("dirección IP no autorizada")]
    Unauthorized,
}

impl RegistrationError {
    /// Whether the caller can recover by re-submitting with `force=true`.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, RegistrationError::DuplicateRecord)
    }
}
