//! Registration Record and Composite Key
//!
//! A record has no independently unique field. Identity is the composite of
//! all seven semantic fields, joined into a single key string. Two records
//! are "the same" iff their keys are equal.

use serde::{Deserialize, Serialize};

/// Delimiter for the composite key. Not expected to occur in field data.
const KEY_DELIMITER: &str = "|";

/// A validated harvest registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Registration {
    /// External scanner identifier. Not unique across time.
    pub id: String,
    pub variedad: String,
    /// Kept as the verbatim string: blocks may be decimal-valued ("1.1").
    pub bloque: String,
    pub tallos: u32,
    pub tamano: String,
    /// Calendar date as `YYYY-MM-DD`.
    pub fecha: String,
    pub etapa: Option<String>,
}

impl Registration {
    /// Composite identity key over the seven semantic fields.
    pub fn key(&self) -> String {
        let tallos = self.tallos.to_string();
        composite_key([
            self.id.as_str(),
            self.variedad.as_str(),
            self.bloque.as_str(),
            tallos.as_str(),
            self.tamano.as_str(),
            self.fecha.as_str(),
            self.etapa.as_deref().unwrap_or(""),
        ])
    }

    /// The sheet mirror row for this registration, stamped with the
    /// ISO write timestamp.
    pub fn to_sheet_row(&self, creado_iso: &str) -> SheetRow {
        SheetRow {
            id: self.id.clone(),
            variedad: self.variedad.clone(),
            bloque: self.bloque.clone(),
            tallos: self.tallos.to_string(),
            tamali: self.tamano.clone(),
            fecha: self.fecha.clone(),
            etapa: self.etapa.clone().unwrap_or_default(),
            creado_iso: creado_iso.to_string(),
        }
    }
}

/// One row of the spreadsheet-backed table, as stored.
///
/// All cells are strings; the sheet has no column types. The size column is
/// named `tamali` because that is the legacy header on the live sheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SheetRow {
    pub id: String,
    pub variedad: String,
    pub bloque: String,
    pub tallos: String,
    pub tamali: String,
    pub fecha: String,
    pub etapa: String,
    pub creado_iso: String,
}

impl SheetRow {
    /// Build from a raw cell vector as returned by the sheet read.
    /// Missing trailing cells become empty strings.
    pub fn from_cells(cells: &[String]) -> Self {
        let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
        Self {
            id: cell(0),
            variedad: cell(1),
            bloque: cell(2),
            tallos: cell(3),
            tamali: cell(4),
            fecha: cell(5),
            etapa: cell(6),
            creado_iso: cell(7),
        }
    }

    /// Cell vector in header order, for the append write.
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.variedad.clone(),
            self.bloque.clone(),
            self.tallos.clone(),
            self.tamali.clone(),
            self.fecha.clone(),
            self.etapa.clone(),
            self.creado_iso.clone(),
        ]
    }

    /// Composite key of the row's seven semantic cells. `creado_iso` is a
    /// write timestamp, not part of identity.
    pub fn key(&self) -> String {
        composite_key([
            self.id.as_str(),
            self.variedad.as_str(),
            self.bloque.as_str(),
            self.tallos.as_str(),
            self.tamali.as_str(),
            self.fecha.as_str(),
            self.etapa.as_str(),
        ])
    }
}

/// Join the seven semantic fields into the duplicate-detection key.
///
/// Each value is trimmed before joining; absent values are passed as empty
/// strings by the callers. No case-folding and no numeric canonicalization:
/// "1.10" and "1.1" are distinct keys. That is a documented limitation of
/// the scheme, not something to fix silently.
pub fn composite_key(fields: [&str; 7]) -> String {
    fields
        .iter()
        .map(|f| f.trim())
        .collect::<Vec<_>>()
        .join(KEY_DELIMITER)
}
