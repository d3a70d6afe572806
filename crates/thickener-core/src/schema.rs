//! Logical measurement fields and the workbook headers they map to.
//!
//! Conversions look columns up by [`Field`] through a [`ColumnSchema`]
//! instead of matching header text themselves. The defaults are the exact,
//! case-sensitive headers of the plant export template; a site whose export
//! differs can override individual names from a JSON file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Result, ThickenerError};
use crate::models::Dataset;

/// Derived column holding underflow percent solids.
pub const PERCENT_SOLIDS_COLUMN: &str = "Underflow_%S";

/// Derived column holding flocculant dosage in grams per tonne.
pub const FLOC_DOSAGE_COLUMN: &str = "Floc_Dosage_g/t";

/// All derived column names, in the order conversions append them.
pub const DERIVED_COLUMNS: &[&str] = &[PERCENT_SOLIDS_COLUMN, FLOC_DOSAGE_COLUMN];

// ── Field ─────────────────────────────────────────────────────────────────────

/// A measurement the engine knows by meaning rather than by header text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Underflow pulp density, kg/m³.
    UnderflowDensity,
    /// Solids feed rate, t/h.
    Tonnage,
    /// Flocculant solution flow, L/min.
    FlocculantLpm,
    /// Flocculant solution flow, m³/h.
    FlocculantM3h,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::UnderflowDensity,
        Field::Tonnage,
        Field::FlocculantLpm,
        Field::FlocculantM3h,
    ];
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Field::UnderflowDensity => "underflow density",
            Field::Tonnage => "tonnage",
            Field::FlocculantLpm => "flocculant flow (L/min)",
            Field::FlocculantM3h => "flocculant flow (m3/h)",
        };
        f.write_str(label)
    }
}

// ── ColumnSchema ──────────────────────────────────────────────────────────────

/// Expected header for each [`Field`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSchema {
    pub underflow_density: String,
    pub tonnage: String,
    pub flocculant_lpm: String,
    pub flocculant_m3h: String,
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self {
            underflow_density: "Underflow, kg/m3".to_string(),
            tonnage: "Tonnage, tph".to_string(),
            flocculant_lpm: "Flocculant, L/min".to_string(),
            flocculant_m3h: "Flocculant, m3/h".to_string(),
        }
    }
}

impl ColumnSchema {
    /// Header expected for `field`.
    pub fn column_name(&self, field: Field) -> &str {
        match field {
            Field::UnderflowDensity => &self.underflow_density,
            Field::Tonnage => &self.tonnage,
            Field::FlocculantLpm => &self.flocculant_lpm,
            Field::FlocculantM3h => &self.flocculant_m3h,
        }
    }

    /// Check which fields are present in `dataset`.
    pub fn resolve(&self, dataset: &Dataset) -> FieldResolution {
        let (found, missing): (Vec<Field>, Vec<Field>) = Field::ALL
            .into_iter()
            .partition(|&field| dataset.has_column(self.column_name(field)));
        FieldResolution { found, missing }
    }

    /// Load a schema override from a JSON file. Keys left out keep their
    /// default header; a blank header is rejected.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ThickenerError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let schema: Self = serde_json::from_str(&content)?;
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        match Field::ALL
            .into_iter()
            .find(|&field| self.column_name(field).trim().is_empty())
        {
            Some(field) => Err(ThickenerError::Config(format!(
                "column name for {field} is empty"
            ))),
            None => Ok(()),
        }
    }
}

// ── FieldResolution ───────────────────────────────────────────────────────────

/// Outcome of matching a schema against a dataset's headers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldResolution {
    pub found: Vec<Field>,
    pub missing: Vec<Field>,
}

impl FieldResolution {
    pub fn contains(&self, field: Field) -> bool {
        self.found.contains(&field)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
