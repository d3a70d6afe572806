//! Unit conversions that append derived columns to a dataset.
//!
//! Each [`ConversionOption`] is evaluated independently: a missing column or
//! an invalid parameter skips that option with a message and never aborts
//! its siblings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::error::ThickenerError;
use crate::models::{Column, Dataset};
use crate::schema::{ColumnSchema, Field, DERIVED_COLUMNS, FLOC_DOSAGE_COLUMN, PERCENT_SOLIDS_COLUMN};

/// Density of water, kg/m³.
const WATER_DENSITY: f64 = 1000.0;

/// Litres per cubic metre divided by minutes per hour.
const M3H_TO_LPM: f64 = 1000.0 / 60.0;

// ── ConversionOption ──────────────────────────────────────────────────────────

/// A user-selectable unit conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionOption {
    /// Underflow density (kg/m³) to percent solids.
    #[serde(rename = "density-to-solids")]
    DensityToPercentSolids,
    /// Flocculant flow in L/min to dosage in g/t.
    #[serde(rename = "floc-lpm-to-gpt")]
    FlocculantLpmToDosage,
    /// Flocculant flow in m³/h to dosage in g/t.
    #[serde(rename = "floc-m3h-to-gpt")]
    FlocculantM3hToDosage,
}

impl ConversionOption {
    /// Order in which selected options are applied. Both flocculant options
    /// write the same column, so the m³/h result wins when both run.
    pub const EVALUATION_ORDER: [ConversionOption; 3] = [
        ConversionOption::DensityToPercentSolids,
        ConversionOption::FlocculantLpmToDosage,
        ConversionOption::FlocculantM3hToDosage,
    ];

    /// Command-line name of the option.
    pub fn name(self) -> &'static str {
        match self {
            ConversionOption::DensityToPercentSolids => "density-to-solids",
            ConversionOption::FlocculantLpmToDosage => "floc-lpm-to-gpt",
            ConversionOption::FlocculantM3hToDosage => "floc-m3h-to-gpt",
        }
    }

    /// Column the option writes.
    pub fn output_column(self) -> &'static str {
        match self {
            ConversionOption::DensityToPercentSolids => PERCENT_SOLIDS_COLUMN,
            ConversionOption::FlocculantLpmToDosage | ConversionOption::FlocculantM3hToDosage => {
                FLOC_DOSAGE_COLUMN
            }
        }
    }
}

impl fmt::Display for ConversionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConversionOption::DensityToPercentSolids => "Density → % solids",
            ConversionOption::FlocculantLpmToDosage => "Flocculant L/min → g/t",
            ConversionOption::FlocculantM3hToDosage => "Flocculant m³/h → g/t",
        };
        f.write_str(label)
    }
}

impl FromStr for ConversionOption {
    type Err = ThickenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::EVALUATION_ORDER
            .into_iter()
            .find(|opt| opt.name() == s.trim())
            .ok_or_else(|| {
                ThickenerError::InvalidParameter(format!("unknown conversion option: {s}"))
            })
    }
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// Why a selected option could not run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreconditionError {
    #[error("column \"{0}\" not found")]
    MissingColumn(String),

    #[error("{0} not provided")]
    MissingParameter(&'static str),

    #[error("specific gravity must be greater than 1 (got {0})")]
    InvalidSpecificGravity(f64),

    #[error("flocculant strength must be greater than 0 (got {0})")]
    InvalidFlocculantStrength(f64),

    #[error("{0}")]
    Rejected(String),
}

/// One line of feedback from [`UnitConverter::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionMessage {
    /// The option ran and wrote `column`; `computed` rows got a value.
    Applied {
        option: ConversionOption,
        column: &'static str,
        computed: usize,
    },
    /// The option was selected but its precondition failed.
    Skipped {
        option: ConversionOption,
        reason: PreconditionError,
    },
    /// Nothing was applied; the dataset is returned as given.
    Unchanged,
}

impl fmt::Display for ConversionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionMessage::Applied {
                option,
                column,
                computed,
            } => write!(f, "{option}: added {column} ({computed} values)"),
            ConversionMessage::Skipped { option, reason } => {
                write!(f, "{option}: skipped, {reason}")
            }
            ConversionMessage::Unchanged => write!(f, "No conversion applied; data unchanged"),
        }
    }
}

/// Result of a conversion request.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub dataset: Dataset,
    pub messages: Vec<ConversionMessage>,
}

impl ConversionOutcome {
    /// Number of options that wrote a column.
    pub fn applied_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| matches!(m, ConversionMessage::Applied { .. }))
            .count()
    }
}

/// Physical parameters entered alongside the upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionParams {
    /// Specific gravity of the dry solids (dimensionless, > 1).
    pub specific_gravity: Option<f64>,
    /// Flocculant solution strength (> 0).
    pub flocculant_strength: Option<f64>,
}

// ── Formulas ──────────────────────────────────────────────────────────────────

/// Percent solids by weight of a pulp of `density` kg/m³ whose dry solids
/// have the given specific gravity. Clamped to `[0, 100]`.
///
/// Returns `None` for a non-finite density or a gravity of 1 or less.
pub fn percent_solids(density: f64, specific_gravity: f64) -> Option<f64> {
    if !density.is_finite() || !specific_gravity.is_finite() || specific_gravity <= 1.0 {
        return None;
    }
    let solids_density = specific_gravity * WATER_DENSITY;
    let ws = (density - WATER_DENSITY) / (solids_density - WATER_DENSITY);
    Some((ws * 100.0).clamp(0.0, 100.0))
}

/// Flocculant dosage in g/t from a flow in L/min, a solution strength and a
/// solids feed rate in t/h.
///
/// A non-positive or non-finite tonnage yields `None` rather than a division
/// by zero.
pub fn flocculant_dosage(flow_lpm: f64, strength: f64, tonnage_tph: f64) -> Option<f64> {
    if !flow_lpm.is_finite() || !strength.is_finite() || !tonnage_tph.is_finite() {
        return None;
    }
    if tonnage_tph <= 0.0 {
        return None;
    }
    Some(flow_lpm * strength * 10.0 * 60.0 / tonnage_tph)
}

/// Convert a flow in m³/h to L/min.
pub fn m3h_to_lpm(flow_m3h: f64) -> f64 {
    flow_m3h * M3H_TO_LPM
}

// ── UnitConverter ─────────────────────────────────────────────────────────────

/// Applies conversion options using a column schema.
#[derive(Debug, Clone, Default)]
pub struct UnitConverter {
    schema: ColumnSchema,
}

impl UnitConverter {
    pub fn new(schema: ColumnSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    /// Apply the selected `options` to a copy of `dataset`.
    ///
    /// Options run in [`ConversionOption::EVALUATION_ORDER`] whatever order
    /// they are given in. When at least one option applies, derived columns
    /// already present in the input are dropped first so every result is
    /// computed from the source columns. When none applies the input is
    /// returned unchanged together with a [`ConversionMessage::Unchanged`].
    pub fn apply(
        &self,
        dataset: &Dataset,
        options: &[ConversionOption],
        params: ConversionParams,
    ) -> ConversionOutcome {
        if options.is_empty() {
            return ConversionOutcome {
                dataset: dataset.clone(),
                messages: vec![ConversionMessage::Unchanged],
            };
        }

        let mut working = dataset.clone();
        for name in DERIVED_COLUMNS {
            working.remove_column(name);
        }

        let mut messages = Vec::new();
        for option in ConversionOption::EVALUATION_ORDER {
            if !options.contains(&option) {
                continue;
            }
            let message = match self.compute(&working, option, params) {
                Ok(values) => {
                    let column = Column::numeric(option.output_column(), values);
                    let computed = column.values.iter().filter(|v| !v.is_missing()).count();
                    match working.set_column(column) {
                        Ok(()) => {
                            debug!(
                                "{}: wrote {} ({} of {} rows)",
                                option.name(),
                                option.output_column(),
                                computed,
                                working.len()
                            );
                            ConversionMessage::Applied {
                                option,
                                column: option.output_column(),
                                computed,
                            }
                        }
                        Err(err) => ConversionMessage::Skipped {
                            option,
                            reason: PreconditionError::Rejected(err.to_string()),
                        },
                    }
                }
                Err(reason) => {
                    debug!("{}: skipped, {}", option.name(), reason);
                    ConversionMessage::Skipped { option, reason }
                }
            };
            messages.push(message);
        }

        if !messages
            .iter()
            .any(|m| matches!(m, ConversionMessage::Applied { .. }))
        {
            messages.push(ConversionMessage::Unchanged);
            return ConversionOutcome {
                dataset: dataset.clone(),
                messages,
            };
        }

        ConversionOutcome {
            dataset: working,
            messages,
        }
    }

    /// Compute the derived values for one option, row by row.
    fn compute(
        &self,
        dataset: &Dataset,
        option: ConversionOption,
        params: ConversionParams,
    ) -> Result<Vec<Option<f64>>, PreconditionError> {
        match option {
            ConversionOption::DensityToPercentSolids => {
                let density = self.numbers(dataset, Field::UnderflowDensity)?;
                let sg = params
                    .specific_gravity
                    .ok_or(PreconditionError::MissingParameter("specific gravity"))?;
                if !sg.is_finite() || sg <= 1.0 {
                    return Err(PreconditionError::InvalidSpecificGravity(sg));
                }
                Ok(density
                    .into_iter()
                    .map(|d| percent_solids(d?, sg))
                    .collect())
            }
            ConversionOption::FlocculantLpmToDosage | ConversionOption::FlocculantM3hToDosage => {
                let lpm = option == ConversionOption::FlocculantLpmToDosage;
                let flow_field = if lpm {
                    Field::FlocculantLpm
                } else {
                    Field::FlocculantM3h
                };
                let to_lpm: fn(f64) -> f64 = if lpm { |q| q } else { m3h_to_lpm };
                let flow = self.numbers(dataset, flow_field)?;
                let tonnage = self.numbers(dataset, Field::Tonnage)?;
                let strength = params
                    .flocculant_strength
                    .ok_or(PreconditionError::MissingParameter("flocculant strength"))?;
                if !strength.is_finite() || strength <= 0.0 {
                    return Err(PreconditionError::InvalidFlocculantStrength(strength));
                }
                Ok(flow
                    .into_iter()
                    .zip(tonnage)
                    .map(|(q, tph)| flocculant_dosage(to_lpm(q?), strength, tph?))
                    .collect())
            }
        }
    }

    fn numbers(&self, dataset: &Dataset, field: Field) -> Result<Vec<Option<f64>>, PreconditionError> {
        let name = self.schema.column_name(field);
        dataset
            .column(name)
            .map(Column::numbers)
            .ok_or_else(|| PreconditionError::MissingColumn(name.to_string()))
    }
}

/// Apply `options` with the default column schema.
pub fn apply_conversions(
    dataset: &Dataset,
    options: &[ConversionOption],
    specific_gravity: Option<f64>,
    flocculant_strength: Option<f64>,
) -> ConversionOutcome {
    UnitConverter::default().apply(
        dataset,
        options,
        ConversionParams {
            specific_gravity,
            flocculant_strength,
        },
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
