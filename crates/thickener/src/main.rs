mod bootstrap;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Duration;
use thickener_core::conversions::{ConversionOption, ConversionParams, UnitConverter};
use thickener_core::formatting::{compliance_kpis, format_before_after, format_compliance};
use thickener_core::models::{ComplianceOutcome, Dataset};
use thickener_core::report::Report;
use thickener_core::schema::ColumnSchema;
use thickener_core::settings::Settings;
use thickener_core::time_utils::{format_timestamp, parse_date, parse_timestamp_strict};
use thickener_data::aggregator::{resample, BucketSize};
use thickener_data::analysis::{compare_before_after, compare_before_after_windowed};
use thickener_data::compliance::{target_compliance_on_dates, DateWindow};
use thickener_data::reader::parse_upload_with_schema;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Thickener v{} starting", env!("CARGO_PKG_VERSION"));

    let Some(file) = settings.file.as_deref() else {
        tracing::info!("No workbook given; nothing to analyse");
        println!("Nothing to analyse. Pass --file <PATH> with a historian export.");
        return Ok(());
    };

    let schema = match settings.schema.as_deref() {
        Some(path) => ColumnSchema::load_from(path)?,
        None => ColumnSchema::default(),
    };

    let dataset = load_dataset(file, &schema)?;
    let dataset = transform(&settings, schema, &dataset)?;

    let mut report = Report::new(settings.project_name.as_deref().unwrap_or_default());
    run_comparisons(&settings, &dataset, &mut report)?;

    if let Some(path) = settings.output.as_deref() {
        write_records(&dataset, path)?;
        println!("Dataset written to {}", path.display());
    }

    if let Some(path) = settings.report.as_deref() {
        if report.is_empty() {
            tracing::warn!("Report has no items; writing an empty report");
        }
        let target = report_path(path, &report);
        report
            .save_to(&target)
            .with_context(|| format!("Failed to write report {}", target.display()))?;
        println!("Report written to {}", target.display());
    }

    Ok(())
}

// ── Pipeline steps ─────────────────────────────────────────────────────────────

fn load_dataset(file: &Path, schema: &ColumnSchema) -> Result<Dataset> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let upload = parse_upload_with_schema(&bytes, schema)?;
    let dataset = upload.dataset;

    tracing::info!(
        "Loaded {} rows x {} columns from {}",
        dataset.len(),
        dataset.width(),
        file.display()
    );
    for field in &upload.fields.missing {
        tracing::warn!(
            "Column '{}' ({}) not found; conversions that need it will be skipped",
            schema.column_name(*field),
            field
        );
    }

    let invalid = dataset.len() - dataset.valid_row_count();
    if invalid > 0 {
        tracing::warn!("{} rows have an unreadable timestamp", invalid);
    }

    println!(
        "Loaded {} rows from {} ({} columns)",
        dataset.len(),
        file.display(),
        dataset.width()
    );
    if let Some((first, last)) = dataset.time_range() {
        println!(
            "Time range: {} to {}",
            format_timestamp(first),
            format_timestamp(last)
        );
    }

    Ok(dataset)
}

/// Apply the requested conversions, then resample.
fn transform(settings: &Settings, schema: ColumnSchema, dataset: &Dataset) -> Result<Dataset> {
    let options = settings
        .conversions
        .iter()
        .map(|name| name.parse::<ConversionOption>())
        .collect::<thickener_core::Result<Vec<_>>>()?;

    let params = ConversionParams {
        specific_gravity: settings.specific_gravity,
        flocculant_strength: settings.flocculant_strength,
    };

    let converted = if options.is_empty() {
        dataset.clone()
    } else {
        let outcome = UnitConverter::new(schema).apply(dataset, &options, params);
        for message in &outcome.messages {
            println!("{message}");
        }
        outcome.dataset
    };

    let bucket = settings
        .resample
        .as_deref()
        .map(str::parse::<BucketSize>)
        .transpose()?;

    let resampled = resample(&converted, bucket);
    if let Some(bucket) = bucket {
        println!(
            "Resampled to {}: {} rows",
            bucket.label(),
            resampled.len()
        );
    }
    Ok(resampled)
}

fn run_comparisons(settings: &Settings, dataset: &Dataset, report: &mut Report) -> Result<()> {
    let wants_before_after = settings.cutoff.is_some();
    let wants_compliance = settings.start.is_some()
        || settings.end.is_some()
        || settings.target.is_some()
        || settings.tolerance.is_some();

    let Some(column) = settings.param.as_deref() else {
        if wants_before_after || wants_compliance {
            bail!(
                "--param is required for comparisons; numeric columns: {}",
                dataset.numeric_column_names().join(", ")
            );
        }
        return Ok(());
    };

    if let Some(cutoff) = settings.cutoff.as_deref() {
        let cutoff = parse_timestamp_strict(cutoff)?;
        let result = match settings.window_days {
            Some(days) => compare_before_after_windowed(
                dataset,
                column,
                cutoff,
                Duration::days(i64::from(days)),
            )?,
            None => compare_before_after(dataset, column, cutoff)?,
        };

        println!("Before vs After: {column} (cut-off {})", format_timestamp(cutoff));
        println!("  {}", format_before_after(&result));
        if let Some(delta) = result.delta_mean() {
            println!("  Change in mean: {delta:+.2}");
        }
        report.add_before_after(&result);
    }

    if wants_compliance {
        let (Some(start), Some(end), Some(target)) =
            (settings.start.as_deref(), settings.end.as_deref(), settings.target)
        else {
            bail!("--start, --end and --target are all required for target compliance");
        };
        let window = DateWindow::inclusive(parse_date(start)?, parse_date(end)?);
        let tolerance = settings.tolerance.unwrap_or(0.0);

        match target_compliance_on_dates(dataset, column, window, target, tolerance)? {
            ComplianceOutcome::Report(result) => {
                println!("Target compliance: {column}");
                println!("  {}", format_compliance(&result));
                for (label, value) in compliance_kpis(&result) {
                    println!("  {label:<16} {value}");
                }
                report.add_compliance(&result);
            }
            ComplianceOutcome::NoDataInWindow => {
                println!("Target compliance: {column}: no data in the selected window");
            }
        }
    }

    Ok(())
}

// ── Output ─────────────────────────────────────────────────────────────────────

fn write_records(dataset: &Dataset, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&dataset.to_records())?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!("Wrote {} records to {}", dataset.len(), path.display());
    Ok(())
}

/// A directory (existing, or given with a trailing separator) receives the
/// report under its default file name.
fn report_path(path: &Path, report: &Report) -> PathBuf {
    let as_dir = path.is_dir() || path.as_os_str().to_string_lossy().ends_with(['/', '\\']);
    if as_dir {
        path.join(report.file_name())
    } else if path.as_os_str().is_empty() {
        bootstrap::reports_dir().join(report.file_name())
    } else {
        path.to_path_buf()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
