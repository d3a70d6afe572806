use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Resample rule codes accepted on the command line.
pub const RESAMPLE_CODES: [&str; 7] = ["15min", "30min", "1H", "4H", "12H", "1D", "7D"];

/// Conversion option names accepted on the command line.
pub const CONVERSION_NAMES: [&str; 3] = ["density-to-solids", "floc-lpm-to-gpt", "floc-m3h-to-gpt"];

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Thickener operational data analysis
#[derive(Parser, Debug, Clone)]
#[command(
    name = "thickener",
    about = "Thickener operational data analysis",
    version
)]
pub struct Settings {
    /// Excel export to analyse (first sheet, data under a 6-row banner)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Project name used in report titles
    #[arg(long)]
    pub project_name: Option<String>,

    /// Solid specific gravity (> 1)
    #[arg(long)]
    pub specific_gravity: Option<f64>,

    /// Flocculant strength (> 0)
    #[arg(long)]
    pub flocculant_strength: Option<f64>,

    /// Unit conversion to apply (repeatable)
    #[arg(long = "convert", value_parser = CONVERSION_NAMES)]
    pub conversions: Vec<String>,

    /// Resample bucket size
    #[arg(long, value_parser = RESAMPLE_CODES)]
    pub resample: Option<String>,

    /// Measurement column used by the comparisons
    #[arg(long)]
    pub param: Option<String>,

    /// Before/after cut-off timestamp
    #[arg(long)]
    pub cutoff: Option<String>,

    /// Limit the before/after comparison to N days each side of the cut-off
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=366))]
    pub window_days: Option<u32>,

    /// First day of the compliance window
    #[arg(long)]
    pub start: Option<String>,

    /// Last day of the compliance window (inclusive)
    #[arg(long)]
    pub end: Option<String>,

    /// Compliance target value
    #[arg(long, allow_negative_numbers = true)]
    pub target: Option<f64>,

    /// Compliance tolerance (>= 0)
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Write the transformed dataset as records JSON
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Write the report snapshots as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// JSON file overriding expected column headers
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted project parameters saved to `~/.thickener/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_gravity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flocculant_strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resample: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    /// Uses `~/.thickener/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".thickener").join("last_used.json")
    }

    /// Load persisted params from the default path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load persisted params from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to the default path, creating parent directories
    /// if needed.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&Self::config_path())
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, fill unset project parameters from the last run,
    /// and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        // Build raw ArgMatches so we can query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());

        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::apply_overrides(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins. clap stores the arg id under the field name.
        if !is_arg_explicitly_set(&matches, "project_name") && settings.project_name.is_none() {
            settings.project_name = last.project_name;
        }
        if !is_arg_explicitly_set(&matches, "specific_gravity")
            && settings.specific_gravity.is_none()
        {
            settings.specific_gravity = last.specific_gravity;
        }
        if !is_arg_explicitly_set(&matches, "flocculant_strength")
            && settings.flocculant_strength.is_none()
        {
            settings.flocculant_strength = last.flocculant_strength;
        }
        if !is_arg_explicitly_set(&matches, "resample") && settings.resample.is_none() {
            settings.resample = last.resample.filter(|code| RESAMPLE_CODES.contains(&code.as_str()));
        }

        settings = Self::apply_overrides(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Apply the `--debug` flag.
    fn apply_overrides(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            project_name: s.project_name.clone(),
            specific_gravity: s.specific_gravity,
            flocculant_strength: s.flocculant_strength,
            resample: s.resample.clone(),
        }
    }
}

// ── Helper: check if an arg was explicitly set on the command line ─────────────

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
