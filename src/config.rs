//! Run configuration for both pipelines.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::fit::DEFAULT_NEAR_ZERO_POINTS;
use crate::analysis::split::DEFAULT_FIELD_DECIMALS;
use crate::data::loader::TraceColumns;

/// Looked up in the working directory at startup.
pub const DEFAULT_CONFIG_FILE: &str = "ferroloop.json";

/// Top-level configuration.  Every field has a default, so a config file
/// only needs to list what differs from the lab setup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transform: TransformConfig,
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Parse a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Like [`Config::load`], but a missing file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Using configuration from {}", path.display());
            Self::load(path)
        } else {
            info!("No {} found, using built-in defaults", path.display());
            Ok(Self::default())
        }
    }
}

// ---------------------------------------------------------------------------
// Raw-signal transformer
// ---------------------------------------------------------------------------

/// Linear map `gain * v + offset` applied to a voltage column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rescale {
    pub gain: f64,
    #[serde(default)]
    pub offset: f64,
}

impl Rescale {
    pub fn apply(&self, v: f64) -> f64 {
        self.gain * v + self.offset
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub enabled: bool,
    pub input_dir: PathBuf,
    /// Glob matched against file names in `input_dir`.
    pub pattern: String,
    pub output_dir: PathBuf,
    /// Instrument header lines before the data rows.
    pub skip_lines: usize,
    pub delimiter: char,
    pub volt1: Rescale,
    pub volt2: Rescale,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            input_dir: PathBuf::from("data"),
            pattern: "ALL*.csv".to_string(),
            output_dir: PathBuf::from("data/output"),
            skip_lines: 25,
            delimiter: ',',
            // (10 * V1) / 5e-4 * 1e-5
            volt1: Rescale {
                gain: 10.0 / 5e-4 * 1e-5,
                offset: 0.0,
            },
            // (1e-7 * V2) / 2e-5 * 1e2
            volt2: Rescale {
                gain: 1e-7 / 2e-5 * 1e2,
                offset: 0.0,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Loop analysis
// ---------------------------------------------------------------------------

/// Where the fitting stage takes its branches from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitSource {
    /// Split each trace and fit in memory.
    #[default]
    Traces,
    /// Refit previously written `upper_*` / `lower_*` tables.
    Branches,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub enabled: bool,
    pub source: FitSource,
    pub input_dir: PathBuf,
    /// Glob matched against file names in `input_dir`.
    pub pattern: String,
    /// Where branch tables are written (and read back from).
    pub branch_dir: PathBuf,
    pub write_branches: bool,
    pub summary_path: PathBuf,
    /// Decimal digits of E used for grouping.
    pub field_decimals: u32,
    /// Lower-branch points nearest D = 0 used for the Ec fit.
    pub near_zero_points: usize,
    pub columns: TraceColumns,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: FitSource::Traces,
            input_dir: PathBuf::from("data/output"),
            pattern: "ALL*.dat".to_string(),
            branch_dir: PathBuf::from("data/output/BTO"),
            write_branches: true,
            summary_path: PathBuf::from("data/output/BTO_Ps_Ec_results.csv"),
            field_decimals: DEFAULT_FIELD_DECIMALS,
            near_zero_points: DEFAULT_NEAR_ZERO_POINTS,
            columns: TraceColumns::default(),
        }
    }
}
