//! Batch drivers: run a pipeline over every matching file in a directory.
//!
//! One bad file never aborts a batch.  Per-file failures are logged with the
//! file name and recorded in the report; only directory-level problems
//! (unreadable input, uncreatable output, unwritable summary) are returned as
//! errors.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{error, info, warn};

use crate::analysis::fit::{LoopFit, extract};
use crate::analysis::split::split;
use crate::config::{AnalysisConfig, FitSource, TransformConfig};
use crate::data::loader::{load_branch, load_trace};
use crate::data::model::{BranchKind, LoopParameters};
use crate::data::writer::{write_branch, write_summary};
use crate::error::LoopError;
use crate::transform::transform_file;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// A file left out of a batch, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a loop-analysis batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// One row per successfully fitted file, in processing order.
    pub rows: Vec<LoopParameters>,
    pub skipped: Vec<SkippedFile>,
}

/// Outcome of a raw-signal transform batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

// ---------------------------------------------------------------------------
// File discovery
// ---------------------------------------------------------------------------

/// Files in `dir` whose name matches the glob `pattern`, sorted by name.
pub fn discover_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = glob::Pattern::new(pattern)
        .with_context(|| format!("invalid file pattern '{pattern}'"))?;

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading input directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        let path = entry.path();
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| matcher.matches(name));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))
}

// ---------------------------------------------------------------------------
// Raw-signal transform
// ---------------------------------------------------------------------------

/// Rescale every matching raw export into the output directory.
pub fn run_transform(cfg: &TransformConfig) -> Result<TransformReport> {
    let files = discover_files(&cfg.input_dir, &cfg.pattern)?;
    create_dir(&cfg.output_dir)?;

    let mut report = TransformReport::default();
    for path in files {
        let name = file_name(&path);
        info!("Transforming: {name}");
        match transform_file(&path, &cfg.output_dir, cfg) {
            Ok(out) => {
                info!("{} saved to {}", file_name(&out), cfg.output_dir.display());
                report.written.push(out);
            }
            Err(err) => {
                error!("Error in file {name}: {err:#}");
                report.skipped.push(SkippedFile {
                    path,
                    reason: format!("{err:#}"),
                });
            }
        }
    }

    info!(
        "Transform finished: {} written, {} skipped",
        report.written.len(),
        report.skipped.len()
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Loop analysis
// ---------------------------------------------------------------------------

/// Run the loop analysis from the configured source and write the summary.
pub fn run_analysis(cfg: &AnalysisConfig) -> Result<BatchReport> {
    match cfg.source {
        FitSource::Traces => analyse_traces(cfg),
        FitSource::Branches => fit_branch_dir(cfg),
    }
}

/// Split and fit every matching trace in `input_dir`.
///
/// Branch tables go to `branch_dir` when `write_branches` is set.  The summary
/// is written to `summary_path`, header only when nothing could be fitted.
pub fn analyse_traces(cfg: &AnalysisConfig) -> Result<BatchReport> {
    let files = discover_files(&cfg.input_dir, &cfg.pattern)?;
    if cfg.write_branches {
        create_dir(&cfg.branch_dir)?;
    }

    let mut report = BatchReport::default();
    for path in files {
        let name = file_name(&path);
        info!("Processing: {name}");
        let outcome = analyse_trace_file(&path, cfg);
        record(&mut report, path, name, outcome);
    }

    finish(cfg, report)
}

fn analyse_trace_file(path: &Path, cfg: &AnalysisConfig) -> Result<LoopFit> {
    let trace = load_trace(path, &cfg.columns)?;
    let (upper, lower) = split(&trace, cfg.field_decimals)?;

    if cfg.write_branches {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("no usable file name in {}", path.display()))?;
        for branch in [&upper, &lower] {
            let out = cfg
                .branch_dir
                .join(format!("{}{stem}.csv", branch.kind.file_prefix()));
            write_branch(&out, branch)?;
        }
    }

    Ok(extract(&upper, &lower, cfg.near_zero_points)?)
}

/// Refit from persisted branch tables.
///
/// Every `upper_<name>.csv` in `branch_dir` whose `<name>.csv` matches the
/// configured pattern's stem is paired with `lower_<name>.csv`.  A missing
/// partner is a per-file error.
pub fn fit_branch_dir(cfg: &AnalysisConfig) -> Result<BatchReport> {
    let stem_pattern = Path::new(&cfg.pattern)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("*");
    let upper_pattern = format!("{}{stem_pattern}.csv", BranchKind::Upper.file_prefix());
    let files = discover_files(&cfg.branch_dir, &upper_pattern)?;

    let mut report = BatchReport::default();
    for upper_path in files {
        let name = file_name(&upper_path);
        info!("Fitting: {name}");
        let outcome = fit_branch_pair(&upper_path, &name, cfg);
        record(&mut report, upper_path, name, outcome);
    }

    finish(cfg, report)
}

fn fit_branch_pair(upper_path: &Path, name: &str, cfg: &AnalysisConfig) -> Result<LoopFit> {
    let Some(rest) = name.strip_prefix(BranchKind::Upper.file_prefix()) else {
        bail!("{name} is not an upper branch table");
    };
    let lower_path =
        upper_path.with_file_name(format!("{}{rest}", BranchKind::Lower.file_prefix()));
    if !lower_path.is_file() {
        bail!("missing lower branch {}", lower_path.display());
    }

    let upper = load_branch(upper_path, BranchKind::Upper)?;
    let lower = load_branch(&lower_path, BranchKind::Lower)?;
    Ok(extract(&upper, &lower, cfg.near_zero_points)?)
}

/// Log one file's outcome and file it into the report.
fn record(report: &mut BatchReport, path: PathBuf, name: String, outcome: Result<LoopFit>) {
    match outcome {
        Ok(fit) => {
            info!(
                "  {name}: Ec = {:.4e}, slope = {:.4e}, Ps = {:.4e}",
                fit.ec, fit.slope, fit.ps
            );
            report.rows.push(LoopParameters {
                filename: name,
                ec: fit.ec,
                slope: fit.slope,
                ps: fit.ps,
            });
        }
        Err(err) => {
            match err.downcast_ref::<LoopError>() {
                Some(LoopError::InsufficientPoints { .. }) => {
                    warn!("  SKIP {name}: {err:#}; check Ec against the field range");
                }
                _ => error!("  SKIP {name}: {err:#}"),
            }
            report.skipped.push(SkippedFile {
                path,
                reason: format!("{err:#}"),
            });
        }
    }
}

fn finish(cfg: &AnalysisConfig, report: BatchReport) -> Result<BatchReport> {
    if let Some(parent) = cfg.summary_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent)?;
    }
    write_summary(&cfg.summary_path, &report.rows)?;
    info!(
        "Saved {} ({} fitted, {} skipped)",
        cfg.summary_path.display(),
        report.rows.len(),
        report.skipped.len()
    );
    Ok(report)
}
