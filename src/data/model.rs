use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sample – one measurement point
// ---------------------------------------------------------------------------

/// A single (E, D) measurement.
///
/// Serialized with the `E` / `D` column names used by the branch tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Applied electric field.
    #[serde(rename = "E")]
    pub e: f64,
    /// Electric displacement / polarization.
    #[serde(rename = "D")]
    pub d: f64,
}

impl Sample {
    pub fn new(e: f64, d: f64) -> Self {
        Sample { e, d }
    }
}

/// Samples in file order, not sorted by field.
pub type Trace = Vec<Sample>;

// ---------------------------------------------------------------------------
// Branch – one half of a hysteresis loop
// ---------------------------------------------------------------------------

/// Which extreme a branch keeps per field group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    /// Maximum D per group.
    Upper,
    /// Minimum D per group.
    Lower,
}

impl BranchKind {
    /// File name prefix of the persisted branch table.
    pub fn file_prefix(self) -> &'static str {
        match self {
            BranchKind::Upper => "upper_",
            BranchKind::Lower => "lower_",
        }
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchKind::Upper => write!(f, "upper"),
            BranchKind::Lower => write!(f, "lower"),
        }
    }
}

/// One sample per distinct rounded field value, ascending in E.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub kind: BranchKind,
    pub samples: Vec<Sample>,
}

impl Branch {
    pub fn new(kind: BranchKind, samples: Vec<Sample>) -> Self {
        Branch { kind, samples }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the branch is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest field value on the branch, `None` when empty.
    pub fn max_field(&self) -> Option<f64> {
        self.samples.iter().map(|s| s.e).reduce(f64::max)
    }
}

// ---------------------------------------------------------------------------
// Fit results
// ---------------------------------------------------------------------------

/// Ordinary least squares line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    pub slope: f64,
    pub intercept: f64,
}

impl FitResult {
    /// x where the fitted line crosses zero.
    pub fn x_intercept(&self) -> f64 {
        -self.intercept / self.slope
    }
}

/// One row of the summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopParameters {
    #[serde(rename = "Filename")]
    pub filename: String,
    /// Coercive field.
    #[serde(rename = "Ec")]
    pub ec: f64,
    /// Slope of the saturated upper-branch fit.
    #[serde(rename = "Slope")]
    pub slope: f64,
    /// Spontaneous polarization.
    #[serde(rename = "Ps")]
    pub ps: f64,
}

/// Column names of the summary table, in order.
pub const SUMMARY_HEADER: [&str; 4] = ["Filename", "Ec", "Slope", "Ps"];

/// Column names of a branch table, in order.
pub const BRANCH_HEADER: [&str; 2] = ["E", "D"];
