use thiserror::Error;

/// Per-file failures of the loop analysis.
///
/// Every variant is recoverable at the batch level: the offending file is
/// logged and skipped, the rest of the batch keeps going.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoopError {
    /// A row or column could not be interpreted as a finite number.
    #[error("line {line}, column {column}: '{token}' is not a number")]
    Parse {
        line: usize,
        column: usize,
        token: String,
    },

    /// The trace holds no samples at all.
    #[error("trace contains no samples")]
    EmptyInput,

    /// A line fit could not be performed.
    #[error("degenerate fit: {0}")]
    DegenerateFit(String),

    /// A field value cannot be placed on the rounding grid without overflow.
    #[error("field {field} cannot be rounded to {decimals} decimals")]
    FieldPrecision { field: f64, decimals: u32 },

    /// Too few upper-branch samples inside the [Ec, max(E)] window.
    #[error("only {found} point(s) in the fit window, need at least 2")]
    InsufficientPoints { found: usize },
}

impl LoopError {
    pub(crate) fn parse(line: usize, column: usize, token: impl Into<String>) -> Self {
        LoopError::Parse {
            line,
            column,
            token: token.into(),
        }
    }
}
