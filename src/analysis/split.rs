use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::data::model::{Branch, BranchKind, Sample};
use crate::error::LoopError;

/// Default number of decimal digits kept when grouping by field.
pub const DEFAULT_FIELD_DECIMALS: u32 = 5;

// ---------------------------------------------------------------------------
// Field grouping key
// ---------------------------------------------------------------------------

/// Field `e` rounded to `decimals` digits, in grid units.
///
/// Rounds half away from zero (`f64::round`), so `0.5` and `-0.5` at zero
/// decimals land on `1` and `-1`.  The key stays a float: large fields at
/// fine precision would saturate an integer grid index and merge groups.
/// Fails when `e * 10^decimals` overflows to infinity.
pub fn field_key(e: f64, decimals: u32) -> Result<f64, LoopError> {
    let exponent = i32::try_from(decimals).unwrap_or(i32::MAX);
    let scaled = (e * 10f64.powi(exponent)).round();
    if !scaled.is_finite() {
        return Err(LoopError::FieldPrecision { field: e, decimals });
    }
    // -0.0 and 0.0 are one group
    Ok(scaled + 0.0)
}

/// Rounded field of one group.
#[derive(Debug, Clone, Copy)]
struct GroupKey(f64);

// -- Manual Eq/Ord (total_cmp) so GroupKey can index a BTreeMap --

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

// ---------------------------------------------------------------------------
// Loop splitting
// ---------------------------------------------------------------------------

/// Running extremes of one field group.
struct Extremes {
    upper: Sample,
    lower: Sample,
}

/// Split a hysteresis trace into its upper and lower branches.
///
/// Samples are grouped by field rounded to `decimals` digits.  Per group the
/// upper branch keeps the largest D and the lower branch the smallest; when
/// several samples tie, the first one in trace order is kept.  Both branches
/// come out ascending in field and carry the original, unrounded values.
pub fn split(trace: &[Sample], decimals: u32) -> Result<(Branch, Branch), LoopError> {
    if trace.is_empty() {
        return Err(LoopError::EmptyInput);
    }

    let mut groups: BTreeMap<GroupKey, Extremes> = BTreeMap::new();
    for &sample in trace {
        let key = GroupKey(field_key(sample.e, decimals)?);
        groups
            .entry(key)
            .and_modify(|g| {
                if sample.d > g.upper.d {
                    g.upper = sample;
                }
                if sample.d < g.lower.d {
                    g.lower = sample;
                }
            })
            .or_insert(Extremes {
                upper: sample,
                lower: sample,
            });
    }

    let (upper, lower): (Vec<Sample>, Vec<Sample>) =
        groups.into_values().map(|g| (g.upper, g.lower)).unzip();

    Ok((
        Branch::new(BranchKind::Upper, upper),
        Branch::new(BranchKind::Lower, lower),
    ))
}
