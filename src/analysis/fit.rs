use log::debug;

use crate::data::model::{Branch, FitResult, Sample};
use crate::error::LoopError;

/// Default number of lower-branch samples nearest D = 0 used for Ec.
pub const DEFAULT_NEAR_ZERO_POINTS: usize = 16;

// ---------------------------------------------------------------------------
// Least squares
// ---------------------------------------------------------------------------

/// Ordinary least squares fit of `D = slope * E + intercept`.
///
/// Uses centered sums, which keeps the result exact on collinear data with a
/// large field offset.  Fails with fewer than two points or when every E is
/// identical.
pub fn line_fit(points: &[Sample]) -> Result<FitResult, LoopError> {
    if points.len() < 2 {
        return Err(LoopError::DegenerateFit(format!(
            "{} point(s), need at least 2",
            points.len()
        )));
    }

    let n = points.len() as f64;
    let mean_e = points.iter().map(|p| p.e).sum::<f64>() / n;
    let mean_d = points.iter().map(|p| p.d).sum::<f64>() / n;

    let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), p| {
        let dx = p.e - mean_e;
        (sxx + dx * dx, sxy + dx * (p.d - mean_d))
    });

    if sxx == 0.0 {
        return Err(LoopError::DegenerateFit(
            "all points share the same field".to_string(),
        ));
    }

    let slope = sxy / sxx;
    Ok(FitResult {
        slope,
        intercept: mean_d - slope * mean_e,
    })
}

// ---------------------------------------------------------------------------
// Coercive field
// ---------------------------------------------------------------------------

/// Coercive field from the lower branch.
///
/// Takes the `n_near_zero` samples with the smallest |D| (all of them when
/// the branch is shorter), fits a line through them and returns its zero
/// crossing.  Equal |D| keep branch order.
pub fn fit_ec(lower: &Branch, n_near_zero: usize) -> Result<f64, LoopError> {
    if lower.len() < n_near_zero {
        debug!(
            "lower branch has {} points, fitting Ec with all of them instead of {}",
            lower.len(),
            n_near_zero
        );
    }

    let mut ranked = lower.samples.clone();
    ranked.sort_by(|a, b| a.d.abs().total_cmp(&b.d.abs()));
    ranked.truncate(n_near_zero);

    let fit = line_fit(&ranked)?;
    if fit.slope == 0.0 {
        return Err(LoopError::DegenerateFit(
            "zero slope near D = 0, no field crossing".to_string(),
        ));
    }
    Ok(fit.x_intercept())
}

// ---------------------------------------------------------------------------
// Spontaneous polarization
// ---------------------------------------------------------------------------

/// Saturated-region fit of the upper branch: returns `(slope, ps)`.
///
/// Only samples with `ec <= E <= max(E)` take part; `ps` is the fitted line
/// at E = 0.
pub fn fit_ps(upper: &Branch, ec: f64) -> Result<(f64, f64), LoopError> {
    let e_max = upper
        .max_field()
        .ok_or(LoopError::InsufficientPoints { found: 0 })?;

    let window: Vec<Sample> = upper
        .samples
        .iter()
        .copied()
        .filter(|s| s.e >= ec && s.e <= e_max)
        .collect();

    if window.len() < 2 {
        return Err(LoopError::InsufficientPoints {
            found: window.len(),
        });
    }

    let fit = line_fit(&window)?;
    Ok((fit.slope, fit.intercept))
}

// ---------------------------------------------------------------------------
// Both parameters
// ---------------------------------------------------------------------------

/// Loop parameters of one trace, before they are tied to a file name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopFit {
    pub ec: f64,
    pub slope: f64,
    pub ps: f64,
}

/// Ec from `lower`, then slope and Ps from `upper` above that Ec.
pub fn extract(upper: &Branch, lower: &Branch, n_near_zero: usize) -> Result<LoopFit, LoopError> {
    let ec = fit_ec(lower, n_near_zero)?;
    let (slope, ps) = fit_ps(upper, ec)?;
    Ok(LoopFit { ec, slope, ps })
}
