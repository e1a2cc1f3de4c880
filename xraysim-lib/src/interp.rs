//! One-dimensional table interpolation.
//!
//! Every function clamps to the boundary values outside `[xp[0], xp[n-1]]`
//! and expects `xp` sorted ascending and non-empty. Tables may repeat an
//! abscissa (absorption edges): a query exactly at the repeated value returns
//! the first of the two ordinates, a query just above it interpolates from the
//! second.

fn bracket(x: f64, xp: &[f64]) -> Option<(usize, usize)> {
    debug_assert!(!xp.is_empty(), "interpolation table must not be empty");
    if x <= xp[0] || x >= xp[xp.len() - 1] {
        return None;
    }
    let idx = xp.partition_point(|&v| v < x);
    Some((idx - 1, idx))
}

fn clamped(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    if x <= xp[0] { fp[0] } else { fp[fp.len() - 1] }
}

/// Linear interpolation of a single value.
pub fn interp_one(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let Some((lo, hi)) = bracket(x, xp) else {
        return clamped(x, xp, fp);
    };
    if (xp[hi] - x).abs() < f64::EPSILON * xp[hi].abs() {
        return fp[hi];
    }
    let t = (x - xp[lo]) / (xp[hi] - xp[lo]);
    fp[lo] + t * (fp[hi] - fp[lo])
}

/// Linear interpolation (equivalent to `numpy.interp`).
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    x.iter().map(|&xi| interp_one(xi, xp, fp)).collect()
}

/// Log-log interpolation: straight lines between `(ln x, ln f)` points.
///
/// Used for photon mass attenuation tables, which are close to power laws
/// between absorption edges.
pub fn interp_loglog_one(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let Some((lo, hi)) = bracket(x, xp) else {
        return clamped(x, xp, fp);
    };
    if (xp[hi] - x).abs() < f64::EPSILON * xp[hi].abs() {
        return fp[hi];
    }
    let t = (x.ln() - xp[lo].ln()) / (xp[hi].ln() - xp[lo].ln());
    (fp[lo].ln() + t * (fp[hi].ln() - fp[lo].ln())).exp()
}

/// Log-linear interpolation: `ln f` varies linearly with `x`.
pub fn interp_loglinear_one(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let Some((lo, hi)) = bracket(x, xp) else {
        return clamped(x, xp, fp);
    };
    let t = (x - xp[lo]) / (xp[hi] - xp[lo]);
    (fp[lo].ln() + t * (fp[hi].ln() - fp[lo].ln())).exp()
}
