use crate::{CoreError, CoreResult};

/// Floating point type used throughout system
pub type Real = f64;

/// Default tolerance for positive semi-definiteness and symmetry checks.
pub const DEFAULT_PSD_TOLERANCE: Real = 1e-6;

pub fn ensure_finite(v: Real, what: &'static str) -> CoreResult<Real> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Rank threshold for singular values: anything at or below this is treated as zero.
///
/// Uses the usual `max(m, n) * eps * s_max` cutoff.
pub fn rank_threshold(s_max: Real, rows: usize, cols: usize) -> Real {
    s_max * rows.max(cols) as Real * Real::EPSILON
}
