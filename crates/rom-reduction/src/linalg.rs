//! Dense linear-algebra kernels shared by the strategies.

use nalgebra::{DMatrix, DVector, Dyn, SVD, SymmetricEigen};
use rom_core::{ensure_finite, rank_threshold};
use tracing::debug;

use crate::error::{ReductionError, ReductionResult, ensure_shape};

/// Iteration cap for the iterative decompositions, scaled by matrix size.
fn max_iterations(rows: usize, cols: usize) -> usize {
    rows.max(cols).saturating_mul(100).max(1_000)
}

fn ensure_all_finite(m: &DMatrix<f64>, what: &'static str) -> ReductionResult<()> {
    for v in m.iter() {
        ensure_finite(*v, what)?;
    }
    Ok(())
}

/// SVD with finite input and a bounded iteration count.
fn bounded_svd(
    m: &DMatrix<f64>,
    vectors: bool,
    what: &'static str,
) -> ReductionResult<SVD<f64, Dyn, Dyn>> {
    ensure_all_finite(m, "SVD input entry")?;
    let (rows, cols) = m.shape();
    m.clone()
        .try_svd(vectors, vectors, f64::EPSILON * 5.0, max_iterations(rows, cols))
        .ok_or(ReductionError::Decomposition { what })
}

/// Symmetric eigendecomposition with finite input and a bounded iteration count.
pub(crate) fn symmetric_eigen(
    m: DMatrix<f64>,
    what: &'static str,
) -> ReductionResult<SymmetricEigen<f64, Dyn>> {
    ensure_all_finite(&m, "eigendecomposition input entry")?;
    let n = m.nrows();
    SymmetricEigen::try_new(m, f64::EPSILON, max_iterations(n, n))
        .ok_or(ReductionError::Decomposition { what })
}

/// How a rank-r singular value decomposition was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SvdMode {
    /// `r` equals the column count; the complete factorisation is used.
    Full,
    /// `r` is below the column count; only the leading `r` triplets are kept.
    Truncated,
}

/// Leading `r` singular triplets of a matrix, ordered by decreasing singular value.
#[derive(Clone, Debug)]
pub struct TruncatedSvd {
    /// Left singular vectors (`m x r`).
    pub u: DMatrix<f64>,
    /// Singular values (`r`).
    pub s: DVector<f64>,
    /// Right singular vectors as columns (`n x r`).
    pub v: DMatrix<f64>,
    pub mode: SvdMode,
}

/// Rank-r SVD of `x`.
///
/// Fails with [`ReductionError::RankExceedsSnapshotCount`] when `r` exceeds the
/// column count and [`ReductionError::RankExceedsStateDimension`] when it
/// exceeds the row count.
pub fn truncated_svd(x: &DMatrix<f64>, r: usize) -> ReductionResult<TruncatedSvd> {
    let (m, n) = x.shape();
    if r == 0 {
        return Err(ReductionError::InvalidRank { rank: r });
    }
    if r > n {
        return Err(ReductionError::RankExceedsSnapshotCount {
            rank: r,
            snapshots: n,
            nx: m,
        });
    }
    if r > m {
        return Err(ReductionError::RankExceedsStateDimension { rank: r, nx: m });
    }

    let mode = if r == n {
        SvdMode::Full
    } else {
        SvdMode::Truncated
    };
    debug!(rows = m, cols = n, rank = r, ?mode, "singular value decomposition");

    let svd = bounded_svd(x, true, "SVD did not converge")?;
    let u = svd.u.ok_or(ReductionError::Decomposition {
        what: "SVD did not return left singular vectors",
    })?;
    let v_t = svd.v_t.ok_or(ReductionError::Decomposition {
        what: "SVD did not return right singular vectors",
    })?;

    let s = &svd.singular_values;
    let mut order: Vec<usize> = (0..s.len()).collect();
    order.sort_by(|&i, &j| s[j].total_cmp(&s[i]));
    let keep = &order[..r];

    Ok(TruncatedSvd {
        u: u.select_columns(keep),
        s: DVector::from_iterator(r, keep.iter().map(|&i| s[i])),
        v: v_t.select_rows(keep).transpose(),
        mode,
    })
}

/// The `r` dominant left singular vectors of `x`.
pub fn left_singular_vectors(x: &DMatrix<f64>, r: usize) -> ReductionResult<DMatrix<f64>> {
    Ok(truncated_svd(x, r)?.u)
}

/// All singular values of `x` in decreasing order.
pub fn singular_values(x: &DMatrix<f64>) -> ReductionResult<DVector<f64>> {
    let svd = bounded_svd(x, false, "SVD did not converge")?;
    let mut s: Vec<f64> = svd.singular_values.iter().copied().collect();
    s.sort_by(|a, b| b.total_cmp(a));
    Ok(DVector::from_vec(s))
}

/// Nearest matrix with orthonormal columns (orthogonal Procrustes).
///
/// With `M = U·S·Zᵗ` the minimiser of `‖M − Q‖_F` over `QᵗQ = I` is `U·Zᵗ`.
pub fn closest_orthonormal(m: &DMatrix<f64>) -> ReductionResult<DMatrix<f64>> {
    let svd = bounded_svd(m, true, "Procrustes SVD did not converge")?;
    let u = svd.u.ok_or(ReductionError::Decomposition {
        what: "Procrustes SVD did not return left singular vectors",
    })?;
    let v_t = svd.v_t.ok_or(ReductionError::Decomposition {
        what: "Procrustes SVD did not return right singular vectors",
    })?;
    Ok(u * v_t)
}

/// Eigendecomposition of a weight matrix that must be symmetric positive
/// semi-definite within `tol`.
///
/// A non-symmetric input has a complex spectrum; its asymmetry is reported
/// as [`ReductionError::NumericalInstability`] when it exceeds `tol`. An
/// eigenvalue below `-tol` fails with [`ReductionError::NonPsdWeightMatrix`].
pub fn psd_eigen(theta: &DMatrix<f64>, tol: f64) -> ReductionResult<SymmetricEigen<f64, Dyn>> {
    let n = theta.nrows();
    ensure_shape("weight matrix", theta.shape(), (n, n))?;
    ensure_all_finite(theta, "weight matrix entry")?;

    let asymmetry = (theta - theta.transpose()).norm() / theta.norm().max(1.0);
    if asymmetry > tol {
        return Err(ReductionError::NumericalInstability {
            what: "weight matrix eigendecomposition (asymmetric input)",
            magnitude: asymmetry,
            tolerance: tol,
        });
    }

    let eigen = symmetric_eigen(
        (theta + theta.transpose()) * 0.5,
        "weight matrix eigendecomposition did not converge",
    )?;
    let min_eigenvalue = eigen.eigenvalues.min();
    if min_eigenvalue < -tol {
        return Err(ReductionError::NonPsdWeightMatrix {
            min_eigenvalue,
            tolerance: tol,
        });
    }
    Ok(eigen)
}

/// Principal square root of a symmetric positive semi-definite matrix.
///
/// Eigenvalues in `[-tol, 0)` and positive ones at round-off level are
/// clamped to zero.
pub fn psd_sqrt(theta: &DMatrix<f64>, tol: f64) -> ReductionResult<DMatrix<f64>> {
    let eigen = psd_eigen(theta, tol)?;
    let n = theta.nrows();
    let cutoff = rank_threshold(eigen.eigenvalues.max().max(0.0), n, n);
    let roots = eigen
        .eigenvalues
        .map(|lambda| if lambda > cutoff { lambda.sqrt() } else { 0.0 });
    let q = &eigen.eigenvectors;
    let root = q * DMatrix::from_diagonal(&roots) * q.transpose();

    if root.iter().any(|v| !v.is_finite()) {
        return Err(ReductionError::NumericalInstability {
            what: "weight matrix square root (non-finite entries)",
            magnitude: f64::INFINITY,
            tolerance: tol,
        });
    }
    Ok(root)
}

/// Invert a small Gram matrix, failing with [`ReductionError::DegenerateBasis`]
/// when it is numerically singular.
pub fn invert_gram(gram: &DMatrix<f64>, what: &str) -> ReductionResult<DMatrix<f64>> {
    let r = gram.nrows();
    ensure_shape("Gram matrix", gram.shape(), (r, r))?;

    let s = singular_values(gram)?;
    let s_max = s.max();
    let s_min = s.min();
    if !(s_min > rank_threshold(s_max, r, r)) {
        return Err(ReductionError::DegenerateBasis {
            what: format!("{what} is singular (smallest singular value {s_min:e})"),
            rank: r,
        });
    }
    gram.clone()
        .try_inverse()
        .ok_or_else(|| ReductionError::DegenerateBasis {
            what: format!("{what} could not be inverted"),
            rank: r,
        })
}

/// Deviation of `|aᵗ·b|` from the identity.
///
/// Zero when the columns of `a` and `b` agree up to sign, which is the only
/// freedom a singular vector has. Infinite for differently shaped inputs.
pub fn subspace_deviation(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    if a.shape() != b.shape() {
        return f64::INFINITY;
    }
    let r = a.ncols();
    let cross = (a.transpose() * b).abs();
    (cross - DMatrix::<f64>::identity(r, r)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rom_core::CoreError;

    fn example_x() -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 3, &[3.0, 2.0, 2.0, 2.0, 3.0, -2.0])
    }

    #[test]
    fn svd_known_values() {
        // Singular values of [[3,2,2],[2,3,-2]] are 5 and 3.
        let svd = truncated_svd(&example_x(), 2).unwrap();
        assert_eq!(svd.mode, SvdMode::Full);
        assert!((svd.s[0] - 5.0).abs() < 1e-12);
        assert!((svd.s[1] - 3.0).abs() < 1e-12);

        let expected_u = DMatrix::from_row_slice(
            2,
            2,
            &[
                1.0 / 2f64.sqrt(),
                1.0 / 2f64.sqrt(),
                1.0 / 2f64.sqrt(),
                -1.0 / 2f64.sqrt(),
            ],
        );
        assert!(subspace_deviation(&svd.u, &expected_u) < 1e-10);
    }

    #[test]
    fn truncated_reconstruction_is_best_rank_r() {
        let x = DMatrix::from_fn(6, 4, |i, j| ((i + 1) * (j + 2)) as f64 + (i as f64).sin());
        let svd = truncated_svd(&x, 2).unwrap();
        assert_eq!(svd.mode, SvdMode::Truncated);
        let approx = &svd.u * DMatrix::from_diagonal(&svd.s) * svd.v.transpose();
        let all = singular_values(&x).unwrap();
        let tail: f64 = all.iter().skip(2).map(|s| s * s).sum::<f64>().sqrt();
        assert!(((x - approx).norm() - tail).abs() < 1e-9);
    }

    #[test]
    fn rank_checks() {
        let x = example_x();
        assert!(matches!(
            truncated_svd(&x, 4),
            Err(ReductionError::RankExceedsSnapshotCount { rank: 4, snapshots: 3, .. })
        ));
        assert!(matches!(
            truncated_svd(&x, 3),
            Err(ReductionError::RankExceedsStateDimension { rank: 3, nx: 2 })
        ));
        assert!(matches!(truncated_svd(&x, 0), Err(ReductionError::InvalidRank { .. })));
    }

    #[test]
    fn procrustes_yields_orthonormal_columns() {
        let m = DMatrix::from_fn(5, 3, |i, j| 1.0 + (i * 3 + j) as f64 * 0.37);
        let q = closest_orthonormal(&m).unwrap();
        assert_eq!(q.shape(), (5, 3));
        let gram = q.transpose() * &q;
        assert!((gram - DMatrix::<f64>::identity(3, 3)).norm() < 1e-10);
    }

    #[test]
    fn psd_sqrt_squares_back() {
        let c = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 0.0, 0.0, 1.0, 3.0]);
        let theta = c.transpose() * &c;
        let root = psd_sqrt(&theta, 1e-6).unwrap();
        assert!((&root * &root - &theta).norm() < 1e-9);
    }

    #[test]
    fn psd_sqrt_rejects_negative_eigenvalue() {
        let theta = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, -1.0, 2.0]));
        let err = psd_sqrt(&theta, 1e-6).unwrap_err();
        match err {
            ReductionError::NonPsdWeightMatrix { min_eigenvalue, .. } => {
                assert!((min_eigenvalue + 1.0).abs() < 1e-12)
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn psd_sqrt_tolerates_roundoff_negatives() {
        let theta = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, -1e-9]));
        let root = psd_sqrt(&theta, 1e-6).unwrap();
        assert!(root[(1, 1)].abs() < 1e-12);
        assert!((root[(0, 0)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn psd_sqrt_rejects_asymmetric() {
        let theta = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]);
        assert!(matches!(
            psd_sqrt(&theta, 1e-6),
            Err(ReductionError::NumericalInstability { .. })
        ));
    }

    #[test]
    fn decompositions_reject_non_finite_input() {
        let mut x = example_x();
        x[(1, 2)] = f64::NAN;
        let non_finite =
            |r: ReductionResult<_>| matches!(r, Err(ReductionError::Core(CoreError::NonFinite { .. })));
        assert!(non_finite(truncated_svd(&x, 1).map(|_| ())));
        assert!(non_finite(singular_values(&x).map(|_| ())));
        assert!(non_finite(closest_orthonormal(&x).map(|_| ())));

        let mut theta = DMatrix::<f64>::identity(3, 3);
        theta[(0, 0)] = f64::INFINITY;
        assert!(non_finite(psd_sqrt(&theta, 1e-6).map(|_| ())));
    }

    #[test]
    fn iteration_cap_scales_with_size() {
        assert_eq!(max_iterations(2, 3), 1_000);
        assert_eq!(max_iterations(50, 20), 5_000);
        assert_eq!(max_iterations(usize::MAX, 1), usize::MAX);
    }

    #[test]
    fn invert_gram_detects_singularity() {
        let gram = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(matches!(
            invert_gram(&gram, "test gram"),
            Err(ReductionError::DegenerateBasis { rank: 2, .. })
        ));
        let inv = invert_gram(&(DMatrix::identity(2, 2) * 2.0), "test gram").unwrap();
        assert!((inv[(0, 0)] - 0.5).abs() < 1e-15);
    }
}
