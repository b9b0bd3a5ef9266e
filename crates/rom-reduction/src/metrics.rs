//! Error metrics of a reduced model against its full-order system.

use nalgebra::{DMatrix, DVector};

use crate::basis::ReductionBasis;
use crate::error::{ReductionError, ReductionResult, ensure_len};
use crate::linalg::invert_gram;
use crate::projector::reduce;
use crate::system::{FullOrderSystem, SnapshotMatrix};

/// Biorthogonal projector `V·Wᵗ` (`nx x nx`).
pub fn projector(w: &DMatrix<f64>, v: &DMatrix<f64>) -> DMatrix<f64> {
    v * w.transpose()
}

/// Oblique projector `V·(Wᵗ·V)⁻¹·Wᵗ`, exact even when `Wᵗ·V ≠ I`.
pub fn oblique_projector(w: &DMatrix<f64>, v: &DMatrix<f64>) -> ReductionResult<DMatrix<f64>> {
    let inv = invert_gram(&(w.transpose() * v), "WᵗV")?;
    Ok(v * inv * w.transpose())
}

fn check_pair(nx: usize, w: &DMatrix<f64>, v: &DMatrix<f64>) -> ReductionResult<()> {
    ensure_len("V rows", v.nrows(), nx)?;
    ensure_len("W rows", w.nrows(), nx)?;
    ensure_len("W columns", w.ncols(), v.ncols())
}

fn sum_column_norms(m: &DMatrix<f64>) -> f64 {
    m.column_iter().map(|col| col.norm()).sum()
}

/// `Σ_i ‖C·(I − V·Wᵗ)·x_i‖₂` over the snapshot columns.
pub fn orthogonal_error(
    x: &SnapshotMatrix,
    c: &DMatrix<f64>,
    w: &DMatrix<f64>,
    v: &DMatrix<f64>,
) -> ReductionResult<f64> {
    ensure_len("C columns", c.ncols(), x.nx())?;
    check_pair(x.nx(), w, v)?;
    let x = x.matrix();
    let residual = c * x - (c * v) * (w.transpose() * x);
    Ok(sum_column_norms(&residual))
}

/// [`orthogonal_error`] with `C = I`.
pub fn unweighted_orthogonal_error(
    x: &SnapshotMatrix,
    w: &DMatrix<f64>,
    v: &DMatrix<f64>,
) -> ReductionResult<f64> {
    check_pair(x.nx(), w, v)?;
    let x = x.matrix();
    let residual = x - v * (w.transpose() * x);
    Ok(sum_column_norms(&residual))
}

/// `Σ_i ‖C·(I − V·(Wᵗ·V)⁻¹·Wᵗ)·x_i‖₂`.
pub fn oblique_orthogonal_error(
    x: &SnapshotMatrix,
    c: &DMatrix<f64>,
    w: &DMatrix<f64>,
    v: &DMatrix<f64>,
) -> ReductionResult<f64> {
    ensure_len("C columns", c.ncols(), x.nx())?;
    check_pair(x.nx(), w, v)?;
    let inv = invert_gram(&(w.transpose() * v), "WᵗV")?;
    let x = x.matrix();
    let residual = c * x - (c * v) * (inv * (w.transpose() * x));
    Ok(sum_column_norms(&residual))
}

/// Multi-step forecasting error of the reduced model.
///
/// Starting from `q₀ = Wᵗ·x₀`, the reduced system is driven by the same
/// controls that produced the snapshot trajectory `x` (column `t` of `u`
/// moves `x_t` to `x_{t+1}`), accumulating `Σ_t ‖C·(x_t − V·q_t)‖₂` for
/// `t = 1..ns-1`.
pub fn reduction_error(
    x: &SnapshotMatrix,
    u: &DMatrix<f64>,
    basis: &ReductionBasis,
    system: &FullOrderSystem,
) -> ReductionResult<f64> {
    ensure_len("snapshot rows", x.nx(), system.nx())?;
    ensure_len("U rows", u.nrows(), system.nu())?;
    let steps = x.ns() - 1;
    if u.ncols() < steps {
        return Err(ReductionError::DimensionMismatch {
            what: "U columns",
            expected: format!("at least {steps}"),
            actual: u.ncols().to_string(),
        });
    }

    let rom = reduce(system, basis)?;
    let (v, w) = (basis.v(), basis.w());
    let x = x.matrix();
    let c = system.c();

    let mut q: DVector<f64> = w.transpose() * x.column(0);
    let mut error = 0.0;
    for t in 1..=steps {
        q = rom.step(&q, &u.column(t - 1).into_owned());
        let deviation = x.column(t).into_owned() - v * &q;
        error += (c * deviation).norm();
    }
    Ok(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_x() -> SnapshotMatrix {
        SnapshotMatrix::new(DMatrix::from_row_slice(
            2,
            3,
            &[3.0, 2.0, 2.0, 2.0, 3.0, -2.0],
        ))
        .unwrap()
    }

    #[test]
    fn full_identity_basis_has_zero_error() {
        let v = DMatrix::identity(2, 2);
        let e = orthogonal_error(&example_x(), &DMatrix::identity(2, 2), &v, &v).unwrap();
        assert!(e.abs() < 1e-14);
    }

    #[test]
    fn one_dimensional_projection_error() {
        // Project onto e1: residuals are the second-row entries.
        let v = DMatrix::identity(2, 1);
        let e = unweighted_orthogonal_error(&example_x(), &v, &v).unwrap();
        assert!((e - 7.0).abs() < 1e-12);
    }

    #[test]
    fn oblique_matches_biorthogonal_when_normalized() {
        let v = DMatrix::from_column_slice(2, 1, &[1.0, 1.0]);
        let w = DMatrix::from_column_slice(2, 1, &[0.5, 0.5]);
        let c = DMatrix::identity(2, 2);
        let a = orthogonal_error(&example_x(), &c, &w, &v).unwrap();
        let b = oblique_orthogonal_error(&example_x(), &c, &w, &v).unwrap();
        assert!((a - b).abs() < 1e-12);

        let p = oblique_projector(&w, &v).unwrap();
        assert!((&p * &p - &p).norm() < 1e-12);
        assert!((projector(&w, &v) - p).norm() < 1e-12);
    }

    #[test]
    fn oblique_rescales_unnormalized_pair() {
        let v = DMatrix::from_column_slice(2, 1, &[1.0, 1.0]);
        let w = DMatrix::from_column_slice(2, 1, &[2.0, 2.0]);
        let c = DMatrix::identity(2, 2);
        let biorth = orthogonal_error(&example_x(), &c, &w, &v).unwrap();
        let oblique = oblique_orthogonal_error(&example_x(), &c, &w, &(&v * 0.25)).unwrap();
        let normalized = orthogonal_error(&example_x(), &c, &(&w * 0.25), &v).unwrap();
        assert!((oblique - normalized).abs() < 1e-12);
        assert!(biorth > normalized);
    }

    #[test]
    fn reduction_error_rejects_short_controls() {
        let sys = FullOrderSystem::linear(
            DMatrix::identity(2, 2),
            DMatrix::zeros(2, 1),
            DMatrix::identity(2, 2),
        )
        .unwrap();
        let basis = ReductionBasis::galerkin(DMatrix::identity(2, 1)).unwrap();
        let err = reduction_error(&example_x(), &DMatrix::zeros(1, 1), &basis, &sys).unwrap_err();
        assert!(matches!(err, ReductionError::DimensionMismatch { what: "U columns", .. }));
    }

    #[test]
    fn reduction_error_of_exact_subspace_is_zero() {
        // A keeps span{e1} invariant; a trajectory starting on e1 stays there.
        let sys = FullOrderSystem::linear(
            DMatrix::from_row_slice(2, 2, &[0.9, 0.3, 0.0, 0.5]),
            DMatrix::from_row_slice(2, 1, &[1.0, 0.0]),
            DMatrix::identity(2, 2),
        )
        .unwrap();
        let x0 = DVector::from_vec(vec![1.0, 0.0]);
        let u = DMatrix::from_row_slice(1, 4, &[1.0, -0.5, 0.2, 0.0]);
        let x = sys.simulate(&x0, &u).unwrap();
        let basis = ReductionBasis::galerkin(DMatrix::identity(2, 1)).unwrap();
        let e = reduction_error(&x, &u, &basis, &sys).unwrap();
        assert!(e < 1e-12);
    }
}
