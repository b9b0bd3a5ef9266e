//! Full-order system data model.
//!
//! The discretized dynamics are `x_{t+1} = A x_t + B u_t + f` with goal
//! output `y_t = C x_t`. Matrices arrive from an external assembly step and
//! are never mutated once validated.

use nalgebra::{DMatrix, DVector};

use crate::error::{ReductionError, ReductionResult, ensure_len, ensure_shape, shape};

/// Validated, immutable full-order dynamical system.
#[derive(Clone, Debug)]
pub struct FullOrderSystem {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    c: DMatrix<f64>,
    f: Option<DVector<f64>>,
}

impl FullOrderSystem {
    /// Build an affine system. Fails if any operator disagrees with `nx = A.rows`.
    pub fn new(
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        c: DMatrix<f64>,
        f: Option<DVector<f64>>,
    ) -> ReductionResult<Self> {
        let nx = a.nrows();
        ensure_shape("A", a.shape(), (nx, nx))?;
        ensure_len("B rows", b.nrows(), nx)?;
        ensure_len("C columns", c.ncols(), nx)?;
        if let Some(f) = &f {
            ensure_len("f length", f.len(), nx)?;
        }
        if nx == 0 {
            return Err(ReductionError::DimensionMismatch {
                what: "A",
                expected: "non-empty square matrix".to_string(),
                actual: shape(0, 0),
            });
        }
        for (what, m) in [("A entry", &a), ("B entry", &b), ("C entry", &c)] {
            for v in m.iter() {
                rom_core::ensure_finite(*v, what)?;
            }
        }
        if let Some(f) = &f {
            for v in f.iter() {
                rom_core::ensure_finite(*v, "f entry")?;
            }
        }
        Ok(Self { a, b, c, f })
    }

    /// Purely linear system (`f = 0`).
    pub fn linear(a: DMatrix<f64>, b: DMatrix<f64>, c: DMatrix<f64>) -> ReductionResult<Self> {
        Self::new(a, b, c, None)
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }

    pub fn c(&self) -> &DMatrix<f64> {
        &self.c
    }

    pub fn f(&self) -> Option<&DVector<f64>> {
        self.f.as_ref()
    }

    /// State dimension.
    pub fn nx(&self) -> usize {
        self.a.nrows()
    }

    /// Input dimension.
    pub fn nu(&self) -> usize {
        self.b.ncols()
    }

    /// Output dimension.
    pub fn ny(&self) -> usize {
        self.c.nrows()
    }

    /// Goal weighting `Cᵗ·C`.
    pub fn goal_weight(&self) -> DMatrix<f64> {
        self.c.transpose() * &self.c
    }

    /// One step of the full-order dynamics.
    pub fn step(&self, x: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        let mut next = &self.a * x + &self.b * u;
        if let Some(f) = &self.f {
            next += f;
        }
        next
    }

    /// Simulate from `x0` under the control columns of `u`.
    ///
    /// Returns an `nx x (steps + 1)` snapshot matrix whose first column is
    /// `x0`, where `steps = u.ncols()`.
    pub fn simulate(&self, x0: &DVector<f64>, u: &DMatrix<f64>) -> ReductionResult<SnapshotMatrix> {
        ensure_len("x0 length", x0.len(), self.nx())?;
        ensure_len("U rows", u.nrows(), self.nu())?;

        let steps = u.ncols();
        let mut x = DMatrix::zeros(self.nx(), steps + 1);
        x.set_column(0, x0);
        for t in 0..steps {
            let next = self.step(&x.column(t).into_owned(), &u.column(t).into_owned());
            x.set_column(t + 1, &next);
        }
        SnapshotMatrix::new(x)
    }
}

/// Sampled full-order states, one per column (`nx x ns`).
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotMatrix(DMatrix<f64>);

impl SnapshotMatrix {
    pub fn new(x: DMatrix<f64>) -> ReductionResult<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ReductionError::DimensionMismatch {
                what: "snapshot matrix",
                expected: "at least one state and one snapshot".to_string(),
                actual: shape(x.nrows(), x.ncols()),
            });
        }
        for v in x.iter() {
            rom_core::ensure_finite(*v, "snapshot entry")?;
        }
        Ok(Self(x))
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.0
    }

    /// State dimension.
    pub fn nx(&self) -> usize {
        self.0.nrows()
    }

    /// Number of snapshots.
    pub fn ns(&self) -> usize {
        self.0.ncols()
    }

    /// Rank bound for data-driven strategies: `min(nx, ns)`.
    pub fn check_rank(&self, rank: usize) -> ReductionResult<()> {
        if rank == 0 {
            return Err(ReductionError::InvalidRank { rank });
        }
        if rank > self.ns() {
            return Err(ReductionError::RankExceedsSnapshotCount {
                rank,
                snapshots: self.ns(),
                nx: self.nx(),
            });
        }
        if rank > self.nx() {
            return Err(ReductionError::RankExceedsStateDimension { rank, nx: self.nx() });
        }
        Ok(())
    }
}

impl AsRef<DMatrix<f64>> for SnapshotMatrix {
    fn as_ref(&self) -> &DMatrix<f64> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_system() -> FullOrderSystem {
        FullOrderSystem::new(
            DMatrix::from_row_slice(2, 2, &[0.5, 0.1, 0.0, 0.8]),
            DMatrix::from_row_slice(2, 1, &[1.0, 0.0]),
            DMatrix::from_row_slice(1, 2, &[0.0, 1.0]),
            Some(DVector::from_vec(vec![0.1, 0.2])),
        )
        .unwrap()
    }

    #[test]
    fn rejects_non_square_a() {
        let err = FullOrderSystem::linear(
            DMatrix::zeros(2, 3),
            DMatrix::zeros(2, 1),
            DMatrix::zeros(1, 2),
        )
        .unwrap_err();
        assert!(matches!(err, ReductionError::DimensionMismatch { what: "A", .. }));
    }

    #[test]
    fn rejects_wrong_b_c_f() {
        let a = DMatrix::<f64>::identity(3, 3);
        assert!(
            FullOrderSystem::linear(a.clone(), DMatrix::zeros(2, 1), DMatrix::zeros(1, 3)).is_err()
        );
        assert!(
            FullOrderSystem::linear(a.clone(), DMatrix::zeros(3, 1), DMatrix::zeros(1, 2)).is_err()
        );
        assert!(
            FullOrderSystem::new(
                a,
                DMatrix::zeros(3, 1),
                DMatrix::zeros(1, 3),
                Some(DVector::zeros(2))
            )
            .is_err()
        );
    }

    #[test]
    fn rejects_non_finite_operators() {
        let mut a = DMatrix::<f64>::identity(2, 2);
        a[(0, 1)] = f64::NAN;
        let err =
            FullOrderSystem::linear(a, DMatrix::zeros(2, 1), DMatrix::zeros(1, 2)).unwrap_err();
        assert!(matches!(
            err,
            ReductionError::Core(rom_core::CoreError::NonFinite { what: "A entry", .. })
        ));

        let mut b = DMatrix::zeros(2, 1);
        b[(1, 0)] = f64::INFINITY;
        assert!(FullOrderSystem::linear(DMatrix::identity(2, 2), b, DMatrix::zeros(1, 2)).is_err());

        let f = DVector::from_vec(vec![0.0, f64::NEG_INFINITY]);
        let err = FullOrderSystem::new(
            DMatrix::identity(2, 2),
            DMatrix::zeros(2, 1),
            DMatrix::zeros(1, 2),
            Some(f),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ReductionError::Core(rom_core::CoreError::NonFinite { what: "f entry", .. })
        ));
    }

    #[test]
    fn simulate_applies_affine_dynamics() {
        let sys = small_system();
        let x0 = DVector::from_vec(vec![1.0, 1.0]);
        let u = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        let x = sys.simulate(&x0, &u).unwrap();
        assert_eq!(x.ns(), 3);
        // x1 = A x0 + B u0 + f = [0.6 + 1 + 0.1, 0.8 + 0.2]
        assert!((x.matrix()[(0, 1)] - 1.7).abs() < 1e-12);
        assert!((x.matrix()[(1, 1)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn snapshot_rank_bounds() {
        let x = SnapshotMatrix::new(DMatrix::from_element(4, 2, 1.0)).unwrap();
        assert!(x.check_rank(2).is_ok());
        assert!(matches!(
            x.check_rank(3),
            Err(ReductionError::RankExceedsSnapshotCount { rank: 3, snapshots: 2, .. })
        ));
        assert!(matches!(x.check_rank(0), Err(ReductionError::InvalidRank { .. })));

        let wide = SnapshotMatrix::new(DMatrix::from_element(2, 5, 1.0)).unwrap();
        assert!(matches!(
            wide.check_rank(3),
            Err(ReductionError::RankExceedsStateDimension { rank: 3, nx: 2 })
        ));
    }

    #[test]
    fn snapshot_rejects_nan() {
        let mut m = DMatrix::from_element(2, 2, 1.0);
        m[(1, 1)] = f64::NAN;
        assert!(SnapshotMatrix::new(m).is_err());
    }
}
