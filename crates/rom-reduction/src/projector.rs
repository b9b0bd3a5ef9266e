//! Projection of a full-order system onto a basis pair.

use nalgebra::{DMatrix, DVector};

use crate::basis::ReductionBasis;
use crate::error::{ReductionResult, ensure_len};
use crate::system::FullOrderSystem;

/// Reduced-order model `(Ar, Br, fr, Cr)`.
///
/// A pure function of the full-order system and the basis; it has no
/// identity of its own.
#[derive(Clone, Debug, PartialEq)]
pub struct ReducedSystem {
    pub ar: DMatrix<f64>,
    pub br: DMatrix<f64>,
    pub fr: Option<DVector<f64>>,
    pub cr: DMatrix<f64>,
}

impl ReducedSystem {
    pub fn rank(&self) -> usize {
        self.ar.nrows()
    }

    /// One step of the reduced dynamics `q_{t+1} = Ar·q_t + Br·u_t + fr`.
    pub fn step(&self, q: &DVector<f64>, u: &DVector<f64>) -> DVector<f64> {
        let mut next = &self.ar * q + &self.br * u;
        if let Some(fr) = &self.fr {
            next += fr;
        }
        next
    }

    /// Reduced output `Cr·q`.
    pub fn output(&self, q: &DVector<f64>) -> DVector<f64> {
        &self.cr * q
    }
}

/// `Ar = Wᵗ·A·V`, `Br = Wᵗ·B`, `fr = Wᵗ·f`, `Cr = C·V`.
pub fn reduce(system: &FullOrderSystem, basis: &ReductionBasis) -> ReductionResult<ReducedSystem> {
    project(system, basis.v(), basis.w())
}

/// Galerkin convenience: `W := V`.
pub fn reduce_galerkin(system: &FullOrderSystem, v: &DMatrix<f64>) -> ReductionResult<ReducedSystem> {
    project(system, v, v)
}

fn project(
    system: &FullOrderSystem,
    v: &DMatrix<f64>,
    w: &DMatrix<f64>,
) -> ReductionResult<ReducedSystem> {
    let nx = system.nx();
    ensure_len("V rows", v.nrows(), nx)?;
    ensure_len("W rows", w.nrows(), nx)?;
    ensure_len("W columns", w.ncols(), v.ncols())?;

    let w_t = w.transpose();
    Ok(ReducedSystem {
        ar: &w_t * system.a() * v,
        br: &w_t * system.b(),
        fr: system.f().map(|f| &w_t * f),
        cr: system.c() * v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReductionError;

    fn system() -> FullOrderSystem {
        FullOrderSystem::new(
            DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 0.0, 0.0, 3.0, 1.0, 1.0, 0.0, 2.0]),
            DMatrix::from_row_slice(3, 1, &[1.0, 0.0, 2.0]),
            DMatrix::from_row_slice(1, 3, &[0.0, 1.0, 1.0]),
            Some(DVector::from_vec(vec![1.0, 1.0, 1.0])),
        )
        .unwrap()
    }

    #[test]
    fn coordinate_basis_selects_submatrices() {
        let v = DMatrix::identity(3, 2);
        let rom = reduce_galerkin(&system(), &v).unwrap();
        assert_eq!(rom.ar, DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 3.0]));
        assert_eq!(rom.br, DMatrix::from_row_slice(2, 1, &[1.0, 0.0]));
        assert_eq!(rom.cr, DMatrix::from_row_slice(1, 2, &[0.0, 1.0]));
        assert_eq!(rom.fr, Some(DVector::from_vec(vec![1.0, 1.0])));
        assert_eq!(rom.rank(), 2);
    }

    #[test]
    fn petrov_galerkin_uses_w_on_the_left() {
        let v = DMatrix::identity(3, 1);
        let w = DMatrix::from_column_slice(3, 1, &[1.0, 0.0, 1.0]);
        let basis = ReductionBasis::new(v, w).unwrap();
        let rom = reduce(&system(), &basis).unwrap();
        // Wᵗ A V = A[0,0] + A[2,0]
        assert_eq!(rom.ar[(0, 0)], 2.0);
        assert_eq!(rom.br[(0, 0)], 3.0);
    }

    #[test]
    fn linear_system_has_no_affine_term() {
        let sys = FullOrderSystem::linear(
            DMatrix::identity(2, 2),
            DMatrix::zeros(2, 1),
            DMatrix::zeros(1, 2),
        )
        .unwrap();
        let rom = reduce_galerkin(&sys, &DMatrix::identity(2, 1)).unwrap();
        assert!(rom.fr.is_none());
    }

    #[test]
    fn dimension_mismatch() {
        let err = reduce_galerkin(&system(), &DMatrix::identity(4, 2)).unwrap_err();
        assert!(matches!(err, ReductionError::DimensionMismatch { what: "V rows", .. }));
    }
}
