//! Inertia-correcting LDLᵀ factorization of Newton-KKT matrices.
//!
//! A KKT matrix `[[H, Aᵀ], [A, 0]]` with `n` primal and `m` constraint rows
//! yields a descent step only when its inertia is `(n, m, 0)`. When the plain
//! factorization fails or has the wrong inertia, a diagonal `diag(δI, −γI)` is
//! added and δ grows tenfold until the inertia is right.

use sprs::{CsMat, FillInReduction, SymmetryCheck, TriMat};
use sprs_ldl::{Ldl, LdlNumeric};

use crate::error::KktError;

const DELTA_INITIAL: f64 = 1e-4;
const DELTA_MAX: f64 = 1e20;
const GAMMA_FLOOR: f64 = 1e-10;

/// Counts of positive, negative and zero pivots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inertia {
    pub positive: usize,
    pub negative: usize,
    pub zero: usize,
}

impl Inertia {
    pub fn new(positive: usize, negative: usize, zero: usize) -> Self {
        Inertia {
            positive,
            negative,
            zero,
        }
    }

    /// Inertia of a block-diagonal `D`, which equals that of the factored
    /// matrix by Sylvester's law.
    pub fn from_pivots(d: &[f64]) -> Self {
        d.iter().fold(Inertia::default(), |mut acc, &v| {
            if v > 0.0 {
                acc.positive += 1;
            } else if v < 0.0 {
                acc.negative += 1;
            } else {
                acc.zero += 1;
            }
            acc
        })
    }
}

/// A held LDLᵀ factorization.
///
/// sprs-ldl needs at least two rows, so one-row systems keep their single
/// pivot and empty systems keep nothing.
pub enum LdltFactor {
    Empty,
    Scalar(f64),
    Sparse(LdlNumeric<f64, usize>),
}

impl LdltFactor {
    /// The diagonal of `D`.
    pub fn pivots(&self) -> Vec<f64> {
        match self {
            LdltFactor::Empty => Vec::new(),
            LdltFactor::Scalar(d) => vec![*d],
            LdltFactor::Sparse(factor) => factor.d().iter().copied().collect(),
        }
    }

    pub fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        match self {
            LdltFactor::Empty => Vec::new(),
            LdltFactor::Scalar(d) => rhs.iter().map(|b| b / d).collect(),
            LdltFactor::Sparse(factor) => factor.solve(rhs),
        }
    }
}

/// Plain sparse LDLᵀ with reverse Cuthill-McKee ordering. `mat` must hold
/// both triangles.
pub fn ldlt(mat: &CsMat<f64>) -> Result<LdltFactor, KktError> {
    match mat.rows() {
        0 => Ok(LdltFactor::Empty),
        1 => {
            let d: f64 = mat.data().iter().sum();
            if d == 0.0 || !d.is_finite() {
                return Err(KktError::SingularPivot { pivot: d });
            }
            Ok(LdltFactor::Scalar(d))
        }
        _ => {
            let mat = as_csc(mat);
            Ok(LdltFactor::Sparse(
                Ldl::new()
                    .fill_in_reduction(FillInReduction::ReverseCuthillMcKee)
                    .check_symmetry(SymmetryCheck::DontCheckSymmetry)
                    .numeric(mat.view())?,
            ))
        }
    }
}

fn as_csc(mat: &CsMat<f64>) -> CsMat<f64> {
    if mat.is_csc() {
        mat.clone()
    } else {
        mat.to_csc()
    }
}

/// Regularized factorization state, carried across solver iterations.
pub struct RegularizedLdlt {
    num_decision_variables: usize,
    num_equality_constraints: usize,
    factor: Option<LdltFactor>,
    /// `(indptr, indices)` of the matrix `factor` was analysed for.
    pattern: Option<(Vec<usize>, Vec<usize>)>,
    /// δ of the last successful factorization.
    prev_delta: f64,
    delta: f64,
    gamma: f64,
}

impl RegularizedLdlt {
    pub fn new(num_decision_variables: usize, num_equality_constraints: usize) -> Self {
        RegularizedLdlt {
            num_decision_variables,
            num_equality_constraints,
            factor: None,
            pattern: None,
            prev_delta: 0.0,
            delta: 0.0,
            gamma: 0.0,
        }
    }

    /// δ applied by the last [`compute`](Self::compute).
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// γ applied by the last [`compute`](Self::compute).
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    fn ideal_inertia(&self) -> Inertia {
        Inertia::new(self.num_decision_variables, self.num_equality_constraints, 0)
    }

    /// Factor `lhs` (full symmetric storage), regularizing until the inertia
    /// is ideal. `mu` is the barrier parameter, zero for SQP.
    ///
    /// On error no factorization is held and [`solve`](Self::solve) returns
    /// zeros.
    pub fn compute(&mut self, lhs: &CsMat<f64>, mu: f64) -> Result<(), KktError> {
        let dim = self.num_decision_variables + self.num_equality_constraints;
        if lhs.rows() != dim || lhs.cols() != dim {
            self.factor = None;
            return Err(KktError::DimensionMismatch {
                expected: dim,
                actual: lhs.rows(),
            });
        }

        let ideal = self.ideal_inertia();
        let plain = self.factor_shifted(lhs, 0.0, 0.0);
        let needs_gamma = match plain {
            Ok(inertia) if inertia == ideal => {
                self.prev_delta = 0.0;
                self.delta = 0.0;
                self.gamma = 0.0;
                return Ok(());
            }
            Ok(inertia) => inertia.zero > 0,
            Err(_) => true,
        };

        let gamma_on = (1e-8 * mu.powf(0.25)).max(GAMMA_FLOOR);
        let mut gamma = if needs_gamma { gamma_on } else { 0.0 };
        let mut delta = if self.prev_delta == 0.0 {
            DELTA_INITIAL
        } else {
            self.prev_delta / 2.0
        };

        loop {
            if delta > DELTA_MAX {
                self.factor = None;
                self.delta = delta;
                self.gamma = gamma;
                tracing::debug!(delta, "KKT regularization diverged");
                return Err(KktError::RegularizationDiverged { delta });
            }

            match self.factor_shifted(lhs, delta, gamma) {
                Ok(inertia) if inertia == ideal => {
                    self.prev_delta = delta;
                    self.delta = delta;
                    self.gamma = gamma;
                    return Ok(());
                }
                // Too few negative pivots means a constraint direction looks
                // positive; only −γ on the constraint block can fix that.
                Ok(inertia) if inertia.negative < ideal.negative && gamma == 0.0 => {
                    gamma = gamma_on;
                }
                Ok(_) => delta *= 10.0,
                Err(_) => {
                    gamma = gamma_on;
                    delta *= 10.0;
                }
            }
            tracing::trace!(delta, gamma, "escalating KKT regularization");
        }
    }

    /// Factor `lhs + diag(δI, −γI)` and return its inertia.
    fn factor_shifted(
        &mut self,
        lhs: &CsMat<f64>,
        delta: f64,
        gamma: f64,
    ) -> Result<Inertia, KktError> {
        let n = self.num_decision_variables;
        let dim = lhs.rows();

        // An explicit diagonal keeps the pattern identical across shifts so
        // the symbolic analysis can be reused.
        let mut tri = TriMat::with_capacity((dim, dim), lhs.nnz() + dim);
        for (&v, (r, c)) in lhs.iter() {
            tri.add_triplet(r, c, v);
        }
        for i in 0..dim {
            tri.add_triplet(i, i, if i < n { delta } else { -gamma });
        }
        let shifted: CsMat<f64> = tri.to_csc();

        let pattern = (
            shifted.indptr().raw_storage().to_vec(),
            shifted.indices().to_vec(),
        );
        let reusable = self.pattern.as_ref() == Some(&pattern);

        let updated = match self.factor.as_mut() {
            Some(LdltFactor::Sparse(factor)) if reusable => {
                Some(factor.update(shifted.view()).map_err(KktError::from))
            }
            _ => None,
        };
        let result = match updated {
            Some(result) => result,
            None => ldlt(&shifted).map(|factor| {
                self.factor = Some(factor);
            }),
        };
        match result {
            Ok(()) => {
                self.pattern = Some(pattern);
                let d: Vec<f64> = self
                    .factor
                    .as_ref()
                    .map(LdltFactor::pivots)
                    .unwrap_or_default();
                Ok(Inertia::from_pivots(&d))
            }
            Err(e) => {
                self.factor = None;
                self.pattern = None;
                Err(e)
            }
        }
    }

    /// Solve with the held factorization; zeros if there is none.
    pub fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        match &self.factor {
            Some(factor) => factor.solve(rhs),
            None => vec![0.0; rhs.len()],
        }
    }

    pub fn is_factored(&self) -> bool {
        self.factor.is_some()
    }

    /// Inertia of the held factorization.
    pub fn inertia(&self) -> Option<Inertia> {
        self.factor
            .as_ref()
            .map(|f| Inertia::from_pivots(&f.pivots()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kkt(entries: &[(usize, usize, f64)], dim: usize) -> CsMat<f64> {
        let mut tri = TriMat::new((dim, dim));
        for &(r, c, v) in entries {
            tri.add_triplet(r, c, v);
            if r != c {
                tri.add_triplet(c, r, v);
            }
        }
        tri.to_csc()
    }

    #[test]
    fn pivots_to_inertia() {
        assert_eq!(Inertia::from_pivots(&[1.0, -2.0, 0.0, 3.0]), Inertia::new(2, 1, 1));
    }

    #[test]
    fn well_posed_kkt_needs_no_regularization() {
        // [[2, 0, 1], [0, 2, 1], [1, 1, 0]]
        let lhs = kkt(&[(0, 0, 2.0), (1, 1, 2.0), (2, 0, 1.0), (2, 1, 1.0)], 3);
        let mut solver = RegularizedLdlt::new(2, 1);
        solver.compute(&lhs, 0.0).unwrap();
        assert_eq!(solver.delta(), 0.0);
        let x = solver.solve(&[0.0, 0.0, 1.0]);
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!((x[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn indefinite_hessian_is_shifted() {
        // H = -1 has the wrong sign for a minimum
        let lhs = kkt(&[(0, 0, -1.0)], 1);
        let mut solver = RegularizedLdlt::new(1, 0);
        solver.compute(&lhs, 0.0).unwrap();
        assert!(solver.delta() > 1.0);
        assert_eq!(solver.inertia(), Some(Inertia::new(1, 0, 0)));
        let x = solver.solve(&[2.0]);
        assert!((x[0] - 2.0 / (solver.delta() - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn single_row_factors_without_shift() {
        let mut solver = RegularizedLdlt::new(1, 0);
        solver.compute(&kkt(&[(0, 0, 4.0)], 1), 0.0).unwrap();
        assert_eq!(solver.delta(), 0.0);
        assert_eq!(solver.solve(&[2.0]), vec![0.5]);
    }

    #[test]
    fn zero_pivot_is_an_error() {
        assert!(matches!(
            ldlt(&kkt(&[(0, 0, 0.0)], 1)),
            Err(KktError::SingularPivot { .. })
        ));
    }

    #[test]
    fn lone_constraint_row_gets_gamma() {
        // No primal block and a structurally zero constraint diagonal
        let mut solver = RegularizedLdlt::new(0, 1);
        solver.compute(&kkt(&[], 1), 1.0).unwrap();
        assert_eq!(solver.inertia(), Some(Inertia::new(0, 1, 0)));
        assert!(solver.gamma() > 0.0);
    }

    #[test]
    fn empty_system_is_a_no_op() {
        let mut solver = RegularizedLdlt::new(0, 0);
        solver.compute(&kkt(&[], 0), 0.0).unwrap();
        assert!(solver.is_factored());
        assert!(solver.solve(&[]).is_empty());
    }
}
