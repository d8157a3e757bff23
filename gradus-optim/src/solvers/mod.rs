pub mod feasibility_restoration;
pub mod interior_point;
pub mod sqp;

use gradus::{Arena, Expr, ExpressionGraph, Variable};
use sprs::{CsMat, TriMat};

use crate::linalg::sparse::{add_block, mul_transpose_vec, norm2, norm_inf};

pub use interior_point::interior_point;
pub use sqp::sqp;

/// Iterates above this magnitude count as diverged.
const DIVERGENCE_LIMIT: f64 = 1e20;

/// Backtracking factor of the line search.
pub(crate) const ALPHA_REDUCTION: f64 = 0.5;

/// The line search gives up once `α < ALPHA_MIN_FRACTION · γ_c`.
pub(crate) const ALPHA_MIN_FRACTION: f64 = 0.05;

pub(crate) const MAX_SECOND_ORDER_CORRECTIONS: usize = 5;

/// Each correction must shrink the constraint violation by this factor.
pub(crate) const SOC_VIOLATION_REDUCTION: f64 = 0.99;

/// A nonlinear program in the form the solvers consume:
///
/// ```text
/// min f(x)  subject to  cₑ(x) = 0,  cᵢ(x) ≥ 0
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Nlp<'a> {
    pub decision_variables: &'a [Variable],
    pub equality_constraints: &'a [Variable],
    pub inequality_constraints: &'a [Variable],
    pub cost: &'a Variable,
}

impl Nlp<'_> {
    /// Arena the problem's expressions live in.
    pub(crate) fn arena(&self) -> Arena {
        self.decision_variables
            .first()
            .unwrap_or(self.cost)
            .arena()
            .clone()
    }
}

/// Values of a fixed list of expressions, refreshed with one traversal.
pub(crate) struct Evaluator {
    graph: ExpressionGraph,
}

impl Evaluator {
    pub(crate) fn new(rows: &[Variable]) -> Self {
        let roots: Vec<Expr> = rows.iter().map(|v| v.expr().clone()).collect();
        Evaluator {
            graph: ExpressionGraph::from_roots(&roots),
        }
    }

    pub(crate) fn values(&self) -> Vec<f64> {
        self.graph.update();
        self.graph.roots().iter().map(Expr::stored_value).collect()
    }

    /// First value, for single-expression evaluators.
    pub(crate) fn scalar(&self) -> f64 {
        self.values().first().copied().unwrap_or(0.0)
    }
}

pub(crate) fn set_values(variables: &[Variable], values: &[f64]) {
    debug_assert_eq!(variables.len(), values.len());
    for (var, &value) in variables.iter().zip(values) {
        var.set_value(value);
    }
}

/// Largest `α ∈ (0, 1]` with `x + α p ≥ (1 − τ) x`.
pub(crate) fn fraction_to_the_boundary(x: &[f64], p: &[f64], tau: f64) -> f64 {
    x.iter().zip(p).fold(1.0_f64, |alpha, (&xi, &pi)| {
        if pi < 0.0 {
            alpha.min(-tau * xi / pi)
        } else {
            alpha
        }
    })
}

/// Equality constraints are stuck at a nonzero stationary point of `½‖cₑ‖²`.
pub(crate) fn is_equality_locally_infeasible(a_e: &CsMat<f64>, c_e: &[f64]) -> bool {
    !c_e.is_empty() && norm2(&mul_transpose_vec(a_e, c_e)) < 1e-6 && norm2(c_e) > 1e-2
}

/// Same test on the violated part `min(cᵢ, 0)` of the inequalities.
pub(crate) fn is_inequality_locally_infeasible(a_i: &CsMat<f64>, c_i: &[f64]) -> bool {
    if c_i.is_empty() {
        return false;
    }
    let violated: Vec<f64> = c_i.iter().map(|&c| c.min(0.0)).collect();
    norm2(&mul_transpose_vec(a_i, &violated)) < 1e-6 && norm2(&violated) > 1e-6
}

pub(crate) fn is_diverging(x: &[f64]) -> bool {
    norm_inf(x) > DIVERGENCE_LIMIT || x.iter().any(|v| !v.is_finite())
}

/// `max |pᵢ| / (1 + |xᵢ|) < 10 ε`.
pub(crate) fn is_step_too_small(p_x: &[f64], x: &[f64]) -> bool {
    let ratio = p_x
        .iter()
        .zip(x)
        .fold(0.0_f64, |acc, (p, xi)| acc.max(p.abs() / (1.0 + xi.abs())));
    ratio < 10.0 * f64::EPSILON
}

/// `[[top_left, Aₑᵀ], [Aₑ, 0]]` in full symmetric storage.
pub(crate) fn assemble_kkt(top_left: &CsMat<f64>, a_e: &CsMat<f64>) -> CsMat<f64> {
    let n = top_left.rows();
    let dim = n + a_e.rows();
    let mut tri = TriMat::with_capacity((dim, dim), top_left.nnz() + 2 * a_e.nnz());
    add_block(&mut tri, top_left, 0, 0, false);
    add_block(&mut tri, a_e, n, 0, true);
    tri.to_csc()
}
