//! Feasibility restoration.
//!
//! When the filter line search stalls, the host solver looks for a less
//! infeasible point by solving
//!
//! ```text
//! min  ρ Σ(pₑ + nₑ + pᵢ + nᵢ) + ζ/2 Σ D_R,k (x_k − x_R,k)²
//! s.t. cₑ(x) − pₑ + nₑ = 0
//!      cᵢ(x) − pᵢ + nᵢ ≥ 0
//!      pₑ, nₑ, pᵢ, nᵢ ≥ 0
//! ```
//!
//! with the interior-point solver, where `x_R` is the iterate restoration
//! started from, `ζ = √μ` and `D_R = min(1, 1/|x_R|)`. The host's callback is
//! consulted every iteration and stops the sub-problem once its filter
//! accepts the restored point.

use sprs::{CsMat, TriMat};

use gradus::Variable;

use crate::config::SolverConfig;
use crate::iteration::SolverIterationInfo;
use crate::linalg::ldlt;
use crate::linalg::sparse::{add_block, add_weighted_gram, mul_vec};
use crate::solvers::{interior_point, set_values, Evaluator, Nlp};
use crate::status::SolverExitCondition;

/// Penalty on the elastic variables.
const RHO: f64 = 1000.0;

/// Diagonal shift making the least-squares multiplier system definite.
const DUAL_REGULARIZATION: f64 = 1e-10;

/// Result of a restoration sub-problem, truncated to the host's variables.
#[derive(Debug, Clone)]
pub(crate) struct RestorationOutcome {
    pub exit_condition: SolverExitCondition,
    pub x: Vec<f64>,
    /// Slacks of the host's inequality rows.
    pub s: Vec<f64>,
}

/// Initial negative elastic `n` for a row with violation `c`: the positive
/// root of `ρn² + (ρc − μ)n − μc/2 = 0`, which minimizes the sub-problem's
/// barrier objective over `p − n = c`.
///
/// The two branches are the same root written to avoid cancellation.
pub(crate) fn initial_elastic(c: f64, rho: f64, mu: f64) -> f64 {
    let b = rho * c - mu;
    let sqrt_disc = (rho * rho * c * c + mu * mu).sqrt();
    if b >= 0.0 {
        mu * c / (b + sqrt_disc)
    } else {
        (-b + sqrt_disc) / (2.0 * rho)
    }
}

/// Run restoration from `(x, s)` at barrier parameter `mu`.
///
/// `callback` is the host's acceptance test; when it returns `true` the
/// outcome is [`SolverExitCondition::CallbackRequestedStop`] and the
/// returned point is the one the host should step to.
pub(crate) fn restore(
    nlp: &Nlp<'_>,
    mu: f64,
    config: &SolverConfig,
    x: &[f64],
    s: &[f64],
    callback: &mut dyn FnMut(&SolverIterationInfo<'_>) -> bool,
) -> RestorationOutcome {
    let decision_variables = nlp.decision_variables;
    let n = decision_variables.len();
    let m_i = nlp.inequality_constraints.len();
    let arena = nlp.arena();

    let zeta = mu.sqrt();

    set_values(decision_variables, x);
    let c_e = Evaluator::new(nlp.equality_constraints).values();
    let c_i = Evaluator::new(nlp.inequality_constraints).values();

    let elastic =
        |count: usize| -> Vec<Variable> { (0..count).map(|_| Variable::new(&arena)).collect() };
    let p_e = elastic(c_e.len());
    let n_e = elastic(c_e.len());
    let p_i = elastic(m_i);
    let n_i = elastic(m_i);

    // Inequality rows are measured against their slacks.
    let c_i_gap: Vec<f64> = c_i.iter().zip(s).map(|(c, s_k)| c - s_k).collect();
    let n_e_0: Vec<f64> = c_e.iter().map(|&c| initial_elastic(c, RHO, mu)).collect();
    let p_e_0: Vec<f64> = c_e.iter().map(|&c| initial_elastic(-c, RHO, mu)).collect();
    let n_i_0: Vec<f64> = c_i_gap.iter().map(|&c| initial_elastic(c, RHO, mu)).collect();
    let p_i_0: Vec<f64> = c_i_gap.iter().map(|&c| initial_elastic(-c, RHO, mu)).collect();

    let elastic_vars: Vec<Variable> = p_e
        .iter()
        .chain(&n_e)
        .chain(&p_i)
        .chain(&n_i)
        .cloned()
        .collect();

    let mut objective = arena.constant(0.0);
    for v in &elastic_vars {
        objective += v;
    }
    objective *= RHO;
    for (x_k, &x_r) in decision_variables.iter().zip(x) {
        let d_r = (1.0 / x_r.abs()).min(1.0);
        let diff = x_k - x_r;
        objective += (zeta / 2.0 * d_r) * (&diff * &diff);
    }

    let equality_constraints: Vec<Variable> = nlp
        .equality_constraints
        .iter()
        .zip(p_e.iter().zip(&n_e))
        .map(|(c, (p, n))| c - p + n)
        .collect();
    let mut inequality_constraints: Vec<Variable> = nlp
        .inequality_constraints
        .iter()
        .zip(p_i.iter().zip(&n_i))
        .map(|(c, (p, n))| c - p + n)
        .collect();
    inequality_constraints.extend(elastic_vars.iter().cloned());

    let mut restoration_variables = decision_variables.to_vec();
    restoration_variables.extend(elastic_vars.iter().cloned());

    let elastic_0: Vec<f64> = p_e_0
        .iter()
        .chain(&n_e_0)
        .chain(&p_i_0)
        .chain(&n_i_0)
        .copied()
        .collect();
    let mut fr_x: Vec<f64> = x.iter().chain(&elastic_0).copied().collect();
    let mut fr_s: Vec<f64> = s.iter().chain(&elastic_0).copied().collect();

    let fr_config = SolverConfig {
        spy: false,
        ..config.clone()
    };
    let fr_nlp = Nlp {
        decision_variables: &restoration_variables,
        equality_constraints: &equality_constraints,
        inequality_constraints: &inequality_constraints,
        cost: &objective,
    };

    let exit_condition = interior_point(&fr_nlp, callback, &fr_config, true, &mut fr_x, &mut fr_s);
    tracing::debug!(%exit_condition, "feasibility restoration finished");

    fr_x.truncate(n);
    fr_s.truncate(m_i);
    set_values(decision_variables, &fr_x);

    RestorationOutcome {
        exit_condition,
        x: fr_x,
        s: fr_s,
    }
}

/// Least-squares multiplier estimate at a restored point.
///
/// Solves `(ÂÂᵀ + εI)[y; z] = Â[∇f; −μe]` with
///
/// ```text
/// Â = [Aₑ   0]
///     [Aᵢ  −S]
/// ```
///
/// Returns `None` when the factorization fails; callers keep their previous
/// multipliers in that case.
pub(crate) fn least_squares_duals(
    g: &[f64],
    a_e: &CsMat<f64>,
    a_i: &CsMat<f64>,
    s: &[f64],
    mu: f64,
) -> Option<(Vec<f64>, Vec<f64>)> {
    let n = g.len();
    let m_e = a_e.rows();
    let m_i = a_i.rows();
    let m = m_e + m_i;

    let mut a_hat = TriMat::new((m, n + m_i));
    add_block(&mut a_hat, a_e, 0, 0, false);
    add_block(&mut a_hat, a_i, m_e, 0, false);
    for (k, s_k) in s.iter().enumerate() {
        a_hat.add_triplet(m_e + k, n + k, -s_k);
    }
    let a_hat: CsMat<f64> = a_hat.to_csc();

    // ÂÂᵀ is the Gram matrix of the rows of Âᵀ
    let a_hat_t: CsMat<f64> = a_hat.transpose_view().to_owned();
    let mut lhs = TriMat::new((m, m));
    add_weighted_gram(&mut lhs, &a_hat_t, &vec![1.0; n + m_i]);
    for k in 0..m {
        lhs.add_triplet(k, k, DUAL_REGULARIZATION);
    }

    let target: Vec<f64> = g.iter().copied().chain(std::iter::repeat(-mu).take(m_i)).collect();
    let rhs = mul_vec(&a_hat, &target);

    match ldlt(&lhs.to_csc()) {
        Ok(factor) => {
            let mut duals = factor.solve(rhs.as_slice());
            let z = duals.split_off(m_e);
            Some((duals, z))
        }
        Err(e) => {
            tracing::debug!(error = %e, "least-squares multiplier estimate failed");
            None
        }
    }
}
