//! Primal-dual interior-point method for problems with inequality
//! constraints.
//!
//! Inequalities `cᵢ(x) ≥ 0` become `cᵢ(x) − s = 0` with slacks `s > 0` kept
//! interior by a log barrier of weight μ. After eliminating the slack and
//! inequality-dual steps each iteration solves
//!
//! ```text
//! [H + AᵢᵀΣAᵢ  Aₑᵀ][ pˣ] = −[∇f − Aₑᵀy + Aᵢᵀ(S⁻¹(Zcᵢ − μe) − z)]
//! [    Aₑ       0 ][−pʸ]    [               cₑ                 ]
//! ```
//!
//! with `Σ = S⁻¹Z`, then recovers
//!
//! ```text
//! pᶻ = −Σcᵢ + μS⁻¹e − ΣAᵢpˣ
//! pˢ = μZ⁻¹e − s − Z⁻¹Spᶻ
//! ```
//!
//! Steps are limited by the fraction-to-the-boundary rule and globalized by
//! the same filter line search as the SQP solver.

use std::time::Instant;

use gradus::{Gradient, Hessian, Jacobian, Variable};
use sprs::{CsMat, TriMat};

use crate::config::SolverConfig;
use crate::diagnostics::{self, IterationMode, IterationRow};
use crate::error_estimate::{interior_point_error_estimate, kkt_error};
use crate::filter::{Filter, FilterEntry};
use crate::iteration::SolverIterationInfo;
use crate::linalg::sparse::{
    add_block, add_weighted_gram, all_finite, axpy, mul_transpose_vec, mul_vec, norm1, sub,
};
use crate::linalg::RegularizedLdlt;
use crate::solvers::feasibility_restoration::{least_squares_duals, restore};
use crate::solvers::{
    assemble_kkt, fraction_to_the_boundary, is_diverging, is_equality_locally_infeasible,
    is_inequality_locally_infeasible, is_step_too_small, set_values, Evaluator, Nlp,
    ALPHA_MIN_FRACTION, ALPHA_REDUCTION, MAX_SECOND_ORDER_CORRECTIONS, SOC_VIOLATION_REDUCTION,
};
use crate::spy::SpyFiles;
use crate::status::SolverExitCondition;

const INITIAL_MU: f64 = 0.1;
const TAU_MIN: f64 = 0.99;

/// Bound on how far `z` may drift from `μS⁻¹e`.
const KAPPA_SIGMA: f64 = 1e10;

/// Barrier parameter and fraction-to-the-boundary factor.
#[derive(Debug, Clone, Copy)]
struct Barrier {
    mu: f64,
    mu_min: f64,
    tau: f64,
}

impl Barrier {
    fn new(tolerance: f64) -> Self {
        Barrier {
            mu: INITIAL_MU,
            mu_min: tolerance / 10.0,
            tau: TAU_MIN,
        }
    }

    /// `μ ← max(μ_min, min(κ_μ μ, μ^θ_μ))` with `κ_μ = 0.2`, `θ_μ = 1.5`.
    /// The filter is reset since its entries depend on μ.
    fn update(&mut self, filter: &mut Filter) {
        self.mu = self.mu_min.max((0.2 * self.mu).min(self.mu.powf(1.5)));
        self.tau = TAU_MIN.max(1.0 - self.mu);
        filter.reset();
    }
}

/// Newton step components.
struct Step {
    p_x: Vec<f64>,
    p_s: Vec<f64>,
    p_y: Vec<f64>,
    p_z: Vec<f64>,
}

/// Inputs to the slack and inequality-dual back-substitution.
struct Iterate<'a> {
    a_i: &'a CsMat<f64>,
    c_i: &'a [f64],
    s: &'a [f64],
    z: &'a [f64],
    sigma: &'a [f64],
    mu: f64,
}

impl Iterate<'_> {
    /// Split a reduced KKT solution and recover `pᶻ` and `pˢ`.
    fn expand(&self, step: &[f64], n: usize) -> Step {
        let p_x = step[..n].to_vec();
        let p_y = step[n..].iter().map(|v| -v).collect();

        let a_i_p_x = mul_vec(self.a_i, &p_x);
        let p_z: Vec<f64> = (0..self.s.len())
            .map(|k| {
                -self.sigma[k] * self.c_i[k] + self.mu / self.s[k] - self.sigma[k] * a_i_p_x[k]
            })
            .collect();
        let p_s = (0..self.s.len())
            .map(|k| self.mu / self.z[k] - self.s[k] - self.s[k] / self.z[k] * p_z[k])
            .collect();

        Step { p_x, p_s, p_y, p_z }
    }
}

/// Solve `nlp` from the primal guess `x` and initial slacks `s`.
///
/// `feasibility_restoration` marks the nested solve run by the restoration
/// phase: it reports its iterations with the `r` marker, never starts a
/// restoration of its own and does not log an exit line. On return `x`, `s`
/// and the decision variables hold the final iterate.
pub fn interior_point(
    nlp: &Nlp<'_>,
    callback: &mut dyn FnMut(&SolverIterationInfo<'_>) -> bool,
    config: &SolverConfig,
    feasibility_restoration: bool,
    x: &mut Vec<f64>,
    s: &mut Vec<f64>,
) -> SolverExitCondition {
    let start = Instant::now();
    let (exit_condition, iterations) =
        run(nlp, callback, config, feasibility_restoration, x, s, start);
    set_values(nlp.decision_variables, x);
    if config.diagnostics && !feasibility_restoration {
        diagnostics::log_exit(exit_condition, iterations, start.elapsed());
    }
    exit_condition
}

#[allow(clippy::too_many_lines)]
fn run(
    nlp: &Nlp<'_>,
    callback: &mut dyn FnMut(&SolverIterationInfo<'_>) -> bool,
    config: &SolverConfig,
    feasibility_restoration: bool,
    x: &mut Vec<f64>,
    s: &mut Vec<f64>,
    start: Instant,
) -> (SolverExitCondition, usize) {
    let decision_variables = nlp.decision_variables;
    let n = decision_variables.len();
    let m_e = nlp.equality_constraints.len();
    let m_i = nlp.inequality_constraints.len();
    debug_assert_eq!(s.len(), m_i);

    if m_e > n {
        return (SolverExitCondition::TooFewDofs, 0);
    }

    let arena = nlp.arena();
    let y_ad: Vec<Variable> = (0..m_e).map(|_| Variable::new(&arena)).collect();
    let z_ad: Vec<Variable> = (0..m_i).map(|_| Variable::new(&arena)).collect();

    // L = f − yᵀcₑ − zᵀcᵢ
    let mut lagrangian = nlp.cost.clone();
    for (y_k, c_k) in y_ad.iter().zip(nlp.equality_constraints) {
        lagrangian -= y_k * c_k;
    }
    for (z_k, c_k) in z_ad.iter().zip(nlp.inequality_constraints) {
        lagrangian -= z_k * c_k;
    }

    set_values(decision_variables, x);
    let cost = Evaluator::new(std::slice::from_ref(nlp.cost));
    let c_e_ad = Evaluator::new(nlp.equality_constraints);
    let c_i_ad = Evaluator::new(nlp.inequality_constraints);
    let gradient_f = Gradient::new(nlp.cost, decision_variables);
    let jacobian_c_e = Jacobian::new(nlp.equality_constraints, decision_variables);
    let jacobian_c_i = Jacobian::new(nlp.inequality_constraints, decision_variables);
    let hessian_l = Hessian::new(&lagrangian, decision_variables);

    let mut y = vec![0.0; m_e];
    let mut z = vec![1.0; m_i];
    set_values(&y_ad, &y);
    set_values(&z_ad, &z);

    let mut f = cost.scalar();
    let mut c_e = c_e_ad.values();
    let mut c_i = c_i_ad.values();
    if !f.is_finite() || !all_finite(&c_e) || !all_finite(&c_i) {
        return (SolverExitCondition::NonfiniteInitialCostOrConstraints, 0);
    }
    let mut g = gradient_f.value();
    let mut a_e = jacobian_c_e.value();
    let mut a_i = jacobian_c_i.value();
    let mut h = hessian_l.value();

    let mut spy = SpyFiles::open(config.spy && !feasibility_restoration);
    let mut solver = RegularizedLdlt::new(n, m_e);
    let mut filter = Filter::new();
    let mut barrier = Barrier::new(config.tolerance);

    let mut iterations = 0;
    let mut full_step_rejected_counter = 0;
    let mut step_too_small_counter = 0;
    let mut acceptable_iter_counter = 0;

    let mut e_0 = interior_point_error_estimate(&g, &a_e, &c_e, &a_i, &c_i, s, &y, &z, 0.0);

    if config.diagnostics && !feasibility_restoration {
        diagnostics::log_iteration_header();
    }

    while e_0 > config.tolerance {
        let iteration_start = Instant::now();
        let mu = barrier.mu;

        if is_equality_locally_infeasible(&a_e, &c_e) {
            tracing::debug!("equality constraints are locally infeasible");
            return (SolverExitCondition::LocallyInfeasible, iterations);
        }
        if is_inequality_locally_infeasible(&a_i, &c_i) {
            tracing::debug!("inequality constraints are locally infeasible");
            return (SolverExitCondition::LocallyInfeasible, iterations);
        }
        if is_diverging(x) || is_diverging(s) {
            return (SolverExitCondition::DivergingIterates, iterations);
        }

        let info = SolverIterationInfo {
            iteration: iterations,
            x,
            s,
            g: &g,
            h: &h,
            a_e: &a_e,
            a_i: &a_i,
        };
        if callback(&info) {
            return (SolverExitCondition::CallbackRequestedStop, iterations);
        }
        spy.record(&h, &a_e, &a_i);

        // Σ = S⁻¹Z
        let sigma: Vec<f64> = s.iter().zip(&z).map(|(s_k, z_k)| z_k / s_k).collect();

        let mut top_left = TriMat::with_capacity((n, n), h.nnz());
        add_block(&mut top_left, &h, 0, 0, false);
        add_weighted_gram(&mut top_left, &a_i, &sigma);
        let lhs = assemble_kkt(&top_left.to_csc(), &a_e);

        // S⁻¹(Zcᵢ − μe) − z
        let shifted: Vec<f64> = (0..m_i)
            .map(|k| (z[k] * c_i[k] - mu) / s[k] - z[k])
            .collect();
        let a_ety = mul_transpose_vec(&a_e, &y);
        let a_it_shifted = mul_transpose_vec(&a_i, &shifted);
        let mut rhs: Vec<f64> = (0..n).map(|k| -(g[k] - a_ety[k] + a_it_shifted[k])).collect();
        rhs.extend(c_e.iter().map(|c| -c));

        if let Err(e) = solver.compute(&lhs, mu) {
            tracing::debug!(error = %e, "KKT factorization failed; taking a zero step");
        }

        let iterate = Iterate {
            a_i: &a_i,
            c_i: &c_i,
            s,
            z: &z,
            sigma: &sigma,
            mu,
        };
        let mut step = iterate.expand(&solver.solve(&rhs), n);

        let alpha_max = fraction_to_the_boundary(s, &step.p_s, barrier.tau);
        let mut alpha = alpha_max;
        let mut alpha_z = fraction_to_the_boundary(&z, &step.p_z, barrier.tau);
        let mut mode = if feasibility_restoration {
            IterationMode::FeasibilityRestoration
        } else {
            IterationMode::Normal
        };

        // Whether the slacks track cᵢ(x) directly this iteration
        let feasible_slacks = config.feasible_ipm && c_i.iter().all(|&c| c > 0.0);

        loop {
            let trial_x = axpy(x, alpha, &step.p_x);
            set_values(decision_variables, &trial_x);
            let trial_f = cost.scalar();
            let trial_c_e = c_e_ad.values();
            let trial_c_i = c_i_ad.values();

            if !trial_f.is_finite() || !all_finite(&trial_c_e) || !all_finite(&trial_c_i) {
                alpha *= ALPHA_REDUCTION;
                continue;
            }

            let trial_s = if feasible_slacks {
                trial_c_i.clone()
            } else {
                axpy(s, alpha, &step.p_s)
            };

            let entry = FilterEntry::interior_point(trial_f, &trial_s, &trial_c_e, &trial_c_i, mu);
            if filter.try_add(entry) {
                break;
            }

            let prev_violation = norm1(&c_e) + norm1(&sub(&c_i, s));
            if entry.violation >= prev_violation {
                let mut alpha_soc = alpha;
                let mut c_e_soc = c_e.clone();
                let mut trial_c_e = trial_c_e;
                let mut rhs_soc = rhs.clone();
                let mut accepted = None;
                let mut prev_soc_violation = entry.violation;

                for _ in 0..MAX_SECOND_ORDER_CORRECTIONS {
                    for (soc, trial) in c_e_soc.iter_mut().zip(&trial_c_e) {
                        *soc = alpha_soc * *soc + trial;
                    }
                    for (r, c) in rhs_soc[n..].iter_mut().zip(&c_e_soc) {
                        *r = -c;
                    }
                    let soc_step = iterate.expand(&solver.solve(&rhs_soc), n);

                    alpha_soc = fraction_to_the_boundary(s, &soc_step.p_s, barrier.tau);
                    let alpha_z_soc = fraction_to_the_boundary(&z, &soc_step.p_z, barrier.tau);
                    let trial_x = axpy(x, alpha_soc, &soc_step.p_x);
                    let trial_s = axpy(s, alpha_soc, &soc_step.p_s);

                    set_values(decision_variables, &trial_x);
                    let trial_f = cost.scalar();
                    trial_c_e = c_e_ad.values();
                    let trial_c_i = c_i_ad.values();

                    let soc_entry =
                        FilterEntry::interior_point(trial_f, &trial_s, &trial_c_e, &trial_c_i, mu);
                    if filter.try_add(soc_entry) {
                        accepted = Some((soc_step, alpha_z_soc));
                        break;
                    }
                    if soc_entry.violation > SOC_VIOLATION_REDUCTION * prev_soc_violation {
                        break;
                    }
                    prev_soc_violation = soc_entry.violation;
                }

                if let Some((soc_step, alpha_z_soc)) = accepted {
                    step = soc_step;
                    alpha = alpha_soc;
                    alpha_z = alpha_z_soc;
                    mode = IterationMode::SecondOrderCorrection;
                    break;
                }
            }

            if alpha == alpha_max {
                full_step_rejected_counter += 1;
            }

            if full_step_rejected_counter >= 4 && filter.max_violation() > entry.violation / 10.0 {
                filter.shrink_max_violation();
                continue;
            }

            alpha *= ALPHA_REDUCTION;

            if alpha < ALPHA_MIN_FRACTION * Filter::GAMMA_CONSTRAINT {
                let current_kkt_error = kkt_error(&g, &a_e, &c_e, &a_i, &c_i, s, &y, &z, mu);

                let trial_x = axpy(x, alpha_max, &step.p_x);
                let trial_s = axpy(s, alpha_max, &step.p_s);
                let trial_y = axpy(&y, alpha_z, &step.p_y);
                let trial_z = axpy(&z, alpha_z, &step.p_z);
                set_values(decision_variables, &trial_x);
                let next_kkt_error = kkt_error(
                    &gradient_f.value(),
                    &jacobian_c_e.value(),
                    &c_e_ad.values(),
                    &jacobian_c_i.value(),
                    &c_i_ad.values(),
                    &trial_s,
                    &trial_y,
                    &trial_z,
                    mu,
                );

                // The full step still reduces the KKT error, so take it
                if next_kkt_error <= 0.999 * current_kkt_error {
                    alpha = alpha_max;
                    break;
                }

                // A restoration that cannot make progress means the original
                // problem is infeasible near here.
                if feasibility_restoration {
                    return (SolverExitCondition::LocallyInfeasible, iterations);
                }

                tracing::debug!(iteration = iterations, "entering feasibility restoration");
                let initial_violation = norm1(&c_e) + norm1(&sub(&c_i, s));
                let mut restoration_callback = |info: &SolverIterationInfo<'_>| {
                    set_values(decision_variables, &info.x[..n]);
                    let trial_s = &info.s[..m_i];
                    let entry = FilterEntry::interior_point(
                        cost.scalar(),
                        trial_s,
                        &c_e_ad.values(),
                        &c_i_ad.values(),
                        mu,
                    );
                    filter.is_acceptable(&entry) && entry.violation < 0.9 * initial_violation
                };
                let outcome = restore(nlp, mu, config, x, s, &mut restoration_callback);

                match outcome.exit_condition {
                    SolverExitCondition::CallbackRequestedStop => {
                        step.p_x = sub(&outcome.x, x);
                        step.p_s = sub(&outcome.s, s);

                        set_values(decision_variables, &outcome.x);
                        match least_squares_duals(
                            &gradient_f.value(),
                            &jacobian_c_e.value(),
                            &jacobian_c_i.value(),
                            &outcome.s,
                            mu,
                        ) {
                            Some((y_estimate, z_estimate)) => {
                                step.p_y = sub(&y_estimate, &y);
                                step.p_z = sub(&z_estimate, &z);
                            }
                            None => {
                                step.p_y = vec![0.0; m_e];
                                step.p_z = vec![0.0; m_i];
                            }
                        }

                        alpha = 1.0;
                        alpha_z = 1.0;
                        mode = IterationMode::FeasibilityRestoration;
                        break;
                    }
                    SolverExitCondition::Success => {
                        *x = outcome.x;
                        *s = outcome.s;
                        return (SolverExitCondition::LocallyInfeasible, iterations);
                    }
                    _ => {
                        *x = outcome.x;
                        *s = outcome.s;
                        return (SolverExitCondition::FeasibilityRestorationFailed, iterations);
                    }
                }
            }
        }

        if alpha == alpha_max {
            full_step_rejected_counter = 0;
        }

        if is_step_too_small(&step.p_x, x) {
            alpha = alpha_max;
            step_too_small_counter += 1;
        } else {
            step_too_small_counter = 0;
        }

        *x = axpy(x, alpha, &step.p_x);
        y = axpy(&y, alpha_z, &step.p_y);
        z = axpy(&z, alpha_z, &step.p_z);
        set_values(decision_variables, x);

        c_e = c_e_ad.values();
        c_i = c_i_ad.values();
        *s = if feasible_slacks && c_i.iter().all(|&c| c > 0.0) {
            c_i.clone()
        } else {
            axpy(s, alpha, &step.p_s)
        };

        // Keep z within a factor of κ_Σ of the central-path value μS⁻¹e
        for (z_k, s_k) in z.iter_mut().zip(s.iter()) {
            *z_k = z_k.min(KAPPA_SIGMA * mu / s_k).max(mu / (KAPPA_SIGMA * s_k));
        }

        set_values(&y_ad, &y);
        set_values(&z_ad, &z);

        f = cost.scalar();
        g = gradient_f.value();
        a_e = jacobian_c_e.value();
        a_i = jacobian_c_i.value();
        h = hessian_l.value();

        e_0 = interior_point_error_estimate(&g, &a_e, &c_e, &a_i, &c_i, s, &y, &z, 0.0);
        if e_0 < config.acceptable_tolerance {
            acceptable_iter_counter += 1;
        } else {
            acceptable_iter_counter = 0;
        }

        // Shrink μ as long as the current barrier subproblem is solved well
        // enough.
        if e_0 > config.tolerance {
            while barrier.mu > barrier.mu_min
                && interior_point_error_estimate(&g, &a_e, &c_e, &a_i, &c_i, s, &y, &z, barrier.mu)
                    <= 10.0 * barrier.mu
            {
                barrier.update(&mut filter);
            }
        }

        if config.diagnostics {
            diagnostics::log_iteration(&IterationRow {
                mode,
                iteration: iterations,
                elapsed: iteration_start.elapsed(),
                error: e_0,
                cost: f,
                infeasibility: norm1(&c_e) + norm1(&sub(&c_i, s)),
                delta: solver.delta(),
                primal_alpha: alpha,
                dual_alpha: alpha_z,
            });
        }

        iterations += 1;

        if iterations >= config.max_iterations {
            return (SolverExitCondition::MaxIterationsExceeded, iterations);
        }
        if start.elapsed() > config.timeout {
            return (SolverExitCondition::Timeout, iterations);
        }
        if e_0 > config.tolerance && acceptable_iter_counter >= config.max_acceptable_iterations {
            return (SolverExitCondition::SolvedToAcceptableTolerance, iterations);
        }

        // Tiny steps twice in a row: this barrier subproblem is done
        if step_too_small_counter >= 2 && barrier.mu > barrier.mu_min {
            barrier.update(&mut filter);
        }
    }

    (SolverExitCondition::Success, iterations)
}
