//! Sequential quadratic programming for equality-constrained problems.
//!
//! Each iteration solves the Newton-KKT system
//!
//! ```text
//! [H   Aₑᵀ][ pˣ] = −[∇f − Aₑᵀy]
//! [Aₑ   0 ][−pʸ]    [    cₑ   ]
//! ```
//!
//! where H is the Hessian of `L = f − yᵀcₑ`, then runs a filter line search
//! with second-order corrections. When the step length collapses the
//! feasibility-restoration sub-problem takes over.

use std::time::Instant;

use gradus::{Gradient, Hessian, Jacobian, Variable};

use crate::config::SolverConfig;
use crate::diagnostics::{self, IterationMode, IterationRow};
use crate::error_estimate::{kkt_error, sqp_error_estimate};
use crate::filter::{Filter, FilterEntry};
use crate::iteration::SolverIterationInfo;
use crate::linalg::sparse::{all_finite, axpy, mul_transpose_vec, norm1, sub, zeros};
use crate::linalg::RegularizedLdlt;
use crate::solvers::feasibility_restoration::{least_squares_duals, restore};
use crate::solvers::{
    assemble_kkt, is_diverging, is_equality_locally_infeasible, is_step_too_small, set_values,
    Evaluator, Nlp, ALPHA_MIN_FRACTION, ALPHA_REDUCTION, MAX_SECOND_ORDER_CORRECTIONS,
    SOC_VIOLATION_REDUCTION,
};
use crate::status::SolverExitCondition;

/// Solve `nlp` (which must have no inequality constraints) from the initial
/// guess in `x`. On return `x` and the decision variables hold the final
/// iterate.
pub fn sqp(
    nlp: &Nlp<'_>,
    callback: &mut dyn FnMut(&SolverIterationInfo<'_>) -> bool,
    config: &SolverConfig,
    x: &mut Vec<f64>,
) -> SolverExitCondition {
    debug_assert!(nlp.inequality_constraints.is_empty());
    let start = Instant::now();
    let (exit_condition, iterations) = run(nlp, callback, config, x, start);
    set_values(nlp.decision_variables, x);
    if config.diagnostics {
        diagnostics::log_exit(exit_condition, iterations, start.elapsed());
    }
    exit_condition
}

fn split_step(step: &[f64], n: usize) -> (Vec<f64>, Vec<f64>) {
    let p_x = step[..n].to_vec();
    let p_y = step[n..].iter().map(|v| -v).collect();
    (p_x, p_y)
}

/// Correct a rejected step of length `alpha` for the curvature of cₑ, reusing
/// the factorization in `solver`. `evaluate` maps a trial point to its cost
/// and equality values. Returns the corrected `(pˣ, pʸ)` once the filter
/// accepts one.
#[allow(clippy::too_many_arguments)]
fn second_order_correction(
    solver: &RegularizedLdlt,
    filter: &mut Filter,
    x: &[f64],
    rhs: &[f64],
    c_e: &[f64],
    mut trial_c_e: Vec<f64>,
    alpha: f64,
    evaluate: &mut dyn FnMut(&[f64]) -> (f64, Vec<f64>),
) -> Option<(Vec<f64>, Vec<f64>)> {
    let n = x.len();
    let mut c_e_soc = c_e.to_vec();
    let mut rhs_soc = rhs.to_vec();
    let mut prev_violation = norm1(&trial_c_e);

    for _ in 0..MAX_SECOND_ORDER_CORRECTIONS {
        for (soc, trial) in c_e_soc.iter_mut().zip(&trial_c_e) {
            *soc = alpha * *soc + trial;
        }
        for (r, c) in rhs_soc[n..].iter_mut().zip(&c_e_soc) {
            *r = -c;
        }
        let (p_x, p_y) = split_step(&solver.solve(&rhs_soc), n);

        let (trial_f, values) = evaluate(&axpy(x, alpha, &p_x));
        trial_c_e = values;
        let entry = FilterEntry::sqp(trial_f, &trial_c_e);
        if filter.try_add(entry) {
            return Some((p_x, p_y));
        }

        // Stop once a correction no longer reduces the violation enough
        if entry.violation > SOC_VIOLATION_REDUCTION * prev_violation {
            break;
        }
        prev_violation = entry.violation;
    }
    None
}

fn run(
    nlp: &Nlp<'_>,
    callback: &mut dyn FnMut(&SolverIterationInfo<'_>) -> bool,
    config: &SolverConfig,
    x: &mut Vec<f64>,
    start: Instant,
) -> (SolverExitCondition, usize) {
    let decision_variables = nlp.decision_variables;
    let n = decision_variables.len();
    let m_e = nlp.equality_constraints.len();

    if m_e > n {
        return (SolverExitCondition::TooFewDofs, 0);
    }

    let arena = nlp.arena();
    let y_ad: Vec<Variable> = (0..m_e).map(|_| Variable::new(&arena)).collect();

    // L = f − yᵀcₑ
    let mut lagrangian = nlp.cost.clone();
    for (y_i, c_i) in y_ad.iter().zip(nlp.equality_constraints) {
        lagrangian -= y_i * c_i;
    }

    set_values(decision_variables, x);
    let cost = Evaluator::new(std::slice::from_ref(nlp.cost));
    let c_e_ad = Evaluator::new(nlp.equality_constraints);
    let gradient_f = Gradient::new(nlp.cost, decision_variables);
    let jacobian_c_e = Jacobian::new(nlp.equality_constraints, decision_variables);
    let hessian_l = Hessian::new(&lagrangian, decision_variables);
    let a_i = zeros(0, n);

    let mut y = vec![0.0; m_e];
    set_values(&y_ad, &y);

    let mut f = cost.scalar();
    let mut c_e = c_e_ad.values();
    if !f.is_finite() || !all_finite(&c_e) {
        return (SolverExitCondition::NonfiniteInitialCostOrConstraints, 0);
    }
    let mut g = gradient_f.value();
    let mut a_e = jacobian_c_e.value();
    let mut h = hessian_l.value();

    let mut spy = crate::spy::SpyFiles::open(config.spy);
    let mut solver = RegularizedLdlt::new(n, m_e);
    let mut filter = Filter::new();

    let mut iterations = 0;
    let mut full_step_rejected_counter = 0;
    let mut acceptable_iter_counter = 0;
    let mut e_0 = sqp_error_estimate(&g, &a_e, &c_e, &y);

    if config.diagnostics {
        diagnostics::log_iteration_header();
    }

    while e_0 > config.tolerance {
        let iteration_start = Instant::now();

        if is_equality_locally_infeasible(&a_e, &c_e) {
            tracing::debug!("equality constraints are locally infeasible");
            return (SolverExitCondition::LocallyInfeasible, iterations);
        }
        if is_diverging(x) {
            return (SolverExitCondition::DivergingIterates, iterations);
        }

        let info = SolverIterationInfo {
            iteration: iterations,
            x,
            s: &[],
            g: &g,
            h: &h,
            a_e: &a_e,
            a_i: &a_i,
        };
        if callback(&info) {
            return (SolverExitCondition::CallbackRequestedStop, iterations);
        }
        spy.record(&h, &a_e, &a_i);

        let lhs = assemble_kkt(&h, &a_e);
        let a_ety = mul_transpose_vec(&a_e, &y);
        let mut rhs: Vec<f64> = g.iter().zip(&a_ety).map(|(g_k, a_k)| a_k - g_k).collect();
        rhs.extend(c_e.iter().map(|c| -c));

        if let Err(e) = solver.compute(&lhs, 0.0) {
            tracing::debug!(error = %e, "KKT factorization failed; taking a zero step");
        }
        let (mut p_x, mut p_y) = split_step(&solver.solve(&rhs), n);

        let mut alpha = 1.0;
        let mut mode = IterationMode::Normal;

        loop {
            let trial_x = axpy(x, alpha, &p_x);
            set_values(decision_variables, &trial_x);
            let trial_f = cost.scalar();
            let trial_c_e = c_e_ad.values();

            if !trial_f.is_finite() || !all_finite(&trial_c_e) {
                alpha *= ALPHA_REDUCTION;
                continue;
            }

            let entry = FilterEntry::sqp(trial_f, &trial_c_e);
            if filter.try_add(entry) {
                break;
            }

            // Constraint violation did not drop: try correcting the step for
            // the curvature of cₑ with the factorization already in hand.
            if entry.violation >= norm1(&c_e) {
                let mut evaluate = |trial_x: &[f64]| {
                    set_values(decision_variables, trial_x);
                    (cost.scalar(), c_e_ad.values())
                };
                let correction = second_order_correction(
                    &solver,
                    &mut filter,
                    x,
                    &rhs,
                    &c_e,
                    trial_c_e,
                    alpha,
                    &mut evaluate,
                );
                if let Some((p_x_cor, p_y_soc)) = correction {
                    p_x = p_x_cor;
                    p_y = p_y_soc;
                    mode = IterationMode::SecondOrderCorrection;
                    break;
                }
            }

            if alpha == 1.0 {
                full_step_rejected_counter += 1;
            }

            // Repeatedly rejected full steps suggest the filter itself is
            // blocking progress.
            if full_step_rejected_counter >= 4 && filter.max_violation() > entry.violation / 10.0 {
                filter.shrink_max_violation();
                continue;
            }

            alpha *= ALPHA_REDUCTION;

            if alpha < ALPHA_MIN_FRACTION * Filter::GAMMA_CONSTRAINT {
                let current_kkt_error = kkt_error(&g, &a_e, &c_e, &a_i, &[], &[], &y, &[], 0.0);

                let trial_x = axpy(x, 1.0, &p_x);
                let trial_y = axpy(&y, 1.0, &p_y);
                set_values(decision_variables, &trial_x);
                let trial_c_e = c_e_ad.values();
                let next_kkt_error = kkt_error(
                    &gradient_f.value(),
                    &jacobian_c_e.value(),
                    &trial_c_e,
                    &a_i,
                    &[],
                    &[],
                    &trial_y,
                    &[],
                    0.0,
                );

                // The full step still reduces the KKT error, so take it
                if next_kkt_error <= 0.999 * current_kkt_error {
                    alpha = 1.0;
                    break;
                }

                tracing::debug!(iteration = iterations, "entering feasibility restoration");
                let initial_violation = norm1(&c_e);
                let mut restoration_callback = |info: &SolverIterationInfo<'_>| {
                    set_values(decision_variables, &info.x[..n]);
                    let entry = FilterEntry::sqp(cost.scalar(), &c_e_ad.values());
                    filter.is_acceptable(&entry) && entry.violation < 0.9 * initial_violation
                };
                let outcome = restore(
                    nlp,
                    config.tolerance / 10.0,
                    config,
                    x,
                    &[],
                    &mut restoration_callback,
                );

                match outcome.exit_condition {
                    SolverExitCondition::CallbackRequestedStop => {
                        p_x = sub(&outcome.x, x);
                        set_values(decision_variables, &outcome.x);
                        p_y = match least_squares_duals(
                            &gradient_f.value(),
                            &jacobian_c_e.value(),
                            &a_i,
                            &[],
                            0.0,
                        ) {
                            Some((y_estimate, _)) => sub(&y_estimate, &y),
                            None => vec![0.0; m_e],
                        };
                        alpha = 1.0;
                        mode = IterationMode::FeasibilityRestoration;
                        break;
                    }
                    SolverExitCondition::Success => {
                        *x = outcome.x;
                        return (SolverExitCondition::LocallyInfeasible, iterations);
                    }
                    _ => {
                        *x = outcome.x;
                        return (SolverExitCondition::FeasibilityRestorationFailed, iterations);
                    }
                }
            }
        }

        if alpha == 1.0 {
            full_step_rejected_counter = 0;
        }
        if is_step_too_small(&p_x, x) {
            alpha = 1.0;
        }

        *x = axpy(x, alpha, &p_x);
        y = axpy(&y, alpha, &p_y);
        set_values(decision_variables, x);
        set_values(&y_ad, &y);

        f = cost.scalar();
        c_e = c_e_ad.values();
        g = gradient_f.value();
        a_e = jacobian_c_e.value();
        h = hessian_l.value();

        e_0 = sqp_error_estimate(&g, &a_e, &c_e, &y);
        if e_0 < config.acceptable_tolerance {
            acceptable_iter_counter += 1;
        } else {
            acceptable_iter_counter = 0;
        }

        if config.diagnostics {
            diagnostics::log_iteration(&IterationRow {
                mode,
                iteration: iterations,
                elapsed: iteration_start.elapsed(),
                error: e_0,
                cost: f,
                infeasibility: norm1(&c_e),
                delta: solver.delta(),
                primal_alpha: alpha,
                dual_alpha: alpha,
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
    }

    (SolverExitCondition::Success, iterations)
}
