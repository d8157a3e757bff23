use std::time::Duration;

use approx::assert_relative_eq;
use gradus::{ExpressionType, VariableMatrix};
use gradus_optim::{geq, Problem, SolverConfig, SolverExitCondition};

// ============================================================
// SQP (no inequality constraints)
// ============================================================

#[test]
fn sqp_equality_constrained_quadratic() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    let y = problem.decision_variable();
    problem.minimize(&x * &x + &y * &y);
    problem.subject_to((&x + &y).equals(1.0));

    let status = problem.solve(&SolverConfig::default());

    assert_eq!(status.exit_condition, SolverExitCondition::Success);
    assert_eq!(status.cost_function_type, ExpressionType::Quadratic);
    assert_eq!(status.equality_constraint_type, ExpressionType::Linear);
    assert_eq!(status.inequality_constraint_type, ExpressionType::None);
    assert_relative_eq!(x.value(), 0.5, epsilon = 1e-6);
    assert_relative_eq!(y.value(), 0.5, epsilon = 1e-6);
    assert_relative_eq!(status.cost, 0.5, epsilon = 1e-6);
}

#[test]
fn sqp_unconstrained_rosenbrock() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    let y = problem.decision_variable();
    x.set_value(-1.2);
    y.set_value(1.0);

    let a = 1.0 - &x;
    let b = &y - &x * &x;
    problem.minimize(&a * &a + 100.0 * (&b * &b));

    let status = problem.solve(&SolverConfig::default());

    assert_eq!(status.exit_condition, SolverExitCondition::Success);
    assert_relative_eq!(x.value(), 1.0, epsilon = 1e-6);
    assert_relative_eq!(y.value(), 1.0, epsilon = 1e-6);
}

#[test]
fn sqp_one_variable_unconstrained() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    x.set_value(3.0);
    problem.minimize(&x * &x);

    let status = problem.solve(&SolverConfig::default());

    assert_eq!(status.exit_condition, SolverExitCondition::Success);
    assert_relative_eq!(x.value(), 0.0, epsilon = 1e-6);
}

#[test]
fn sqp_one_variable_nonconvex_start() {
    // Negative curvature at x = 0.1 forces a regularized 1×1 system
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    x.set_value(0.1);
    problem.minimize(x.pow(4.0) - &x * &x);

    let status = problem.solve(&SolverConfig::default());

    assert!(status.exit_condition.is_success(), "{}", status.exit_condition);
    assert_relative_eq!(x.value(), 0.5_f64.sqrt(), epsilon = 1e-6);
}

#[test]
fn sqp_nonlinear_equality() {
    // Closest point to (2, 1) on the unit circle
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    let y = problem.decision_variable();
    x.set_value(1.0);
    y.set_value(0.5);

    let dx = &x - 2.0;
    let dy = &y - 1.0;
    problem.minimize(&dx * &dx + &dy * &dy);
    problem.subject_to((&x * &x + &y * &y).equals(1.0));

    let status = problem.solve(&SolverConfig::default());

    assert!(status.exit_condition.is_success(), "{}", status.exit_condition);
    let norm = 5.0_f64.sqrt();
    assert_relative_eq!(x.value(), 2.0 / norm, epsilon = 1e-6);
    assert_relative_eq!(y.value(), 1.0 / norm, epsilon = 1e-6);
}

#[test]
fn sqp_inconsistent_equalities_are_locally_infeasible() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    let y = problem.decision_variable();
    problem.subject_to((&x + &y).equals(1.0));
    problem.subject_to((&x + &y).equals(2.0));

    let status = problem.solve(&SolverConfig::default());

    assert_eq!(status.exit_condition, SolverExitCondition::LocallyInfeasible);
}

#[test]
fn too_few_degrees_of_freedom() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    problem.subject_to(x.equals(1.0));
    problem.subject_to(x.equals(2.0));

    let status = problem.solve(&SolverConfig::default());

    assert_eq!(status.exit_condition, SolverExitCondition::TooFewDofs);
}

#[test]
fn nonfinite_initial_cost() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    problem.minimize(x.ln());

    let status = problem.solve(&SolverConfig::default());

    assert_eq!(
        status.exit_condition,
        SolverExitCondition::NonfiniteInitialCostOrConstraints
    );
}

#[test]
fn max_iterations_is_a_soft_exit() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    x.set_value(10.0);
    problem.minimize(&x * &x * &x * &x);

    let status = problem.solve(&SolverConfig::default().with_max_iterations(2));

    assert_eq!(status.exit_condition, SolverExitCondition::MaxIterationsExceeded);
    // Still returns the improved iterate
    assert!(x.value().abs() < 10.0);
    assert_relative_eq!(status.cost, x.value().powi(4), max_relative = 1e-12);
}

#[test]
fn zero_timeout_stops_after_first_iteration() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    x.set_value(10.0);
    problem.minimize(&x * &x * &x * &x);

    let status = problem.solve(&SolverConfig::default().with_timeout(Duration::ZERO));

    assert_eq!(status.exit_condition, SolverExitCondition::Timeout);
}

#[test]
fn constant_problem_returns_immediately() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    x.set_value(4.0);
    problem.minimize(problem.arena().constant(3.0));

    let status = problem.solve(&SolverConfig::default());

    assert_eq!(status.exit_condition, SolverExitCondition::Success);
    assert_eq!(status.cost, 3.0);
    assert_eq!(x.value(), 4.0);
}

// ============================================================
// Interior point
// ============================================================

#[test]
fn interior_point_active_bound() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    let d = &x - 2.0;
    problem.minimize(&d * &d);
    problem.subject_to(x.geq(3.0));

    let status = problem.solve(&SolverConfig::default());

    assert!(status.exit_condition.is_success(), "{}", status.exit_condition);
    assert_eq!(status.inequality_constraint_type, ExpressionType::Linear);
    assert_relative_eq!(x.value(), 3.0, epsilon = 1e-6);
    assert_relative_eq!(status.cost, 1.0, epsilon = 1e-5);
}

#[test]
fn interior_point_inactive_bound() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    let d = &x - 2.0;
    problem.minimize(&d * &d);
    problem.subject_to(x.leq(5.0));

    let status = problem.solve(&SolverConfig::default());

    assert!(status.exit_condition.is_success(), "{}", status.exit_condition);
    assert_relative_eq!(x.value(), 2.0, epsilon = 1e-6);
}

#[test]
fn interior_point_mixed_constraints() {
    // min x² + y²  s.t.  x + y = 2, x ≥ 1.5
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    let y = problem.decision_variable();
    problem.minimize(&x * &x + &y * &y);
    problem.subject_to((&x + &y).equals(2.0));
    problem.subject_to(geq(&x, 1.5));

    let status = problem.solve(&SolverConfig::default());

    assert!(status.exit_condition.is_success(), "{}", status.exit_condition);
    assert_relative_eq!(x.value(), 1.5, epsilon = 1e-6);
    assert_relative_eq!(y.value(), 0.5, epsilon = 1e-6);
}

#[test]
fn interior_point_matrix_bounds() {
    // Projection of (3, -1, 0.5) onto the box [0, 1]³
    let mut problem = Problem::new();
    let x = problem.decision_variable_matrix(3, 1);
    let target = VariableMatrix::from_values(problem.arena(), 3, 1, &[3.0, -1.0, 0.5]);
    let diff = &x - &target;
    problem.minimize((diff.t() * &diff)[(0, 0)].clone());
    problem.subject_to(x.geq(0.0));
    problem.subject_to(x.leq(1.0));

    let status = problem.solve(&SolverConfig::default());

    assert!(status.exit_condition.is_success(), "{}", status.exit_condition);
    let values = x.values();
    assert_relative_eq!(values[0], 1.0, epsilon = 1e-6);
    assert_relative_eq!(values[1], 0.0, epsilon = 1e-6);
    assert_relative_eq!(values[2], 0.5, epsilon = 1e-6);
}

#[test]
fn feasible_ipm_keeps_feasible_iterates() {
    // x stays inside the log's domain only if x ≥ 0.5 holds at every trial
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    x.set_value(4.0);
    problem.minimize(&x - x.ln());
    problem.subject_to(x.geq(0.5));

    let status = problem.solve(&SolverConfig::default().with_feasible_ipm(true));

    assert!(status.exit_condition.is_success(), "{}", status.exit_condition);
    assert_relative_eq!(x.value(), 1.0, epsilon = 1e-6);
}

#[test]
fn conflicting_bounds_are_locally_infeasible() {
    // x ≥ 2 and x ≤ 1: at x = 1.5 both violations cancel in Aᵢᵀcᵢ⁻
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    x.set_value(1.5);
    problem.minimize(&x * &x);
    problem.subject_to(x.geq(2.0));
    problem.subject_to(x.leq(1.0));

    let status = problem.solve(&SolverConfig::default());

    assert_eq!(status.exit_condition, SolverExitCondition::LocallyInfeasible);
}

#[test]
fn conflicting_bounds_never_report_success() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    problem.minimize(&x * &x);
    problem.subject_to(x.geq(2.0));
    problem.subject_to(x.leq(1.0));

    let status = problem.solve(&SolverConfig::default().with_max_iterations(200));

    assert!(!status.exit_condition.is_success(), "{}", status.exit_condition);
}

#[test]
fn callbacks_see_slacks_for_interior_point() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut problem = Problem::new();
    let x = problem.decision_variable();
    let d = &x - 2.0;
    problem.minimize(&d * &d);
    problem.subject_to(x.geq(3.0));

    let sizes = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&sizes);
    problem.add_callback(move |info| {
        log.borrow_mut().push((info.x.len(), info.s.len(), info.a_i.rows()));
        false
    });

    problem.solve(&SolverConfig::default());

    let sizes = sizes.borrow();
    assert!(!sizes.is_empty());
    assert!(sizes.iter().all(|&sz| sz == (1, 1, 1)));
}
