use gradus_optim::{multistart, MultistartResult, Problem, SolverConfig, SolverExitCondition};

/// min x − ln x from `x0`: a start at 0 has a nonfinite initial cost.
fn solve_log_barrier(&x0: &f64) -> MultistartResult<f64> {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    x.set_value(x0);
    problem.minimize(&x - x.ln());
    let status = problem.solve(&SolverConfig::default());
    MultistartResult {
        status,
        variables: x.value(),
    }
}

/// Tilted double well with minima near ±1; the left one is lower.
fn solve_double_well(&x0: &f64) -> MultistartResult<f64> {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    x.set_value(x0);
    let w = &x * &x - 1.0;
    problem.minimize(&w * &w + 0.3 * &x);
    let status = problem.solve(&SolverConfig::default());
    MultistartResult {
        status,
        variables: x.value(),
    }
}

#[test]
fn only_converging_start_wins_regardless_of_position() {
    for position in 0..4 {
        let mut guesses = vec![0.0; 4];
        guesses[position] = 2.0;

        let best = multistart(solve_log_barrier, &guesses).unwrap();

        assert_eq!(best.status.exit_condition, SolverExitCondition::Success);
        assert!((best.variables - 1.0).abs() < 1e-6);
    }
}

#[test]
fn lower_cost_wins_among_successes() {
    let guesses = [0.9, -0.9, 1.1];

    let best = multistart(solve_double_well, &guesses).unwrap();

    assert_eq!(best.status.exit_condition, SolverExitCondition::Success);
    assert!(best.variables < 0.0, "picked x = {}", best.variables);
    assert!(best.status.cost < 0.0);
}
