#![cfg(feature = "serde")]

use std::time::Duration;

use gradus::ExpressionType;
use gradus_optim::{Problem, SolverConfig, SolverExitCondition, SolverStatus};

#[test]
fn config_roundtrip_json() {
    let config = SolverConfig::default()
        .with_tolerance(1e-10)
        .with_timeout(Duration::from_millis(250))
        .with_feasible_ipm(true);
    let json = serde_json::to_string(&config).unwrap();
    let restored: SolverConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, config);

    // An unbounded timeout survives too
    let json = serde_json::to_string(&SolverConfig::default()).unwrap();
    let restored: SolverConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.timeout, Duration::MAX);
}

#[test]
fn status_roundtrip_json() {
    let mut problem = Problem::new();
    let x = problem.decision_variable();
    x.set_value(2.0);
    problem.minimize(&x * &x);
    problem.subject_to(x.geq(1.0));
    let status = problem.solve(&SolverConfig::default());
    assert_eq!(status.cost_function_type, ExpressionType::Quadratic);

    let json = serde_json::to_string(&status).unwrap();
    let restored: SolverStatus = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, status);

    let exit: SolverExitCondition = serde_json::from_str("\"LocallyInfeasible\"").unwrap();
    assert_eq!(exit, SolverExitCondition::LocallyInfeasible);
}
