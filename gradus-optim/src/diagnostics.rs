//! Progress reporting through `tracing`.
//!
//! Everything here is emitted at INFO and only when
//! [`SolverConfig::diagnostics`](crate::SolverConfig::diagnostics) is set.

use std::time::Duration;

use gradus::ExpressionType;

use crate::status::SolverExitCondition;

/// Which solve produced an iteration row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationMode {
    Normal,
    /// Step accepted after a second-order correction.
    SecondOrderCorrection,
    /// Iteration of a nested feasibility-restoration solve.
    FeasibilityRestoration,
}

impl IterationMode {
    fn marker(self) -> char {
        match self {
            IterationMode::Normal => ' ',
            IterationMode::SecondOrderCorrection => 's',
            IterationMode::FeasibilityRestoration => 'r',
        }
    }
}

/// One line of the iteration table.
#[derive(Debug, Clone, Copy)]
pub struct IterationRow {
    pub mode: IterationMode,
    pub iteration: usize,
    pub elapsed: Duration,
    pub error: f64,
    pub cost: f64,
    pub infeasibility: f64,
    pub delta: f64,
    pub primal_alpha: f64,
    pub dual_alpha: f64,
}

pub fn log_problem_summary(
    cost: ExpressionType,
    equality: ExpressionType,
    inequality: ExpressionType,
    num_decision_variables: usize,
    num_equality_constraints: usize,
    num_inequality_constraints: usize,
) {
    tracing::info!(
        "solving a problem with {cost} cost, {equality} equality and {inequality} inequality constraints"
    );
    tracing::info!(
        decision_variables = num_decision_variables,
        equality_constraints = num_equality_constraints,
        inequality_constraints = num_inequality_constraints,
        "problem size"
    );
}

pub fn log_solver_choice(name: &str) {
    tracing::info!("using the {name} solver");
}

pub fn log_iteration_header() {
    tracing::info!(
        "{:>5} {:>10} {:>11} {:>12} {:>11} {:>9} {:>9} {:>9}",
        "iter",
        "time (ms)",
        "error",
        "cost",
        "infeas.",
        "reg",
        "primal α",
        "dual α"
    );
}

pub fn log_iteration(row: &IterationRow) {
    tracing::info!(
        "{:>4}{} {:>10.3} {:>11.4e} {:>12.5e} {:>11.4e} {:>9.2e} {:>9.2e} {:>9.2e}",
        row.iteration,
        row.mode.marker(),
        row.elapsed.as_secs_f64() * 1e3,
        row.error,
        row.cost,
        row.infeasibility,
        row.delta,
        row.primal_alpha,
        row.dual_alpha
    );
}

pub fn log_exit(exit_condition: SolverExitCondition, iterations: usize, elapsed: Duration) {
    tracing::info!(
        iterations,
        elapsed_ms = elapsed.as_secs_f64() * 1e3,
        "exit: {exit_condition}"
    );
}
