//! Problem builder and solver dispatch.

use gradus::{
    Arena, EqualityConstraints, ExpressionType, InequalityConstraints, Variable, VariableMatrix,
};

use crate::config::SolverConfig;
use crate::diagnostics;
use crate::iteration::{IterationCallback, SolverIterationInfo};
use crate::solvers::{interior_point, set_values, sqp, Nlp};
use crate::status::SolverStatus;

/// Constraints that can be handed to [`Problem::subject_to`].
pub trait ConstraintSet {
    fn append_to(self, problem: &mut Problem);
}

impl ConstraintSet for EqualityConstraints {
    fn append_to(self, problem: &mut Problem) {
        problem.equality_constraints.extend(self.constraints);
    }
}

impl ConstraintSet for InequalityConstraints {
    fn append_to(self, problem: &mut Problem) {
        problem.inequality_constraints.extend(self.constraints);
    }
}

/// A nonlinear program
///
/// ```text
/// min f(x)  subject to  cₑ(x) = 0,  cᵢ(x) ≥ 0
/// ```
///
/// built from decision variables of the problem's arena. [`solve`](Self::solve)
/// writes the solution back into those variables.
///
/// # Example
/// ```
/// use gradus_optim::{Problem, SolverConfig};
///
/// let mut problem = Problem::new();
/// let x = problem.decision_variable();
/// let y = problem.decision_variable();
/// problem.minimize(&x * &x + &y * &y);
/// problem.subject_to((&x + &y).equals(1.0));
///
/// let status = problem.solve(&SolverConfig::default());
/// assert!(status.exit_condition.is_success());
/// assert!((x.value() - 0.5).abs() < 1e-6);
/// ```
pub struct Problem {
    arena: Arena,
    decision_variables: Vec<Variable>,
    cost: Option<Variable>,
    equality_constraints: Vec<Variable>,
    inequality_constraints: Vec<Variable>,
    callbacks: Vec<IterationCallback<'static>>,
}

impl Default for Problem {
    fn default() -> Self {
        Problem::new()
    }
}

impl Problem {
    /// Empty problem with a fresh arena.
    pub fn new() -> Self {
        Problem::with_arena(Arena::new())
    }

    /// Empty problem whose variables live in `arena`.
    pub fn with_arena(arena: Arena) -> Self {
        Problem {
            arena,
            decision_variables: Vec::new(),
            cost: None,
            equality_constraints: Vec::new(),
            inequality_constraints: Vec::new(),
            callbacks: Vec::new(),
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// New scalar decision variable, initialised to zero.
    pub fn decision_variable(&mut self) -> Variable {
        let var = Variable::new(&self.arena);
        self.decision_variables.push(var.clone());
        var
    }

    /// `rows × cols` matrix of independent decision variables.
    pub fn decision_variable_matrix(&mut self, rows: usize, cols: usize) -> VariableMatrix {
        let mat = VariableMatrix::new(&self.arena, rows, cols);
        self.decision_variables.extend(mat.iter().cloned());
        mat
    }

    /// Symmetric `rows × rows` matrix: entries `(i, j)` and `(j, i)` are the
    /// same variable, so only the upper triangle adds decision variables.
    pub fn symmetric_decision_variable(&mut self, rows: usize) -> VariableMatrix {
        let mut upper = Vec::with_capacity(rows * (rows + 1) / 2);
        for _ in 0..rows * (rows + 1) / 2 {
            upper.push(self.decision_variable());
        }
        // Row-major index of (i, j) with i ≤ j in the packed upper triangle
        let packed = |i: usize, j: usize| i * rows - i * (i + 1) / 2 + j;
        VariableMatrix::from_fn(rows, rows, |r, c| {
            let (i, j) = if r <= c { (r, c) } else { (c, r) };
            upper[packed(i, j)].clone()
        })
    }

    pub fn minimize(&mut self, cost: Variable) {
        self.cost = Some(cost);
    }

    pub fn maximize(&mut self, objective: Variable) {
        self.cost = Some(-objective);
    }

    /// Add equality or inequality constraints.
    pub fn subject_to(&mut self, constraints: impl ConstraintSet) {
        constraints.append_to(self);
    }

    /// Register a per-iteration callback. Returning `true` from any callback
    /// stops the solve.
    pub fn add_callback(
        &mut self,
        callback: impl FnMut(&SolverIterationInfo<'_>) -> bool + 'static,
    ) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn clear_callbacks(&mut self) {
        self.callbacks.clear();
    }

    pub fn decision_variables(&self) -> &[Variable] {
        &self.decision_variables
    }

    pub fn equality_constraints(&self) -> &[Variable] {
        &self.equality_constraints
    }

    pub fn inequality_constraints(&self) -> &[Variable] {
        &self.inequality_constraints
    }

    pub fn cost_function_type(&self) -> ExpressionType {
        self.cost
            .as_ref()
            .map_or(ExpressionType::None, Variable::expression_type)
    }

    pub fn equality_constraint_type(&self) -> ExpressionType {
        constraint_type(&self.equality_constraints)
    }

    pub fn inequality_constraint_type(&self) -> ExpressionType {
        constraint_type(&self.inequality_constraints)
    }

    /// Solve from the current values of the decision variables.
    ///
    /// Problems without inequality constraints go to the SQP solver, the
    /// rest to the interior-point solver. The returned status always carries
    /// the cost at the final iterate, which the decision variables also hold.
    pub fn solve(&mut self, config: &SolverConfig) -> SolverStatus {
        let cost = self.cost.clone().unwrap_or_else(|| self.arena.constant(0.0));

        let mut status = SolverStatus {
            cost_function_type: self.cost_function_type(),
            equality_constraint_type: self.equality_constraint_type(),
            inequality_constraint_type: self.inequality_constraint_type(),
            ..SolverStatus::default()
        };

        if config.diagnostics {
            diagnostics::log_problem_summary(
                status.cost_function_type,
                status.equality_constraint_type,
                status.inequality_constraint_type,
                self.decision_variables.len(),
                self.equality_constraints.len(),
                self.inequality_constraints.len(),
            );
        }

        // Nothing to optimise
        if self.decision_variables.is_empty()
            || (status.cost_function_type <= ExpressionType::Constant
                && status.equality_constraint_type <= ExpressionType::Constant
                && status.inequality_constraint_type <= ExpressionType::Constant)
        {
            status.cost = cost.value();
            return status;
        }

        let mut x: Vec<f64> = self.decision_variables.iter().map(Variable::value).collect();

        let callbacks = &mut self.callbacks;
        let mut callback = |info: &SolverIterationInfo<'_>| callbacks.iter_mut().any(|cb| cb(info));

        let nlp = Nlp {
            decision_variables: &self.decision_variables,
            equality_constraints: &self.equality_constraints,
            inequality_constraints: &self.inequality_constraints,
            cost: &cost,
        };

        status.exit_condition = if self.inequality_constraints.is_empty() {
            if config.diagnostics {
                diagnostics::log_solver_choice("SQP");
            }
            sqp(&nlp, &mut callback, config, &mut x)
        } else {
            if config.diagnostics {
                diagnostics::log_solver_choice("interior-point");
            }
            let mut s = vec![1.0; self.inequality_constraints.len()];
            interior_point(&nlp, &mut callback, config, false, &mut x, &mut s)
        };

        set_values(&self.decision_variables, &x);
        status.cost = cost.value();
        status
    }
}

fn constraint_type(constraints: &[Variable]) -> ExpressionType {
    constraints
        .iter()
        .map(Variable::expression_type)
        .max()
        .unwrap_or(ExpressionType::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn symmetric_variable_shares_entries() {
        let mut problem = Problem::new();
        let p = problem.symmetric_decision_variable(3);
        assert_eq!(problem.decision_variables().len(), 6);
        for r in 0..3 {
            for c in 0..3 {
                assert!(p[(r, c)].same_node(&p[(c, r)]));
            }
        }
        assert!(!p[(0, 1)].same_node(&p[(0, 2)]));
    }

    #[test]
    fn constraint_types_summarise_rows() {
        let mut problem = Problem::new();
        let x = problem.decision_variable();
        let y = problem.decision_variable();
        problem.subject_to((&x + &y).equals(1.0));
        problem.subject_to((&x * &y).geq(0.0));
        problem.subject_to(x.sin().leq(0.5));
        assert_eq!(problem.cost_function_type(), ExpressionType::None);
        assert_eq!(problem.equality_constraint_type(), ExpressionType::Linear);
        assert_eq!(problem.inequality_constraint_type(), ExpressionType::Nonlinear);
    }

    #[test]
    fn empty_problem_succeeds_immediately() {
        let mut problem = Problem::new();
        let status = problem.solve(&SolverConfig::default());
        assert!(status.exit_condition.is_success());
        assert_eq!(status.cost_function_type, ExpressionType::None);
        assert_eq!(status.cost, 0.0);
    }

    #[test]
    fn callback_stops_solve() {
        let mut problem = Problem::new();
        let x = problem.decision_variable();
        x.set_value(3.0);
        problem.minimize(&x * &x * &x * &x);

        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        problem.add_callback(move |info| {
            seen.set(seen.get() + 1);
            info.iteration >= 2
        });

        let status = problem.solve(&SolverConfig::default());
        assert_eq!(
            status.exit_condition,
            crate::SolverExitCondition::CallbackRequestedStop
        );
        assert_eq!(calls.get(), 3);
    }
}
