use std::fmt;

use gradus::ExpressionType;

/// Why a solve returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverExitCondition {
    /// KKT error reached the configured tolerance.
    Success,
    /// Acceptable tolerance held for the configured number of iterations.
    SolvedToAcceptableTolerance,
    CallbackRequestedStop,
    /// More equality constraints than decision variables.
    TooFewDofs,
    LocallyInfeasible,
    FeasibilityRestorationFailed,
    NonfiniteInitialCostOrConstraints,
    DivergingIterates,
    MaxIterationsExceeded,
    Timeout,
}

impl SolverExitCondition {
    /// True for the two converged outcomes.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            SolverExitCondition::Success | SolverExitCondition::SolvedToAcceptableTolerance
        )
    }
}

impl fmt::Display for SolverExitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            SolverExitCondition::Success => "solved to desired tolerance",
            SolverExitCondition::SolvedToAcceptableTolerance => "solved to acceptable tolerance",
            SolverExitCondition::CallbackRequestedStop => "callback requested stop",
            SolverExitCondition::TooFewDofs => "problem has too few degrees of freedom",
            SolverExitCondition::LocallyInfeasible => "problem is locally infeasible",
            SolverExitCondition::FeasibilityRestorationFailed => {
                "solver failed to reach the desired tolerance, and feasibility restoration failed to converge"
            }
            SolverExitCondition::NonfiniteInitialCostOrConstraints => {
                "solver encountered nonfinite initial cost or constraints and gave up"
            }
            SolverExitCondition::DivergingIterates => {
                "solver encountered diverging primal iterates xₖ and/or sₖ and gave up"
            }
            SolverExitCondition::MaxIterationsExceeded => {
                "solution returned after maximum iterations exceeded"
            }
            SolverExitCondition::Timeout => "solution returned after maximum wall clock time exceeded",
        };
        f.write_str(message)
    }
}

/// Outcome of [`Problem::solve`](crate::Problem::solve).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverStatus {
    pub cost_function_type: ExpressionType,
    pub equality_constraint_type: ExpressionType,
    pub inequality_constraint_type: ExpressionType,
    pub exit_condition: SolverExitCondition,
    /// Objective value at the returned iterate.
    pub cost: f64,
}

impl Default for SolverStatus {
    fn default() -> Self {
        SolverStatus {
            cost_function_type: ExpressionType::None,
            equality_constraint_type: ExpressionType::None,
            inequality_constraint_type: ExpressionType::None,
            exit_condition: SolverExitCondition::Success,
            cost: 0.0,
        }
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (cost {}, equality {}, inequality {}): cost = {}",
            self.exit_condition,
            self.cost_function_type,
            self.equality_constraint_type,
            self.inequality_constraint_type,
            self.cost
        )
    }
}
