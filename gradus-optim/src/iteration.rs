use sprs::CsMat;

/// Snapshot handed to iteration callbacks.
#[derive(Debug, Clone, Copy)]
pub struct SolverIterationInfo<'a> {
    pub iteration: usize,
    /// Primal iterate.
    pub x: &'a [f64],
    /// Inequality slacks; empty for SQP.
    pub s: &'a [f64],
    /// Cost gradient.
    pub g: &'a [f64],
    /// Lagrangian Hessian.
    pub h: &'a CsMat<f64>,
    /// Equality constraint Jacobian.
    pub a_e: &'a CsMat<f64>,
    /// Inequality constraint Jacobian.
    pub a_i: &'a CsMat<f64>,
}

/// Per-iteration hook. Returning `true` stops the solve with
/// [`CallbackRequestedStop`](crate::SolverExitCondition::CallbackRequestedStop).
pub type IterationCallback<'a> = Box<dyn FnMut(&SolverIterationInfo<'_>) -> bool + 'a>;
