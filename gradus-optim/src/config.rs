use std::time::Duration;

/// Options shared by the SQP and interior-point solvers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverConfig {
    /// Scaled KKT error at which the solve counts as converged (default: 1e-8).
    pub tolerance: f64,
    /// Iteration cap (default: 5000).
    pub max_iterations: usize,
    /// Looser error level accepted if held for `max_acceptable_iterations`
    /// consecutive iterations (default: 1e-6).
    pub acceptable_tolerance: f64,
    /// Default: 15.
    pub max_acceptable_iterations: usize,
    /// Wall-clock budget, checked between iterations. `Duration::MAX` disables it.
    pub timeout: Duration,
    /// Keep inequality constraints that start feasible feasible for the whole
    /// solve (default: false).
    pub feasible_ipm: bool,
    /// Emit per-iteration progress through `tracing` at INFO (default: false).
    pub diagnostics: bool,
    /// Append sparsity patterns of H, Aₑ and Aᵢ to `*.spy` files every
    /// iteration (default: false).
    pub spy: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            tolerance: 1e-8,
            max_iterations: 5000,
            acceptable_tolerance: 1e-6,
            max_acceptable_iterations: 15,
            timeout: Duration::MAX,
            feasible_ipm: false,
            diagnostics: false,
            spy: false,
        }
    }
}

impl SolverConfig {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_feasible_ipm(mut self, feasible_ipm: bool) -> Self {
        self.feasible_ipm = feasible_ipm;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_spy(mut self, spy: bool) -> Self {
        self.spy = spy;
        self
    }
}
