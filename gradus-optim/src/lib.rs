//! Constrained nonlinear optimization on gradus expression graphs.
//!
//! A [`Problem`] collects decision variables, a cost and constraints built
//! with gradus arithmetic. [`Problem::solve`] differentiates everything
//! once, then runs either a sequential quadratic programming solver
//! (equality constraints only) or a primal-dual interior-point solver, both
//! globalized by a filter line search with feasibility restoration.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod error_estimate;
pub mod filter;
pub mod iteration;
pub mod linalg;
pub mod logger;
pub mod multistart;
pub mod problem;
pub mod solvers;
pub mod spy;
pub mod status;

pub use gradus::{constraints, eq, geq, leq, EqualityConstraints, InequalityConstraints};

pub use config::SolverConfig;
pub use error::{KktError, SpyError};
pub use iteration::{IterationCallback, SolverIterationInfo};
pub use logger::{init_logger, init_logger_with_level};
pub use multistart::{multistart, MultistartResult};
pub use problem::{ConstraintSet, Problem};
pub use status::{SolverExitCondition, SolverStatus};
