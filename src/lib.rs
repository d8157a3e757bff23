//! Reverse-mode automatic differentiation over pooled, deduplicated
//! expression graphs.
//!
//! Expressions are built with ordinary arithmetic on [`Variable`]s living in
//! an [`Arena`]. Derivatives come from [`Gradient`], [`Jacobian`] and
//! [`Hessian`], which return sparse (`sprs`) or dense values at the current
//! leaf values and can also build their results symbolically.

pub mod arena;
pub mod constraints;
pub mod expression;
pub mod expression_type;
pub mod gradient;
pub mod graph;
pub mod hessian;
pub mod jacobian;
pub mod opcode;
pub mod variable;
pub mod variable_block;
pub mod variable_matrix;

#[cfg(feature = "faer")]
pub mod faer_support;
#[cfg(feature = "nalgebra")]
pub mod nalgebra_support;

pub use arena::Arena;
pub use constraints::{eq, geq, leq, EqualityConstraints, InequalityConstraints, Operand};
pub use expression::Expr;
pub use expression_type::ExpressionType;
pub use gradient::Gradient;
pub use graph::ExpressionGraph;
pub use hessian::Hessian;
pub use jacobian::Jacobian;
pub use opcode::OpCode;
pub use variable::{IntoExpr, Variable};
pub use variable_block::VariableBlock;
pub use variable_matrix::VariableMatrix;
