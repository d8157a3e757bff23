//! Scalar front end over [`Expr`].

use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::arena::Arena;
use crate::constraints::{EqualityConstraints, InequalityConstraints, Operand};
use crate::expression::Expr;
use crate::expression_type::ExpressionType;
use crate::graph::ExpressionGraph;
use crate::opcode::OpCode;

/// An autodiff scalar: a value-typed handle to one expression node.
///
/// Cloning shares the node; arithmetic builds new nodes in the same arena.
#[derive(Clone)]
pub struct Variable {
    expr: Expr,
}

impl Variable {
    /// A fresh decision variable (zero-valued linear leaf) in `arena`.
    pub fn new(arena: &Arena) -> Self {
        arena.variable()
    }

    pub fn with_value(arena: &Arena, value: f64) -> Self {
        Variable::from_expr(arena.leaf_expr(value))
    }

    pub fn constant(arena: &Arena, value: f64) -> Self {
        arena.constant(value)
    }

    #[inline]
    pub fn from_expr(expr: Expr) -> Self {
        Variable { expr }
    }

    #[inline]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    #[inline]
    pub fn arena(&self) -> &Arena {
        self.expr.arena()
    }

    /// Current value, recomputed from the leaves.
    pub fn value(&self) -> f64 {
        if !self.expr.op().is_leaf() {
            ExpressionGraph::new(&self.expr).update();
        }
        self.expr.stored_value()
    }

    /// Assign a value. Meant for decision variables; on a dependent
    /// expression the value is overwritten by the next update.
    pub fn set_value(&self, value: f64) {
        if !self.expr.op().is_leaf() {
            tracing::warn!(
                "set_value on a dependent expression; the next update will overwrite it"
            );
        }
        self.expr.set_stored_value(value);
    }

    pub fn expression_type(&self) -> ExpressionType {
        self.expr.expression_type()
    }

    /// True if `other` refers to the same node.
    pub fn same_node(&self, other: &Variable) -> bool {
        self.arena().ptr_eq(other.arena()) && self.expr.id() == other.expr.id()
    }

    pub fn pow(&self, power: impl IntoExpr) -> Variable {
        let power = power.into_expr(self.arena());
        Variable::from_expr(self.expr.pow(&power))
    }

    /// Four-quadrant arctangent of `self / x`.
    pub fn atan2(&self, x: impl IntoExpr) -> Variable {
        let x = x.into_expr(self.arena());
        Variable::from_expr(self.expr.atan2(&x))
    }

    pub fn hypot(&self, other: impl IntoExpr) -> Variable {
        let other = other.into_expr(self.arena());
        Variable::from_expr(self.expr.hypot(&other))
    }

    /// `self == rhs`.
    pub fn equals(&self, rhs: impl Operand) -> EqualityConstraints {
        EqualityConstraints::new(self, rhs)
    }

    /// `self >= rhs`.
    pub fn geq(&self, rhs: impl Operand) -> InequalityConstraints {
        InequalityConstraints::geq(self, rhs)
    }

    /// `self <= rhs`.
    pub fn leq(&self, rhs: impl Operand) -> InequalityConstraints {
        InequalityConstraints::leq(self, rhs)
    }
}

macro_rules! unary_methods {
    ($($name:ident),* $(,)?) => {
        impl Variable {
            $(
                #[inline]
                pub fn $name(&self) -> Variable {
                    Variable::from_expr(self.expr.$name())
                }
            )*
        }
    };
}

unary_methods!(
    abs, sqrt, cbrt, sign, exp, ln, log10, sin, cos, tan, asin, acos, atan, sinh, cosh, tanh,
);

/// Anything that can stand in for a scalar operand of a [`Variable`].
pub trait IntoExpr {
    fn into_expr(self, arena: &Arena) -> Expr;
}

impl IntoExpr for f64 {
    fn into_expr(self, arena: &Arena) -> Expr {
        arena.constant_expr(self)
    }
}

impl IntoExpr for Variable {
    fn into_expr(self, _arena: &Arena) -> Expr {
        self.expr
    }
}

impl IntoExpr for &Variable {
    fn into_expr(self, _arena: &Arena) -> Expr {
        self.expr.clone()
    }
}

// ──────────────────────────────────────────────
//  Operators
// ──────────────────────────────────────────────

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:ident) => {
        impl $trait<&Variable> for &Variable {
            type Output = Variable;
            #[inline]
            fn $method(self, rhs: &Variable) -> Variable {
                Variable::from_expr(Expr::binary(OpCode::$op, &self.expr, &rhs.expr))
            }
        }

        impl $trait<Variable> for Variable {
            type Output = Variable;
            #[inline]
            fn $method(self, rhs: Variable) -> Variable {
                (&self).$method(&rhs)
            }
        }

        impl $trait<&Variable> for Variable {
            type Output = Variable;
            #[inline]
            fn $method(self, rhs: &Variable) -> Variable {
                (&self).$method(rhs)
            }
        }

        impl $trait<Variable> for &Variable {
            type Output = Variable;
            #[inline]
            fn $method(self, rhs: Variable) -> Variable {
                self.$method(&rhs)
            }
        }

        impl $trait<f64> for &Variable {
            type Output = Variable;
            #[inline]
            fn $method(self, rhs: f64) -> Variable {
                let rhs = self.arena().constant_expr(rhs);
                Variable::from_expr(Expr::binary(OpCode::$op, &self.expr, &rhs))
            }
        }

        impl $trait<f64> for Variable {
            type Output = Variable;
            #[inline]
            fn $method(self, rhs: f64) -> Variable {
                (&self).$method(rhs)
            }
        }

        impl $trait<&Variable> for f64 {
            type Output = Variable;
            #[inline]
            fn $method(self, rhs: &Variable) -> Variable {
                let lhs = rhs.arena().constant_expr(self);
                Variable::from_expr(Expr::binary(OpCode::$op, &lhs, &rhs.expr))
            }
        }

        impl $trait<Variable> for f64 {
            type Output = Variable;
            #[inline]
            fn $method(self, rhs: Variable) -> Variable {
                self.$method(&rhs)
            }
        }

        impl $assign_trait<&Variable> for Variable {
            #[inline]
            fn $assign_method(&mut self, rhs: &Variable) {
                *self = (&*self).$method(rhs);
            }
        }

        impl $assign_trait<Variable> for Variable {
            #[inline]
            fn $assign_method(&mut self, rhs: Variable) {
                *self = (&*self).$method(&rhs);
            }
        }

        impl $assign_trait<f64> for Variable {
            #[inline]
            fn $assign_method(&mut self, rhs: f64) {
                *self = (&*self).$method(rhs);
            }
        }
    };
}

impl_binary_op!(Add, add, AddAssign, add_assign, Add);
impl_binary_op!(Sub, sub, SubAssign, sub_assign, Sub);
impl_binary_op!(Mul, mul, MulAssign, mul_assign, Mul);
impl_binary_op!(Div, div, DivAssign, div_assign, Div);

impl Neg for &Variable {
    type Output = Variable;
    #[inline]
    fn neg(self) -> Variable {
        Variable::from_expr(-&self.expr)
    }
}

impl Neg for Variable {
    type Output = Variable;
    #[inline]
    fn neg(self) -> Variable {
        -&self
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("value", &self.value())
            .field("type", &self.expression_type())
            .finish()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_leaves_are_distinct() {
        let arena = Arena::new();
        let a = Variable::new(&arena);
        let b = Variable::new(&arena);
        assert!(!a.same_node(&b));
        assert_eq!(a.expression_type(), ExpressionType::Linear);
        assert_eq!(a.value(), 0.0);
    }

    #[test]
    fn value_tracks_leaves() {
        let arena = Arena::new();
        let x = Variable::with_value(&arena, 1.0);
        let f = &x * &x + 2.0 * &x;
        assert_eq!(f.value(), 3.0);
        x.set_value(3.0);
        assert_eq!(f.value(), 15.0);
    }

    #[test]
    fn compound_assignment() {
        let arena = Arena::new();
        let x = Variable::with_value(&arena, 2.0);
        let mut acc = arena.constant(0.0);
        acc += &x;
        acc *= 3.0;
        acc -= 1.0;
        assert_eq!(acc.value(), 5.0);
        assert_eq!(acc.expression_type(), ExpressionType::Linear);
    }

    #[test]
    fn type_propagation() {
        let arena = Arena::new();
        let x = arena.variable();
        let y = arena.variable();
        assert_eq!((&x * &y).expression_type(), ExpressionType::Quadratic);
        assert_eq!((&x * &y * &x).expression_type(), ExpressionType::Nonlinear);
        assert_eq!((&x / 2.0).expression_type(), ExpressionType::Linear);
        assert_eq!((2.0 / &x).expression_type(), ExpressionType::Nonlinear);
        assert_eq!(x.pow(2.0).expression_type(), ExpressionType::Quadratic);
        assert_eq!(x.sin().expression_type(), ExpressionType::Nonlinear);
    }
}
