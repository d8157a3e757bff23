//! Reference-counted handles to arena nodes and node construction.
//!
//! Every arithmetic operation goes through [`Expr::binary`] or
//! [`Expr::unary`], which fold constants and prune identities before
//! allocating, so `x * 1`, `x + 0` or `2 * 3` never create a compound node.

use std::borrow::Cow;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::arena::{Arena, NodeId};
use crate::expression_type::ExpressionType;
use crate::opcode::{eval_forward, OpCode, UNUSED};

/// Strong reference to one node of an [`Arena`].
pub struct Expr {
    arena: Arena,
    id: NodeId,
}

impl Expr {
    /// Wrap a reference the caller already owns.
    #[inline]
    pub(crate) fn from_owned(arena: Arena, id: NodeId) -> Self {
        Expr { arena, id }
    }

    /// Take a new reference to an existing node.
    #[inline]
    pub(crate) fn share(arena: &Arena, id: NodeId) -> Self {
        arena.pool_mut().retain(id);
        Expr {
            arena: arena.clone(),
            id,
        }
    }

    #[inline]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn op(&self) -> OpCode {
        self.arena.pool().node(self.id).op
    }

    pub fn expression_type(&self) -> ExpressionType {
        self.arena.pool().node(self.id).ty
    }

    /// Stored value, without refreshing from the leaves.
    pub fn stored_value(&self) -> f64 {
        self.arena.pool().node(self.id).value
    }

    pub(crate) fn set_stored_value(&self, value: f64) {
        self.arena.pool_mut().node_mut(self.id).value = value;
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.expression_type() == ExpressionType::Constant
    }

    /// True if this is a constant equal to `value`.
    pub fn is_constant_value(&self, value: f64) -> bool {
        let pool = self.arena.pool();
        let node = pool.node(self.id);
        node.ty == ExpressionType::Constant && node.value == value
    }

    /// Number of strong references to this node.
    pub fn ref_count(&self) -> u32 {
        self.arena.pool().node(self.id).refs
    }

    /// Apply a binary op, folding and pruning where possible.
    pub fn binary(op: OpCode, lhs: &Expr, rhs: &Expr) -> Expr {
        debug_assert!(op.is_binary());
        let (lhs, rhs) = reconcile(lhs, rhs);
        if let Some(pruned) = prune(op, &lhs, &rhs) {
            return pruned;
        }

        let arena = lhs.arena.clone();
        let (value, lty, rty) = {
            let pool = arena.pool();
            let (l, r) = (pool.node(lhs.id), pool.node(rhs.id));
            (eval_forward(op, l.value, r.value), l.ty, r.ty)
        };
        if lty == ExpressionType::Constant && rty == ExpressionType::Constant {
            return arena.constant_expr(value);
        }
        arena.alloc(op, op.result_type(lty, rty), value, [lhs.id, rhs.id])
    }

    /// Apply a unary op, folding constants.
    pub fn unary(op: OpCode, arg: &Expr) -> Expr {
        debug_assert!(!op.is_binary() && !op.is_leaf());
        if op == OpCode::Neg && arg.is_constant_value(0.0) {
            return arg.clone();
        }

        let (value, ty) = {
            let pool = arg.arena.pool();
            let node = pool.node(arg.id);
            (eval_forward(op, node.value, 0.0), node.ty)
        };
        if ty == ExpressionType::Constant {
            return arg.arena.constant_expr(value);
        }
        arg.arena
            .alloc(op, op.result_type(ty, ExpressionType::None), value, [arg.id, UNUSED])
    }

    pub fn pow(&self, power: &Expr) -> Expr {
        Expr::binary(OpCode::Pow, self, power)
    }

    pub fn atan2(&self, x: &Expr) -> Expr {
        Expr::binary(OpCode::Atan2, self, x)
    }

    pub fn hypot(&self, other: &Expr) -> Expr {
        Expr::binary(OpCode::Hypot, self, other)
    }
}

macro_rules! unary_methods {
    ($($name:ident => $op:ident),* $(,)?) => {
        impl Expr {
            $(
                #[inline]
                pub fn $name(&self) -> Expr {
                    Expr::unary(OpCode::$op, self)
                }
            )*
        }
    };
}

unary_methods! {
    abs => Abs,
    sqrt => Sqrt,
    cbrt => Cbrt,
    sign => Sign,
    exp => Exp,
    ln => Log,
    log10 => Log10,
    sin => Sin,
    cos => Cos,
    tan => Tan,
    asin => Asin,
    acos => Acos,
    atan => Atan,
    sinh => Sinh,
    cosh => Cosh,
    tanh => Tanh,
}

/// Bring both operands into one arena. Constants are re-materialised where
/// needed; two non-constant expressions from different arenas cannot mix.
fn reconcile<'a>(lhs: &'a Expr, rhs: &'a Expr) -> (Cow<'a, Expr>, Cow<'a, Expr>) {
    if lhs.arena.ptr_eq(&rhs.arena) {
        (Cow::Borrowed(lhs), Cow::Borrowed(rhs))
    } else if rhs.is_constant() {
        let value = rhs.stored_value();
        (Cow::Borrowed(lhs), Cow::Owned(lhs.arena.constant_expr(value)))
    } else if lhs.is_constant() {
        let value = lhs.stored_value();
        (Cow::Owned(rhs.arena.constant_expr(value)), Cow::Borrowed(rhs))
    } else {
        panic!("cannot combine expressions from different arenas")
    }
}

/// Algebraic identities that avoid allocating a new node.
fn prune(op: OpCode, lhs: &Expr, rhs: &Expr) -> Option<Expr> {
    match op {
        OpCode::Add => {
            if lhs.is_constant_value(0.0) {
                Some(rhs.clone())
            } else if rhs.is_constant_value(0.0) {
                Some(lhs.clone())
            } else {
                None
            }
        }
        OpCode::Sub => {
            if lhs.is_constant_value(0.0) {
                if rhs.is_constant_value(0.0) {
                    Some(lhs.clone())
                } else {
                    Some(-rhs)
                }
            } else if rhs.is_constant_value(0.0) {
                Some(lhs.clone())
            } else {
                None
            }
        }
        OpCode::Mul => {
            if lhs.is_constant_value(0.0) {
                Some(lhs.clone())
            } else if rhs.is_constant_value(0.0) {
                Some(rhs.clone())
            } else if lhs.is_constant_value(1.0) {
                Some(rhs.clone())
            } else if rhs.is_constant_value(1.0) {
                Some(lhs.clone())
            } else {
                None
            }
        }
        OpCode::Div => {
            if lhs.is_constant_value(0.0) || rhs.is_constant_value(1.0) {
                Some(lhs.clone())
            } else {
                None
            }
        }
        OpCode::Pow => {
            if rhs.is_constant_value(0.0) {
                Some(lhs.arena.constant_expr(1.0))
            } else if rhs.is_constant_value(1.0) || lhs.is_constant_value(1.0) {
                Some(lhs.clone())
            } else if lhs.is_constant_value(0.0) && rhs.is_constant() && rhs.stored_value() > 0.0 {
                Some(lhs.clone())
            } else if rhs.is_constant_value(2.0) && !lhs.is_constant() {
                // Keeps x² quadratic rather than nonlinear
                Some(lhs * lhs)
            } else {
                None
            }
        }
        _ => None,
    }
}

impl Clone for Expr {
    #[inline]
    fn clone(&self) -> Self {
        Expr::share(&self.arena, self.id)
    }
}

impl Drop for Expr {
    #[inline]
    fn drop(&mut self) {
        self.arena.pool_mut().release(self.id);
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pool = self.arena.pool();
        let node = pool.node(self.id);
        f.debug_struct("Expr")
            .field("id", &self.id)
            .field("op", &node.op)
            .field("type", &node.ty)
            .field("value", &node.value)
            .finish()
    }
}

macro_rules! expr_binary_op {
    ($trait:ident, $method:ident, $op:ident) => {
        impl $trait<&Expr> for &Expr {
            type Output = Expr;
            #[inline]
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary(OpCode::$op, self, rhs)
            }
        }
    };
}

expr_binary_op!(Add, add, Add);
expr_binary_op!(Sub, sub, Sub);
expr_binary_op!(Mul, mul, Mul);
expr_binary_op!(Div, div, Div);

impl Neg for &Expr {
    type Output = Expr;
    #[inline]
    fn neg(self) -> Expr {
        Expr::unary(OpCode::Neg, self)
    }
}

impl Neg for Expr {
    type Output = Expr;
    #[inline]
    fn neg(self) -> Expr {
        -&self
    }
}
