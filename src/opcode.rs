//! Operation table for expression nodes.
//!
//! Each node carries one [`OpCode`]. [`eval_forward`] evaluates it,
//! [`reverse_partials`] gives the numeric partials used by numeric adjoints and
//! [`adjoint_exprs`] builds the same partials as new expressions so a gradient
//! can itself be differentiated.

use num_traits::Float;

use crate::expression::Expr;
use crate::expression_type::ExpressionType;

/// Sentinel for an empty argument slot.
pub const UNUSED: u32 = u32::MAX;

/// Closed set of node operations.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpCode {
    // ── Leaves ──
    /// Decision variable; its value is set from outside.
    Decision,
    Constant,

    // ── Binary ──
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Atan2,
    Hypot,

    // ── Unary ──
    Neg,
    Abs,
    Sqrt,
    Cbrt,
    Sign,

    // ── Exp / Log ──
    Exp,
    Log,
    Log10,

    // ── Trig ──
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,

    // ── Hyperbolic ──
    Sinh,
    Cosh,
    Tanh,
}

impl OpCode {
    #[inline]
    pub fn is_leaf(self) -> bool {
        matches!(self, OpCode::Decision | OpCode::Constant)
    }

    #[inline]
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Pow
                | OpCode::Atan2
                | OpCode::Hypot
        )
    }

    /// Expression type of a node applying `self` to arguments of the given types.
    ///
    /// `rhs` is ignored for unary ops.
    pub fn result_type(self, lhs: ExpressionType, rhs: ExpressionType) -> ExpressionType {
        use ExpressionType as T;
        match self {
            OpCode::Decision => T::Linear,
            OpCode::Constant => T::Constant,
            OpCode::Add | OpCode::Sub => lhs.max(rhs),
            OpCode::Mul => T::product(lhs, rhs),
            OpCode::Div => T::quotient(lhs, rhs),
            OpCode::Neg => lhs,
            _ => {
                let widest = if self.is_binary() { lhs.max(rhs) } else { lhs };
                if widest <= T::Constant {
                    T::Constant
                } else {
                    T::Nonlinear
                }
            }
        }
    }
}

/// Evaluate a single opcode in the forward direction.
///
/// For unary ops `b` is ignored.
#[inline]
pub fn eval_forward<T: Float>(op: OpCode, a: T, b: T) -> T {
    match op {
        OpCode::Decision | OpCode::Constant => {
            unreachable!("leaf values are assigned, never evaluated")
        }

        OpCode::Add => a + b,
        OpCode::Sub => a - b,
        OpCode::Mul => a * b,
        OpCode::Div => a / b,
        OpCode::Pow => a.powf(b),
        OpCode::Atan2 => a.atan2(b),
        OpCode::Hypot => a.hypot(b),

        OpCode::Neg => -a,
        OpCode::Abs => a.abs(),
        OpCode::Sqrt => a.sqrt(),
        OpCode::Cbrt => a.cbrt(),
        OpCode::Sign => sign(a),

        OpCode::Exp => a.exp(),
        OpCode::Log => a.ln(),
        OpCode::Log10 => a.log10(),

        OpCode::Sin => a.sin(),
        OpCode::Cos => a.cos(),
        OpCode::Tan => a.tan(),
        OpCode::Asin => a.asin(),
        OpCode::Acos => a.acos(),
        OpCode::Atan => a.atan(),

        OpCode::Sinh => a.sinh(),
        OpCode::Cosh => a.cosh(),
        OpCode::Tanh => a.tanh(),
    }
}

/// `-1`, `0` or `1`. Unlike `Float::signum`, zero maps to zero.
#[inline]
fn sign<T: Float>(a: T) -> T {
    if a < T::zero() {
        -T::one()
    } else if a > T::zero() {
        T::one()
    } else {
        T::zero()
    }
}

/// Numeric partial derivatives `(∂r/∂a, ∂r/∂b)` of a single opcode.
///
/// `a`, `b` are the argument values and `r` the node's value. For unary ops
/// the second partial is zero.
#[inline]
pub fn reverse_partials<T: Float>(op: OpCode, a: T, b: T, r: T) -> (T, T) {
    let zero = T::zero();
    let one = T::one();
    let two = one + one;
    match op {
        OpCode::Decision | OpCode::Constant => (zero, zero),

        OpCode::Add => (one, one),
        OpCode::Sub => (one, -one),
        OpCode::Mul => (b, a),
        OpCode::Div => {
            let inv = one / b;
            (inv, -a * inv * inv)
        }
        OpCode::Pow => {
            // d/da a^b = b a^(b-1), d/db a^b = a^b ln(a); the latter is taken as 0 at a = 0
            let da = b * a.powf(b - one);
            let db = if a == zero { zero } else { r * a.ln() };
            (da, db)
        }
        OpCode::Atan2 => {
            let denom = a * a + b * b;
            (b / denom, -a / denom)
        }
        OpCode::Hypot => {
            if r == zero {
                (zero, zero)
            } else {
                (a / r, b / r)
            }
        }

        OpCode::Neg => (-one, zero),
        OpCode::Abs => (sign(a), zero),
        OpCode::Sqrt => (one / (two * r), zero),
        OpCode::Cbrt => {
            let three = two + one;
            (one / (three * r * r), zero)
        }
        OpCode::Sign => (zero, zero),

        OpCode::Exp => (r, zero),
        OpCode::Log => (one / a, zero),
        OpCode::Log10 => {
            let ten = T::from(10.0).unwrap_or_else(T::one);
            (one / (a * ten.ln()), zero)
        }

        OpCode::Sin => (a.cos(), zero),
        OpCode::Cos => (-a.sin(), zero),
        OpCode::Tan => {
            let c = a.cos();
            (one / (c * c), zero)
        }
        OpCode::Asin => (one / (one - a * a).sqrt(), zero),
        OpCode::Acos => (-one / (one - a * a).sqrt(), zero),
        OpCode::Atan => (one / (one + a * a), zero),

        OpCode::Sinh => (a.cosh(), zero),
        OpCode::Cosh => (a.sinh(), zero),
        OpCode::Tanh => {
            let c = a.cosh();
            (one / (c * c), zero)
        }
    }
}

/// Symbolic counterpart of [`reverse_partials`], already multiplied by the
/// parent adjoint `adj`.
///
/// `node` is the expression applying `op` to `lhs` (and `rhs`). A `None`
/// entry means the contribution is identically zero.
pub fn adjoint_exprs(
    op: OpCode,
    node: &Expr,
    lhs: &Expr,
    rhs: Option<&Expr>,
    adj: &Expr,
) -> [Option<Expr>; 2] {
    let unary = |e: Expr| [Some(e), None];
    match op {
        OpCode::Decision | OpCode::Constant => [None, None],

        OpCode::Add => [Some(adj.clone()), Some(adj.clone())],
        OpCode::Sub => [Some(adj.clone()), Some(-adj)],
        OpCode::Mul => {
            let rhs = expect_rhs(rhs);
            [Some(adj * rhs), Some(adj * lhs)]
        }
        OpCode::Div => {
            let rhs = expect_rhs(rhs);
            [Some(adj / rhs), Some(&(adj * &(-lhs)) / &(rhs * rhs))]
        }
        OpCode::Pow => {
            let rhs = expect_rhs(rhs);
            let one = node.arena().constant_expr(1.0);
            let da = &(adj * &lhs.pow(&(rhs - &one))) * rhs;
            let db = &(adj * node) * &lhs.ln();
            [Some(da), Some(db)]
        }
        OpCode::Atan2 => {
            let rhs = expect_rhs(rhs);
            let denom = &(lhs * lhs) + &(rhs * rhs);
            [
                Some(&(adj * rhs) / &denom),
                Some(&(adj * &(-lhs)) / &denom),
            ]
        }
        OpCode::Hypot => {
            let rhs = expect_rhs(rhs);
            [Some(&(adj * lhs) / node), Some(&(adj * rhs) / node)]
        }

        OpCode::Neg => unary(-adj),
        OpCode::Abs => unary(adj * &lhs.sign()),
        OpCode::Sqrt => {
            let two = node.arena().constant_expr(2.0);
            unary(adj / &(&two * node))
        }
        OpCode::Cbrt => {
            let three = node.arena().constant_expr(3.0);
            unary(adj / &(&three * &(node * node)))
        }
        OpCode::Sign => [None, None],

        OpCode::Exp => unary(adj * node),
        OpCode::Log => unary(adj / lhs),
        OpCode::Log10 => {
            let ln10 = node.arena().constant_expr(std::f64::consts::LN_10);
            unary(adj / &(lhs * &ln10))
        }

        OpCode::Sin => unary(adj * &lhs.cos()),
        OpCode::Cos => unary(adj * &(-&lhs.sin())),
        OpCode::Tan => {
            let c = lhs.cos();
            unary(adj / &(&c * &c))
        }
        OpCode::Asin | OpCode::Acos => {
            let one = node.arena().constant_expr(1.0);
            let root = (&one - &(lhs * lhs)).sqrt();
            let d = adj / &root;
            if op == OpCode::Asin {
                unary(d)
            } else {
                unary(-&d)
            }
        }
        OpCode::Atan => {
            let one = node.arena().constant_expr(1.0);
            unary(adj / &(&one + &(lhs * lhs)))
        }

        OpCode::Sinh => unary(adj * &lhs.cosh()),
        OpCode::Cosh => unary(adj * &lhs.sinh()),
        OpCode::Tanh => {
            let c = lhs.cosh();
            unary(adj / &(&c * &c))
        }
    }
}

#[inline]
fn expect_rhs(rhs: Option<&Expr>) -> &Expr {
    match rhs {
        Some(rhs) => rhs,
        None => unreachable!("binary op without a second argument"),
    }
}
