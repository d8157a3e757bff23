use std::fmt;

/// Highest-order operation on any path from an expression to its leaves.
///
/// Ordered so that `max` over a set of expressions gives the type of their
/// combination under addition. The Jacobian uses this to decide which rows
/// have a constant gradient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExpressionType {
    /// No expression at all (e.g. a problem without a cost function).
    #[default]
    None,
    /// Value never changes.
    Constant,
    /// Affine in every leaf.
    Linear,
    /// At most a product of two linear terms.
    Quadratic,
    Nonlinear,
}

impl ExpressionType {
    /// Type of `lhs * rhs`.
    #[inline]
    pub fn product(lhs: Self, rhs: Self) -> Self {
        match (lhs, rhs) {
            (Self::Constant, other) | (other, Self::Constant) => other,
            (Self::Linear, Self::Linear) => Self::Quadratic,
            _ => Self::Nonlinear,
        }
    }

    /// Type of `lhs / rhs`.
    #[inline]
    pub fn quotient(lhs: Self, rhs: Self) -> Self {
        if rhs == Self::Constant {
            lhs
        } else {
            Self::Nonlinear
        }
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "empty",
            Self::Constant => "constant",
            Self::Linear => "linear",
            Self::Quadratic => "quadratic",
            Self::Nonlinear => "nonlinear",
        };
        f.write_str(name)
    }
}
