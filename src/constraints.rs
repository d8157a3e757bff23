//! Equality and inequality constraint sets.
//!
//! A constraint is stored as one scalar expression per entry: equality rows
//! are driven to zero, inequality rows to a nonnegative value.

use std::borrow::Borrow;

use crate::arena::Arena;
use crate::variable::Variable;
use crate::variable_block::VariableBlock;
use crate::variable_matrix::VariableMatrix;

/// One side of a constraint: a scalar, a variable, a matrix or a block.
///
/// A 1×1 side is broadcast against the other.
pub trait Operand {
    /// Arena of the operand's expressions, if it has any.
    fn arena_hint(&self) -> Option<Arena>;

    fn into_matrix(self, arena: &Arena) -> VariableMatrix;
}

impl Operand for f64 {
    fn arena_hint(&self) -> Option<Arena> {
        None
    }

    fn into_matrix(self, arena: &Arena) -> VariableMatrix {
        VariableMatrix::from_values(arena, 1, 1, &[self])
    }
}

impl Operand for &[f64] {
    fn arena_hint(&self) -> Option<Arena> {
        None
    }

    fn into_matrix(self, arena: &Arena) -> VariableMatrix {
        VariableMatrix::from_values(arena, self.len(), 1, self)
    }
}

impl Operand for Variable {
    fn arena_hint(&self) -> Option<Arena> {
        Some(self.arena().clone())
    }

    fn into_matrix(self, _arena: &Arena) -> VariableMatrix {
        VariableMatrix::column(vec![self])
    }
}

impl Operand for &Variable {
    fn arena_hint(&self) -> Option<Arena> {
        Some(self.arena().clone())
    }

    fn into_matrix(self, _arena: &Arena) -> VariableMatrix {
        VariableMatrix::column(vec![self.clone()])
    }
}

impl Operand for VariableMatrix {
    fn arena_hint(&self) -> Option<Arena> {
        self.arena().cloned()
    }

    fn into_matrix(self, _arena: &Arena) -> VariableMatrix {
        self
    }
}

impl Operand for &VariableMatrix {
    fn arena_hint(&self) -> Option<Arena> {
        self.arena().cloned()
    }

    fn into_matrix(self, _arena: &Arena) -> VariableMatrix {
        self.clone()
    }
}

impl<M: Borrow<VariableMatrix>> Operand for VariableBlock<M> {
    fn arena_hint(&self) -> Option<Arena> {
        self.iter().next().map(|v| v.arena().clone())
    }

    fn into_matrix(self, _arena: &Arena) -> VariableMatrix {
        self.to_matrix()
    }
}

/// `lhs - rhs` entrywise, broadcasting a 1×1 side.
fn difference(lhs: impl Operand, rhs: impl Operand) -> Vec<Variable> {
    let arena = lhs
        .arena_hint()
        .or_else(|| rhs.arena_hint())
        .unwrap_or_default();
    let lhs = lhs.into_matrix(&arena);
    let rhs = rhs.into_matrix(&arena);

    if lhs.shape() == rhs.shape() {
        lhs.iter().zip(rhs.iter()).map(|(l, r)| l - r).collect()
    } else if lhs.shape() == (1, 1) {
        let l = &lhs[0];
        rhs.iter().map(|r| l - r).collect()
    } else if rhs.shape() == (1, 1) {
        let r = &rhs[0];
        lhs.iter().map(|l| l - r).collect()
    } else {
        panic!(
            "constraint operands have mismatched shapes {:?} and {:?}",
            lhs.shape(),
            rhs.shape()
        )
    }
}

/// Rows that must equal zero.
#[derive(Clone, Debug, Default)]
pub struct EqualityConstraints {
    pub constraints: Vec<Variable>,
}

impl EqualityConstraints {
    /// `lhs == rhs`.
    pub fn new(lhs: impl Operand, rhs: impl Operand) -> Self {
        EqualityConstraints {
            constraints: difference(lhs, rhs),
        }
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Whether every row is within `tolerance` of zero at the current values.
    pub fn is_satisfied(&self, tolerance: f64) -> bool {
        self.constraints.iter().all(|c| c.value().abs() <= tolerance)
    }
}

/// Rows that must be nonnegative.
#[derive(Clone, Debug, Default)]
pub struct InequalityConstraints {
    pub constraints: Vec<Variable>,
}

impl InequalityConstraints {
    /// `lhs >= rhs`.
    pub fn geq(lhs: impl Operand, rhs: impl Operand) -> Self {
        InequalityConstraints {
            constraints: difference(lhs, rhs),
        }
    }

    /// `lhs <= rhs`.
    pub fn leq(lhs: impl Operand, rhs: impl Operand) -> Self {
        InequalityConstraints {
            constraints: difference(rhs, lhs),
        }
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn is_satisfied(&self, tolerance: f64) -> bool {
        self.constraints.iter().all(|c| c.value() >= -tolerance)
    }
}

impl Extend<EqualityConstraints> for EqualityConstraints {
    fn extend<I: IntoIterator<Item = EqualityConstraints>>(&mut self, iter: I) {
        for set in iter {
            self.constraints.extend(set.constraints);
        }
    }
}

impl Extend<InequalityConstraints> for InequalityConstraints {
    fn extend<I: IntoIterator<Item = InequalityConstraints>>(&mut self, iter: I) {
        for set in iter {
            self.constraints.extend(set.constraints);
        }
    }
}

/// `lhs == rhs`.
pub fn eq(lhs: impl Operand, rhs: impl Operand) -> EqualityConstraints {
    EqualityConstraints::new(lhs, rhs)
}

/// `lhs >= rhs`.
pub fn geq(lhs: impl Operand, rhs: impl Operand) -> InequalityConstraints {
    InequalityConstraints::geq(lhs, rhs)
}

/// `lhs <= rhs`.
pub fn leq(lhs: impl Operand, rhs: impl Operand) -> InequalityConstraints {
    InequalityConstraints::leq(lhs, rhs)
}
