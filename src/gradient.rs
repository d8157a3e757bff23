//! Gradient of a scalar expression.

use crate::jacobian::Jacobian;
use crate::variable::Variable;
use crate::variable_matrix::VariableMatrix;

/// `∇f` with respect to an ordered variable list.
///
/// A thin wrapper over a one-row [`Jacobian`], so a linear `f` is
/// differentiated once and replayed afterwards.
pub struct Gradient {
    jacobian: Jacobian,
}

impl Gradient {
    pub fn new(f: &Variable, wrt: &[Variable]) -> Self {
        Gradient {
            jacobian: Jacobian::new(std::slice::from_ref(f), wrt),
        }
    }

    pub fn len(&self) -> usize {
        self.jacobian.shape().1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Symbolic gradient as a column vector.
    pub fn get(&self) -> VariableMatrix {
        self.jacobian.get().transpose()
    }

    /// Dense gradient at the current values.
    pub fn value(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.len()];
        let jac = self.jacobian.value();
        for (&v, (_, c)) in jac.iter() {
            dense[c] += v;
        }
        dense
    }
}
