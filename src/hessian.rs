//! Hessian of a scalar expression as the Jacobian of its gradient tree.

use sprs::CsMat;

use crate::graph::ExpressionGraph;
use crate::jacobian::Jacobian;
use crate::variable::Variable;
use crate::variable_matrix::VariableMatrix;

pub struct Hessian {
    jacobian: Jacobian,
}

impl Hessian {
    /// `∇²f` with respect to `wrt`. For a quadratic `f` every gradient entry
    /// is linear, so the whole Hessian is cached at construction.
    pub fn new(f: &Variable, wrt: &[Variable]) -> Self {
        let gradient = ExpressionGraph::new(f.expr()).generate_gradient_tree(wrt);
        Hessian {
            jacobian: Jacobian::new(&gradient, wrt),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.jacobian.shape()
    }

    pub fn get(&self) -> VariableMatrix {
        self.jacobian.get()
    }

    /// Full symmetric Hessian (both triangles) at the current values.
    pub fn value(&self) -> CsMat<f64> {
        self.jacobian.value()
    }
}
