//! Sparse Jacobian of a vector of expressions.
//!
//! Rows are classified once at construction. A row whose expression type is
//! at most linear has a constant gradient, so its triplets are computed once
//! and replayed on every [`Jacobian::value`]. Quadratic and nonlinear rows keep
//! their traversal list and are re-swept numerically each call.

use sprs::{CsMat, TriMat};

use crate::arena::RowGuard;
use crate::expression_type::ExpressionType;
use crate::graph::ExpressionGraph;
use crate::variable::Variable;
use crate::variable_matrix::VariableMatrix;

pub struct Jacobian {
    rows: Vec<Variable>,
    wrt: Vec<Variable>,
    /// Row index and traversal of every row that must be re-differentiated.
    graphs: Vec<(usize, ExpressionGraph)>,
    cached: Vec<(usize, usize, f64)>,
}

impl Jacobian {
    /// `∂rows / ∂wrt`, of shape `rows.len() × wrt.len()`.
    pub fn new(rows: &[Variable], wrt: &[Variable]) -> Self {
        let mut graphs = Vec::new();
        let mut cached = Vec::new();
        {
            // Graphs capture each node's row while the guard is live, so later
            // sweeps report against `wrt` without re-marking.
            let _rows = RowGuard::new(wrt);
            for (r, row) in rows.iter().enumerate() {
                let graph = ExpressionGraph::new(row.expr());
                if row.expression_type() > ExpressionType::Linear {
                    graphs.push((r, graph));
                } else {
                    graph.update();
                    graph.compute_adjoints(|c, adjoint| {
                        if adjoint != 0.0 {
                            cached.push((r, c, adjoint));
                        }
                    });
                }
            }
        }
        tracing::trace!(
            rows = rows.len(),
            cols = wrt.len(),
            nonlinear = graphs.len(),
            cached = cached.len(),
            "built jacobian"
        );
        Jacobian {
            rows: rows.to_vec(),
            wrt: wrt.to_vec(),
            graphs,
            cached,
        }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.wrt.len())
    }

    /// Rows re-differentiated on every [`value`](Self::value) call.
    pub fn nonlinear_rows(&self) -> Vec<usize> {
        self.graphs.iter().map(|(r, _)| *r).collect()
    }

    /// Triplets of the rows with constant gradients.
    pub fn cached_triplets(&self) -> &[(usize, usize, f64)] {
        &self.cached
    }

    /// Symbolic Jacobian; each entry is itself differentiable.
    pub fn get(&self) -> VariableMatrix {
        let cols = self.wrt.len();
        let mut storage = Vec::with_capacity(self.rows.len() * cols);
        for row in &self.rows {
            storage.extend(ExpressionGraph::new(row.expr()).generate_gradient_tree(&self.wrt));
        }
        VariableMatrix::from_variables(self.rows.len(), cols, storage)
    }

    /// Numeric Jacobian at the current values, in CSC form.
    pub fn value(&self) -> CsMat<f64> {
        let mut tri = TriMat::with_capacity(self.shape(), self.cached.len());
        for &(r, c, v) in &self.cached {
            tri.add_triplet(r, c, v);
        }
        for (r, graph) in &self.graphs {
            graph.update();
            graph.compute_adjoints(|c, adjoint| {
                if adjoint != 0.0 {
                    tri.add_triplet(*r, c, adjoint);
                }
            });
        }
        tri.to_csc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    #[test]
    fn linear_rows_are_cached() {
        let arena = Arena::new();
        let x = arena.variable();
        let y = arena.variable();
        let rows = vec![&x * 3.0 + &y, &x * &y];
        let jac = Jacobian::new(&rows, &[x.clone(), y.clone()]);
        assert_eq!(jac.nonlinear_rows(), vec![1]);
        let mut cached = jac.cached_triplets().to_vec();
        cached.sort_by(|a, b| a.1.cmp(&b.1));
        assert_eq!(cached, vec![(0, 0, 3.0), (0, 1, 1.0)]);

        x.set_value(2.0);
        y.set_value(5.0);
        let dense = jac.value().to_dense();
        assert_eq!(dense[[1, 0]], 5.0);
        assert_eq!(dense[[1, 1]], 2.0);
    }

    #[test]
    fn symbolic_entries_match_numeric() {
        let arena = Arena::new();
        let x = Variable::with_value(&arena, 0.3);
        let rows = vec![x.sin() * &x];
        let jac = Jacobian::new(&rows, std::slice::from_ref(&x));
        let symbolic = jac.get();
        let numeric = jac.value().to_dense()[[0, 0]];
        assert!((symbolic[0].value() - numeric).abs() < 1e-14);
    }
}
