//! Dense row-major matrix of [`Variable`]s.

use std::fmt;
use std::ops::{Add, Div, Index, IndexMut, Mul, Neg, Sub};

use crate::arena::Arena;
use crate::constraints::{EqualityConstraints, InequalityConstraints, Operand};
use crate::expression::Expr;
use crate::graph::ExpressionGraph;
use crate::variable::Variable;
use crate::variable_block::VariableBlock;

#[derive(Clone)]
pub struct VariableMatrix {
    rows: usize,
    cols: usize,
    storage: Vec<Variable>,
}

impl VariableMatrix {
    /// `rows × cols` fresh decision variables.
    pub fn new(arena: &Arena, rows: usize, cols: usize) -> Self {
        VariableMatrix {
            rows,
            cols,
            storage: (0..rows * cols).map(|_| arena.variable()).collect(),
        }
    }

    /// `rows × cols` constant zeros.
    pub fn zeros(arena: &Arena, rows: usize, cols: usize) -> Self {
        Self::from_fn(rows, cols, |_, _| arena.constant(0.0))
    }

    /// Constants from row-major `values`.
    pub fn from_values(arena: &Arena, rows: usize, cols: usize, values: &[f64]) -> Self {
        assert_eq!(
            values.len(),
            rows * cols,
            "expected {} values for a {rows}x{cols} matrix",
            rows * cols
        );
        VariableMatrix {
            rows,
            cols,
            storage: values.iter().map(|&v| arena.constant(v)).collect(),
        }
    }

    /// Wrap row-major `variables`.
    pub fn from_variables(rows: usize, cols: usize, variables: Vec<Variable>) -> Self {
        assert_eq!(
            variables.len(),
            rows * cols,
            "expected {} variables for a {rows}x{cols} matrix",
            rows * cols
        );
        VariableMatrix {
            rows,
            cols,
            storage: variables,
        }
    }

    /// Column vector.
    pub fn column(variables: Vec<Variable>) -> Self {
        let rows = variables.len();
        Self::from_variables(rows, 1, variables)
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> Variable) -> Self {
        let mut storage = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                storage.push(f(r, c));
            }
        }
        VariableMatrix {
            rows,
            cols,
            storage,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Arena of the entries, `None` when empty.
    pub fn arena(&self) -> Option<&Arena> {
        self.storage.first().map(Variable::arena)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> &Variable {
        assert!(row < self.rows && col < self.cols, "index ({row}, {col}) out of bounds");
        &self.storage[row * self.cols + col]
    }

    #[inline]
    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut Variable {
        assert!(row < self.rows && col < self.cols, "index ({row}, {col}) out of bounds");
        &mut self.storage[row * self.cols + col]
    }

    pub fn as_slice(&self) -> &[Variable] {
        &self.storage
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.storage.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Variable> {
        self.storage.iter_mut()
    }

    pub fn into_vec(self) -> Vec<Variable> {
        self.storage
    }

    /// Current values, row-major. The whole matrix is refreshed in one pass.
    pub fn values(&self) -> Vec<f64> {
        let exprs: Vec<Expr> = self.storage.iter().map(|v| v.expr().clone()).collect();
        ExpressionGraph::from_roots(&exprs).update();
        exprs.iter().map(Expr::stored_value).collect()
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.get(row, col).value()
    }

    /// Assign row-major values to the entries (decision variables).
    pub fn set_values(&self, values: &[f64]) {
        assert_eq!(values.len(), self.len(), "value count does not match matrix size");
        for (var, &value) in self.storage.iter().zip(values) {
            var.set_value(value);
        }
    }

    pub fn transpose(&self) -> VariableMatrix {
        Self::from_fn(self.cols, self.rows, |r, c| self.get(c, r).clone())
    }

    /// Shorthand for [`transpose`](Self::transpose).
    pub fn t(&self) -> VariableMatrix {
        self.transpose()
    }

    pub fn map(&self, mut f: impl FnMut(&Variable) -> Variable) -> VariableMatrix {
        VariableMatrix {
            rows: self.rows,
            cols: self.cols,
            storage: self.storage.iter().map(&mut f).collect(),
        }
    }

    /// Sum of all entries.
    pub fn sum(&self) -> Variable {
        let arena = self
            .arena()
            .cloned()
            .unwrap_or_default();
        self.storage
            .iter()
            .fold(arena.constant(0.0), |acc, v| acc + v)
    }

    /// Side-by-side concatenation.
    pub fn hstack(blocks: &[&VariableMatrix]) -> VariableMatrix {
        let rows = blocks.first().map_or(0, |b| b.rows);
        assert!(blocks.iter().all(|b| b.rows == rows), "hstack needs equal row counts");
        let cols = blocks.iter().map(|b| b.cols).sum();
        let mut storage = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for block in blocks {
                storage.extend_from_slice(&block.storage[r * block.cols..(r + 1) * block.cols]);
            }
        }
        VariableMatrix {
            rows,
            cols,
            storage,
        }
    }

    /// Top-to-bottom concatenation.
    pub fn vstack(blocks: &[&VariableMatrix]) -> VariableMatrix {
        let cols = blocks.first().map_or(0, |b| b.cols);
        assert!(blocks.iter().all(|b| b.cols == cols), "vstack needs equal column counts");
        let rows = blocks.iter().map(|b| b.rows).sum();
        let storage = blocks.iter().flat_map(|b| b.storage.iter().cloned()).collect();
        VariableMatrix {
            rows,
            cols,
            storage,
        }
    }

    pub fn block(&self, row: usize, col: usize, rows: usize, cols: usize) -> VariableBlock<&Self> {
        VariableBlock::new(self, row, col, rows, cols)
    }

    pub fn block_mut(
        &mut self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> VariableBlock<&mut Self> {
        VariableBlock::new(self, row, col, rows, cols)
    }

    pub fn row(&self, row: usize) -> VariableBlock<&Self> {
        self.block(row, 0, 1, self.cols)
    }

    pub fn row_mut(&mut self, row: usize) -> VariableBlock<&mut Self> {
        let cols = self.cols;
        self.block_mut(row, 0, 1, cols)
    }

    pub fn col(&self, col: usize) -> VariableBlock<&Self> {
        self.block(0, col, self.rows, 1)
    }

    pub fn col_mut(&mut self, col: usize) -> VariableBlock<&mut Self> {
        let rows = self.rows;
        self.block_mut(0, col, rows, 1)
    }

    /// `len` entries of a column vector starting at `offset`.
    pub fn segment(&self, offset: usize, len: usize) -> VariableBlock<&Self> {
        assert_eq!(self.cols, 1, "segment is only defined for column vectors");
        self.block(offset, 0, len, 1)
    }

    pub fn segment_mut(&mut self, offset: usize, len: usize) -> VariableBlock<&mut Self> {
        assert_eq!(self.cols, 1, "segment is only defined for column vectors");
        self.block_mut(offset, 0, len, 1)
    }

    /// `self == rhs`, entrywise.
    pub fn equals(&self, rhs: impl Operand) -> EqualityConstraints {
        EqualityConstraints::new(self, rhs)
    }

    /// `self >= rhs`, entrywise.
    pub fn geq(&self, rhs: impl Operand) -> InequalityConstraints {
        InequalityConstraints::geq(self, rhs)
    }

    /// `self <= rhs`, entrywise.
    pub fn leq(&self, rhs: impl Operand) -> InequalityConstraints {
        InequalityConstraints::leq(self, rhs)
    }

    /// Solve `A X = B` symbolically, so `X` stays differentiable in the
    /// entries of `A` and `B`.
    ///
    /// Up to 3×3 uses the explicit inverse. Larger systems use Gaussian
    /// elimination with partial pivoting, choosing pivots by current value.
    pub fn solve(a: &VariableMatrix, b: &VariableMatrix) -> VariableMatrix {
        assert_eq!(a.rows, a.cols, "solve needs a square coefficient matrix");
        assert_eq!(a.rows, b.rows, "solve needs matching row counts");

        match a.rows {
            0 => b.clone(),
            1 => b.map(|v| v / a.get(0, 0)),
            2 => {
                let (p, q) = (a.get(0, 0), a.get(0, 1));
                let (r, s) = (a.get(1, 0), a.get(1, 1));
                let det = &(p * s) - &(q * r);
                let inv = VariableMatrix::from_variables(
                    2,
                    2,
                    vec![s / &det, -q / &det, -r / &det, p / &det],
                );
                &inv * b
            }
            3 => &inverse_3x3(a) * b,
            _ => gaussian_elimination(a, b),
        }
    }
}

fn inverse_3x3(m: &VariableMatrix) -> VariableMatrix {
    let e = |r: usize, c: usize| m.get(r, c);
    let minor = |r0: usize, r1: usize, c0: usize, c1: usize| {
        &(e(r0, c0) * e(r1, c1)) - &(e(r0, c1) * e(r1, c0))
    };

    // Cofactors, already transposed into the adjugate
    let adj = [
        minor(1, 2, 1, 2),
        -minor(0, 2, 1, 2),
        minor(0, 1, 1, 2),
        -minor(1, 2, 0, 2),
        minor(0, 2, 0, 2),
        -minor(0, 1, 0, 2),
        minor(1, 2, 0, 1),
        -minor(0, 2, 0, 1),
        minor(0, 1, 0, 1),
    ];
    let det = &(&(e(0, 0) * &adj[0]) + &(e(0, 1) * &adj[3])) + &(e(0, 2) * &adj[6]);
    VariableMatrix::from_variables(3, 3, adj.iter().map(|c| c / &det).collect())
}

fn gaussian_elimination(a: &VariableMatrix, b: &VariableMatrix) -> VariableMatrix {
    let n = a.rows;
    let mut a = a.clone();
    let mut b = b.clone();
    let mut a_values = a.values();

    #[allow(clippy::needless_range_loop)]
    for k in 0..n {
        let pivot = (k..n)
            .max_by(|&i, &j| a_values[i * n + k].abs().total_cmp(&a_values[j * n + k].abs()))
            .unwrap_or(k);
        if pivot != k {
            for c in 0..n {
                a.storage.swap(k * n + c, pivot * n + c);
                a_values.swap(k * n + c, pivot * n + c);
            }
            for c in 0..b.cols {
                b.storage.swap(k * b.cols + c, pivot * b.cols + c);
            }
        }

        for i in k + 1..n {
            let factor = a.get(i, k) / a.get(k, k);
            let factor_value = a_values[i * n + k] / a_values[k * n + k];
            for c in k..n {
                let updated = a.get(i, c) - &(&factor * a.get(k, c));
                a_values[i * n + c] -= factor_value * a_values[k * n + c];
                *a.get_mut(i, c) = updated;
            }
            for c in 0..b.cols {
                let updated = b.get(i, c) - &(&factor * b.get(k, c));
                *b.get_mut(i, c) = updated;
            }
        }
    }

    let mut x = b.clone();
    for c in 0..b.cols {
        for i in (0..n).rev() {
            let mut acc = b.get(i, c).clone();
            for j in i + 1..n {
                acc = &acc - &(a.get(i, j) * x.get(j, c));
            }
            *x.get_mut(i, c) = &acc / a.get(i, i);
        }
    }
    x
}

impl Index<(usize, usize)> for VariableMatrix {
    type Output = Variable;
    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &Variable {
        self.get(row, col)
    }
}

impl IndexMut<(usize, usize)> for VariableMatrix {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Variable {
        self.get_mut(row, col)
    }
}

/// Flat row-major indexing; natural for vectors.
impl Index<usize> for VariableMatrix {
    type Output = Variable;
    #[inline]
    fn index(&self, index: usize) -> &Variable {
        &self.storage[index]
    }
}

impl IndexMut<usize> for VariableMatrix {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Variable {
        &mut self.storage[index]
    }
}

impl<'a> IntoIterator for &'a VariableMatrix {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;
    fn into_iter(self) -> Self::IntoIter {
        self.storage.iter()
    }
}

impl IntoIterator for VariableMatrix {
    type Item = Variable;
    type IntoIter = std::vec::IntoIter<Variable>;
    fn into_iter(self) -> Self::IntoIter {
        self.storage.into_iter()
    }
}

impl From<Variable> for VariableMatrix {
    fn from(v: Variable) -> Self {
        VariableMatrix::column(vec![v])
    }
}

impl From<Vec<Variable>> for VariableMatrix {
    fn from(v: Vec<Variable>) -> Self {
        VariableMatrix::column(v)
    }
}

impl AsRef<[Variable]> for VariableMatrix {
    fn as_ref(&self) -> &[Variable] {
        &self.storage
    }
}

impl fmt::Debug for VariableMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self.values();
        let rows: Vec<&[f64]> = values.chunks(self.cols.max(1)).collect();
        f.debug_struct("VariableMatrix")
            .field("shape", &(self.rows, self.cols))
            .field("values", &rows)
            .finish()
    }
}

// ──────────────────────────────────────────────
//  Operators
// ──────────────────────────────────────────────

fn zip_with(
    lhs: &VariableMatrix,
    rhs: &VariableMatrix,
    op: impl Fn(&Variable, &Variable) -> Variable,
) -> VariableMatrix {
    assert_eq!(lhs.shape(), rhs.shape(), "elementwise op on mismatched shapes");
    VariableMatrix {
        rows: lhs.rows,
        cols: lhs.cols,
        storage: lhs.iter().zip(rhs.iter()).map(|(l, r)| op(l, r)).collect(),
    }
}

impl Add<&VariableMatrix> for &VariableMatrix {
    type Output = VariableMatrix;
    fn add(self, rhs: &VariableMatrix) -> VariableMatrix {
        zip_with(self, rhs, |l, r| l + r)
    }
}

impl Sub<&VariableMatrix> for &VariableMatrix {
    type Output = VariableMatrix;
    fn sub(self, rhs: &VariableMatrix) -> VariableMatrix {
        zip_with(self, rhs, |l, r| l - r)
    }
}

/// Matrix product.
impl Mul<&VariableMatrix> for &VariableMatrix {
    type Output = VariableMatrix;
    fn mul(self, rhs: &VariableMatrix) -> VariableMatrix {
        assert_eq!(
            self.cols, rhs.rows,
            "matrix product of {:?} and {:?}",
            self.shape(),
            rhs.shape()
        );
        let arena = self.arena().or(rhs.arena()).cloned().unwrap_or_default();
        VariableMatrix::from_fn(self.rows, rhs.cols, |r, c| {
            (0..self.cols).fold(arena.constant(0.0), |acc, k| {
                acc + &(self.get(r, k) * rhs.get(k, c))
            })
        })
    }
}

impl Mul<&Variable> for &VariableMatrix {
    type Output = VariableMatrix;
    fn mul(self, rhs: &Variable) -> VariableMatrix {
        self.map(|v| v * rhs)
    }
}

impl Mul<&VariableMatrix> for &Variable {
    type Output = VariableMatrix;
    fn mul(self, rhs: &VariableMatrix) -> VariableMatrix {
        rhs.map(|v| self * v)
    }
}

impl Mul<f64> for &VariableMatrix {
    type Output = VariableMatrix;
    fn mul(self, rhs: f64) -> VariableMatrix {
        self.map(|v| v * rhs)
    }
}

impl Mul<&VariableMatrix> for f64 {
    type Output = VariableMatrix;
    fn mul(self, rhs: &VariableMatrix) -> VariableMatrix {
        rhs.map(|v| self * v)
    }
}

impl Div<&Variable> for &VariableMatrix {
    type Output = VariableMatrix;
    fn div(self, rhs: &Variable) -> VariableMatrix {
        self.map(|v| v / rhs)
    }
}

impl Div<f64> for &VariableMatrix {
    type Output = VariableMatrix;
    fn div(self, rhs: f64) -> VariableMatrix {
        self.map(|v| v / rhs)
    }
}

impl Neg for &VariableMatrix {
    type Output = VariableMatrix;
    fn neg(self) -> VariableMatrix {
        self.map(|v| -v)
    }
}

macro_rules! forward_owned_matrix_op {
    ($trait:ident, $method:ident) => {
        impl $trait<VariableMatrix> for VariableMatrix {
            type Output = VariableMatrix;
            #[inline]
            fn $method(self, rhs: VariableMatrix) -> VariableMatrix {
                (&self).$method(&rhs)
            }
        }

        impl $trait<&VariableMatrix> for VariableMatrix {
            type Output = VariableMatrix;
            #[inline]
            fn $method(self, rhs: &VariableMatrix) -> VariableMatrix {
                (&self).$method(rhs)
            }
        }

        impl $trait<VariableMatrix> for &VariableMatrix {
            type Output = VariableMatrix;
            #[inline]
            fn $method(self, rhs: VariableMatrix) -> VariableMatrix {
                self.$method(&rhs)
            }
        }
    };
}

forward_owned_matrix_op!(Add, add);
forward_owned_matrix_op!(Sub, sub);
forward_owned_matrix_op!(Mul, mul);

impl Neg for VariableMatrix {
    type Output = VariableMatrix;
    fn neg(self) -> VariableMatrix {
        -&self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matmul_and_transpose() {
        let arena = Arena::new();
        let a = VariableMatrix::from_values(&arena, 2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = a.t();
        assert_eq!(b.shape(), (3, 2));
        let c = &a * &b;
        assert_eq!(c.values(), vec![14.0, 32.0, 32.0, 77.0]);
    }

    #[test]
    fn stacking() {
        let arena = Arena::new();
        let a = VariableMatrix::from_values(&arena, 2, 1, &[1.0, 2.0]);
        let b = VariableMatrix::from_values(&arena, 2, 1, &[3.0, 4.0]);
        assert_eq!(VariableMatrix::hstack(&[&a, &b]).values(), vec![1.0, 3.0, 2.0, 4.0]);
        assert_eq!(VariableMatrix::vstack(&[&a, &b]).values(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn solve_small_and_large() {
        let arena = Arena::new();
        for n in 1..=5 {
            // Diagonally dominant so every size is well conditioned
            let values: Vec<f64> = (0..n * n)
                .map(|k| if k / n == k % n { 10.0 + k as f64 } else { (k % 3) as f64 })
                .collect();
            let a = VariableMatrix::from_values(&arena, n, n, &values);
            let x_true: Vec<f64> = (0..n).map(|i| i as f64 - 1.5).collect();
            let b_values: Vec<f64> = (0..n)
                .map(|r| (0..n).map(|c| values[r * n + c] * x_true[c]).sum())
                .collect();
            let b = VariableMatrix::from_values(&arena, n, 1, &b_values);
            let x = VariableMatrix::solve(&a, &b);
            for (got, want) in x.values().iter().zip(&x_true) {
                assert!((got - want).abs() < 1e-10, "n = {n}: {got} vs {want}");
            }
        }
    }
}
