//! Rectangular views into a [`VariableMatrix`].

use std::borrow::{Borrow, BorrowMut};
use std::ops::{Index, IndexMut};

use crate::constraints::{EqualityConstraints, InequalityConstraints, Operand};
use crate::variable::Variable;
use crate::variable_matrix::VariableMatrix;

/// A `rows × cols` window starting at `(row_offset, col_offset)`.
///
/// `M` is `&VariableMatrix` for a read-only view or `&mut VariableMatrix`
/// for one that can be written through.
pub struct VariableBlock<M> {
    mat: M,
    row_offset: usize,
    col_offset: usize,
    rows: usize,
    cols: usize,
}

impl<M: Borrow<VariableMatrix>> VariableBlock<M> {
    pub fn new(mat: M, row_offset: usize, col_offset: usize, rows: usize, cols: usize) -> Self {
        let (total_rows, total_cols) = mat.borrow().shape();
        assert!(
            row_offset + rows <= total_rows && col_offset + cols <= total_cols,
            "block ({row_offset}, {col_offset}) of size {rows}x{cols} exceeds a {total_rows}x{total_cols} matrix"
        );
        VariableBlock {
            mat,
            row_offset,
            col_offset,
            rows,
            cols,
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

    pub fn get(&self, row: usize, col: usize) -> &Variable {
        assert!(row < self.rows && col < self.cols, "index ({row}, {col}) out of bounds");
        self.mat
            .borrow()
            .get(self.row_offset + row, self.col_offset + col)
    }

    /// Entries in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> + '_ {
        (0..self.rows).flat_map(move |r| (0..self.cols).map(move |c| self.get(r, c)))
    }

    pub fn values(&self) -> Vec<f64> {
        self.to_matrix().values()
    }

    /// Copy the viewed entries into an owned matrix; the variables are shared.
    pub fn to_matrix(&self) -> VariableMatrix {
        VariableMatrix::from_fn(self.rows, self.cols, |r, c| self.get(r, c).clone())
    }

    /// Sub-block relative to this block.
    pub fn block(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> VariableBlock<&VariableMatrix> {
        assert!(
            row + rows <= self.rows && col + cols <= self.cols,
            "sub-block exceeds its parent"
        );
        VariableBlock::new(
            self.mat.borrow(),
            self.row_offset + row,
            self.col_offset + col,
            rows,
            cols,
        )
    }

    /// Assign values to the viewed decision variables.
    pub fn set_values(&self, values: &[f64]) {
        assert_eq!(values.len(), self.rows * self.cols, "value count does not match block size");
        for (var, &value) in self.iter().zip(values) {
            var.set_value(value);
        }
    }

    pub fn equals(&self, rhs: impl Operand) -> EqualityConstraints {
        EqualityConstraints::new(self.to_matrix(), rhs)
    }

    pub fn geq(&self, rhs: impl Operand) -> InequalityConstraints {
        InequalityConstraints::geq(self.to_matrix(), rhs)
    }

    pub fn leq(&self, rhs: impl Operand) -> InequalityConstraints {
        InequalityConstraints::leq(self.to_matrix(), rhs)
    }
}

impl<M: BorrowMut<VariableMatrix>> VariableBlock<M> {
    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut Variable {
        assert!(row < self.rows && col < self.cols, "index ({row}, {col}) out of bounds");
        let (r, c) = (self.row_offset + row, self.col_offset + col);
        self.mat.borrow_mut().get_mut(r, c)
    }

    /// Replace the viewed entries with `values`' entries.
    pub fn assign(&mut self, values: &VariableMatrix) {
        assert_eq!(values.shape(), self.shape(), "assigning a mismatched shape into a block");
        for r in 0..self.rows {
            for c in 0..self.cols {
                *self.get_mut(r, c) = values.get(r, c).clone();
            }
        }
    }

    pub fn block_mut(
        &mut self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> VariableBlock<&mut VariableMatrix> {
        assert!(
            row + rows <= self.rows && col + cols <= self.cols,
            "sub-block exceeds its parent"
        );
        let (r, c) = (self.row_offset + row, self.col_offset + col);
        VariableBlock::new(self.mat.borrow_mut(), r, c, rows, cols)
    }
}

impl<M: Borrow<VariableMatrix>> Index<(usize, usize)> for VariableBlock<M> {
    type Output = Variable;
    fn index(&self, (row, col): (usize, usize)) -> &Variable {
        self.get(row, col)
    }
}

impl<M: BorrowMut<VariableMatrix>> IndexMut<(usize, usize)> for VariableBlock<M> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Variable {
        self.get_mut(row, col)
    }
}

/// Flat row-major indexing within the block.
impl<M: Borrow<VariableMatrix>> Index<usize> for VariableBlock<M> {
    type Output = Variable;
    fn index(&self, index: usize) -> &Variable {
        self.get(index / self.cols, index % self.cols)
    }
}

impl<M: BorrowMut<VariableMatrix>> IndexMut<usize> for VariableBlock<M> {
    fn index_mut(&mut self, index: usize) -> &mut Variable {
        let cols = self.cols;
        self.get_mut(index / cols, index % cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    #[test]
    fn block_reads_through() {
        let arena = Arena::new();
        let m = VariableMatrix::from_values(&arena, 3, 3, &[1., 2., 3., 4., 5., 6., 7., 8., 9.]);
        let b = m.block(1, 1, 2, 2);
        assert_eq!(b.values(), vec![5.0, 6.0, 8.0, 9.0]);
        assert_eq!(b.block(1, 0, 1, 2).values(), vec![8.0, 9.0]);
        assert_eq!(b[3].value(), 9.0);
    }

    #[test]
    fn block_mut_assigns_into_parent() {
        let arena = Arena::new();
        let mut m = VariableMatrix::zeros(&arena, 2, 3);
        let patch = VariableMatrix::from_values(&arena, 2, 1, &[7.0, 8.0]);
        m.col_mut(2).assign(&patch);
        m.block_mut(0, 0, 1, 1)[(0, 0)] = arena.constant(1.0);
        assert_eq!(m.values(), vec![1.0, 0.0, 7.0, 0.0, 0.0, 8.0]);
    }
}
