//! nalgebra adapters for matrix values and derivative results.
//!
//! Conversions copy values; nothing here builds expressions.

use nalgebra::{DMatrix, DVector};
use sprs::CsMat;

use crate::arena::Arena;
use crate::gradient::Gradient;
use crate::hessian::Hessian;
use crate::jacobian::Jacobian;
use crate::variable_matrix::VariableMatrix;

/// Current values of `m` as a `DMatrix`.
pub fn to_dmatrix(m: &VariableMatrix) -> DMatrix<f64> {
    DMatrix::from_row_slice(m.rows(), m.cols(), &m.values())
}

/// Constant matrix holding the entries of `m`.
pub fn from_dmatrix(arena: &Arena, m: &DMatrix<f64>) -> VariableMatrix {
    VariableMatrix::from_fn(m.nrows(), m.ncols(), |r, c| arena.constant(m[(r, c)]))
}

/// Assign `x` to the decision variables of a column vector.
pub fn set_from_dvector(m: &VariableMatrix, x: &DVector<f64>) {
    m.set_values(x.as_slice());
}

/// Densify a sparse derivative.
pub fn csc_to_dmatrix(mat: &CsMat<f64>) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(mat.rows(), mat.cols());
    for (&v, (r, c)) in mat.iter() {
        dense[(r, c)] += v;
    }
    dense
}

pub fn gradient_nalgebra(gradient: &Gradient) -> DVector<f64> {
    DVector::from_vec(gradient.value())
}

pub fn jacobian_nalgebra(jacobian: &Jacobian) -> DMatrix<f64> {
    csc_to_dmatrix(&jacobian.value())
}

pub fn hessian_nalgebra(hessian: &Hessian) -> DMatrix<f64> {
    csc_to_dmatrix(&hessian.value())
}
