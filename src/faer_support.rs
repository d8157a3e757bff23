//! faer adapters for matrix values and derivative results.

use faer::{Col, Mat};
use sprs::CsMat;

use crate::gradient::Gradient;
use crate::hessian::Hessian;
use crate::jacobian::Jacobian;
use crate::variable_matrix::VariableMatrix;

/// Current values of `m` as a `faer::Mat`.
pub fn to_faer(m: &VariableMatrix) -> Mat<f64> {
    let values = m.values();
    let cols = m.cols();
    Mat::from_fn(m.rows(), cols, |i, j| values[i * cols + j])
}

/// Assign `x` to the decision variables of a column vector.
pub fn set_from_col(m: &VariableMatrix, x: &Col<f64>) {
    let xs: Vec<f64> = (0..x.nrows()).map(|i| x[i]).collect();
    m.set_values(&xs);
}

pub fn csc_to_faer(mat: &CsMat<f64>) -> Mat<f64> {
    let mut dense = vec![0.0; mat.rows() * mat.cols()];
    let cols = mat.cols();
    for (&v, (r, c)) in mat.iter() {
        dense[r * cols + c] += v;
    }
    Mat::from_fn(mat.rows(), cols, |i, j| dense[i * cols + j])
}

pub fn gradient_faer(gradient: &Gradient) -> Col<f64> {
    let g = gradient.value();
    Col::from_fn(g.len(), |i| g[i])
}

pub fn jacobian_faer(jacobian: &Jacobian) -> Mat<f64> {
    csc_to_faer(&jacobian.value())
}

pub fn hessian_faer(hessian: &Hessian) -> Mat<f64> {
    csc_to_faer(&hessian.value())
}
