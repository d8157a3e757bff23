//! Small dense-vector and CSC helpers used by the solvers.

use sprs::{CsMat, TriMat};

pub fn zeros(rows: usize, cols: usize) -> CsMat<f64> {
    CsMat::zero((rows, cols)).to_csc()
}

/// `A x`.
pub fn mul_vec(a: &CsMat<f64>, x: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.cols(), x.len());
    let mut out = vec![0.0; a.rows()];
    for (&v, (r, c)) in a.iter() {
        out[r] += v * x[c];
    }
    out
}

/// `Aᵀ x`.
pub fn mul_transpose_vec(a: &CsMat<f64>, x: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.rows(), x.len());
    let mut out = vec![0.0; a.cols()];
    for (&v, (r, c)) in a.iter() {
        out[c] += v * x[r];
    }
    out
}

/// `Aᵀ diag(d) A` as triplets added into `tri` at offset `(0, 0)`.
pub fn add_weighted_gram(tri: &mut TriMat<f64>, a: &CsMat<f64>, d: &[f64]) {
    let csr = a.to_csr();
    for (r, row) in csr.outer_iterator().enumerate() {
        let w = d[r];
        for (i, &vi) in row.iter() {
            for (j, &vj) in row.iter() {
                tri.add_triplet(i, j, vi * w * vj);
            }
        }
    }
}

/// Add `a` into `tri` at `(row_offset, col_offset)`, and its transpose at the
/// mirrored position when `mirror` is set.
pub fn add_block(
    tri: &mut TriMat<f64>,
    a: &CsMat<f64>,
    row_offset: usize,
    col_offset: usize,
    mirror: bool,
) {
    for (&v, (r, c)) in a.iter() {
        tri.add_triplet(row_offset + r, col_offset + c, v);
        if mirror {
            tri.add_triplet(col_offset + c, row_offset + r, v);
        }
    }
}

pub fn norm1(v: &[f64]) -> f64 {
    v.iter().map(|x| x.abs()).sum()
}

pub fn norm2(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

pub fn norm_inf(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

pub fn all_finite(v: &[f64]) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// `x + α p`.
pub fn axpy(x: &[f64], alpha: f64, p: &[f64]) -> Vec<f64> {
    x.iter().zip(p).map(|(xi, pi)| xi + alpha * pi).collect()
}

pub fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CsMat<f64> {
        let mut tri = TriMat::new((2, 3));
        tri.add_triplet(0, 0, 1.0);
        tri.add_triplet(0, 2, 2.0);
        tri.add_triplet(1, 1, -3.0);
        tri.to_csc()
    }

    #[test]
    fn products() {
        let a = sample();
        assert_eq!(mul_vec(&a, &[1.0, 1.0, 1.0]), vec![3.0, -3.0]);
        assert_eq!(mul_transpose_vec(&a, &[1.0, 2.0]), vec![1.0, -6.0, 2.0]);
    }

    #[test]
    fn weighted_gram() {
        let a = sample();
        let mut tri = TriMat::new((3, 3));
        add_weighted_gram(&mut tri, &a, &[2.0, 1.0]);
        let g: CsMat<f64> = tri.to_csc();
        let dense = g.to_dense();
        assert_eq!(dense[[0, 2]], 4.0);
        assert_eq!(dense[[2, 2]], 8.0);
        assert_eq!(dense[[1, 1]], 9.0);
    }
}
