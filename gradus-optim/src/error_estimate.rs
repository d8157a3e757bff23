//! KKT error measures used for termination and step rejection.

use sprs::CsMat;

use crate::linalg::sparse::{mul_transpose_vec, norm1, norm_inf};

/// Cap on the dual scaling factor.
const S_MAX: f64 = 100.0;

/// Scaled ∞-norm KKT error of an equality-constrained iterate:
/// `max(‖∇f − Aₑᵀy‖∞ / s_d, ‖cₑ‖∞)`.
pub fn sqp_error_estimate(g: &[f64], a_e: &CsMat<f64>, c_e: &[f64], y: &[f64]) -> f64 {
    let s_d = if y.is_empty() {
        1.0
    } else {
        S_MAX.max(norm1(y) / y.len() as f64) / S_MAX
    };

    let aty = mul_transpose_vec(a_e, y);
    let stationarity = g
        .iter()
        .zip(&aty)
        .fold(0.0_f64, |acc, (gi, ai)| acc.max((gi - ai).abs()));

    (stationarity / s_d).max(norm_inf(c_e))
}

/// Scaled ∞-norm KKT error of an interior-point iterate at barrier `mu`.
///
/// Adds primal feasibility `‖cᵢ − s‖∞` and complementarity
/// `‖Sz − μe‖∞ / s_c` to the equality-constrained terms.
#[allow(clippy::too_many_arguments)]
pub fn interior_point_error_estimate(
    g: &[f64],
    a_e: &CsMat<f64>,
    c_e: &[f64],
    a_i: &CsMat<f64>,
    c_i: &[f64],
    s: &[f64],
    y: &[f64],
    z: &[f64],
    mu: f64,
) -> f64 {
    let duals = y.len() + z.len();
    let s_d = if duals == 0 {
        1.0
    } else {
        S_MAX.max((norm1(y) + norm1(z)) / duals as f64) / S_MAX
    };
    let s_c = if z.is_empty() {
        1.0
    } else {
        S_MAX.max(norm1(z) / z.len() as f64) / S_MAX
    };

    let aty = mul_transpose_vec(a_e, y);
    let atz = mul_transpose_vec(a_i, z);
    let stationarity = (0..g.len()).fold(0.0_f64, |acc, k| acc.max((g[k] - aty[k] - atz[k]).abs()));

    let slack_gap = c_i
        .iter()
        .zip(s)
        .fold(0.0_f64, |acc, (ci, si)| acc.max((ci - si).abs()));
    let complementarity = s
        .iter()
        .zip(z)
        .fold(0.0_f64, |acc, (si, zi)| acc.max((si * zi - mu).abs()));

    (stationarity / s_d)
        .max(norm_inf(c_e))
        .max(slack_gap)
        .max(complementarity / s_c)
}

/// Unscaled 1-norm KKT error:
/// `‖∇f − Aₑᵀy − Aᵢᵀz‖₁ + ‖Sz − μe‖₁ + ‖cₑ‖₁ + ‖cᵢ − s‖₁`.
///
/// Pass empty `c_i`, `s` and `z` with an empty `a_i` for SQP.
#[allow(clippy::too_many_arguments)]
pub fn kkt_error(
    g: &[f64],
    a_e: &CsMat<f64>,
    c_e: &[f64],
    a_i: &CsMat<f64>,
    c_i: &[f64],
    s: &[f64],
    y: &[f64],
    z: &[f64],
    mu: f64,
) -> f64 {
    let aty = mul_transpose_vec(a_e, y);
    let atz = mul_transpose_vec(a_i, z);
    let stationarity: f64 = (0..g.len()).map(|k| (g[k] - aty[k] - atz[k]).abs()).sum();
    let complementarity: f64 = s.iter().zip(z).map(|(si, zi)| (si * zi - mu).abs()).sum();
    let slack_gap: f64 = c_i.iter().zip(s).map(|(ci, si)| (ci - si).abs()).sum();
    stationarity + complementarity + norm1(c_e) + slack_gap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::zeros;
    use sprs::TriMat;

    #[test]
    fn unconstrained_is_gradient_norm() {
        let a = zeros(0, 2);
        assert_eq!(sqp_error_estimate(&[3.0, -4.0], &a, &[], &[]), 4.0);
        assert_eq!(kkt_error(&[3.0, -4.0], &a, &[], &zeros(0, 2), &[], &[], &[], &[], 0.0), 7.0);
    }

    #[test]
    fn large_duals_scale_stationarity() {
        let mut tri = TriMat::new((1, 1));
        tri.add_triplet(0, 0, 1.0);
        let a: CsMat<f64> = tri.to_csc();
        // s_d = 400 / 100 = 4
        let err = sqp_error_estimate(&[402.0], &a, &[0.0], &[400.0]);
        assert!((err - 0.5).abs() < 1e-12);
    }

    #[test]
    fn complementarity_counts() {
        let a_e = zeros(0, 1);
        let a_i = zeros(1, 1);
        let err = interior_point_error_estimate(
            &[0.0],
            &a_e,
            &[],
            &a_i,
            &[2.0],
            &[2.0],
            &[],
            &[0.5],
            0.1,
        );
        assert!((err - 0.9).abs() < 1e-12);
    }
}
