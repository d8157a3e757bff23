#![allow(dead_code)]

use gradus::{Arena, Variable};

// ─── Rosenbrock ────────────────────────────────────────────────────────────

pub fn rosenbrock(x: &[Variable]) -> Variable {
    let mut sum = x[0].arena().constant(0.0);
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - &x[i];
        let t2 = &x[i + 1] - &x[i] * &x[i];
        sum += &t1 * &t1 + 100.0 * (&t2 * &t2);
    }
    sum
}

pub fn rosenbrock_f64(x: &[f64]) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum += t1 * t1 + 100.0 * t2 * t2;
    }
    sum
}

// ─── Rastrigin ─────────────────────────────────────────────────────────────
// f(x) = 10n + Σ[x_i² - 10·cos(2π·x_i)]
// Diagonal Hessian, exercises cos.

pub fn rastrigin(x: &[Variable]) -> Variable {
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut sum = x[0].arena().constant(10.0 * x.len() as f64);
    for xi in x {
        sum += xi * xi - 10.0 * (two_pi * xi).cos();
    }
    sum
}

// ─── PDE Poisson Residual ──────────────────────────────────────────────────
// r_i = -u_{i-1} + 2u_i - u_{i+1} - h², Dirichlet BCs u_0 = u_{N+1} = 0.
// Every row is linear, so the Jacobian is fully cached.

pub fn pde_poisson_residuals(x: &[Variable]) -> Vec<Variable> {
    let n = x.len();
    let h = 1.0 / (n as f64 + 1.0);
    (0..n)
        .map(|i| {
            let mut r = 2.0 * &x[i] - h * h;
            if i > 0 {
                r -= &x[i - 1];
            }
            if i + 1 < n {
                r -= &x[i + 1];
            }
            r
        })
        .collect()
}

/// Same stencil with a cubic reaction term, making every row nonlinear.
pub fn bratu_residuals(x: &[Variable]) -> Vec<Variable> {
    pde_poisson_residuals(x)
        .into_iter()
        .zip(x)
        .map(|(r, xi)| r + 0.1 * xi.exp())
        .collect()
}

// ─── Helpers ───────────────────────────────────────────────────────────────

pub fn make_input(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 + 0.01 * i as f64).collect()
}

pub fn make_variables(arena: &Arena, values: &[f64]) -> Vec<Variable> {
    values
        .iter()
        .map(|&v| Variable::with_value(arena, v))
        .collect()
}

pub fn finite_diff_gradient(f: impl Fn(&[f64]) -> f64, x: &[f64], h: f64) -> Vec<f64> {
    let n = x.len();
    let mut grad = vec![0.0; n];
    for i in 0..n {
        let mut xp = x.to_vec();
        let mut xm = x.to_vec();
        xp[i] += h;
        xm[i] -= h;
        grad[i] = (f(&xp) - f(&xm)) / (2.0 * h);
    }
    grad
}
