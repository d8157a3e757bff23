use approx::assert_relative_eq;
use gradus::{Arena, Gradient, Jacobian, Variable, VariableMatrix};

fn residual(a: &[f64], x: &[f64], b: &[f64]) -> f64 {
    let n = x.len();
    (0..n)
        .map(|i| {
            let ax: f64 = (0..n).map(|j| a[i * n + j] * x[j]).sum();
            (ax - b[i]).abs()
        })
        .fold(0.0, f64::max)
}

#[test]
fn arithmetic_and_transpose() {
    let arena = Arena::new();
    let a = VariableMatrix::from_values(&arena, 2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let b = VariableMatrix::from_values(&arena, 3, 1, &[1.0, 0.0, -1.0]);

    let ab = &a * &b;
    assert_eq!(ab.shape(), (2, 1));
    assert_eq!(ab.values(), vec![-2.0, -2.0]);

    let at = a.t();
    assert_eq!(at.shape(), (3, 2));
    assert_eq!(at.value(2, 1), 6.0);

    let sum = &a + &a;
    assert_eq!((&sum - &a).values(), a.values());
    assert_eq!((&a * 2.0).values(), sum.values());
    assert_eq!((-&a).value(1, 2), -6.0);
    assert_eq!(a.sum().value(), 21.0);
}

#[test]
fn stacking_and_blocks() {
    let arena = Arena::new();
    let top = VariableMatrix::from_values(&arena, 1, 2, &[1.0, 2.0]);
    let bottom = VariableMatrix::from_values(&arena, 2, 2, &[3.0, 4.0, 5.0, 6.0]);
    let stacked = VariableMatrix::vstack(&[&top, &bottom]);
    assert_eq!(stacked.shape(), (3, 2));
    assert_eq!(stacked.col(1).values(), vec![2.0, 4.0, 6.0]);
    assert_eq!(stacked.block(1, 0, 2, 2).values(), bottom.values());

    let wide = VariableMatrix::hstack(&[&bottom, &bottom]);
    assert_eq!(wide.shape(), (2, 4));
    assert_eq!(wide.row(1).values(), vec![5.0, 6.0, 5.0, 6.0]);
}

#[test]
fn blocks_alias_their_parent() {
    let arena = Arena::new();
    let x = VariableMatrix::new(&arena, 4, 1);
    x.segment(1, 2).set_values(&[7.0, 8.0]);
    assert_eq!(x.values(), vec![0.0, 7.0, 8.0, 0.0]);
}

#[test]
fn solve_small_and_large_systems() {
    let arena = Arena::new();
    for n in [1, 2, 3, 5] {
        // Off-diagonal entries outweigh the diagonal, so elimination must pivot
        let a_values: Vec<f64> = (0..n * n)
            .map(|k| {
                let (i, j) = (k / n, k % n);
                if i == j {
                    0.5 + i as f64
                } else {
                    (n + 1) as f64 / (1.0 + (i + 2 * j) as f64)
                }
            })
            .collect();
        let b_values: Vec<f64> = (0..n).map(|i| 1.0 - i as f64).collect();
        let a = VariableMatrix::from_values(&arena, n, n, &a_values);
        let b = VariableMatrix::from_values(&arena, n, 1, &b_values);

        let x = VariableMatrix::solve(&a, &b);
        assert_eq!(x.shape(), (n, 1));
        assert!(residual(&a_values, &x.values(), &b_values) < 1e-10, "n = {n}");
    }
}

#[test]
fn solve_is_differentiable() {
    let arena = Arena::new();
    let p = Variable::with_value(&arena, 2.0);
    let a = VariableMatrix::from_variables(
        2,
        2,
        vec![p.clone(), arena.constant(1.0), arena.constant(1.0), arena.constant(3.0)],
    );
    let b = VariableMatrix::from_values(&arena, 2, 1, &[1.0, 2.0]);
    let x = VariableMatrix::solve(&a, &b);

    // x₀ = (3 - 2) / (3p - 1)
    assert_relative_eq!(x.value(0, 0), 1.0 / 5.0, epsilon = 1e-14);
    let dx0 = Gradient::new(&x[0], std::slice::from_ref(&p)).value()[0];
    assert_relative_eq!(dx0, -3.0 / 25.0, epsilon = 1e-14);

    p.set_value(1.0);
    assert_relative_eq!(x.value(0, 0), 0.5, epsilon = 1e-14);
}

#[test]
fn jacobian_of_matrix_product() {
    let arena = Arena::new();
    let m = VariableMatrix::from_values(&arena, 2, 2, &[1.0, 2.0, 3.0, 4.0]);
    let x = VariableMatrix::new(&arena, 2, 1);
    let y = &m * &x;
    let jacobian = Jacobian::new(y.as_slice(), x.as_slice());
    assert!(jacobian.nonlinear_rows().is_empty());
    let dense = jacobian.value().to_dense();
    assert_eq!(dense[[0, 0]], 1.0);
    assert_eq!(dense[[0, 1]], 2.0);
    assert_eq!(dense[[1, 0]], 3.0);
    assert_eq!(dense[[1, 1]], 4.0);
}

#[test]
fn constraint_sets_flatten_entries() {
    let arena = Arena::new();
    let x = VariableMatrix::new(&arena, 2, 2);
    x.set_values(&[1.0, 2.0, 3.0, 4.0]);

    let bounds = x.geq(2.0);
    assert_eq!(bounds.len(), 4);
    assert!(!bounds.is_satisfied(1e-9));
    x.set_values(&[2.0, 2.0, 3.0, 4.0]);
    assert!(bounds.is_satisfied(1e-9));

    let eq = x.equals(&x.t());
    assert_eq!(eq.len(), 4);
    assert!(!eq.is_satisfied(1e-9));
    x.set_values(&[2.0, 3.0, 3.0, 4.0]);
    assert!(eq.is_satisfied(1e-9));
}

#[cfg(feature = "nalgebra")]
mod nalgebra_interop {
    use super::*;
    use gradus::nalgebra_support::{
        from_dmatrix, hessian_nalgebra, jacobian_nalgebra, set_from_dvector, to_dmatrix,
    };
    use gradus::Hessian;
    use nalgebra::{DMatrix, DVector};

    #[test]
    fn derivative_results_densify() {
        let arena = Arena::new();
        let x = VariableMatrix::new(&arena, 2, 1);
        set_from_dvector(&x, &DVector::from_vec(vec![1.0, -1.0]));
        let f = &x[0] * &x[0] * &x[1];
        let h = hessian_nalgebra(&Hessian::new(&f, x.as_slice()));
        assert_eq!(h, DMatrix::from_row_slice(2, 2, &[-2.0, 2.0, 2.0, 0.0]));

        let m = from_dmatrix(&arena, &DMatrix::from_row_slice(1, 2, &[3.0, 4.0]));
        let y = &m * &x;
        assert_eq!(to_dmatrix(&y)[(0, 0)], -1.0);
        let jac = jacobian_nalgebra(&Jacobian::new(y.as_slice(), x.as_slice()));
        assert_eq!(jac, DMatrix::from_row_slice(1, 2, &[3.0, 4.0]));
    }
}

#[cfg(feature = "faer")]
mod faer_interop {
    use super::*;
    use gradus::faer_support::{gradient_faer, set_from_col, to_faer};

    #[test]
    fn gradient_as_column() {
        let arena = Arena::new();
        let x = VariableMatrix::new(&arena, 3, 1);
        set_from_col(&x, &faer::Col::from_fn(3, |i| i as f64 + 1.0));
        assert_eq!(to_faer(&x).read(2, 0), 3.0);

        let f = (&x[0] * &x[1]) + x[2].exp();
        let g = gradient_faer(&Gradient::new(&f, x.as_slice()));
        assert_eq!(g.read(0), 2.0);
        assert_eq!(g.read(1), 1.0);
        assert_relative_eq!(g.read(2), 3.0_f64.exp());
    }
}
