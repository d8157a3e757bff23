use gradus::{Arena, ExpressionGraph, ExpressionType, OpCode, Variable};

// ============================================================
// Folding and pruning
// ============================================================

#[test]
fn constant_subtrees_fold_to_one_node() {
    let arena = Arena::new();
    let a = arena.constant(2.0);
    let b = arena.constant(0.5);
    let before = arena.live_nodes();

    let folded = ((&a * &b).exp() + a.pow(3.0)).sqrt() / &b;
    assert_eq!(folded.expression_type(), ExpressionType::Constant);
    assert_eq!(folded.expr().op(), OpCode::Constant);
    // Only the result survives; every intermediate constant was released
    assert_eq!(arena.live_nodes(), before + 1);

    let expected = ((1.0_f64).exp() + 8.0).sqrt() / 0.5;
    assert_eq!(folded.value(), expected);
}

#[test]
fn refolding_a_folded_constant_is_stable() {
    let arena = Arena::new();
    let c = arena.constant(3.0);
    let once = &c * 1.0 + 0.0;
    let twice = &once * 1.0 + 0.0;
    assert!(once.same_node(&c));
    assert!(twice.same_node(&once));
    assert_eq!(twice.value(), 3.0);
}

#[test]
fn identities_return_the_operand() {
    let arena = Arena::new();
    let x = Variable::with_value(&arena, 4.0);
    let before = arena.live_nodes();

    let results = [&x + 0.0, 0.0 + &x, &x - 0.0, &x * 1.0, 1.0 * &x, &x / 1.0, x.pow(1.0)];
    for r in &results {
        assert!(r.same_node(&x));
    }
    let zero = &x * 0.0;
    assert!(zero.expr().is_constant_value(0.0));
    assert_eq!(x.pow(0.0).value(), 1.0);
    // The literal constants are dropped with the pruned nodes
    drop(results);
    drop(zero);
    assert_eq!(arena.live_nodes(), before);
}

#[test]
fn negated_zero_is_not_allocated() {
    let arena = Arena::new();
    let zero = arena.constant(0.0);
    assert!((-&zero).same_node(&zero));
}

// ============================================================
// Expression types
// ============================================================

#[test]
fn types_follow_polynomial_degree() {
    let arena = Arena::new();
    let x = arena.variable();
    let y = arena.variable();

    assert_eq!(x.expression_type(), ExpressionType::Linear);
    assert_eq!((2.0 * &x - &y + 1.0).expression_type(), ExpressionType::Linear);
    assert_eq!((&x * &y).expression_type(), ExpressionType::Quadratic);
    assert_eq!(x.pow(2.0).expression_type(), ExpressionType::Quadratic);
    assert_eq!((&x * &x / 4.0).expression_type(), ExpressionType::Quadratic);
    assert_eq!((&x * &x * &y).expression_type(), ExpressionType::Nonlinear);
    assert_eq!((1.0 / &x).expression_type(), ExpressionType::Nonlinear);
    assert_eq!(x.sin().expression_type(), ExpressionType::Nonlinear);
    assert_eq!((-&x).expression_type(), ExpressionType::Linear);
}

// ============================================================
// Graph topology
// ============================================================

#[test]
fn diamond_is_visited_once() {
    let arena = Arena::new();
    let x = Variable::with_value(&arena, 0.3);
    let g = x.sin();
    let f = &g * &g.cos() + &g;
    let graph = ExpressionGraph::new(f.expr());
    // x, g, cos g, product, sum
    assert_eq!(graph.len(), 5);
}

#[test]
fn graph_update_propagates_leaf_changes() {
    let arena = Arena::new();
    let x = Variable::with_value(&arena, 1.0);
    let y = Variable::with_value(&arena, 2.0);
    let rows = [&x * &y, &x + &y, x.exp() * &y];
    let roots: Vec<_> = rows.iter().map(|r| r.expr().clone()).collect();
    let graph = ExpressionGraph::from_roots(&roots);

    // x and y appear once across the shared graph
    assert_eq!(graph.len(), 2 + 1 + 1 + 2);

    x.set_value(3.0);
    y.set_value(-1.0);
    graph.update();
    assert_eq!(rows[0].expr().stored_value(), -3.0);
    assert_eq!(rows[1].expr().stored_value(), 2.0);
    assert_eq!(rows[2].expr().stored_value(), -(3.0_f64.exp()));
}

#[test]
fn variable_value_recomputes_lazily() {
    let arena = Arena::new();
    let x = Variable::with_value(&arena, 0.0);
    let f = x.cos() + &x;
    assert_eq!(f.value(), 1.0);
    x.set_value(std::f64::consts::PI);
    assert_eq!(f.value(), -1.0 + std::f64::consts::PI);
}

// ============================================================
// Node pool
// ============================================================

#[test]
fn freed_slots_are_reused() {
    let arena = Arena::new();
    let x: Vec<Variable> = (0..8).map(|i| Variable::with_value(&arena, i as f64)).collect();
    let baseline = arena.live_nodes();

    let build = || {
        let mut f = arena.constant(0.0);
        for xi in &x {
            f += xi.sin() * xi;
        }
        f
    };

    drop(build());
    assert_eq!(arena.live_nodes(), baseline);
    let capacity = arena.capacity();
    for _ in 0..10 {
        drop(build());
    }
    assert_eq!(arena.live_nodes(), baseline);
    assert_eq!(arena.capacity(), capacity);
}

#[test]
fn long_chain_teardown_does_not_recurse() {
    let arena = Arena::new();
    let x = Variable::with_value(&arena, 0.0);
    let mut chain = x.clone();
    for _ in 0..200_000 {
        chain = chain.sin() + &x;
    }
    assert!(chain.value().is_finite());
    drop(chain);
    assert_eq!(arena.live_nodes(), 1);
}

#[test]
fn dropping_handles_in_any_order_frees_everything() {
    let arena = Arena::new();
    let x = arena.variable();
    let y = arena.variable();
    let shared = &x * &y;
    let a = shared.exp();
    let b = &shared + &a;
    drop(shared);
    drop(x);
    assert!(arena.live_nodes() > 0);
    drop(a);
    drop(b);
    drop(y);
    assert_eq!(arena.live_nodes(), 0);
}
