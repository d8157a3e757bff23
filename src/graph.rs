//! Deduplicated traversal of an expression DAG.
//!
//! The node list is built in two passes over the arena. The first counts each
//! non-constant node's in-degree into `duplications`; the second emits a node
//! only once every incoming edge has been walked, giving a parent-before-child
//! order that lists shared subexpressions exactly once. Constant nodes are left
//! out entirely since their values never change.

use std::collections::HashMap;

use crate::arena::{Arena, NodeId, RowGuard};
use crate::expression::Expr;
use crate::expression_type::ExpressionType;
use crate::opcode::{adjoint_exprs, eval_forward, reverse_partials, UNUSED};
use crate::variable::Variable;

/// Topologically ordered, duplicate-free view of the subgraph under one or
/// more roots.
pub struct ExpressionGraph {
    arena: Option<Arena>,
    roots: Vec<Expr>,
    /// Non-constant roots.
    seeds: Vec<NodeId>,
    /// Parent before child.
    nodes: Vec<NodeId>,
    /// `Node::row` of each listed node at construction time.
    rows: Vec<i32>,
    positions: HashMap<NodeId, usize>,
}

impl ExpressionGraph {
    pub fn new(root: &Expr) -> Self {
        Self::from_roots(std::slice::from_ref(root))
    }

    /// One list covering every root; shared nodes still appear once.
    pub fn from_roots(roots: &[Expr]) -> Self {
        let roots: Vec<Expr> = roots.to_vec();
        let live: Vec<&Expr> = roots.iter().filter(|root| !root.is_constant()).collect();
        let Some(arena) = live.first().map(|root| root.arena().clone()) else {
            return ExpressionGraph {
                arena: None,
                roots,
                seeds: Vec::new(),
                nodes: Vec::new(),
                rows: Vec::new(),
                positions: HashMap::new(),
            };
        };

        let seeds: Vec<NodeId> = live
            .iter()
            .map(|root| {
                assert!(
                    root.arena().ptr_eq(&arena),
                    "graph roots must share one arena"
                );
                root.id()
            })
            .collect();

        let mut nodes = Vec::new();
        let mut rows = Vec::new();
        {
            let mut pool = arena.pool_mut();
            let mut stack: Vec<NodeId> = Vec::new();

            // Each root gets one virtual incoming edge.
            for &id in &seeds {
                let node = pool.node_mut(id);
                if node.duplications == 0 {
                    stack.push(id);
                }
                node.duplications += 1;
            }

            while let Some(id) = stack.pop() {
                let args = pool.node(id).args;
                for arg in args {
                    if arg == UNUSED || pool.node(arg).ty == ExpressionType::Constant {
                        continue;
                    }
                    let node = pool.node_mut(arg);
                    if node.duplications == 0 {
                        stack.push(arg);
                    }
                    node.duplications += 1;
                }
            }

            for &id in &seeds {
                let node = pool.node_mut(id);
                node.duplications -= 1;
                if node.duplications == 0 {
                    stack.push(id);
                }
            }

            while let Some(id) = stack.pop() {
                let node = pool.node(id);
                let args = node.args;
                nodes.push(id);
                rows.push(node.row);
                for arg in args {
                    if arg == UNUSED || pool.node(arg).ty == ExpressionType::Constant {
                        continue;
                    }
                    let node = pool.node_mut(arg);
                    node.duplications -= 1;
                    if node.duplications == 0 {
                        stack.push(arg);
                    }
                }
            }
        }

        let positions = nodes.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        ExpressionGraph {
            arena: Some(arena),
            roots,
            seeds,
            nodes,
            rows,
            positions,
        }
    }

    /// Number of distinct non-constant nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[Expr] {
        &self.roots
    }

    /// Recompute every node's value from its children, child before parent.
    pub fn update(&self) {
        let Some(arena) = &self.arena else {
            return;
        };
        let mut pool = arena.pool_mut();
        for &id in self.nodes.iter().rev() {
            let node = pool.node(id);
            if node.op.is_leaf() {
                continue;
            }
            let (op, [a, b]) = (node.op, node.args);
            let av = pool.node(a).value;
            let bv = if b == UNUSED { 0.0 } else { pool.node(b).value };
            pool.node_mut(id).value = eval_forward(op, av, bv);
        }
    }

    /// Numeric reverse sweep.
    ///
    /// Each root is seeded with adjoint 1 (with several roots this is the
    /// gradient of their sum). Every listed node whose row was set when the
    /// graph was built is reported as `(row, adjoint)`. Node values are used
    /// as stored; call [`update`](Self::update) first if leaves have moved.
    pub fn compute_adjoints(&self, mut report: impl FnMut(usize, f64)) {
        let Some(arena) = &self.arena else {
            return;
        };
        let mut found = Vec::new();
        {
            let mut pool = arena.pool_mut();
            for &id in &self.nodes {
                pool.node_mut(id).adjoint = 0.0;
            }
            for &id in &self.seeds {
                pool.node_mut(id).adjoint += 1.0;
            }

            for (i, &id) in self.nodes.iter().enumerate() {
                let node = pool.node(id);
                let (op, [a, b], value, adjoint) = (node.op, node.args, node.value, node.adjoint);
                if self.rows[i] >= 0 {
                    found.push((self.rows[i] as usize, adjoint));
                }
                if op.is_leaf() || adjoint == 0.0 {
                    continue;
                }
                let av = pool.node(a).value;
                let bv = if b == UNUSED { 0.0 } else { pool.node(b).value };
                let (da, db) = reverse_partials(op, av, bv, value);

                let lhs = pool.node_mut(a);
                if lhs.ty != ExpressionType::Constant {
                    lhs.adjoint += adjoint * da;
                }
                if b != UNUSED {
                    let rhs = pool.node_mut(b);
                    if rhs.ty != ExpressionType::Constant {
                        rhs.adjoint += adjoint * db;
                    }
                }
            }
        }
        for (row, adjoint) in found {
            report(row, adjoint);
        }
    }

    /// Build the gradient of the root(s) with respect to `wrt` as new
    /// expressions, which can themselves be differentiated.
    ///
    /// Entries for variables the roots do not depend on are constant zero.
    pub fn generate_gradient_tree(&self, wrt: &[Variable]) -> Vec<Variable> {
        let zeros = || {
            wrt.iter()
                .map(|v| Variable::from_expr(v.arena().constant_expr(0.0)))
                .collect()
        };
        let Some(arena) = &self.arena else {
            return zeros();
        };
        if wrt.is_empty() {
            return Vec::new();
        }

        let _rows = RowGuard::new(wrt);
        let mut grad: Vec<Option<Expr>> = vec![None; wrt.len()];
        {
            // Adjoint expressions live only in this table; dropping it at the
            // end of the block releases every intermediate.
            let mut adjoints: Vec<Option<Expr>> = vec![None; self.nodes.len()];
            for id in &self.seeds {
                let pos = self.positions[id];
                let one = arena.constant_expr(1.0);
                accumulate(&mut adjoints[pos], one);
            }

            for (i, &id) in self.nodes.iter().enumerate() {
                let Some(adj) = adjoints[i].clone() else {
                    continue;
                };
                let (op, [a, b], row) = {
                    let pool = arena.pool();
                    let node = pool.node(id);
                    (node.op, node.args, node.row)
                };
                if row >= 0 {
                    grad[row as usize] = Some(adj.clone());
                }
                if op.is_leaf() {
                    continue;
                }

                let node = Expr::share(arena, id);
                let lhs = Expr::share(arena, a);
                let rhs = (b != UNUSED).then(|| Expr::share(arena, b));
                let [dl, dr] = adjoint_exprs(op, &node, &lhs, rhs.as_ref(), &adj);

                for (arg, contribution) in [(Some(&lhs), dl), (rhs.as_ref(), dr)] {
                    let (Some(arg), Some(contribution)) = (arg, contribution) else {
                        continue;
                    };
                    if arg.is_constant() {
                        continue;
                    }
                    let pos = self.positions[&arg.id()];
                    accumulate(&mut adjoints[pos], contribution);
                }
            }
        }

        grad.into_iter()
            .zip(wrt)
            .map(|(g, w)| match g {
                Some(expr) => Variable::from_expr(expr),
                None => Variable::from_expr(w.arena().constant_expr(0.0)),
            })
            .collect()
    }
}

fn accumulate(slot: &mut Option<Expr>, contribution: Expr) {
    *slot = Some(match slot.take() {
        Some(acc) => &acc + &contribution,
        None => contribution,
    });
}
