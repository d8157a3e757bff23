//! Pooled storage for expression nodes.
//!
//! Nodes live in a growable `Vec` and are addressed by `u32` handles. Every
//! strong reference bumps the node's reference count; when a count reaches
//! zero the slot goes back on a free list and the node's arguments are
//! released in turn. Release walks an explicit stack, so tearing down an
//! arbitrarily deep expression never recurses.
//!
//! An [`Arena`] is a cheap shared handle (`Rc<RefCell<_>>`). It is `!Send`:
//! one pool belongs to one thread, and parallel solves each build their own.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::expression::Expr;
use crate::expression_type::ExpressionType;
use crate::opcode::{OpCode, UNUSED};
use crate::variable::Variable;

/// Index of a node inside its arena.
pub type NodeId = u32;

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) value: f64,
    /// Numeric reverse-mode accumulator.
    pub(crate) adjoint: f64,
    pub(crate) op: OpCode,
    pub(crate) ty: ExpressionType,
    pub(crate) args: [NodeId; 2],
    pub(crate) refs: u32,
    /// Column in the wrt-vector currently being differentiated against, or -1.
    pub(crate) row: i32,
    /// Transient in-degree counter used while building a traversal order.
    pub(crate) duplications: u32,
}

impl Node {
    fn new(op: OpCode, ty: ExpressionType, value: f64, args: [NodeId; 2]) -> Self {
        Node {
            value,
            adjoint: 0.0,
            op,
            ty,
            args,
            refs: 1,
            row: -1,
            duplications: 0,
        }
    }
}

pub(crate) struct Pool {
    pub(crate) nodes: Vec<Node>,
    free: Vec<NodeId>,
    /// Scratch stack reused across releases.
    pending: Vec<NodeId>,
    live: usize,
}

impl Pool {
    fn with_capacity(capacity: usize) -> Self {
        Pool {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            pending: Vec::new(),
            live: 0,
        }
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    /// Store `node`, taking a reference on each of its arguments. The new
    /// node starts with a count of one, owned by the caller.
    fn alloc(&mut self, node: Node) -> NodeId {
        for arg in node.args {
            if arg != UNUSED {
                self.node_mut(arg).refs += 1;
            }
        }
        self.live += 1;
        match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = node;
                id
            }
            None => {
                let id = NodeId::try_from(self.nodes.len())
                    .ok()
                    .filter(|&id| id != UNUSED)
                    .unwrap_or_else(|| panic!("expression arena exhausted its u32 index space"));
                self.nodes.push(node);
                id
            }
        }
    }

    #[inline]
    pub(crate) fn retain(&mut self, id: NodeId) {
        self.node_mut(id).refs += 1;
    }

    pub(crate) fn release(&mut self, id: NodeId) {
        let mut stack = std::mem::take(&mut self.pending);
        stack.push(id);
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id as usize];
            debug_assert!(node.refs > 0, "released node {id} with no live references");
            node.refs -= 1;
            if node.refs == 0 {
                let args = node.args;
                node.args = [UNUSED; 2];
                for arg in args {
                    if arg != UNUSED {
                        stack.push(arg);
                    }
                }
                self.free.push(id);
                self.live -= 1;
            }
        }
        self.pending = stack;
    }
}

/// Shared handle to a pool of expression nodes.
#[derive(Clone)]
pub struct Arena {
    pool: Rc<RefCell<Pool>>,
}

impl Arena {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Pre-size the node storage.
    pub fn with_capacity(capacity: usize) -> Self {
        Arena {
            pool: Rc::new(RefCell::new(Pool::with_capacity(capacity))),
        }
    }

    /// A new decision variable: a linear leaf holding zero.
    pub fn variable(&self) -> Variable {
        Variable::from_expr(self.leaf_expr(0.0))
    }

    pub fn constant(&self, value: f64) -> Variable {
        Variable::from_expr(self.constant_expr(value))
    }

    /// Number of nodes currently referenced.
    pub fn live_nodes(&self) -> usize {
        self.pool.borrow().live
    }

    /// Number of slots ever allocated (live plus free).
    pub fn capacity(&self) -> usize {
        self.pool.borrow().nodes.len()
    }

    /// True if both handles refer to the same pool.
    #[inline]
    pub fn ptr_eq(&self, other: &Arena) -> bool {
        Rc::ptr_eq(&self.pool, &other.pool)
    }

    pub(crate) fn constant_expr(&self, value: f64) -> Expr {
        self.alloc(OpCode::Constant, ExpressionType::Constant, value, [UNUSED; 2])
    }

    pub(crate) fn leaf_expr(&self, value: f64) -> Expr {
        self.alloc(OpCode::Decision, ExpressionType::Linear, value, [UNUSED; 2])
    }

    pub(crate) fn alloc(
        &self,
        op: OpCode,
        ty: ExpressionType,
        value: f64,
        args: [NodeId; 2],
    ) -> Expr {
        let id = self.pool_mut().alloc(Node::new(op, ty, value, args));
        Expr::from_owned(self.clone(), id)
    }

    #[inline]
    pub(crate) fn pool(&self) -> Ref<'_, Pool> {
        self.pool.borrow()
    }

    #[inline]
    pub(crate) fn pool_mut(&self) -> RefMut<'_, Pool> {
        self.pool.borrow_mut()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pool = self.pool.borrow();
        f.debug_struct("Arena")
            .field("live", &pool.live)
            .field("capacity", &pool.nodes.len())
            .finish()
    }
}

/// Marks each wrt variable with its position for the lifetime of the guard.
///
/// Traversals read `Node::row` to find which leaves to report. The rows are
/// reset to -1 on drop, so they are only meaningful inside one
/// differentiation.
pub(crate) struct RowGuard {
    arena: Option<Arena>,
    ids: Vec<NodeId>,
}

impl RowGuard {
    pub(crate) fn new(wrt: &[Variable]) -> Self {
        let Some(first) = wrt.first() else {
            return RowGuard {
                arena: None,
                ids: Vec::new(),
            };
        };
        let arena = first.arena().clone();
        let mut ids = Vec::with_capacity(wrt.len());
        {
            let mut pool = arena.pool_mut();
            for (row, var) in wrt.iter().enumerate() {
                assert!(
                    var.arena().ptr_eq(&arena),
                    "differentiating with respect to variables from different arenas"
                );
                let id = var.expr().id();
                pool.node_mut(id).row = row as i32;
                ids.push(id);
            }
        }
        RowGuard {
            arena: Some(arena),
            ids,
        }
    }
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        if let Some(arena) = &self.arena {
            let mut pool = arena.pool_mut();
            for &id in &self.ids {
                pool.node_mut(id).row = -1;
            }
        }
    }
}
