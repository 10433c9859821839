//! Region-nested operation graph for one function.
//!
//! A `Function` owns a tree of regions and blocks. Blocks hold operations in
//! program order; operations may own nested regions (loop and conditional
//! bodies). Operations are stored in a `petgraph::StableGraph` so ids stay
//! valid while rewrite rules erase and insert operations; petgraph edges
//! exist solely for def-use queries (producer -> consumer).

use crate::types::Type;
use crate::{Error, Result};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;

/// Type alias for operation identifiers (backed by petgraph NodeIndex).
pub type OpId = NodeIndex;

/// Unique identifier for a block.
///
/// Blocks live in a side-table (`Function::blocks`) and are never removed, so
/// ids are simple indices that remain valid across graph mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

/// Unique identifier for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(pub usize);

/// Identifier for an SSA value.
///
/// A value is either the single result of an operation or an argument of a
/// block (e.g. a loop induction variable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueId {
    /// The result of an operation.
    Result(OpId),

    /// The `n`-th argument of a block.
    Arg(BlockId, u32),
}

impl ValueId {
    /// Get the defining operation, if this value is an operation result.
    pub fn op(&self) -> Option<OpId> {
        match self {
            ValueId::Result(op) => Some(*op),
            ValueId::Arg(..) => None,
        }
    }
}

/// A compile-time constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    I64(i64),
    F32(f32),
}

/// Operation kind.
///
/// The memory model distinguishes three kinds the pool optimizer cares about:
/// pool allocation, view creation, and load/store. Everything else is opaque
/// compute or control structure.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    /// Allocate a contiguous byte pool in the function entry region.
    ///
    /// Result type must be a rank-1 static byte buffer.
    AllocPool,

    /// Create a typed view into a pool at a constant byte offset.
    ///
    /// Operands: `[pool]`. Two views with equal (pool, offset) alias.
    MakeView { offset: i64 },

    /// Load a scalar from a view. Operands: `[view, indices...]`.
    Load,

    /// Store a scalar into a view. Operands: `[value, view, indices...]`.
    Store,

    /// A compile-time constant.
    Constant(ConstValue),

    /// An opaque arithmetic operation, identified by name.
    Compute(String),

    /// An iteration construct owning a body region.
    ///
    /// The body block carries one argument, the induction variable.
    Loop { trip_count: i64 },

    /// A conditional construct owning a body region.
    Cond,

    /// Function terminator. Operands: returned values.
    Return,
}

/// An operation in the graph.
#[derive(Debug, Clone)]
pub struct Op {
    /// Operation kind.
    pub kind: OpKind,

    /// Operand values, in order.
    pub operands: Vec<ValueId>,

    /// Result type, if the operation produces a value.
    pub result_type: Option<Type>,

    /// Owning block.
    pub block: BlockId,

    /// Regions owned by this operation (loop/conditional bodies).
    pub regions: Vec<RegionId>,
}

impl Op {
    /// Check if this is a pool allocation.
    pub fn is_pool_alloc(&self) -> bool {
        matches!(self.kind, OpKind::AllocPool)
    }

    /// Check if this is a view creation.
    pub fn is_view(&self) -> bool {
        matches!(self.kind, OpKind::MakeView { .. })
    }

    /// Check if this is a load.
    pub fn is_load(&self) -> bool {
        matches!(self.kind, OpKind::Load)
    }

    /// Check if this is a store.
    pub fn is_store(&self) -> bool {
        matches!(self.kind, OpKind::Store)
    }

    /// Check if this is an iteration construct.
    pub fn is_loop(&self) -> bool {
        matches!(self.kind, OpKind::Loop { .. })
    }

    /// The pool operand of a view creation.
    pub fn view_pool(&self) -> Option<ValueId> {
        if self.is_view() {
            self.operands.first().copied()
        } else {
            None
        }
    }

    /// The byte offset of a view creation.
    pub fn view_offset(&self) -> Option<i64> {
        match self.kind {
            OpKind::MakeView { offset } => Some(offset),
            _ => None,
        }
    }

    /// The memory operand of a load.
    pub fn load_source(&self) -> Option<ValueId> {
        if self.is_load() {
            self.operands.first().copied()
        } else {
            None
        }
    }

    /// The memory operand of a store.
    pub fn store_target(&self) -> Option<ValueId> {
        if self.is_store() {
            self.operands.get(1).copied()
        } else {
            None
        }
    }

    /// The stored value operand of a store.
    pub fn store_value(&self) -> Option<ValueId> {
        if self.is_store() {
            self.operands.first().copied()
        } else {
            None
        }
    }
}

/// A block: an ordered sequence of operations plus block arguments.
#[derive(Debug, Clone)]
pub struct Block {
    /// Operations in program order.
    pub ops: Vec<OpId>,

    /// Block argument types.
    pub args: Vec<Type>,

    /// Owning region.
    pub region: RegionId,
}

/// A region: a list of blocks owned by an operation (or the function itself).
#[derive(Debug, Clone)]
pub struct Region {
    /// Blocks in this region.
    pub blocks: Vec<BlockId>,

    /// The operation owning this region, or `None` for the function body.
    pub parent: Option<OpId>,
}

// ──────────────────────────────── Function ───────────────────────────────

/// A single function: an operation graph with one body region.
///
/// Ops live in a `StableGraph` so their ids survive erasure of other ops.
/// Blocks and regions live in append-only side tables.
pub struct Function {
    /// Function name (for logging).
    name: String,

    /// Operation storage; edges are def-use (producer -> consumer).
    ops: StableGraph<Op, ()>,

    /// Block side-table.
    blocks: Vec<Block>,

    /// Region side-table.
    regions: Vec<Region>,

    /// The function body region.
    body: RegionId,
}

impl Function {
    /// Create a new function with an empty body region and entry block.
    pub fn new(name: impl Into<String>) -> Self {
        let body = RegionId(0);
        let entry = BlockId(0);
        Self {
            name: name.into(),
            ops: StableGraph::new(),
            blocks: vec![Block {
                ops: Vec::new(),
                args: Vec::new(),
                region: body,
            }],
            regions: vec![Region {
                blocks: vec![entry],
                parent: None,
            }],
            body,
        }
    }

    /// Get the function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the entry block of the function body.
    pub fn entry_block(&self) -> BlockId {
        self.regions[self.body.0].blocks[0]
    }

    // ── Op access ──

    /// Get an immutable reference to an operation.
    pub fn op(&self, id: OpId) -> Result<&Op> {
        self.ops
            .node_weight(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Op {:?} not found", id)))
    }

    /// Get a mutable reference to an operation.
    pub fn op_mut(&mut self, id: OpId) -> Result<&mut Op> {
        self.ops
            .node_weight_mut(id)
            .ok_or_else(|| Error::InvalidGraph(format!("Op {:?} not found", id)))
    }

    /// Check if an operation still exists (has not been erased).
    pub fn is_live(&self, id: OpId) -> bool {
        self.ops.node_weight(id).is_some()
    }

    /// The result value of an operation, if it produces one.
    pub fn result(&self, id: OpId) -> Result<Option<ValueId>> {
        Ok(self.op(id)?.result_type.as_ref().map(|_| ValueId::Result(id)))
    }

    /// Get the number of live operations.
    pub fn op_count(&self) -> usize {
        self.ops.node_count()
    }

    /// The byte offset of a view creation op.
    pub fn view_offset(&self, id: OpId) -> Result<i64> {
        self.op(id)?
            .view_offset()
            .ok_or_else(|| Error::InvalidGraph(format!("Op {:?} is not a view", id)))
    }

    // ── Block and region access ──

    /// Get a block.
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    /// Operations of a block in program order, without descending into regions.
    pub fn block_ops(&self, id: BlockId) -> &[OpId] {
        &self.blocks[id.0].ops
    }

    /// Get a region.
    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0]
    }

    /// The block containing an operation.
    pub fn block_of(&self, id: OpId) -> Result<BlockId> {
        Ok(self.op(id)?.block)
    }

    /// The operation owning a block's region, or `None` at the function boundary.
    pub fn parent_op(&self, block: BlockId) -> Option<OpId> {
        self.regions[self.blocks[block.0].region.0].parent
    }

    /// The top-level block enclosing an operation: the block whose immediate
    /// parent is the function itself, found by climbing parent-block links.
    pub fn top_level_block(&self, id: OpId) -> Result<BlockId> {
        let mut block = self.block_of(id)?;
        while let Some(parent) = self.parent_op(block) {
            block = self.block_of(parent)?;
        }
        Ok(block)
    }

    /// Check if an operation sits directly in the function's top-level block.
    pub fn is_in_top_level_block(&self, id: OpId) -> Result<bool> {
        Ok(self.parent_op(self.block_of(id)?).is_none())
    }

    // ── Structural walks ──

    /// Walk the operations of a block in structural program order, descending
    /// transparently into nested regions.
    ///
    /// An operation that owns regions is visited before the operations of its
    /// regions (structural nesting order, not execution order).
    pub fn walk(&self, block: BlockId) -> Vec<OpId> {
        let mut out = Vec::new();
        self.walk_into(block, &mut out);
        out
    }

    fn walk_into(&self, block: BlockId, out: &mut Vec<OpId>) {
        for &id in &self.blocks[block.0].ops {
            out.push(id);
            if let Some(op) = self.ops.node_weight(id) {
                for &region in &op.regions {
                    for &nested in &self.regions[region.0].blocks {
                        self.walk_into(nested, out);
                    }
                }
            }
        }
    }

    // ── Def-use queries ──

    /// The operation defining a value, if it is an operation result.
    pub fn defining_op(&self, value: ValueId) -> Option<OpId> {
        value.op()
    }

    /// All operations using a value as an operand.
    pub fn users(&self, value: ValueId) -> Vec<OpId> {
        match value {
            ValueId::Result(def) => {
                let mut users: Vec<OpId> = self.ops.neighbors(def).collect();
                users.sort();
                users.dedup();
                users
            }
            // Block arguments carry no def-use edges; scan operand lists.
            ValueId::Arg(..) => self
                .ops
                .node_indices()
                .filter(|&id| self.ops[id].operands.contains(&value))
                .collect(),
        }
    }

    // ── Graph mutation ──

    /// Register def-use edges for a freshly inserted operation.
    fn register_op(&mut self, op: Op) -> OpId {
        let operands = op.operands.clone();
        let id = self.ops.add_node(op);
        for operand in operands {
            if let ValueId::Result(def) = operand {
                self.ops.add_edge(def, id, ());
            }
        }
        id
    }

    /// Append a new operation at the end of a block.
    pub fn append_op(
        &mut self,
        block: BlockId,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_type: Option<Type>,
    ) -> OpId {
        let id = self.register_op(Op {
            kind,
            operands,
            result_type,
            block,
            regions: Vec::new(),
        });
        self.blocks[block.0].ops.push(id);
        id
    }

    /// Insert a new operation immediately before an existing one.
    pub fn insert_op_before(
        &mut self,
        before: OpId,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_type: Option<Type>,
    ) -> Result<OpId> {
        let block = self.block_of(before)?;
        let position = self.blocks[block.0]
            .ops
            .iter()
            .position(|&id| id == before)
            .ok_or_else(|| {
                Error::InvalidGraph(format!("Op {:?} not found in its block", before))
            })?;
        let id = self.register_op(Op {
            kind,
            operands,
            result_type,
            block,
            regions: Vec::new(),
        });
        self.blocks[block.0].ops.insert(position, id);
        Ok(id)
    }

    /// Add a region owned by an operation, or a detached region if `parent`
    /// is `None`.
    pub fn add_region(&mut self, parent: Option<OpId>) -> Result<RegionId> {
        let id = RegionId(self.regions.len());
        self.regions.push(Region {
            blocks: Vec::new(),
            parent,
        });
        if let Some(op) = parent {
            self.op_mut(op)?.regions.push(id);
        }
        Ok(id)
    }

    /// Add a block to a region.
    pub fn add_block(&mut self, region: RegionId, args: Vec<Type>) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block {
            ops: Vec::new(),
            args,
            region,
        });
        self.regions[region.0].blocks.push(id);
        id
    }

    /// Replace every use of `old` with `new`, keeping def-use edges coherent.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) -> Result<()> {
        let affected = self.users(old);
        for user in &affected {
            let op = self.op_mut(*user)?;
            for operand in op.operands.iter_mut() {
                if *operand == old {
                    *operand = new;
                }
            }
        }
        if let ValueId::Result(old_def) = old {
            for user in &affected {
                while let Some(edge) = self.ops.find_edge(old_def, *user) {
                    self.ops.remove_edge(edge);
                }
            }
        }
        if let ValueId::Result(new_def) = new {
            for user in &affected {
                self.ops.add_edge(new_def, *user, ());
            }
        }
        Ok(())
    }

    /// Erase an operation from the graph.
    ///
    /// Nested regions are erased recursively. Fails if the operation's result
    /// still has uses; callers must rewrite uses first.
    pub fn erase_op(&mut self, id: OpId) -> Result<()> {
        let op = self.op(id)?.clone();

        if op.result_type.is_some() && !self.users(ValueId::Result(id)).is_empty() {
            return Err(Error::InvalidGraph(format!(
                "Cannot erase op {:?}: its result still has uses",
                id
            )));
        }

        // Erase nested ops first (innermost last in the list, any order works
        // as long as uses are internal to the region).
        for region in &op.regions {
            for block in self.regions[region.0].blocks.clone() {
                for nested in self.blocks[block.0].ops.clone() {
                    if self.is_live(nested) {
                        self.erase_op(nested)?;
                    }
                }
            }
        }

        self.blocks[op.block.0].ops.retain(|&o| o != id);
        self.ops.remove_node(id);
        Ok(())
    }
}
