//! Live-range analysis for views.
//!
//! The live range of a view is the inclusive span of operations, in the
//! structural program order of the view's top-level block, between its first
//! and last memory access. Uses nested arbitrarily deep inside loop or
//! conditional bodies count; ordering is the structural walk order of the
//! top-level block.

use basalt_core::{Error, Function, Op, OpId, Result, ValueId};

/// The live range of a view: boundary accesses plus every walked operation
/// between them, inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveRange {
    /// First load or store accessing the view.
    pub first: OpId,

    /// Last load or store accessing the view.
    pub last: OpId,

    /// All operations of the top-level walk between `first` and `last`.
    pub ops: Vec<OpId>,
}

/// Check if an operation is a load or store whose memory operand is the
/// given view's result.
fn accesses_view(op: &Op, view: OpId) -> bool {
    let target = ValueId::Result(view);
    op.load_source() == Some(target) || op.store_target() == Some(target)
}

/// Compute the live range of a view.
///
/// A view with zero memory accesses is invalid input; callers filter such
/// views out before invoking the analysis.
pub fn live_range(func: &Function, view: OpId) -> Result<LiveRange> {
    let top = func.top_level_block(view)?;

    let mut first = None;
    let mut last = None;
    for id in func.walk(top) {
        if accesses_view(func.op(id)?, view) {
            if first.is_none() {
                first = Some(id);
            }
            last = Some(id);
        }
    }
    let (first, last) = match (first, last) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(Error::InvalidGraph(format!(
                "View {:?} has no memory accesses",
                view
            )));
        }
    };

    let mut ops = Vec::new();
    let mut in_range = false;
    for id in func.walk(top) {
        if id == first {
            in_range = true;
        }
        if in_range {
            ops.push(id);
        }
        if id == last {
            break;
        }
    }

    Ok(LiveRange { first, last, ops })
}

/// Check if a view has at least one memory access.
pub fn has_memory_uses(func: &Function, view: OpId) -> Result<bool> {
    for user in func.users(ValueId::Result(view)) {
        if accesses_view(func.op(user)?, view) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Check if `before` is visited before `after` in the structural walk of a
/// block.
pub fn op_precedes(func: &Function, block: basalt_core::BlockId, before: OpId, after: OpId) -> bool {
    let mut before_found = false;
    for id in func.walk(block) {
        if id == before {
            before_found = true;
        } else if id == after {
            return before_found;
        }
    }
    before_found
}

/// Check if an operation lies within a live range's op list.
pub fn range_contains(range: &LiveRange, op: OpId) -> bool {
    range.ops.contains(&op)
}

/// Check if a live range lies entirely between `first` and `last`.
pub fn range_within(func: &Function, first: OpId, last: OpId, range: &LiveRange) -> Result<bool> {
    let top = func.top_level_block(first)?;
    Ok(op_precedes(func, top, first, range.first) && op_precedes(func, top, range.last, last))
}
