//! Interference proving for slot sharing.
//!
//! Two views may share a pool slot only if their uses are dataflow-disjoint
//! (no value stored into one is derived, even transitively, from a load out
//! of the other) and their live ranges do not intersect. Both conditions are
//! necessary: dataflow disjointness alone does not prevent temporally
//! overlapping accesses from clobbering each other's storage.

use crate::liveness::{live_range, range_contains, range_within};
use crate::loop_nest::ranges_in_same_loop_nest;
use basalt_core::{Function, OpId, Result, ValueId};
use std::collections::{HashSet, VecDeque};

/// All stores in the top-level walk whose memory operand is the view's
/// result.
pub fn stores_into(func: &Function, view: OpId) -> Result<Vec<OpId>> {
    let top = func.top_level_block(view)?;
    let target = ValueId::Result(view);
    let mut stores = Vec::new();
    for id in func.walk(top) {
        if func.op(id)?.store_target() == Some(target) {
            stores.push(id);
        }
    }
    Ok(stores)
}

/// Check that no store into `view` derives its stored value, transitively,
/// from a load out of any view in `group`.
///
/// For each store, the stored value's defining-op chain is searched backward
/// with a worklist. Block arguments and constants are leaves; loads are
/// leaves whose source view is tested for membership in `group`. A visited
/// set prevents revisiting a defining operation within one trace.
pub fn uses_disjoint(func: &Function, group: &[OpId], view: OpId) -> Result<bool> {
    for store in stores_into(func, view)? {
        let Some(stored) = func.op(store)?.store_value() else {
            continue;
        };

        let mut worklist: VecDeque<ValueId> = VecDeque::from([stored]);
        let mut visited: HashSet<OpId> = HashSet::new();

        while let Some(value) = worklist.pop_front() {
            // Block arguments (e.g. induction variables) are leaves.
            let ValueId::Result(def) = value else {
                continue;
            };
            if !visited.insert(def) {
                continue;
            }

            let def_op = func.op(def)?;
            if def_op.is_load() {
                let Some(source) = def_op.load_source() else {
                    continue;
                };
                if let Some(source_view) = func.defining_op(source)
                    && func.op(source_view)?.is_view()
                    && group.contains(&source_view)
                {
                    tracing::trace!(
                        ?store,
                        load = ?def,
                        "store value derives from a load out of the candidate group"
                    );
                    return Ok(false);
                }
            } else {
                for &operand in &def_op.operands {
                    worklist.push_back(operand);
                }
            }
        }
    }
    Ok(true)
}

/// Extend the pairwise disjointness test to two equivalence groups: every
/// member of each group must be disjoint from the whole of the other.
pub fn mutually_disjoint(func: &Function, group_a: &[OpId], group_b: &[OpId]) -> Result<bool> {
    for &view in group_b {
        if !uses_disjoint(func, group_a, view)? {
            return Ok(false);
        }
    }
    for &view in group_a {
        if !uses_disjoint(func, group_b, view)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Check whether any live range of `group_a` intersects any live range of
/// `group_b`.
///
/// A pair intersects when either boundary of B's range lies inside A's op
/// list, or B's range is fully nested between A's boundaries, or the
/// boundaries are co-located in a shared loop nest. Deliberately
/// conservative: a false positive costs an optimization, a false negative
/// would corrupt data.
pub fn ranges_intersect(func: &Function, group_a: &[OpId], group_b: &[OpId]) -> Result<bool> {
    for &a in group_a {
        let range = live_range(func, a)?;
        for &b in group_b {
            let other = live_range(func, b)?;

            if range_contains(&range, other.first) || range_contains(&range, other.last) {
                return Ok(true);
            }
            if range_within(func, other.first, other.last, &range)? {
                return Ok(true);
            }
            if ranges_in_same_loop_nest(func, other.first, other.last, &range)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
