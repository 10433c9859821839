//! Slot-sharing rewrite rule.
//!
//! Rooted at a view creation, this rule searches the same pool for other
//! views with an identical byte footprint whose uses are provably disjoint
//! from the root's, and rewrites them to alias the root's offset. Merging
//! never changes the pool size; the compaction rule reclaims the freed bytes
//! afterwards.

use crate::error::{Error, Result};
use crate::interference::{mutually_disjoint, ranges_intersect};
use crate::liveness::has_memory_uses;
use crate::pools::{is_static_byte_pool, pool_alloc_of_view, view_footprint, views_of_pool};
use basalt_core::{Function, OpId, OpKind, RewritePattern, ValueId};
use petgraph::unionfind::UnionFind;
use std::collections::HashMap;

/// Rewrite rule that merges same-size views of one pool onto a shared offset.
pub struct ShareViewSlots;

impl ShareViewSlots {
    /// Gather the candidate partners for `root`: other views of the same pool
    /// in the same block with the same byte footprint and at least one memory
    /// access.
    fn candidates(
        &self,
        func: &Function,
        root: OpId,
        pool: OpId,
        footprint: i64,
    ) -> Result<Vec<OpId>> {
        let block = func.block_of(root)?;
        let mut candidates = Vec::new();
        for &id in func.block_ops(block) {
            if id == root || !func.op(id)?.is_view() {
                continue;
            }
            if pool_alloc_of_view(func, id)? != Some(pool) {
                continue;
            }
            if view_footprint(func, id)? != footprint {
                continue;
            }
            if !has_memory_uses(func, id)? {
                continue;
            }
            candidates.push(id);
        }
        Ok(candidates)
    }
}

impl RewritePattern for ShareViewSlots {
    type Error = Error;

    fn name(&self) -> &str {
        "share-view-slots"
    }

    fn match_and_rewrite(&self, func: &mut Function, root: OpId) -> Result<bool> {
        let op = func.op(root)?;
        if !op.is_view() {
            return Ok(false);
        }

        // Only views with a fully static result shape qualify.
        let static_result = op
            .result_type
            .as_ref()
            .and_then(|ty| ty.as_buffer())
            .is_some_and(|buffer| buffer.has_static_shape());
        if !static_result {
            return Ok(false);
        }

        let Some(pool) = pool_alloc_of_view(func, root)? else {
            return Ok(false);
        };
        if !is_static_byte_pool(func, pool)? {
            return Ok(false);
        }

        // The rule only roots in the function's top-level block.
        if !func.is_in_top_level_block(root)? {
            return Ok(false);
        }

        // A view without memory accesses has no live range to reason about.
        if !has_memory_uses(func, root)? {
            return Ok(false);
        }

        // The pool must be shared, otherwise there is nothing to merge.
        let views = views_of_pool(func, pool)?;
        if views.len() < 2 {
            return Ok(false);
        }

        let footprint = view_footprint(func, root)?;
        let candidates = self.candidates(func, root, pool, footprint)?;
        if candidates.is_empty() {
            return Ok(false);
        }

        // Equivalence groups over the pool's views. Views sharing an offset
        // already alias and start out unioned; accepted reusers join the
        // root's set as they are discovered, so later candidates are checked
        // against the grown group.
        let index: HashMap<OpId, usize> = views.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        let mut groups: UnionFind<usize> = UnionFind::new(views.len());
        let mut slot_by_offset: HashMap<i64, usize> = HashMap::new();
        for (i, &view) in views.iter().enumerate() {
            let offset = func.view_offset(view)?;
            match slot_by_offset.get(&offset) {
                Some(&leader) => {
                    groups.union(leader, i);
                }
                None => {
                    slot_by_offset.insert(offset, i);
                }
            }
        }

        let root_index = index[&root];
        let mut accepted: Vec<OpId> = Vec::new();
        for candidate in candidates {
            let candidate_index = index[&candidate];

            // Same slot already, or accepted earlier in this invocation.
            if groups.equiv(root_index, candidate_index) {
                continue;
            }

            // The interference checks only see aliases with at least one
            // memory access; a never-accessed alias has no live range and
            // cannot interfere. It still moves with its slot below.
            let mut root_group: Vec<OpId> = Vec::new();
            for &view in &views {
                if groups.equiv(root_index, index[&view]) && has_memory_uses(func, view)? {
                    root_group.push(view);
                }
            }
            let mut candidate_group: Vec<OpId> = Vec::new();
            let mut candidate_aliases: Vec<OpId> = Vec::new();
            for &view in &views {
                if groups.equiv(candidate_index, index[&view]) {
                    candidate_aliases.push(view);
                    if has_memory_uses(func, view)? {
                        candidate_group.push(view);
                    }
                }
            }

            if !mutually_disjoint(func, &root_group, &candidate_group)? {
                continue;
            }
            if ranges_intersect(func, &root_group, &candidate_group)? {
                continue;
            }

            tracing::debug!(?root, ?candidate, "views can share a pool slot");
            groups.union(root_index, candidate_index);
            accepted.extend(candidate_aliases);
        }

        if accepted.is_empty() {
            return Ok(false);
        }

        // Re-emit every accepted view at the root's offset, right before the
        // op it replaces.
        let offset = func.view_offset(root)?;
        for old in accepted {
            let result_type = func.op(old)?.result_type.clone();
            let replacement = func.insert_op_before(
                old,
                OpKind::MakeView { offset },
                vec![ValueId::Result(pool)],
                result_type,
            )?;
            func.replace_all_uses(ValueId::Result(old), ValueId::Result(replacement))?;
            func.erase_op(old)?;
        }

        Ok(true)
    }
}
