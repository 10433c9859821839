//! Pool compaction rewrite rule.
//!
//! After slot sharing, a pool may hold fewer distinct slots than it was sized
//! for. This rule measures the bytes actually used, emits a smaller
//! replacement pool, and renumbers the surviving slots to contiguous offsets
//! starting at zero.

use crate::error::{Error, Result};
use crate::pools::{
    distinct_views_of_pool, is_static_byte_pool, pool_capacity, used_bytes, view_footprint,
    views_sharing_slot,
};
use basalt_core::{BufferType, Function, OpId, OpKind, RewritePattern, Type, ValueId};

/// Rewrite rule that shrinks a pool to the total footprint of its slots.
pub struct CompactPools;

impl RewritePattern for CompactPools {
    type Error = Error;

    fn name(&self) -> &str {
        "compact-pools"
    }

    fn match_and_rewrite(&self, func: &mut Function, root: OpId) -> Result<bool> {
        if !is_static_byte_pool(func, root)? {
            return Ok(false);
        }

        // The rule only roots in the function's top-level block.
        if !func.is_in_top_level_block(root)? {
            return Ok(false);
        }

        // A pool with no views is not this rule's concern.
        let distinct = distinct_views_of_pool(func, root)?;
        if distinct.is_empty() {
            return Ok(false);
        }

        let capacity = pool_capacity(func, root)?;
        let used = used_bytes(func, root)?;

        // Views exceeding their pool means an earlier analysis stage emitted
        // inconsistent offsets; continuing would risk an undersized
        // allocation.
        if used > capacity {
            return Err(Error::PoolOverflow { used, capacity });
        }
        if used == capacity {
            return Ok(false);
        }

        tracing::debug!(?root, capacity, used, "compacting pool");

        let replacement_pool = func.insert_op_before(
            root,
            OpKind::AllocPool,
            vec![],
            Some(Type::Buffer(BufferType::bytes(used))),
        )?;

        // Walk distinct slots in first-appearance order, assigning contiguous
        // offsets; every alias of a slot moves together.
        let mut offset = 0;
        let mut moves: Vec<(OpId, i64)> = Vec::new();
        for slot in distinct {
            for view in views_sharing_slot(func, slot)? {
                moves.push((view, offset));
            }
            offset += view_footprint(func, slot)?;
        }

        for (old, offset) in moves {
            let result_type = func.op(old)?.result_type.clone();
            let replacement = func.insert_op_before(
                old,
                OpKind::MakeView { offset },
                vec![ValueId::Result(replacement_pool)],
                result_type,
            )?;
            func.replace_all_uses(ValueId::Result(old), ValueId::Result(replacement))?;
            func.erase_op(old)?;
        }

        func.replace_all_uses(ValueId::Result(root), ValueId::Result(replacement_pool))?;
        func.erase_op(root)?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::views_of_pool;
    use basalt_core::{DataType, FunctionBuilder};

    fn f32x4() -> BufferType {
        BufferType::new(vec![4], DataType::F32)
    }

    fn apply_once(func: &mut Function, root: OpId) -> Result<bool> {
        CompactPools.match_and_rewrite(func, root)
    }

    /// The single live pool allocation of a function.
    fn find_pool(func: &Function) -> OpId {
        let pools: Vec<OpId> = func
            .walk(func.entry_block())
            .into_iter()
            .filter(|&id| func.op(id).unwrap().is_pool_alloc())
            .collect();
        assert_eq!(pools.len(), 1);
        pools[0]
    }

    #[test]
    fn test_compacts_slack() {
        let mut builder = FunctionBuilder::new("f");
        let pool = builder.alloc_pool(64);
        let v1 = builder.make_view(pool, 0, f32x4()).unwrap();
        let v2 = builder.make_view(pool, 32, f32x4()).unwrap();
        let c = builder.constant_f32(1.0);
        builder.store(c, v1, &[]).unwrap();
        builder.store(c, v2, &[]).unwrap();
        let mut func = builder.finish();

        assert!(apply_once(&mut func, pool.op().unwrap()).unwrap());

        let new_pool = find_pool(&func);
        assert_eq!(pool_capacity(&func, new_pool).unwrap(), 32);

        // Offsets renumbered contiguously in first-appearance order.
        let offsets: Vec<i64> = views_of_pool(&func, new_pool)
            .unwrap()
            .into_iter()
            .map(|v| func.view_offset(v).unwrap())
            .collect();
        assert_eq!(offsets, vec![0, 16]);
    }

    #[test]
    fn test_exact_fit_is_a_no_match() {
        let mut builder = FunctionBuilder::new("f");
        let pool = builder.alloc_pool(32);
        let v1 = builder.make_view(pool, 0, f32x4()).unwrap();
        let v2 = builder.make_view(pool, 16, f32x4()).unwrap();
        let c = builder.constant_f32(1.0);
        builder.store(c, v1, &[]).unwrap();
        builder.store(c, v2, &[]).unwrap();
        let mut func = builder.finish();

        assert!(!apply_once(&mut func, pool.op().unwrap()).unwrap());
        assert!(func.is_live(pool.op().unwrap()));
    }

    #[test]
    fn test_aliases_move_together() {
        let mut builder = FunctionBuilder::new("f");
        let pool = builder.alloc_pool(64);
        let v1 = builder.make_view(pool, 16, f32x4()).unwrap();
        let v2 = builder.make_view(pool, 16, f32x4()).unwrap();
        let c = builder.constant_f32(1.0);
        builder.store(c, v1, &[]).unwrap();
        builder.store(c, v2, &[]).unwrap();
        let mut func = builder.finish();

        assert!(apply_once(&mut func, pool.op().unwrap()).unwrap());

        let new_pool = find_pool(&func);
        // One 16-byte slot with two aliases at offset zero.
        assert_eq!(pool_capacity(&func, new_pool).unwrap(), 16);
        let views = views_of_pool(&func, new_pool).unwrap();
        assert_eq!(views.len(), 2);
        for view in views {
            assert_eq!(func.view_offset(view).unwrap(), 0);
        }
    }

    #[test]
    fn test_overflow_is_fatal() {
        // Two distinct 16-byte slots declared in a 16-byte pool.
        let mut builder = FunctionBuilder::new("f");
        let pool = builder.alloc_pool(16);
        let v1 = builder.make_view(pool, 0, f32x4()).unwrap();
        let v2 = builder.make_view(pool, 16, f32x4()).unwrap();
        let c = builder.constant_f32(1.0);
        builder.store(c, v1, &[]).unwrap();
        builder.store(c, v2, &[]).unwrap();
        let mut func = builder.finish();

        let result = apply_once(&mut func, pool.op().unwrap());
        assert!(matches!(
            result,
            Err(Error::PoolOverflow {
                used: 32,
                capacity: 16
            })
        ));
    }

    #[test]
    fn test_pool_without_views_is_a_no_match() {
        let mut builder = FunctionBuilder::new("f");
        let pool = builder.alloc_pool(64);
        let mut func = builder.finish();

        assert!(!apply_once(&mut func, pool.op().unwrap()).unwrap());
    }
}
