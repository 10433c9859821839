//! Pool and view queries shared by the analyses and rewrite rules.
//!
//! All queries walk the top-level block of the function (descending into
//! nested regions), because views, pools, and their accesses can occur at
//! arbitrary nesting depth while the rewrite rules only root at top level.

use basalt_core::{Function, OpId, Result};

/// The pool allocation a view references, or `None` if its pool operand is
/// not directly the result of a pool allocation.
pub fn pool_alloc_of_view(func: &Function, view: OpId) -> Result<Option<OpId>> {
    let Some(pool_value) = func.op(view)?.view_pool() else {
        return Ok(None);
    };
    let Some(def) = func.defining_op(pool_value) else {
        return Ok(None);
    };
    if func.op(def)?.is_pool_alloc() {
        Ok(Some(def))
    } else {
        Ok(None)
    }
}

/// All views referencing a pool, in structural program order.
pub fn views_of_pool(func: &Function, pool: OpId) -> Result<Vec<OpId>> {
    let top = func.top_level_block(pool)?;
    let mut views = Vec::new();
    for id in func.walk(top) {
        if func.op(id)?.is_view() && pool_alloc_of_view(func, id)? == Some(pool) {
            views.push(id);
        }
    }
    Ok(views)
}

/// One view per distinct offset, in order of first appearance.
pub fn distinct_views_of_pool(func: &Function, pool: OpId) -> Result<Vec<OpId>> {
    let mut distinct: Vec<OpId> = Vec::new();
    for view in views_of_pool(func, pool)? {
        let offset = func.view_offset(view)?;
        let mut seen = false;
        for &other in &distinct {
            if func.view_offset(other)? == offset {
                seen = true;
                break;
            }
        }
        if !seen {
            distinct.push(view);
        }
    }
    Ok(distinct)
}

/// All views aliasing the given one: same pool, same offset (including the
/// view itself).
pub fn views_sharing_slot(func: &Function, view: OpId) -> Result<Vec<OpId>> {
    let Some(pool) = pool_alloc_of_view(func, view)? else {
        return Ok(vec![view]);
    };
    let offset = func.view_offset(view)?;
    let mut aliases = Vec::new();
    for other in views_of_pool(func, pool)? {
        if func.view_offset(other)? == offset {
            aliases.push(other);
        }
    }
    Ok(aliases)
}

/// Byte footprint of a view's result buffer.
///
/// Fails for views with a dynamic result shape; the rewrite rules filter
/// those out before calling this.
pub fn view_footprint(func: &Function, view: OpId) -> Result<i64> {
    func.op(view)?
        .result_type
        .as_ref()
        .and_then(|ty| ty.as_buffer())
        .and_then(|buffer| buffer.size_in_bytes())
        .ok_or_else(|| {
            basalt_core::Error::InvalidType(format!("View {:?} has no static footprint", view))
        })
}

/// Capacity in bytes of a pool allocation.
pub fn pool_capacity(func: &Function, pool: OpId) -> Result<i64> {
    func.op(pool)?
        .result_type
        .as_ref()
        .and_then(|ty| ty.as_buffer())
        .and_then(|buffer| buffer.size_in_bytes())
        .ok_or_else(|| {
            basalt_core::Error::InvalidType(format!("Pool {:?} has no static capacity", pool))
        })
}

/// Check that a pool allocation has the required rank-1 static byte type.
pub fn is_static_byte_pool(func: &Function, pool: OpId) -> Result<bool> {
    let op = func.op(pool)?;
    if !op.is_pool_alloc() {
        return Ok(false);
    }
    Ok(op
        .result_type
        .as_ref()
        .and_then(|ty| ty.as_buffer())
        .is_some_and(|buffer| buffer.is_byte_pool() && buffer.has_static_shape()))
}

/// Total bytes used by a pool after slot sharing: the sum of footprints of
/// distinct-offset view groups, each counted once regardless of alias count.
pub fn used_bytes(func: &Function, pool: OpId) -> Result<i64> {
    let mut total = 0;
    for view in distinct_views_of_pool(func, pool)? {
        total += view_footprint(func, view)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_core::{BufferType, DataType, FunctionBuilder};

    #[test]
    fn test_views_and_footprints() {
        let mut builder = FunctionBuilder::new("f");
        let pool = builder.alloc_pool(64);
        let v1 = builder
            .make_view(pool, 0, BufferType::new(vec![4], DataType::F32))
            .unwrap();
        let v2 = builder
            .make_view(pool, 16, BufferType::new(vec![4], DataType::F32))
            .unwrap();
        let v3 = builder
            .make_view(pool, 16, BufferType::new(vec![2, 2], DataType::F32))
            .unwrap();
        let func = builder.finish();

        let pool = pool.op().unwrap();
        let (v1, v2, v3) = (v1.op().unwrap(), v2.op().unwrap(), v3.op().unwrap());

        assert!(is_static_byte_pool(&func, pool).unwrap());
        assert_eq!(pool_capacity(&func, pool).unwrap(), 64);
        assert_eq!(views_of_pool(&func, pool).unwrap(), vec![v1, v2, v3]);

        // v2 and v3 share offset 16; distinct groups are {v1} and {v2, v3}.
        assert_eq!(distinct_views_of_pool(&func, pool).unwrap(), vec![v1, v2]);
        assert_eq!(views_sharing_slot(&func, v2).unwrap(), vec![v2, v3]);
        assert_eq!(view_footprint(&func, v1).unwrap(), 16);
        assert_eq!(used_bytes(&func, pool).unwrap(), 32);
    }

    #[test]
    fn test_pool_of_view_resolution() {
        let mut builder = FunctionBuilder::new("f");
        let pool = builder.alloc_pool(32);
        let view = builder
            .make_view(pool, 0, BufferType::new(vec![8], DataType::F32))
            .unwrap();
        let func = builder.finish();

        assert_eq!(
            pool_alloc_of_view(&func, view.op().unwrap()).unwrap(),
            Some(pool.op().unwrap())
        );
    }
}
