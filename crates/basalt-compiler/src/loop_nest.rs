//! Loop-nest classification.
//!
//! Live ranges computed in the flattened order of the top-level block can
//! appear disjoint even when both ranges execute repeatedly inside the same
//! loop body; sharing a slot there would corrupt data across iterations.
//! These checks detect when two range boundaries are co-located in a shared
//! loop nest. Any shared outermost loop counts as interference, even when the
//! two ranges sit in sibling sub-regions of that loop; relaxing this risks
//! unsound reuse.

use crate::liveness::LiveRange;
use basalt_core::{Function, OpId, Result};

/// The outermost iteration construct among an operation's chain of enclosing
/// blocks, stopping at the function boundary.
///
/// Returns `None` when the operation sits directly in the top-level block or
/// is nested only inside non-loop constructs.
pub fn outermost_enclosing_loop(func: &Function, op: OpId) -> Result<Option<OpId>> {
    let mut outermost = None;
    let mut block = func.block_of(op)?;
    while let Some(parent) = func.parent_op(block) {
        if func.op(parent)?.is_loop() {
            outermost = Some(parent);
        }
        block = func.block_of(parent)?;
    }
    Ok(outermost)
}

/// True iff both operations have a defined outermost enclosing loop and the
/// two loops are the identical construct.
pub fn share_loop_nest(func: &Function, a: OpId, b: OpId) -> Result<bool> {
    let Some(loop_a) = outermost_enclosing_loop(func, a)? else {
        return Ok(false);
    };
    let Some(loop_b) = outermost_enclosing_loop(func, b)? else {
        return Ok(false);
    };
    Ok(loop_a == loop_b)
}

/// Check if the boundaries of a candidate range (`first`, `last`) and an
/// existing live range are co-located in a shared loop nest.
///
/// Four cases, in priority order:
/// 1. `first` and `last` both at top level: no shared nest possible.
/// 2. The live range's boundaries both at top level: same.
/// 3. `last` and the live range's first op share a loop nest: interfering.
/// 4. `first` and the live range's last op share a loop nest: interfering.
///
/// Otherwise the boundaries either mix top-level and nested positions or sit
/// in unrelated nests, and this rule reports no interference.
pub fn ranges_in_same_loop_nest(
    func: &Function,
    first: OpId,
    last: OpId,
    range: &LiveRange,
) -> Result<bool> {
    let first_at_top = func.is_in_top_level_block(first)?;
    let last_at_top = func.is_in_top_level_block(last)?;
    if first_at_top && last_at_top {
        return Ok(false);
    }

    let range_first_at_top = func.is_in_top_level_block(range.first)?;
    let range_last_at_top = func.is_in_top_level_block(range.last)?;
    if range_first_at_top && range_last_at_top {
        return Ok(false);
    }

    if !last_at_top && !range_first_at_top && share_loop_nest(func, last, range.first)? {
        tracing::trace!(?last, range_first = ?range.first, "range boundaries share a loop nest");
        return Ok(true);
    }

    if !first_at_top && !range_last_at_top && share_loop_nest(func, first, range.last)? {
        tracing::trace!(?first, range_last = ?range.last, "range boundaries share a loop nest");
        return Ok(true);
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::live_range;
    use basalt_core::{BufferType, DataType, FunctionBuilder};

    fn f32x4() -> BufferType {
        BufferType::new(vec![4], DataType::F32)
    }

    #[test]
    fn test_outermost_loop_of_top_level_op() {
        let mut builder = FunctionBuilder::new("f");
        let c = builder.constant_i64(1);
        let func = builder.finish();

        assert_eq!(
            outermost_enclosing_loop(&func, c.op().unwrap()).unwrap(),
            None
        );
    }

    #[test]
    fn test_outermost_loop_skips_inner_nests() {
        // loop { cond { loop { op } } } -- the outermost loop wins.
        let mut builder = FunctionBuilder::new("f");
        let flag = builder.constant_i64(1);
        let outer_iv = builder.begin_loop(2).unwrap();
        builder.begin_cond(flag).unwrap();
        let _inner_iv = builder.begin_loop(2).unwrap();
        let inner = builder.compute(
            "add",
            vec![outer_iv],
            basalt_core::Type::Scalar(DataType::I64),
        );
        builder.end_loop().unwrap();
        builder.end_cond().unwrap();
        builder.end_loop().unwrap();
        let func = builder.finish();

        let inner = inner.op().unwrap();
        let outermost = outermost_enclosing_loop(&func, inner).unwrap().unwrap();
        assert!(func.op(outermost).unwrap().is_loop());
        assert!(func.is_in_top_level_block(outermost).unwrap());
    }

    #[test]
    fn test_share_loop_nest() {
        let mut builder = FunctionBuilder::new("f");
        let pool = builder.alloc_pool(32);
        let v1 = builder.make_view(pool, 0, f32x4()).unwrap();
        let v2 = builder.make_view(pool, 16, f32x4()).unwrap();
        let value = builder.constant_f32(1.0);

        let iv = builder.begin_loop(4).unwrap();
        builder.store(value, v1, &[iv]).unwrap();
        builder.store(value, v2, &[iv]).unwrap();
        builder.end_loop().unwrap();

        let iv2 = builder.begin_loop(4).unwrap();
        let x = builder.load(v1, &[iv2]).unwrap();
        let _ = x;
        builder.end_loop().unwrap();
        let func = builder.finish();

        let r1 = live_range(&func, v1.op().unwrap()).unwrap();
        let r2 = live_range(&func, v2.op().unwrap()).unwrap();

        // Both first uses live in the first loop; v1's last use is in the
        // second loop.
        assert!(share_loop_nest(&func, r1.first, r2.first).unwrap());
        assert!(!share_loop_nest(&func, r1.last, r2.last).unwrap());
    }

    #[test]
    fn test_ranges_in_same_loop_nest_rejects_shared_loop() {
        let mut builder = FunctionBuilder::new("f");
        let pool = builder.alloc_pool(32);
        let v1 = builder.make_view(pool, 0, f32x4()).unwrap();
        let v2 = builder.make_view(pool, 16, f32x4()).unwrap();
        let value = builder.constant_f32(1.0);

        let iv = builder.begin_loop(4).unwrap();
        builder.store(value, v1, &[iv]).unwrap();
        let x = builder.load(v1, &[iv]).unwrap();
        let _ = x;
        builder.store(value, v2, &[iv]).unwrap();
        let y = builder.load(v2, &[iv]).unwrap();
        let _ = y;
        builder.end_loop().unwrap();
        let func = builder.finish();

        let r1 = live_range(&func, v1.op().unwrap()).unwrap();
        let r2 = live_range(&func, v2.op().unwrap()).unwrap();

        assert!(ranges_in_same_loop_nest(&func, r2.first, r2.last, &r1).unwrap());
    }

    #[test]
    fn test_ranges_at_top_level_never_share_nest() {
        let mut builder = FunctionBuilder::new("f");
        let pool = builder.alloc_pool(32);
        let v1 = builder.make_view(pool, 0, f32x4()).unwrap();
        let v2 = builder.make_view(pool, 16, f32x4()).unwrap();
        let value = builder.constant_f32(1.0);
        builder.store(value, v1, &[]).unwrap();
        let x = builder.load(v1, &[]).unwrap();
        let _ = x;
        builder.store(value, v2, &[]).unwrap();
        let y = builder.load(v2, &[]).unwrap();
        let _ = y;
        let func = builder.finish();

        let r1 = live_range(&func, v1.op().unwrap()).unwrap();
        let r2 = live_range(&func, v2.op().unwrap()).unwrap();

        assert!(!ranges_in_same_loop_nest(&func, r2.first, r2.last, &r1).unwrap());
    }

    #[test]
    fn test_distinct_loops_do_not_share_nest() {
        let mut builder = FunctionBuilder::new("f");
        let pool = builder.alloc_pool(32);
        let v1 = builder.make_view(pool, 0, f32x4()).unwrap();
        let v2 = builder.make_view(pool, 16, f32x4()).unwrap();
        let value = builder.constant_f32(1.0);

        let iv = builder.begin_loop(4).unwrap();
        builder.store(value, v1, &[iv]).unwrap();
        let x = builder.load(v1, &[iv]).unwrap();
        builder.end_loop().unwrap();
        let _ = x;

        let iv2 = builder.begin_loop(4).unwrap();
        builder.store(value, v2, &[iv2]).unwrap();
        let y = builder.load(v2, &[iv2]).unwrap();
        builder.end_loop().unwrap();
        let _ = y;
        let func = builder.finish();

        let r1 = live_range(&func, v1.op().unwrap()).unwrap();
        let r2 = live_range(&func, v2.op().unwrap()).unwrap();

        assert!(!ranges_in_same_loop_nest(&func, r2.first, r2.last, &r1).unwrap());
    }
}
