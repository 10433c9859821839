//! Optimization passes.

pub mod compact_pools;
pub mod share_slots;

pub use compact_pools::CompactPools;
pub use share_slots::ShareViewSlots;

use crate::error::{Error, Result};
use basalt_core::{Function, Pass, RewritePattern, apply_patterns_greedily};

/// Pass that optimizes memory pools.
///
/// Runs the slot-sharing and pool-compaction rules together to a fixed point:
/// each accepted merge frees a slot, and compaction then shrinks the pool to
/// the surviving slots' total footprint.
pub struct OptimizeMemoryPools;

impl Pass for OptimizeMemoryPools {
    type Error = Error;

    fn name(&self) -> &str {
        "optimize-memory-pools"
    }

    fn run(&self, func: &mut Function) -> Result<bool> {
        let share = ShareViewSlots;
        let compact = CompactPools;
        let patterns: [&dyn RewritePattern<Error = Error>; 2] = [&share, &compact];
        apply_patterns_greedily(func, &patterns)
    }
}
