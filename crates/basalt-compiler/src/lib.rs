//! Memory-pool optimization for the basalt buffer IR.
//!
//! An earlier bundling stage packs the scratch buffers of a function into a
//! small number of contiguous byte pools, each accessed through typed views
//! at constant offsets. This crate shrinks those pools further:
//!
//! 1. **Slot sharing** (`ShareViewSlots`) merges same-size views whose uses
//!    are dataflow-disjoint and whose live ranges do not intersect onto one
//!    offset.
//! 2. **Compaction** (`CompactPools`) re-allocates each pool at its true
//!    footprint and renumbers the surviving slots contiguously.
//!
//! Both rules run to a fixed point under the greedy rewrite driver; together
//! they form the `OptimizeMemoryPools` pass. The supporting analyses (live
//! ranges, loop-nest classification, and the interference prover) live in
//! their own modules and are usable on their own.
//!
//! # Example
//!
//! ```
//! use basalt_compiler::OptimizeMemoryPools;
//! use basalt_core::{BufferType, DataType, FunctionBuilder, Pass};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = FunctionBuilder::new("main");
//! let pool = builder.alloc_pool(64);
//! let v1 = builder.make_view(pool, 0, BufferType::new(vec![4], DataType::F32))?;
//! let v2 = builder.make_view(pool, 16, BufferType::new(vec![4], DataType::F32))?;
//! let c = builder.constant_f32(1.0);
//! builder.store(c, v1, &[])?;
//! builder.store(c, v2, &[])?;
//! let mut func = builder.finish();
//!
//! // The two views never overlap, so they end up sharing one 16-byte slot.
//! OptimizeMemoryPools.run(&mut func)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod interference;
pub mod liveness;
pub mod loop_nest;
pub mod passes;
pub mod pools;

pub use error::{Error, Result};
pub use liveness::LiveRange;
pub use passes::{CompactPools, OptimizeMemoryPools, ShareViewSlots};
