//! Core intermediate representation and rewrite infrastructure for basalt.
//!
//! This crate provides the foundational abstractions the optimization passes
//! are built on:
//! - A region-nested operation graph for one function (`Function`, `Op`, `Block`)
//! - A builder for constructing functions programmatically (`FunctionBuilder`)
//! - A greedy pattern-rewrite driver (`RewritePattern`, `apply_patterns_greedily`)
//! - A pass trait and manager (`Pass`, `PassManager`)
//!
//! The IR models bufferized numeric-compute programs after buffer bundling:
//! scratch memory lives in byte-addressable *pools* (`OpKind::AllocPool`),
//! accessed through typed *views* at constant byte offsets
//! (`OpKind::MakeView`), with loads and stores as the only memory accesses.

pub mod builder;
pub mod ir;
pub mod pass;
pub mod rewrite;
pub mod types;

pub use builder::FunctionBuilder;
pub use ir::{Block, BlockId, ConstValue, Function, Op, OpId, OpKind, Region, RegionId, ValueId};
pub use pass::{Pass, PassManager};
pub use rewrite::{RewritePattern, apply_patterns_greedily};
pub use types::{BufferType, DataType, Shape, Type};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for IR operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid graph structure: {0}")]
    InvalidGraph(String),

    #[error("Invalid type: {0}")]
    InvalidType(String),
}
