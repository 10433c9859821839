//! Error types for the optimization passes.

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pool optimization.
///
/// `PoolOverflow` signals an internal-consistency fault: an earlier analysis
/// stage produced views whose combined footprint exceeds their pool. The pass
/// must abort rather than risk emitting an undersized allocation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Ir(#[from] basalt_core::Error),

    #[error("pool overflow: views occupy {used} bytes but the pool holds {capacity}")]
    PoolOverflow { used: i64, capacity: i64 },
}
