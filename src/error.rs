//! Shared error types for the training core.

use std::collections::TryReserveError;

/// Errors surfaced by the histogram engine.
///
/// The first two variants are resource failures (allocation or size
/// arithmetic), detected before any buffer is touched. Dimensionality
/// rejection is its own variant so callers can distinguish "try fewer
/// features" from "give me more memory". The totals-mismatch variant is only
/// produced by the debug verifier.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("buffer growth failed: {0}")]
    Resource(#[from] TryReserveError),

    #[error("size overflow computing {what}")]
    SizeOverflow { what: &'static str },

    #[error("split search supports 1 or 2 dimensions, got {dimensions}")]
    UnsupportedDimensions { dimensions: usize },

    #[error("summed-area bin {index} disagrees with the brute-force total")]
    TotalsMismatch { index: usize },
}

impl CoreError {
    /// True for allocation and size-arithmetic failures.
    pub fn is_resource(&self) -> bool {
        matches!(self, CoreError::Resource(_) | CoreError::SizeOverflow { .. })
    }
}
