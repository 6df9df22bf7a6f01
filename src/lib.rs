//! Dense `f32` compute kernels over aligned buffers and strided views.
//!
//! This crate is the CPU backend of an N-dimensional array library. Arrays are
//! described by a flat [`AlignedBuffer`] plus a `(shape, strides, offset)` layout;
//! the kernels here move data between arbitrary strided views and densely packed
//! ("compact") buffers and run arithmetic on the compact side.
//!
//! # Core Types
//!
//! - [`AlignedBuffer`]: Owned, fixed-alignment scalar storage, released on drop
//! - [`StridedLayout`]: Shape/strides/offset metadata for a logical array
//! - [`StridedView`] / [`StridedViewMut`]: Borrowed strided views over a buffer
//! - [`IndexWalker`]: Row-major multi-index iteration over a shape
//!
//! # Operations
//!
//! ## View transfer
//!
//! - [`compact`], [`compact_into`]: Gather a strided view into a compact buffer
//! - [`ewise_setitem`]: Scatter a compact buffer into a strided view
//! - [`scalar_setitem`]: Write one scalar to every element of a strided view
//!
//! ## Elementwise
//!
//! - [`ewise_add`], [`ewise_mul`], [`ewise_div`], [`ewise_maximum`], [`ewise_eq`], [`ewise_ge`]
//! - [`scalar_add`], [`scalar_mul`], [`scalar_div`], [`scalar_power`], [`scalar_maximum`],
//!   [`scalar_eq`], [`scalar_ge`]
//! - [`ewise_log`], [`ewise_exp`], [`ewise_tanh`]
//!
//! ## Matrix multiply
//!
//! - [`matmul`]: Reference triple-loop product of row-major matrices
//! - [`matmul_tiled`]: Block product over `T x T` tiled layouts, built on [`aligned_dot`]
//! - [`to_tiled`], [`from_tiled`]: Convert between row-major and tiled layouts
//!
//! ## Reduce
//!
//! - [`reduce_max`], [`reduce_sum`]: Reduce consecutive contiguous runs
//! - [`reduce_axis`]: Reduce one axis of a strided view (keepdims)
//!
//! # Example
//!
//! ```rust
//! use strided_cpu::{compact, AlignedBuffer, StridedView};
//!
//! // A 2x3 row-major matrix, viewed transposed.
//! let buf = AlignedBuffer::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
//! let view = StridedView::new(&buf, &[3, 2], &[1, 3], 0).unwrap();
//!
//! let out = compact(&view).unwrap();
//! assert_eq!(out.as_slice(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
//! ```

mod buffer;
mod ewise;
mod index;
mod matmul;
mod reduce;
mod transfer;
mod view;

// ============================================================================
// Storage and indexing
// ============================================================================
pub use buffer::AlignedBuffer;
pub use index::{compact_strides, is_compact, IndexWalker};
pub use view::{StridedLayout, StridedView, StridedViewMut};

// ============================================================================
// View transfer
// ============================================================================
pub use transfer::{compact, compact_into, ewise_setitem, scalar_setitem};

// ============================================================================
// Elementwise operations
// ============================================================================
pub use ewise::{
    ewise_add, ewise_div, ewise_eq, ewise_exp, ewise_ge, ewise_log, ewise_maximum, ewise_mul,
    ewise_tanh, scalar_add, scalar_div, scalar_eq, scalar_ge, scalar_maximum, scalar_mul,
    scalar_power,
};

// ============================================================================
// Matrix multiply
// ============================================================================
pub use matmul::{aligned_dot, from_tiled, matmul, matmul_tiled, tiled_layout, to_tiled};

// ============================================================================
// Reduce operations
// ============================================================================
pub use reduce::{reduce_axis, reduce_max, reduce_sum, ReduceOp};

// ============================================================================
// Constants
// ============================================================================

/// Element type stored in every buffer.
pub type Scalar = f32;

/// Default alignment boundary of buffer storage, in bytes.
///
/// Must be at least `TILE * size_of::<Scalar>()` so that every tile of a tiled
/// operand starts on an aligned address.
pub const ALIGNMENT: usize = 256;

/// Default side length of the square tiles used by [`matmul_tiled`].
pub const TILE: usize = 8;

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur during buffer and kernel operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StridedError {
    /// Aligned storage could not be obtained.
    #[error("failed to allocate {len} scalars aligned to {align} bytes")]
    AllocationFailed { len: usize, align: usize },

    /// Alignment is not a power of two or is smaller than one tile row.
    #[error("invalid alignment {0}")]
    InvalidAlignment(usize),

    /// Shape and strides have different ranks.
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),

    /// Element counts of two operands disagree.
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A view reaches outside its backing buffer.
    #[error("offset overflow while computing buffer location")]
    OffsetOverflow,

    /// Reduction over runs of length zero.
    #[error("reduce size must be at least 1")]
    ZeroReduceSize,

    /// A matrix dimension is not a multiple of the tile size.
    #[error("dimension {dim} is not a multiple of tile size {tile}")]
    TileMismatch { dim: usize, tile: usize },

    /// Invalid axis index for the given array rank.
    #[error("invalid axis {axis} for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },

    /// Axis list is not a permutation of `0..rank`.
    #[error("invalid permutation {0:?}")]
    InvalidPermutation(Vec<usize>),
}

/// Result type for buffer and kernel operations.
pub type Result<T> = std::result::Result<T, StridedError>;

#[inline]
pub(crate) fn ensure_same_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(StridedError::LengthMismatch { expected, actual });
    }
    Ok(())
}
