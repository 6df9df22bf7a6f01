//! Dense matrix multiply: a reference triple loop and a tile-blocked variant.
//!
//! The blocked path works on *tiled* operands. A `rows x cols` matrix in tiled
//! layout is a compact 4D array of shape `(rows/T, cols/T, T, T)`: row-major
//! over blocks, and row-major within each `T x T` block. [`to_tiled`] and
//! [`from_tiled`] convert between the two layouts through the strided view
//! layer.
//!
//! Both paths sum every output cell over `k` in ascending order, so the tiled
//! result reproduces the naive one whenever the compiler does not reassociate
//! the accumulation.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::instrument;

use crate::buffer::AlignedBuffer;
use crate::transfer::{compact, ewise_setitem};
use crate::view::{StridedLayout, StridedView, StridedViewMut};
use crate::{ensure_same_len, Result, Scalar, StridedError, ALIGNMENT};

// ============================================================================
// Naive path
// ============================================================================

/// Check that a `rows x cols` matrix has `actual` elements.
///
/// A size that overflows `usize` saturates and therefore never matches.
fn ensure_matrix_len(rows: usize, cols: usize, actual: usize) -> Result<()> {
    ensure_same_len(rows.saturating_mul(cols), actual)
}

/// `out = a * b` for row-major `a: m x n`, `b: n x p`, `out: m x p`.
///
/// Each output cell is zeroed and then accumulated over `k = 0..n` in order.
/// This is the correctness oracle for [`matmul_tiled`].
#[instrument(level = "debug", skip_all, fields(m = m, n = n, p = p))]
pub fn matmul(
    a: &[Scalar],
    b: &[Scalar],
    out: &mut [Scalar],
    m: usize,
    n: usize,
    p: usize,
) -> Result<()> {
    ensure_matrix_len(m, n, a.len())?;
    ensure_matrix_len(n, p, b.len())?;
    ensure_matrix_len(m, p, out.len())?;
    if out.is_empty() {
        return Ok(());
    }

    for i in 0..m {
        for j in 0..p {
            let mut acc = 0.0;
            for k in 0..n {
                acc += a[i * n + k] * b[k * p + j];
            }
            out[i * p + j] = acc;
        }
    }
    Ok(())
}

// ============================================================================
// Micro-kernel
// ============================================================================

/// Smallest power-of-two boundary covering one tile row.
#[inline]
fn tile_row_align<const T: usize>() -> usize {
    (T * std::mem::size_of::<Scalar>()).next_power_of_two()
}

#[inline]
fn is_tile_aligned<const T: usize>(tile: &[Scalar]) -> bool {
    tile.as_ptr() as usize % tile_row_align::<T>() == 0
}

/// Multiply two `T x T` row-major tiles and **add** the product into `out`.
///
/// `out` is never cleared; callers zero it before the first reduction block.
/// Tiles are expected to start on a `T`-scalar boundary (checked in debug
/// builds). `out` cannot alias `a` or `b` since it is borrowed mutably.
///
/// # Panics
/// Panics if any tile holds fewer than `T * T` scalars.
#[inline]
pub fn aligned_dot<const T: usize>(a: &[Scalar], b: &[Scalar], out: &mut [Scalar]) {
    debug_assert!(is_tile_aligned::<T>(a), "tile a is not aligned");
    debug_assert!(is_tile_aligned::<T>(b), "tile b is not aligned");
    debug_assert!(is_tile_aligned::<T>(out), "tile out is not aligned");

    let a = &a[..T * T];
    let b = &b[..T * T];
    let out = &mut out[..T * T];

    // i-k-j order keeps the inner loop contiguous in b and out. Each out cell
    // still accumulates over k in ascending order.
    for i in 0..T {
        let out_row = &mut out[i * T..(i + 1) * T];
        for k in 0..T {
            let a_ik = a[i * T + k];
            let b_row = &b[k * T..(k + 1) * T];
            for (o, &b_kj) in out_row.iter_mut().zip(b_row) {
                *o += a_ik * b_kj;
            }
        }
    }
}

// ============================================================================
// Tiled path
// ============================================================================

/// Per-call scratch: aligned copies of the current `a`/`b` blocks and the
/// running accumulator of the current output block.
struct TileScratch {
    a: AlignedBuffer,
    b: AlignedBuffer,
    acc: AlignedBuffer,
}

impl TileScratch {
    fn new<const T: usize>() -> Result<Self> {
        let align = tile_row_align::<T>().max(ALIGNMENT);
        Ok(Self {
            a: AlignedBuffer::with_alignment(T * T, align)?,
            b: AlignedBuffer::with_alignment(T * T, align)?,
            acc: AlignedBuffer::with_alignment(T * T, align)?,
        })
    }
}

fn ensure_tile_multiple<const T: usize>(dim: usize) -> Result<()> {
    if T == 0 || dim % T != 0 {
        return Err(StridedError::TileMismatch { dim, tile: T });
    }
    Ok(())
}

/// Compute one row of output blocks: `out_row[j] = Σ_k a[i, k] * b[k, j]`.
fn multiply_block_row<const T: usize>(
    scratch: &mut TileScratch,
    a: &[Scalar],
    b: &[Scalar],
    out_row: &mut [Scalar],
    i: usize,
    n_blocks: usize,
    p_blocks: usize,
) {
    let tile = T * T;
    for (j, out_block) in out_row.chunks_exact_mut(tile).enumerate() {
        scratch.acc.fill(0.0);
        for k in 0..n_blocks {
            let a_off = (i * n_blocks + k) * tile;
            let b_off = (k * p_blocks + j) * tile;
            scratch.a.as_mut_slice().copy_from_slice(&a[a_off..a_off + tile]);
            scratch.b.as_mut_slice().copy_from_slice(&b[b_off..b_off + tile]);
            aligned_dot::<T>(&scratch.a, &scratch.b, &mut scratch.acc);
        }
        out_block.copy_from_slice(&scratch.acc);
    }
}

/// `out = a * b` over tiled operands with tile size `T`.
///
/// `a` is `m x n`, `b` is `n x p` and `out` is `m x p`, all in tiled layout
/// (see the module docs). For every output block the kernel zeroes an aligned
/// `T x T` accumulator, copies each `a`/`b` block pair into aligned scratch
/// tiles and accumulates their product with [`aligned_dot`], then stores the
/// accumulator into `out`.
///
/// With the `parallel` feature, rows of output blocks are computed
/// concurrently; each task writes a disjoint range of `out`.
///
/// # Errors
/// - [`StridedError::TileMismatch`] if `m`, `n` or `p` is not a multiple of `T`.
/// - [`StridedError::LengthMismatch`] if a buffer length disagrees with its shape.
/// - [`StridedError::AllocationFailed`] if scratch tiles cannot be allocated.
#[instrument(level = "debug", skip_all, fields(m = m, n = n, p = p, tile = T))]
pub fn matmul_tiled<const T: usize>(
    a: &[Scalar],
    b: &[Scalar],
    out: &mut [Scalar],
    m: usize,
    n: usize,
    p: usize,
) -> Result<()> {
    ensure_tile_multiple::<T>(m)?;
    ensure_tile_multiple::<T>(n)?;
    ensure_tile_multiple::<T>(p)?;
    ensure_matrix_len(m, n, a.len())?;
    ensure_matrix_len(n, p, b.len())?;
    ensure_matrix_len(m, p, out.len())?;

    if out.is_empty() {
        return Ok(());
    }

    let (n_blocks, p_blocks) = (n / T, p / T);
    let row_len = p_blocks * T * T;

    #[cfg(feature = "parallel")]
    {
        out.par_chunks_mut(row_len).enumerate().try_for_each_init(
            TileScratch::new::<T>,
            |scratch, (i, out_row)| {
                let scratch = scratch.as_mut().map_err(|e| e.clone())?;
                multiply_block_row::<T>(scratch, a, b, out_row, i, n_blocks, p_blocks);
                Ok(())
            },
        )
    }

    #[cfg(not(feature = "parallel"))]
    {
        let mut scratch = TileScratch::new::<T>()?;
        for (i, out_row) in out.chunks_exact_mut(row_len).enumerate() {
            multiply_block_row::<T>(&mut scratch, a, b, out_row, i, n_blocks, p_blocks);
        }
        Ok(())
    }
}

// ============================================================================
// Layout conversion
// ============================================================================

/// Strided layout that reads a row-major `rows x cols` matrix as tiled blocks.
///
/// The layout has shape `(rows/tile, cols/tile, tile, tile)` and strides
/// `(cols*tile, tile, cols, 1)`, so compacting it yields the tiled layout.
pub fn tiled_layout(rows: usize, cols: usize, tile: usize) -> Result<StridedLayout> {
    for dim in [rows, cols] {
        if tile == 0 || dim % tile != 0 {
            return Err(StridedError::TileMismatch { dim, tile });
        }
    }
    let t = isize::try_from(tile).map_err(|_| StridedError::OffsetOverflow)?;
    let row = isize::try_from(cols).map_err(|_| StridedError::OffsetOverflow)?;
    let block_row = row.checked_mul(t).ok_or(StridedError::OffsetOverflow)?;
    StridedLayout::new(
        &[rows / tile, cols / tile, tile, tile],
        &[block_row, t, row, 1],
        0,
    )
}

/// Copy a row-major `rows x cols` matrix into a new buffer in tiled layout.
pub fn to_tiled<const T: usize>(
    matrix: &[Scalar],
    rows: usize,
    cols: usize,
) -> Result<AlignedBuffer> {
    ensure_matrix_len(rows, cols, matrix.len())?;
    let view = StridedView::from_layout(matrix, tiled_layout(rows, cols, T)?)?;
    compact(&view)
}

/// Write a tiled `rows x cols` matrix back into row-major `out`.
pub fn from_tiled<const T: usize>(
    tiled: &[Scalar],
    out: &mut [Scalar],
    rows: usize,
    cols: usize,
) -> Result<()> {
    ensure_matrix_len(rows, cols, out.len())?;
    let mut target = StridedViewMut::from_layout(out, tiled_layout(rows, cols, T)?)?;
    ewise_setitem(tiled, &mut target)
}
