//! Transfers between strided views and compact buffers.
//!
//! Each transfer walks the view's shape in row-major order with an
//! [`IndexWalker`](crate::IndexWalker) while stepping sequentially through the
//! compact side, so element `i` of the compact buffer always corresponds to the
//! `i`-th index tuple of the view.

use tracing::{debug, instrument};

use crate::buffer::AlignedBuffer;
use crate::index::compact_strides;
use crate::view::{StridedView, StridedViewMut};
use crate::{ensure_same_len, Result, Scalar};

/// Gather `view` into a freshly allocated compact buffer.
///
/// The result holds `product(view.shape())` elements in row-major order and
/// never aliases the view's storage.
#[instrument(level = "debug", skip_all, fields(shape = ?view.shape()))]
pub fn compact(view: &StridedView<'_>) -> Result<AlignedBuffer> {
    let mut out = AlignedBuffer::new(view.len())?;
    compact_into(view, &mut out)?;
    Ok(out)
}

/// Gather `view` into the caller-supplied compact buffer `out`.
///
/// # Errors
/// [`LengthMismatch`](crate::StridedError::LengthMismatch) unless
/// `out.len() == product(view.shape())`.
pub fn compact_into(view: &StridedView<'_>, out: &mut [Scalar]) -> Result<()> {
    ensure_same_len(view.len(), out.len())?;
    if out.is_empty() {
        return Ok(());
    }

    let data = view.data();
    let strides = view.strides();
    let offset = view.offset();

    if strides == compact_strides(view.shape()).as_slice() {
        debug!("contiguous source, copying run directly");
        out.copy_from_slice(&data[offset..offset + out.len()]);
        return Ok(());
    }

    let mut walker = view.layout().walker();
    for dst in out.iter_mut() {
        walker.next();
        *dst = data[walker.location(strides, offset)];
    }
    Ok(())
}

/// Scatter the compact buffer `src` into `target`, element by element in
/// row-major order of the target's shape.
///
/// # Errors
/// [`LengthMismatch`](crate::StridedError::LengthMismatch) unless
/// `src.len() == product(target.shape())`.
pub fn ewise_setitem(src: &[Scalar], target: &mut StridedViewMut<'_>) -> Result<()> {
    ensure_same_len(target.len(), src.len())?;
    if src.is_empty() {
        return Ok(());
    }

    let (data, layout) = target.parts_mut();
    let strides = layout.strides();
    let offset = layout.offset();

    if strides == compact_strides(layout.shape()).as_slice() {
        data[offset..offset + src.len()].copy_from_slice(src);
        return Ok(());
    }

    let mut walker = layout.walker();
    for &value in src {
        walker.next();
        data[walker.location(strides, offset)] = value;
    }
    Ok(())
}

/// Write `value` to every element of `target`.
///
/// `count` is the element count of the target (`product(target.shape())`),
/// passed explicitly by the caller.
///
/// # Errors
/// [`LengthMismatch`](crate::StridedError::LengthMismatch) if `count` disagrees
/// with the target's shape.
pub fn scalar_setitem(count: usize, value: Scalar, target: &mut StridedViewMut<'_>) -> Result<()> {
    ensure_same_len(target.len(), count)?;

    let (data, layout) = target.parts_mut();
    let strides = layout.strides();
    let offset = layout.offset();

    let mut walker = layout.walker();
    while walker.next().is_some() {
        data[walker.location(strides, offset)] = value;
    }
    Ok(())
}
