//! Strided views over flat scalar storage.
//!
//! A view is a `(buffer, shape, strides, offset)` tuple: the element at
//! multi-index `idx` lives at `offset + Σ strides[i] * idx[i]` in the buffer.
//! Views borrow their buffer and never own it, so a view cannot outlive the
//! storage it points into.
//!
//! - [`StridedLayout`]: Shape/strides/offset metadata on its own
//! - [`StridedView`]: Shared view (any number may alias one buffer)
//! - [`StridedViewMut`]: Exclusive view used as a write target

use crate::index::{checked_len, compact_strides, is_compact, IndexWalker};
use crate::{Result, Scalar, StridedError};

// ============================================================================
// Validation helpers
// ============================================================================

/// Validate that all accessed locations stay within `[0, len)`.
fn validate_bounds(len: usize, shape: &[usize], strides: &[isize], offset: usize) -> Result<()> {
    // Empty array - no access needed
    if shape.iter().any(|&d| d == 0) {
        return Ok(());
    }
    let offset = isize::try_from(offset).map_err(|_| StridedError::OffsetOverflow)?;
    let mut min_offset = offset;
    let mut max_offset = offset;
    for (&dim, &stride) in shape.iter().zip(strides.iter()) {
        if dim > 1 {
            let extent = isize::try_from(dim - 1).map_err(|_| StridedError::OffsetOverflow)?;
            let end = stride
                .checked_mul(extent)
                .ok_or(StridedError::OffsetOverflow)?;
            if end >= 0 {
                max_offset = max_offset
                    .checked_add(end)
                    .ok_or(StridedError::OffsetOverflow)?;
            } else {
                min_offset = min_offset
                    .checked_add(end)
                    .ok_or(StridedError::OffsetOverflow)?;
            }
        }
    }
    if min_offset < 0 || max_offset as usize >= len {
        return Err(StridedError::OffsetOverflow);
    }
    Ok(())
}

/// Reject shapes whose element count does not fit in `usize`.
fn validate_len(shape: &[usize]) -> Result<()> {
    checked_len(shape)
        .map(|_| ())
        .ok_or(StridedError::OffsetOverflow)
}

fn validate_permutation(perm: &[usize], rank: usize) -> Result<()> {
    if perm.len() != rank {
        return Err(StridedError::RankMismatch(perm.len(), rank));
    }
    let mut seen = vec![false; rank];
    for &p in perm {
        if p >= rank || seen[p] {
            return Err(StridedError::InvalidPermutation(perm.to_vec()));
        }
        seen[p] = true;
    }
    Ok(())
}

// ============================================================================
// StridedLayout
// ============================================================================

/// Shape, strides and offset of a logical array, independent of its storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StridedLayout {
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
}

impl StridedLayout {
    /// Create a layout; `shape` and `strides` must have the same rank and the
    /// element count must fit in `usize`.
    pub fn new(shape: &[usize], strides: &[isize], offset: usize) -> Result<Self> {
        if shape.len() != strides.len() {
            return Err(StridedError::RankMismatch(shape.len(), strides.len()));
        }
        validate_len(shape)?;
        Ok(Self {
            shape: shape.to_vec(),
            strides: strides.to_vec(),
            offset,
        })
    }

    /// Row-major layout with zero offset.
    pub fn compact(shape: &[usize]) -> Result<Self> {
        validate_len(shape)?;
        Ok(Self {
            shape: shape.to_vec(),
            strides: compact_strides(shape),
            offset: 0,
        })
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of logical elements (product of the shape).
    #[inline]
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_compact(&self) -> bool {
        is_compact(&self.shape, &self.strides, self.offset)
    }

    /// Walker over this layout's shape.
    pub fn walker(&self) -> IndexWalker {
        IndexWalker::new(&self.shape)
    }

    /// Reorder axes: axis `i` of the result is axis `perm[i]` of `self`.
    pub fn permute(&self, perm: &[usize]) -> Result<Self> {
        validate_permutation(perm, self.ndim())?;
        Ok(Self {
            shape: perm.iter().map(|&p| self.shape[p]).collect(),
            strides: perm.iter().map(|&p| self.strides[p]).collect(),
            offset: self.offset,
        })
    }

    /// Buffer location of `indices`, panicking if any index is out of range.
    fn location(&self, indices: &[usize]) -> usize {
        assert_eq!(indices.len(), self.ndim(), "wrong number of indices");
        let mut loc = self.offset as isize;
        for (i, &index) in indices.iter().enumerate() {
            assert!(
                index < self.shape[i],
                "index {} out of bounds for dim {}",
                index,
                self.shape[i]
            );
            loc += index as isize * self.strides[i];
        }
        loc as usize
    }
}

// ============================================================================
// StridedView
// ============================================================================

/// Shared strided view over a scalar buffer.
#[derive(Debug, Clone)]
pub struct StridedView<'a> {
    data: &'a [Scalar],
    layout: StridedLayout,
}

impl<'a> StridedView<'a> {
    /// Create a view, checking that every index stays inside `data`.
    pub fn new(
        data: &'a [Scalar],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Self> {
        Self::from_layout(data, StridedLayout::new(shape, strides, offset)?)
    }

    pub fn from_layout(data: &'a [Scalar], layout: StridedLayout) -> Result<Self> {
        validate_bounds(data.len(), &layout.shape, &layout.strides, layout.offset)?;
        Ok(Self { data, layout })
    }

    /// Row-major view of `shape` starting at the beginning of `data`.
    pub fn compact(data: &'a [Scalar], shape: &[usize]) -> Result<Self> {
        Self::from_layout(data, StridedLayout::compact(shape)?)
    }

    #[inline]
    pub fn layout(&self) -> &StridedLayout {
        &self.layout
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.layout.offset()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    #[inline]
    pub fn is_compact(&self) -> bool {
        self.layout.is_compact()
    }

    /// The whole backing buffer, not just the elements the view reaches.
    #[inline]
    pub fn data(&self) -> &'a [Scalar] {
        self.data
    }

    /// Get an element.
    pub fn get(&self, indices: &[usize]) -> Scalar {
        self.data[self.layout.location(indices)]
    }

    /// Permute dimensions (zero-copy).
    pub fn permute(&self, perm: &[usize]) -> Result<StridedView<'a>> {
        Ok(StridedView {
            data: self.data,
            layout: self.layout.permute(perm)?,
        })
    }
}

// ============================================================================
// StridedViewMut
// ============================================================================

/// Exclusive strided view, the write target of the setitem transfers.
#[derive(Debug)]
pub struct StridedViewMut<'a> {
    data: &'a mut [Scalar],
    layout: StridedLayout,
}

impl<'a> StridedViewMut<'a> {
    /// Create a mutable view, checking that every index stays inside `data`.
    pub fn new(
        data: &'a mut [Scalar],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Self> {
        Self::from_layout(data, StridedLayout::new(shape, strides, offset)?)
    }

    pub fn from_layout(data: &'a mut [Scalar], layout: StridedLayout) -> Result<Self> {
        validate_bounds(data.len(), &layout.shape, &layout.strides, layout.offset)?;
        Ok(Self { data, layout })
    }

    /// Row-major view of `shape` starting at the beginning of `data`.
    pub fn compact(data: &'a mut [Scalar], shape: &[usize]) -> Result<Self> {
        Self::from_layout(data, StridedLayout::compact(shape)?)
    }

    #[inline]
    pub fn layout(&self) -> &StridedLayout {
        &self.layout
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.layout.offset()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layout.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    /// Get an element.
    pub fn get(&self, indices: &[usize]) -> Scalar {
        self.data[self.layout.location(indices)]
    }

    /// Set an element.
    pub fn set(&mut self, indices: &[usize], value: Scalar) {
        let loc = self.layout.location(indices);
        self.data[loc] = value;
    }

    /// Permute dimensions, consuming the mutable view.
    pub fn permute(self, perm: &[usize]) -> Result<StridedViewMut<'a>> {
        let layout = self.layout.permute(perm)?;
        Ok(StridedViewMut {
            data: self.data,
            layout,
        })
    }

    /// Reborrow as an immutable view.
    pub fn as_view(&self) -> StridedView<'_> {
        StridedView {
            data: &*self.data,
            layout: self.layout.clone(),
        }
    }

    /// Split into the backing storage and the layout addressing it.
    pub(crate) fn parts_mut(&mut self) -> (&mut [Scalar], &StridedLayout) {
        (&mut *self.data, &self.layout)
    }
}
