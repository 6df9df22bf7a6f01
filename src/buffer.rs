//! Fixed-alignment owned scalar storage.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use tracing::trace;

use crate::{Result, Scalar, StridedError, ALIGNMENT, TILE};

/// Owned block of scalars whose first element sits on an `align`-byte boundary.
///
/// Storage is zero-initialized on construction and released exactly once when
/// the buffer is dropped. Views borrow the buffer as a slice (`Deref<Target = [Scalar]>`)
/// and therefore cannot outlive it.
pub struct AlignedBuffer {
    ptr: NonNull<Scalar>,
    len: usize,
    align: usize,
}

// Safety: AlignedBuffer owns its data exclusively, like Vec<f32>.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// Allocate `len` zeroed scalars aligned to [`ALIGNMENT`].
    pub fn new(len: usize) -> Result<Self> {
        Self::with_alignment(len, ALIGNMENT)
    }

    /// Allocate `len` zeroed scalars aligned to `align` bytes.
    ///
    /// # Errors
    /// - [`StridedError::InvalidAlignment`] if `align` is not a power of two or is
    ///   smaller than one tile row (`TILE * size_of::<Scalar>()`).
    /// - [`StridedError::AllocationFailed`] if the storage cannot be obtained.
    pub fn with_alignment(len: usize, align: usize) -> Result<Self> {
        if !align.is_power_of_two() || align < TILE * std::mem::size_of::<Scalar>() {
            return Err(StridedError::InvalidAlignment(align));
        }
        if len == 0 {
            // Dangling but aligned; never dereferenced or freed.
            let ptr = NonNull::new(align as *mut Scalar)
                .ok_or(StridedError::AllocationFailed { len, align })?;
            return Ok(Self { ptr, len, align });
        }

        let layout = Self::layout(len, align)?;
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr =
            NonNull::new(raw as *mut Scalar).ok_or(StridedError::AllocationFailed { len, align })?;
        trace!(len, align, "allocated aligned buffer");
        Ok(Self { ptr, len, align })
    }

    /// Allocate a buffer holding a copy of `src`.
    pub fn from_slice(src: &[Scalar]) -> Result<Self> {
        let mut buf = Self::new(src.len())?;
        buf.as_mut_slice().copy_from_slice(src);
        Ok(buf)
    }

    /// Allocate a new buffer with the same contents and alignment.
    pub fn try_clone(&self) -> Result<Self> {
        let mut buf = Self::with_alignment(self.len, self.align)?;
        buf.as_mut_slice().copy_from_slice(self.as_slice());
        Ok(buf)
    }

    fn layout(len: usize, align: usize) -> Result<Layout> {
        len.checked_mul(std::mem::size_of::<Scalar>())
            .and_then(|size| Layout::from_size_align(size, align).ok())
            .ok_or(StridedError::AllocationFailed { len, align })
    }

    /// Number of scalars.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Alignment boundary of the storage, in bytes.
    #[inline]
    pub fn alignment(&self) -> usize {
        self.align
    }

    #[inline]
    pub fn as_slice(&self) -> &[Scalar] {
        // SAFETY: ptr is valid for len initialized scalars (or dangling with len 0).
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Scalar] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Raw byte view of the storage, in native endianness.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_slice())
    }

    /// Address of the first scalar as an integer.
    #[inline]
    pub fn as_ptr_usize(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: Scalar) {
        self.as_mut_slice().fill(value);
    }

    /// Overwrite the whole buffer with `src`.
    pub fn copy_from_slice(&mut self, src: &[Scalar]) -> Result<()> {
        crate::ensure_same_len(self.len, src.len())?;
        self.as_mut_slice().copy_from_slice(src);
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<Scalar> {
        self.as_slice().to_vec()
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        if let Ok(layout) = Self::layout(self.len, self.align) {
            // SAFETY: the same layout was used to allocate ptr.
            unsafe { dealloc(self.ptr.as_ptr() as *mut u8, layout) };
            trace!(len = self.len, align = self.align, "released aligned buffer");
        }
    }
}

impl Deref for AlignedBuffer {
    type Target = [Scalar];

    #[inline]
    fn deref(&self) -> &[Scalar] {
        self.as_slice()
    }
}

impl DerefMut for AlignedBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut [Scalar] {
        self.as_mut_slice()
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len)
            .field("align", &self.align)
            .field("data", &self.as_slice())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed_and_aligned() {
        let buf = AlignedBuffer::new(37).unwrap();
        assert_eq!(buf.len(), 37);
        assert!(buf.iter().all(|&x| x == 0.0));
        assert_eq!(buf.as_ptr_usize() % ALIGNMENT, 0);
    }

    #[test]
    fn test_custom_alignment() {
        let buf = AlignedBuffer::with_alignment(10, 64).unwrap();
        assert_eq!(buf.alignment(), 64);
        assert_eq!(buf.as_ptr_usize() % 64, 0);
    }

    #[test]
    fn test_invalid_alignment() {
        assert_eq!(
            AlignedBuffer::with_alignment(4, 48).unwrap_err(),
            StridedError::InvalidAlignment(48)
        );
        // Smaller than one tile row of f32.
        assert_eq!(
            AlignedBuffer::with_alignment(4, 16).unwrap_err(),
            StridedError::InvalidAlignment(16)
        );
    }

    #[test]
    fn test_empty_buffer() {
        let buf = AlignedBuffer::new(0).unwrap();
        assert!(buf.is_empty());
        assert_eq!(buf.as_slice(), &[] as &[f32]);
        assert_eq!(buf.as_ptr_usize() % ALIGNMENT, 0);
    }

    #[test]
    fn test_allocation_failure_propagates() {
        let err = AlignedBuffer::new(usize::MAX / 2).unwrap_err();
        assert!(matches!(err, StridedError::AllocationFailed { .. }));
    }

    #[test]
    fn test_fill_and_copy() {
        let mut buf = AlignedBuffer::new(4).unwrap();
        buf.fill(2.5);
        assert_eq!(buf.to_vec(), vec![2.5; 4]);

        buf.copy_from_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(buf.as_slice(), &[1.0, 2.0, 3.0, 4.0]);

        let err = buf.copy_from_slice(&[1.0]).unwrap_err();
        assert_eq!(
            err,
            StridedError::LengthMismatch {
                expected: 4,
                actual: 1
            }
        );
    }

    #[test]
    fn test_as_bytes_preserves_layout() {
        let buf = AlignedBuffer::from_slice(&[1.0, -2.0]).unwrap();
        let bytes = buf.as_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_ne_bytes());
        assert_eq!(&bytes[4..], &(-2.0f32).to_ne_bytes());
    }

    #[test]
    fn test_try_clone_is_independent() {
        let a = AlignedBuffer::from_slice(&[1.0, 2.0, 3.0]).unwrap();
        let mut b = a.try_clone().unwrap();
        b[0] = 9.0;
        assert_eq!(a[0], 1.0);
        assert_eq!(b.as_slice(), &[9.0, 2.0, 3.0]);
        assert_ne!(a.as_ptr_usize(), b.as_ptr_usize());
    }
}
