//! Row-major multi-index iteration and compact-stride helpers.

use smallvec::SmallVec;

/// Stack-allocated Vec for shapes and indices; 8 axes cover every practical rank.
type SVec<T> = SmallVec<[T; 8]>;

/// Iterator over multi-dimensional index tuples within a shape.
///
/// Iterates in row-major order (last index varies fastest). Each call to
/// `next` advances the tuple held in [`current`](Self::current) in place, so
/// callers read the index after a successful step:
///
/// ```rust
/// use strided_cpu::IndexWalker;
///
/// let mut walker = IndexWalker::new(&[2, 2]);
/// let mut seen = vec![];
/// while walker.next().is_some() {
///     seen.push(walker.current().to_vec());
/// }
/// assert_eq!(seen, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
/// ```
///
/// A rank-0 shape yields exactly one (empty) tuple. A shape with any zero-sized
/// axis yields nothing.
#[derive(Debug, Clone)]
pub struct IndexWalker {
    shape: SVec<usize>,
    current: SVec<usize>,
    total: usize,
    count: usize,
}

impl IndexWalker {
    /// Walker over `shape`. An element count beyond `usize::MAX` saturates.
    pub fn new(shape: &[usize]) -> Self {
        let total = checked_len(shape).unwrap_or(usize::MAX);
        Self {
            shape: SmallVec::from_slice(shape),
            current: smallvec::smallvec![0; shape.len()],
            total,
            count: 0,
        }
    }

    /// The index tuple produced by the most recent step.
    #[inline]
    pub fn current(&self) -> &[usize] {
        &self.current
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of tuples in a full pass.
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Element displacement of the current index under `strides`.
    #[inline]
    pub fn offset(&self, strides: &[isize]) -> isize {
        self.current
            .iter()
            .zip(strides.iter())
            .map(|(&i, &s)| i as isize * s)
            .sum()
    }

    /// Buffer location `offset + Σ strides[i] * index[i]` of the current index.
    ///
    /// The caller guarantees the location is non-negative; views validate this
    /// for every index at construction.
    #[inline]
    pub fn location(&self, strides: &[isize], offset: usize) -> usize {
        (offset as isize + self.offset(strides)) as usize
    }

    /// Reset the iterator to the beginning.
    pub fn reset(&mut self) {
        self.current.fill(0);
        self.count = 0;
    }
}

impl Iterator for IndexWalker {
    type Item = ();

    fn next(&mut self) -> Option<()> {
        if self.count >= self.total {
            return None;
        }
        if self.count > 0 {
            // Increment: last index varies fastest (row-major)
            for i in (0..self.shape.len()).rev() {
                self.current[i] += 1;
                if self.current[i] < self.shape[i] {
                    break;
                }
                self.current[i] = 0;
            }
        }
        self.count += 1;
        Some(())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.count;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for IndexWalker {}

/// Number of elements in `shape`, or `None` if it does not fit in `usize`.
///
/// A zero-sized axis makes the count zero regardless of the other axes.
pub(crate) fn checked_len(shape: &[usize]) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Compute row-major strides (last index varies fastest).
///
/// Strides that do not fit in `isize` saturate; such shapes never pass view
/// validation unless they are empty.
pub fn compact_strides(shape: &[usize]) -> Vec<isize> {
    let rank = shape.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in (0..rank - 1).rev() {
        let dim = isize::try_from(shape[i + 1]).unwrap_or(isize::MAX);
        strides[i] = strides[i + 1].saturating_mul(dim);
    }
    strides
}

/// Whether `(shape, strides, offset)` describes a compact array: canonical
/// row-major strides and zero offset.
pub fn is_compact(shape: &[usize], strides: &[isize], offset: usize) -> bool {
    offset == 0 && strides == compact_strides(shape).as_slice()
}
