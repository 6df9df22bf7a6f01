//! Max/sum reductions over consecutive contiguous runs.
//!
//! The run kernels never look at shapes or strides: an axis reduction first
//! permutes the reduced axis to the end and compacts, so every output element
//! is produced from one contiguous run of `reduce_size` inputs.

use tracing::instrument;

use crate::buffer::AlignedBuffer;
use crate::ewise::max_first;
use crate::transfer::compact;
use crate::view::StridedView;
use crate::{ensure_same_len, Result, Scalar, StridedError};

/// Reduction applied by [`reduce_axis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Max,
    Sum,
}

impl ReduceOp {
    /// Run the matching run kernel ([`reduce_max`] or [`reduce_sum`]).
    pub fn apply(self, a: &[Scalar], out: &mut [Scalar], reduce_size: usize) -> Result<()> {
        match self {
            ReduceOp::Max => reduce_max(a, out, reduce_size),
            ReduceOp::Sum => reduce_sum(a, out, reduce_size),
        }
    }
}

fn check_runs(a_len: usize, out_len: usize, reduce_size: usize) -> Result<()> {
    if reduce_size == 0 {
        return Err(StridedError::ZeroReduceSize);
    }
    ensure_same_len(out_len * reduce_size, a_len)
}

/// `out[i] = max(a[i*reduce_size .. (i+1)*reduce_size])`.
///
/// The first element of a run wins ties and NaN comparisons, matching
/// [`ewise_maximum`](crate::ewise_maximum).
///
/// # Errors
/// - [`StridedError::ZeroReduceSize`] if `reduce_size == 0`.
/// - [`StridedError::LengthMismatch`] unless `a.len() == out.len() * reduce_size`.
pub fn reduce_max(a: &[Scalar], out: &mut [Scalar], reduce_size: usize) -> Result<()> {
    check_runs(a.len(), out.len(), reduce_size)?;
    for (o, run) in out.iter_mut().zip(a.chunks_exact(reduce_size)) {
        *o = run[1..].iter().fold(run[0], |acc, &x| max_first(acc, x));
    }
    Ok(())
}

/// `out[i] = sum(a[i*reduce_size .. (i+1)*reduce_size])`, summed left to right.
///
/// # Errors
/// - [`StridedError::ZeroReduceSize`] if `reduce_size == 0`.
/// - [`StridedError::LengthMismatch`] unless `a.len() == out.len() * reduce_size`.
pub fn reduce_sum(a: &[Scalar], out: &mut [Scalar], reduce_size: usize) -> Result<()> {
    check_runs(a.len(), out.len(), reduce_size)?;
    for (o, run) in out.iter_mut().zip(a.chunks_exact(reduce_size)) {
        let mut acc = 0.0;
        for &x in run {
            acc += x;
        }
        *o = acc;
    }
    Ok(())
}

/// Reduce `view` along `axis`.
///
/// The axis is moved last, the permuted view is compacted, and the runs are
/// reduced. The result is row-major with the view's shape except
/// `shape[axis] == 1`.
///
/// # Errors
/// - [`StridedError::InvalidAxis`] if `axis >= view.ndim()`.
/// - [`StridedError::ZeroReduceSize`] if the reduced axis is empty.
#[instrument(level = "debug", skip_all, fields(shape = ?view.shape(), axis = axis, op = ?op))]
pub fn reduce_axis(view: &StridedView<'_>, axis: usize, op: ReduceOp) -> Result<AlignedBuffer> {
    let rank = view.ndim();
    if axis >= rank {
        return Err(StridedError::InvalidAxis { axis, rank });
    }
    let reduce_size = view.shape()[axis];
    if reduce_size == 0 {
        return Err(StridedError::ZeroReduceSize);
    }

    let perm: Vec<usize> = (0..rank).filter(|&i| i != axis).chain([axis]).collect();
    let packed = compact(&view.permute(&perm)?)?;

    let mut out = AlignedBuffer::new(packed.len() / reduce_size)?;
    op.apply(&packed, &mut out, reduce_size)?;
    Ok(out)
}
