//! Elementwise and scalar kernels over compact buffers.
//!
//! Every kernel writes `out[i] = f(a[i], b[i])` (or `f(a[i], val)`, or `f(a[i])`)
//! for all `i`. Inputs and output must have equal length. Floating-point
//! exceptional values (division by zero, `log` of non-positive numbers,
//! overflow) follow IEEE-754 and are never intercepted.

use crate::{ensure_same_len, Result, Scalar};

/// `max` that keeps the first operand unless it compares strictly less than the
/// second. Ties and NaN comparisons return `x`.
#[inline(always)]
pub(crate) fn max_first(x: Scalar, y: Scalar) -> Scalar {
    if x < y {
        y
    } else {
        x
    }
}

/// Boolean encoded as `1.0` / `0.0`.
#[inline(always)]
fn flag(cond: bool) -> Scalar {
    if cond {
        1.0
    } else {
        0.0
    }
}

macro_rules! ewise_binary {
    ($(#[$doc:meta])* $name:ident, |$x:ident, $y:ident| $body:expr) => {
        $(#[$doc])*
        pub fn $name(a: &[Scalar], b: &[Scalar], out: &mut [Scalar]) -> Result<()> {
            ensure_same_len(a.len(), b.len())?;
            ensure_same_len(a.len(), out.len())?;
            for ((o, &$x), &$y) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
                *o = $body;
            }
            Ok(())
        }
    };
}

macro_rules! ewise_scalar {
    ($(#[$doc:meta])* $name:ident, |$x:ident, $y:ident| $body:expr) => {
        $(#[$doc])*
        pub fn $name(a: &[Scalar], val: Scalar, out: &mut [Scalar]) -> Result<()> {
            ensure_same_len(a.len(), out.len())?;
            let $y = val;
            for (o, &$x) in out.iter_mut().zip(a.iter()) {
                *o = $body;
            }
            Ok(())
        }
    };
}

macro_rules! ewise_unary {
    ($(#[$doc:meta])* $name:ident, |$x:ident| $body:expr) => {
        $(#[$doc])*
        pub fn $name(a: &[Scalar], out: &mut [Scalar]) -> Result<()> {
            ensure_same_len(a.len(), out.len())?;
            for (o, &$x) in out.iter_mut().zip(a.iter()) {
                *o = $body;
            }
            Ok(())
        }
    };
}

// ============================================================================
// Arithmetic
// ============================================================================

ewise_binary!(
    /// `out = a + b`
    ewise_add, |x, y| x + y
);
ewise_scalar!(
    /// `out = a + val`
    scalar_add, |x, val| x + val
);
ewise_binary!(
    /// `out = a * b`
    ewise_mul, |x, y| x * y
);
ewise_scalar!(
    /// `out = a * val`
    scalar_mul, |x, val| x * val
);
ewise_binary!(
    /// `out = a / b`
    ewise_div, |x, y| x / y
);
ewise_scalar!(
    /// `out = a / val`
    scalar_div, |x, val| x / val
);
ewise_scalar!(
    /// `out = a ^ val`
    scalar_power, |x, val| x.powf(val)
);

// ============================================================================
// Maximum and comparisons
// ============================================================================

ewise_binary!(
    /// `out = max(a, b)`; on ties or NaN the element of `a` is kept.
    ewise_maximum, |x, y| max_first(x, y)
);
ewise_scalar!(
    /// `out = max(a, val)`; on ties or NaN the element of `a` is kept.
    scalar_maximum, |x, val| max_first(x, val)
);
ewise_binary!(
    /// `out = (a == b)` as `1.0` / `0.0`.
    ewise_eq, |x, y| flag(x == y)
);
ewise_scalar!(
    /// `out = (a == val)` as `1.0` / `0.0`.
    scalar_eq, |x, val| flag(x == val)
);
ewise_binary!(
    /// `out = (a >= b)` as `1.0` / `0.0`.
    ewise_ge, |x, y| flag(x >= y)
);
ewise_scalar!(
    /// `out = (a >= val)` as `1.0` / `0.0`.
    scalar_ge, |x, val| flag(x >= val)
);

// ============================================================================
// Transcendental
// ============================================================================

ewise_unary!(
    /// Natural logarithm.
    ewise_log, |x| x.ln()
);
ewise_unary!(
    /// Exponential.
    ewise_exp, |x| x.exp()
);
ewise_unary!(
    /// Hyperbolic tangent.
    ewise_tanh, |x| x.tanh()
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StridedError;

    const A: [f32; 3] = [1.0, 2.0, 3.0];
    const B: [f32; 3] = [4.0, 5.0, 6.0];

    #[test]
    fn test_ewise_arithmetic() {
        let mut out = [0.0f32; 3];
        ewise_add(&A, &B, &mut out).unwrap();
        assert_eq!(out, [5.0, 7.0, 9.0]);
        ewise_mul(&A, &B, &mut out).unwrap();
        assert_eq!(out, [4.0, 10.0, 18.0]);
        ewise_div(&B, &A, &mut out).unwrap();
        assert_eq!(out, [4.0, 2.5, 2.0]);
    }

    #[test]
    fn test_scalar_arithmetic() {
        let mut out = [0.0f32; 3];
        scalar_add(&A, 1.5, &mut out).unwrap();
        assert_eq!(out, [2.5, 3.5, 4.5]);
        scalar_mul(&A, 2.0, &mut out).unwrap();
        assert_eq!(out, [2.0, 4.0, 6.0]);
        scalar_div(&A, 2.0, &mut out).unwrap();
        assert_eq!(out, [0.5, 1.0, 1.5]);
        scalar_power(&A, 2.0, &mut out).unwrap();
        assert_eq!(out, [1.0, 4.0, 9.0]);
    }

    #[test]
    fn test_comparisons() {
        let mut out = [0.0f32; 3];
        scalar_ge(&A, 2.0, &mut out).unwrap();
        assert_eq!(out, [0.0, 1.0, 1.0]);
        scalar_eq(&A, 2.0, &mut out).unwrap();
        assert_eq!(out, [0.0, 1.0, 0.0]);
        ewise_eq(&A, &[1.0, 0.0, 3.0], &mut out).unwrap();
        assert_eq!(out, [1.0, 0.0, 1.0]);
        ewise_ge(&A, &[2.0, 2.0, 2.0], &mut out).unwrap();
        assert_eq!(out, [0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_maximum() {
        let mut out = [0.0f32; 3];
        ewise_maximum(&A, &[0.0, 5.0, 3.0], &mut out).unwrap();
        assert_eq!(out, [1.0, 5.0, 3.0]);
        scalar_maximum(&A, 2.0, &mut out).unwrap();
        assert_eq!(out, [2.0, 2.0, 3.0]);
    }

    #[test]
    fn test_maximum_nan_keeps_first_operand() {
        let mut out = [0.0f32; 2];
        ewise_maximum(&[f32::NAN, 1.0], &[1.0, f32::NAN], &mut out).unwrap();
        assert!(out[0].is_nan());
        assert_eq!(out[1], 1.0);
    }

    #[test]
    fn test_transcendental() {
        let mut out = [0.0f32; 3];
        ewise_exp(&[0.0, 1.0, -1.0], &mut out).unwrap();
        assert_eq!(out[0], 1.0);
        assert!((out[1] - std::f32::consts::E).abs() < 1e-6);
        ewise_log(&[1.0, std::f32::consts::E, 1.0], &mut out).unwrap();
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 1.0).abs() < 1e-6);
        ewise_tanh(&[0.0, 100.0, -100.0], &mut out).unwrap();
        assert_eq!(out, [0.0, 1.0, -1.0]);
    }

    #[test]
    fn test_ieee_exceptional_values() {
        let mut out = [0.0f32; 3];
        ewise_div(&[1.0, -1.0, 0.0], &[0.0, 0.0, 0.0], &mut out).unwrap();
        assert_eq!(out[0], f32::INFINITY);
        assert_eq!(out[1], f32::NEG_INFINITY);
        assert!(out[2].is_nan());

        ewise_log(&[0.0, -1.0, 1.0], &mut out).unwrap();
        assert_eq!(out[0], f32::NEG_INFINITY);
        assert!(out[1].is_nan());

        ewise_exp(&[1000.0, 0.0, 0.0], &mut out).unwrap();
        assert_eq!(out[0], f32::INFINITY);
    }

    #[test]
    fn test_length_mismatch() {
        let mut out = [0.0f32; 2];
        assert_eq!(
            ewise_add(&A, &B, &mut out).unwrap_err(),
            StridedError::LengthMismatch {
                expected: 3,
                actual: 2
            }
        );
        let mut out = [0.0f32; 3];
        assert!(ewise_mul(&A, &B[..2], &mut out).is_err());
        assert!(ewise_tanh(&A[..1], &mut out).is_err());
    }
}
