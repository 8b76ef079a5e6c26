//! Fixed-point operations.

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::types::scalar::FxpScalar;
use crate::config::{FRAC_BITS, SCALE};

#[inline]
fn saturate(v: i64) -> i32 {
    if v > (i32::MAX as i64) {
        i32::MAX
    } else if v < (i32::MIN as i64) {
        i32::MIN
    } else {
        v as i32
    }
}

/// Basic fixed-point addition with saturation.
pub fn fxp_add(a: FxpScalar, b: FxpScalar) -> FxpScalar {
    FxpScalar(a.0.saturating_add(b.0))
}

/// Basic fixed-point subtraction with saturation.
pub fn fxp_sub(a: FxpScalar, b: FxpScalar) -> FxpScalar {
    FxpScalar(a.0.saturating_sub(b.0))
}

/// Fixed-point multiplication: `(a * b) >> 16` on a 64-bit intermediate.
pub fn fxp_mul(a: FxpScalar, b: FxpScalar) -> FxpScalar {
    let product = (a.0 as i64) * (b.0 as i64);
    FxpScalar(saturate(product >> FRAC_BITS))
}

/// Fixed-point division: `(a << 16) / b`.
///
/// A zero divisor saturates towards the sign of the dividend instead of trapping.
pub fn fxp_div(a: FxpScalar, b: FxpScalar) -> FxpScalar {
    if b.0 == 0 {
        return if a.0 >= 0 { FxpScalar(i32::MAX) } else { FxpScalar(i32::MIN) };
    }
    let shifted = (a.0 as i64) << FRAC_BITS;
    FxpScalar(saturate(shifted / (b.0 as i64)))
}

/// Fixed-point square root (Newton's method on a 64-bit intermediate).
pub fn fxp_sqrt(a: FxpScalar) -> FxpScalar {
    if a.0 <= 0 {
        return FxpScalar::ZERO;
    }
    // sqrt(v / 2^16) * 2^16 == sqrt(v * 2^16)
    let v = (a.0 as i64) << FRAC_BITS;
    let mut x = v;
    let mut y = (x + 1) >> 1;
    while y < x {
        x = y;
        y = (x + v / x) >> 1;
    }
    FxpScalar(saturate(x))
}

/// Scales by a basis-point factor, e.g. `12_500` for 125%.
pub fn fxp_scale_bps(a: FxpScalar, bps: u32) -> FxpScalar {
    FxpScalar(saturate((a.0 as i64) * (bps as i64) / 10_000))
}

/// Integer to fixed-point.
pub const fn from_int(v: i32) -> FxpScalar {
    FxpScalar(v.saturating_mul(SCALE))
}

/// Integer part, truncated towards zero.
pub const fn to_int(s: FxpScalar) -> i32 {
    s.0 / SCALE
}

/// Helper to convert f32 to FxpScalar (TEST ONLY).
#[cfg(test)]
pub fn from_f32(f: f32) -> FxpScalar {
    FxpScalar((f * (SCALE as f32)) as i32)
}

/// Helper to convert FxpScalar to f32 (TEST ONLY).
#[cfg(test)]
pub fn to_f32(s: FxpScalar) -> f32 {
    (s.0 as f32) / (SCALE as f32)
}
