use crate::types::scalar::FxpScalar;
// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::fxp::ops::{fxp_add, fxp_sub, fxp_mul, fxp_div, fxp_sqrt, fxp_scale_bps, from_int, to_int, from_f32, to_f32};
use crate::config::SCALE;

const EPSILON: f32 = 1.0 / (SCALE as f32);

#[test]
fn test_fxp_conversions() {
    let s = from_f32(-2.5);
    assert_eq!(s.0, -2 * SCALE - SCALE / 2);
    assert!((to_f32(s) + 2.5).abs() <= EPSILON);

    assert_eq!(from_int(3), FxpScalar(3 * SCALE));
    assert_eq!(to_int(from_int(-7)), -7);
}

#[test]
fn test_fxp_add_sub_saturate() {
    assert!((to_f32(fxp_add(from_f32(1.5), from_f32(2.25))) - 3.75).abs() <= EPSILON);
    assert!((to_f32(fxp_sub(from_f32(3.5), from_f32(1.25))) - 2.25).abs() <= EPSILON);
    assert_eq!(fxp_add(FxpScalar(i32::MAX), FxpScalar::ONE), FxpScalar(i32::MAX));
    assert_eq!(fxp_sub(FxpScalar(i32::MIN), FxpScalar::ONE), FxpScalar(i32::MIN));
}

#[test]
fn test_fxp_mul() {
    assert_eq!(fxp_mul(from_int(2), from_int(3)), from_int(6));
    assert_eq!(fxp_mul(from_f32(0.5), from_f32(0.5)), from_f32(0.25));
    assert_eq!(fxp_mul(from_int(30000), from_int(30000)), FxpScalar(i32::MAX));
}

#[test]
fn test_fxp_div() {
    assert_eq!(fxp_div(from_int(6), from_int(3)), from_int(2));
    assert_eq!(fxp_div(from_int(1), from_int(4)), from_f32(0.25));
    assert_eq!(fxp_div(from_int(1), FxpScalar::ZERO), FxpScalar(i32::MAX));
    assert_eq!(fxp_div(from_int(-1), FxpScalar::ZERO), FxpScalar(i32::MIN));
}

#[test]
fn test_fxp_sqrt() {
    assert_eq!(fxp_sqrt(from_int(16)), from_int(4));
    assert_eq!(fxp_sqrt(from_f32(0.25)), from_f32(0.5));
    assert_eq!(fxp_sqrt(from_int(-4)), FxpScalar::ZERO);
    let r = to_f32(fxp_sqrt(from_int(2)));
    assert!((r - 1.41421).abs() < 0.001);
}

#[test]
fn test_fxp_scale_bps() {
    assert_eq!(fxp_scale_bps(from_int(10), 12_500), from_f32(12.5));
    assert_eq!(fxp_scale_bps(from_int(10), 7_500), from_f32(7.5));
}
