//! Fixed-point charge arithmetic.
//!
//! Levels are quantized to `frac_bits` fractional bits (`i64`). Charge is kept
//! as *twice* the V·ns integral in the same unit (`i128`), so a step adds
//! `2·L·D` and a ramp adds `(L0 + L1)·D` without any rounding. Conversion back
//! to V·ns happens only when a compensation pulse is computed.

/// Quantize a level in volts to `frac_bits` fractional bits, rounding to nearest
/// and saturating at the `i64` range. Non-finite values map to 0.
#[inline]
pub fn quantize_level(volts: f64, frac_bits: u32) -> i64 {
    if !volts.is_finite() {
        return 0;
    }
    let scaled = (volts * scale(frac_bits)).round();
    if scaled >= i64::MAX as f64 {
        i64::MAX
    } else if scaled <= i64::MIN as f64 {
        i64::MIN
    } else {
        scaled as i64
    }
}

/// Largest level word not above `volts`, for bounds that must not be exceeded.
#[inline]
pub fn floor_level(volts: f64, frac_bits: u32) -> i64 {
    let scaled = (volts * scale(frac_bits)).floor();
    if scaled.is_finite() && scaled < i64::MAX as f64 && scaled > i64::MIN as f64 {
        scaled as i64
    } else {
        0
    }
}

#[inline]
pub fn dequantize_level(q: i64, frac_bits: u32) -> f64 {
    q as f64 / scale(frac_bits)
}

/// Doubled area of a constant segment.
#[inline]
pub fn step_area2(level_q: i64, duration_ns: u64) -> i128 {
    2 * i128::from(level_q) * i128::from(duration_ns)
}

/// Doubled area of a linear segment (trapezoid).
#[inline]
pub fn ramp_area2(from_q: i64, to_q: i64, duration_ns: u64) -> i128 {
    (i128::from(from_q) + i128::from(to_q)) * i128::from(duration_ns)
}

/// Convert a doubled fixed-point area to V·ns.
#[inline]
pub fn area2_to_volt_ns(area2: i128, frac_bits: u32) -> f64 {
    area2 as f64 / (2.0 * scale(frac_bits))
}

/// V·ns of one doubled area unit.
#[inline]
pub fn volt_ns_per_area2(frac_bits: u32) -> f64 {
    1.0 / (2.0 * scale(frac_bits))
}

/// Smallest multiple of `unit_ns` that is `>= ns`. Non-positive input gives 0.
#[inline]
pub fn ceil_to_unit(ns: f64, unit_ns: u32) -> u64 {
    if ns.is_nan() || ns <= 0.0 {
        return 0;
    }
    let unit = f64::from(unit_ns.max(1));
    let cycles = (ns / unit).ceil();
    if cycles >= u64::MAX as f64 / unit {
        u64::MAX
    } else {
        cycles as u64 * u64::from(unit_ns.max(1))
    }
}

#[inline]
fn scale(frac_bits: u32) -> f64 {
    2f64.powi(frac_bits as i32)
}
