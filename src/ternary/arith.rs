//! Scalar ternary arithmetic primitives.
//!
//! These are total functions over `i32`; the registers they feed are not
//! trit vectors, so a "shift" by one trit position is literal
//! multiplication or division by 3.

/// Sign of a value as a trit: -1, 0, or +1.
#[inline]
pub fn tsign(v: i32) -> i32 {
    v.signum()
}

/// Magnitude of a value. Wraps at `i32::MIN` rather than overflowing.
#[inline]
pub fn tabs(v: i32) -> i32 {
    v.wrapping_abs()
}

/// Shift left by one trit position (multiply by 3).
#[inline]
pub fn tshl3(v: i32) -> i32 {
    v.wrapping_mul(3)
}

/// Shift right by one trit position (divide by 3, truncated toward zero).
/// In balanced ternary, truncation equals rounding!
#[inline]
pub fn tshr3(v: i32) -> i32 {
    v / 3
}

/// Three-way compare: the sign of `a - b`, computed without the subtraction
/// so extreme operands cannot overflow.
#[inline]
pub fn tcmpr(a: i32, b: i32) -> i32 {
    match a.cmp(&b) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}
