//! Q8 fixed-point helpers
//!
//! Channel levels are stored as `i32` with [`FIXED_Q`] fractional bits so that
//! per-tick steps accumulate without drift over long fades.

/// Number of fractional bits in a fixed-point level
pub const FIXED_Q: u32 = 8;

/// Fixed-point representation of `1.0`
pub const FIXED_ONE: i32 = 1 << FIXED_Q;

/// Highest linear brightness level
pub const LEVEL_MAX: u8 = u8::MAX;

/// Fixed-point brightness level
pub type Fixed = i32;

/// Convert an integer level to fixed point
#[inline]
#[allow(clippy::cast_lossless)]
pub const fn to_fixed(level: u8) -> Fixed {
    (level as i32) << FIXED_Q
}

/// Integer part of a fixed-point level
#[inline]
pub const fn integer_part(value: Fixed) -> i32 {
    value >> FIXED_Q
}

/// Fractional part of a fixed-point level (0..256)
#[inline]
pub const fn fractional_part(value: Fixed) -> i32 {
    value & (FIXED_ONE - 1)
}

/// Integer part of a fixed-point level, clamped into the `u8` level range
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub const fn to_level(value: Fixed) -> u8 {
    let integer = integer_part(value);
    if integer <= 0 {
        0
    } else if integer >= LEVEL_MAX as i32 {
        LEVEL_MAX
    } else {
        integer as u8
    }
}
