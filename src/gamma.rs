//! Gamma correction table
//!
//! Maps a linear Q8 brightness level to a perceptually corrected value in the
//! `0..=u16::MAX` range. Levels between two table entries are linearly
//! interpolated, which gives sub-step duty precision during slow fades.

use crate::fixed::{FIXED_Q, Fixed, fractional_part, integer_part};

/// Number of entries in the gamma table
pub const GAMMA_TABLE_SIZE: usize = 256;

/// Default correction exponent
pub const DEFAULT_GAMMA_CORRECTION: f32 = 0.8;

const LAST_INDEX: usize = GAMMA_TABLE_SIZE - 1;

/// Gamma lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GammaTable {
    entries: [u16; GAMMA_TABLE_SIZE],
}

impl Default for GammaTable {
    fn default() -> Self {
        Self::build(DEFAULT_GAMMA_CORRECTION)
    }
}

impl GammaTable {
    /// Build a table from a correction exponent
    ///
    /// Each entry is `(i / 255) ^ (1 / correction)` scaled to `255` in Q8. The
    /// last entry is forced to `u16::MAX` so full duty is always reachable.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn build(correction: f32) -> Self {
        let mut entries = [0u16; GAMMA_TABLE_SIZE];
        let scale = (LAST_INDEX << FIXED_Q) as f32;
        for (i, entry) in entries.iter_mut().enumerate() {
            let linear = i as f32 / LAST_INDEX as f32;
            let corrected = libm::powf(linear, 1.0 / correction);
            *entry = libm::roundf(corrected * scale).clamp(0.0, f32::from(u16::MAX)) as u16;
        }
        entries[LAST_INDEX] = u16::MAX;
        Self { entries }
    }

    /// Create a table from raw entries
    ///
    /// Entries are taken as is; monotonicity is the caller's responsibility.
    pub const fn from_entries(entries: [u16; GAMMA_TABLE_SIZE]) -> Self {
        Self { entries }
    }

    /// Replace every entry at once
    pub fn replace(&mut self, entries: &[u16; GAMMA_TABLE_SIZE]) {
        self.entries = *entries;
    }

    /// Raw table entries
    pub const fn entries(&self) -> &[u16; GAMMA_TABLE_SIZE] {
        &self.entries
    }

    /// Check that no entry is lower than the one before it
    pub fn is_monotonic(&self) -> bool {
        self.entries.windows(2).all(|pair| pair[0] <= pair[1])
    }

    /// Look up a fixed-point level, interpolating between neighbouring entries
    #[allow(clippy::cast_sign_loss)]
    pub fn lookup(&self, level: Fixed) -> u32 {
        let level = level.max(0);
        let index = integer_part(level) as usize;
        if index >= LAST_INDEX {
            return u32::from(self.entries[LAST_INDEX]);
        }

        let current = u32::from(self.entries[index]);
        let next = u32::from(self.entries[index + 1]);
        let fraction = fractional_part(level) as u32;
        if next >= current {
            current + (((next - current) * fraction) >> FIXED_Q)
        } else {
            // Custom tables are not validated, so tolerate a falling segment
            current - (((current - next) * fraction) >> FIXED_Q)
        }
    }

    /// Corrected duty for a fixed-point level, scaled to `max_duty`
    #[allow(clippy::cast_possible_truncation)]
    pub fn duty(&self, level: Fixed, max_duty: u32) -> u32 {
        let value = u64::from(self.lookup(level));
        (value * u64::from(max_duty) / u64::from(u16::MAX)) as u32
    }
}
