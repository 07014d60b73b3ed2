//! Per-channel fade and blink state
//!
//! [`ChannelFade`] is the pure arithmetic half of the tick handler: every
//! period [`ChannelFade::advance`] moves the channel one step and reports which
//! duty update the engine has to issue. It never touches hardware.

use embassy_time::Duration;

use crate::fixed::{Fixed, to_fixed, to_level};

/// Number of interpolation legs used by a fade, independent of its duration
pub const FADE_LEGS: u32 = 100;

/// Duty update requested by one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Nothing to do, the channel is idle
    Idle,
    /// Ramp the hardware towards the level over the channel's ramp window
    Ramp(Fixed),
    /// Apply the level immediately
    Set(Fixed),
}

/// Fade state of a single channel
///
/// A channel with `remaining > 0` is ramping. A channel with neither remaining
/// steps nor a blink cycle is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelFade {
    /// Current level
    current: Fixed,
    /// Level the fade ends at, or the blink's on level
    target: Fixed,
    /// Signed per-tick delta
    step: Fixed,
    /// Ticks left in the current leg
    remaining: u32,
    /// Ticks per blink half period, `0` when not blinking
    cycle: u32,
    /// Hardware ramp window for every step
    ramp: Duration,
}

impl Default for ChannelFade {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelFade {
    /// Create an idle channel at level zero
    pub const fn new() -> Self {
        Self {
            current: 0,
            target: 0,
            step: 0,
            remaining: 0,
            cycle: 0,
            ramp: Duration::from_millis(0),
        }
    }

    pub const fn current(&self) -> Fixed {
        self.current
    }

    pub const fn target(&self) -> Fixed {
        self.target
    }

    pub const fn step(&self) -> Fixed {
        self.step
    }

    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    pub const fn cycle(&self) -> u32 {
        self.cycle
    }

    pub const fn ramp(&self) -> Duration {
        self.ramp
    }

    /// Integer part of the current level
    pub const fn level(&self) -> u8 {
        to_level(self.current)
    }

    /// Check if the channel still needs ticks
    pub const fn is_active(&self) -> bool {
        self.remaining > 0 || self.cycle > 0
    }

    pub const fn is_blinking(&self) -> bool {
        self.cycle > 0
    }

    /// Fade from the current level to `level` in [`FADE_LEGS`] steps
    ///
    /// The step is truncated towards zero, so small distances may produce a
    /// zero step; the last leg always lands on the target.
    #[allow(clippy::cast_possible_wrap)]
    pub fn set_target(&mut self, level: u8, ramp: Duration) {
        self.target = to_fixed(level);
        self.remaining = FADE_LEGS;
        self.step = (self.target - self.current) / FADE_LEGS as i32;
        self.cycle = 0;
        self.ramp = ramp;
    }

    /// Blink between `level` and zero, switching every `cycle` ticks
    ///
    /// With `fade` the channel ramps down and up again instead of toggling.
    /// A zero cycle is treated as one tick.
    pub fn start_blink(&mut self, level: u8, cycle: u32, fade: bool, ramp: Duration) {
        let cycle = cycle.max(1);
        self.target = to_fixed(level);
        self.current = self.target;
        self.cycle = cycle;
        self.ramp = ramp;
        if fade {
            self.remaining = cycle;
            self.step = -(self.current / i32::try_from(cycle).unwrap_or(i32::MAX));
        } else {
            self.remaining = 0;
            self.step = 0;
        }
    }

    /// Stop blinking or fading, keeping the current level
    pub fn stop_blink(&mut self) {
        self.remaining = 0;
        self.cycle = 0;
    }

    /// Advance the channel by one tick
    pub fn advance(&mut self) -> TickAction {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.step != 0 {
                self.current = self.current.saturating_add(self.step);
                if self.remaining > 0 {
                    return TickAction::Ramp(self.current);
                }
                self.current = self.leg_end();
            } else if self.remaining == 0 && self.cycle == 0 {
                self.current = self.target;
            }
            return TickAction::Set(self.current);
        }

        if self.cycle > 0 {
            self.remaining = self.cycle - 1;
            if self.step != 0 {
                self.step = -self.step;
                self.current = self.current.saturating_add(self.step);
            } else if self.current == self.target {
                self.current = 0;
            } else {
                self.current = self.target;
            }
            return TickAction::Ramp(self.current);
        }

        TickAction::Idle
    }

    /// Level the current leg ends at
    const fn leg_end(&self) -> Fixed {
        if self.cycle > 0 && self.step < 0 {
            0
        } else {
            self.target
        }
    }
}
