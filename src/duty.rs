//! Duty writer
//!
//! Translates duty targets into the PWM peripheral's ramp registers. The
//! hardware ramps a channel by `scale` duty units every `cycles_per_step` PWM
//! cycles, `steps` times; each of these fields is 10 bits wide.

use embassy_time::Duration;

use crate::PwmOutput;
use crate::error::{Error, Result};

/// Maximum value of the step count field
pub const MAX_STEP_FIELD: u32 = 0x3ff;

/// Maximum value of the cycles-per-step field
pub const MAX_CYCLE_FIELD: u32 = 0x3ff;

/// Maximum value of the scale (duty units per step) field
pub const MAX_SCALE_FIELD: u32 = 0x3ff;

/// Highest supported duty resolution in bits
pub const MAX_DUTY_RESOLUTION: u8 = 20;

const MIN_DIVIDER_Q8: u64 = 1 << 8;
const MAX_DIVIDER_Q8: u64 = (1 << 18) - 1;

/// PWM timer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmTimerConfig {
    /// Timer source clock
    pub source_clock_hz: u32,
    /// PWM output frequency
    pub frequency_hz: u32,
    /// Duty resolution in bits
    pub duty_resolution: u8,
}

impl Default for PwmTimerConfig {
    fn default() -> Self {
        Self {
            source_clock_hz: 80_000_000,
            frequency_hz: 5_000,
            duty_resolution: 13,
        }
    }
}

impl PwmTimerConfig {
    /// Full-scale duty value
    pub const fn max_duty(&self) -> u32 {
        1 << self.duty_resolution
    }

    /// Clock divider in Q8 format, as programmed into the timer
    ///
    /// Returns `None` if the resolution or frequency cannot be produced from
    /// the source clock.
    #[allow(clippy::cast_possible_truncation)]
    pub fn divider(&self) -> Option<u32> {
        if self.duty_resolution == 0
            || self.duty_resolution > MAX_DUTY_RESOLUTION
            || self.frequency_hz == 0
        {
            return None;
        }
        let divider = (u64::from(self.source_clock_hz) << 8)
            / (u64::from(self.frequency_hz) << self.duty_resolution);
        (MIN_DIVIDER_Q8..=MAX_DIVIDER_Q8)
            .contains(&divider)
            .then_some(divider as u32)
    }

    /// Check that the configuration can be programmed
    pub fn validate(&self) -> Result<()> {
        self.divider().map(|_| ()).ok_or(Error::InvalidConfig)
    }

    /// Number of PWM cycles per second, derived from the source clock, divider
    /// and resolution
    #[allow(clippy::cast_possible_truncation)]
    pub fn cycle_frequency(&self) -> u32 {
        let Some(divider) = self.divider() else {
            return 0;
        };
        ((u64::from(self.source_clock_hz) << 8)
            / u64::from(self.max_duty())
            / u64::from(divider)) as u32
    }
}

/// Ramp direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DutyDirection {
    Decrease,
    Increase,
}

/// Channel duty register contents
///
/// Fields are written first and take effect once the channel is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyConfig {
    pub direction: DutyDirection,
    /// Number of ramp steps
    pub steps: u16,
    /// PWM cycles between two ramp steps
    pub cycles_per_step: u16,
    /// Duty units added or removed per step
    pub scale: u16,
    /// Output high point, left untouched when `None`
    pub hpoint: Option<u32>,
    /// Absolute duty to load before ramping, left untouched when `None`
    pub duty: Option<u32>,
}

impl DutyConfig {
    /// Load `duty` without ramping
    pub const fn immediate(duty: u32) -> Self {
        Self {
            direction: DutyDirection::Increase,
            steps: 1,
            cycles_per_step: 1,
            scale: 0,
            hpoint: None,
            duty: Some(duty),
        }
    }
}

/// Cycle and scale fields derived for a timed ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampFields {
    pub cycles_per_step: u32,
    pub scale: u32,
}

/// Derive ramp fields for moving `delta` duty units within `available` PWM
/// cycles
///
/// Returns `None` when there is nothing to ramp or no time to ramp in.
pub const fn ramp_fields(delta: u32, available: u32) -> Option<RampFields> {
    if delta == 0 || available == 0 {
        return None;
    }
    let fields = if available > delta {
        let cycles = available / delta;
        RampFields {
            cycles_per_step: if cycles > MAX_CYCLE_FIELD {
                MAX_CYCLE_FIELD
            } else {
                cycles
            },
            scale: 1,
        }
    } else {
        let scale = delta / available;
        RampFields {
            cycles_per_step: 1,
            scale: if scale > MAX_SCALE_FIELD {
                MAX_SCALE_FIELD
            } else {
                scale
            },
        }
    };
    Some(fields)
}

/// Build the register contents ramping from `current` to `target`
///
/// The step count is clamped to its field; when clamped, the scale is
/// widened so the ramp still covers as much of the distance as possible.
#[allow(clippy::cast_possible_truncation)]
pub fn step_config(current: u32, target: u32, fields: RampFields) -> DutyConfig {
    let (direction, delta) = if current > target {
        (DutyDirection::Decrease, current - target)
    } else {
        (DutyDirection::Increase, target - current)
    };

    let mut scale = fields.scale.min(MAX_SCALE_FIELD);
    let mut steps = 0;
    if scale > 0 {
        steps = (delta / scale).min(MAX_STEP_FIELD);
        if steps == MAX_STEP_FIELD {
            scale = (delta / steps).min(MAX_SCALE_FIELD);
        }
    }

    if scale > 0 && steps > 0 {
        DutyConfig {
            direction,
            steps: steps as u16,
            cycles_per_step: fields.cycles_per_step.min(MAX_CYCLE_FIELD) as u16,
            scale: scale as u16,
            hpoint: None,
            duty: Some(current),
        }
    } else {
        DutyConfig {
            direction,
            steps: 0,
            cycles_per_step: 1,
            scale: 0,
            hpoint: None,
            duty: Some(target),
        }
    }
}

/// Hardware-facing duty writer
///
/// Owns the PWM output and the timer configuration it was set up with.
pub struct DutyWriter<P: PwmOutput> {
    output: P,
    timer: PwmTimerConfig,
    cycle_frequency: u32,
}

impl<P: PwmOutput> DutyWriter<P> {
    /// Create a writer for an already configured output
    pub fn new(output: P, timer: PwmTimerConfig) -> Self {
        Self {
            output,
            cycle_frequency: timer.cycle_frequency(),
            timer,
        }
    }

    /// Full-scale duty of the configured timer
    pub const fn max_duty(&self) -> u32 {
        self.timer.max_duty()
    }

    pub fn into_output(self) -> P {
        self.output
    }

    /// Write a channel configuration and latch it
    pub fn configure_duty(&mut self, channel: u8, config: &DutyConfig) {
        self.output.write_config(channel, config);
        self.output.commit(channel);
    }

    /// Apply `duty` at the next PWM cycle without ramping
    pub fn set_duty_immediate(&mut self, channel: u8, duty: u32) {
        self.configure_duty(channel, &DutyConfig::immediate(duty));
    }

    /// Ramp the channel from its live duty to `target` within `max_duration`
    ///
    /// Falls back to an immediate set if there is no distance to cover or the
    /// duration does not span a single PWM cycle.
    #[allow(clippy::cast_possible_truncation)]
    pub fn ramp_over_time(&mut self, channel: u8, target: u32, max_duration: Duration) {
        let current = self.output.duty(channel);
        let delta = current.abs_diff(target);
        let available = max_duration
            .as_millis()
            .saturating_mul(u64::from(self.cycle_frequency))
            / 1000;
        let available = available.min(u64::from(u32::MAX)) as u32;

        match ramp_fields(delta, available) {
            Some(fields) => {
                let config = step_config(current, target, fields);
                self.configure_duty(channel, &config);
            }
            None => self.set_duty_immediate(channel, target),
        }
    }
}
