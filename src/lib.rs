#![no_std]

pub mod duty;
pub mod engine;
pub mod error;
pub mod fade;
pub mod fixed;
pub mod gamma;
pub mod timer;

pub use duty::{DutyConfig, DutyDirection, DutyWriter, PwmTimerConfig, RampFields};
pub use engine::{EngineConfig, FadeEngine};
pub use error::{Error, HardwareError, InitError, Result};
pub use fade::{ChannelFade, FADE_LEGS, TickAction};
pub use fixed::{FIXED_Q, Fixed};
pub use gamma::{GAMMA_TABLE_SIZE, GammaTable};
pub use timer::TickTimer;

pub use embassy_time::Duration;

/// Abstract PWM peripheral
///
/// Implement this trait for the platform's PWM controller. Channel ids are
/// bound to pins outside of this crate.
pub trait PwmOutput {
    /// Configure the PWM timer shared by all channels
    fn configure_timer(&mut self, timer: &PwmTimerConfig) -> core::result::Result<(), HardwareError>;

    /// Read back the duty the channel is currently outputting
    fn duty(&self, channel: u8) -> u32;

    /// Write the channel's duty configuration without applying it
    fn write_config(&mut self, channel: u8, config: &DutyConfig);

    /// Latch the written configuration at the next PWM cycle
    fn commit(&mut self, channel: u8);
}
