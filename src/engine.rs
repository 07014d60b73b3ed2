//! Fade engine
//!
//! Owns the channel states, the gamma table, the duty writer and the shared
//! tick timer. The engine is meant to live in a `static` and be shared by the
//! timer interrupt ([`FadeEngine::on_tick`]) and application code (every other
//! method).
//!
//! ```ignore
//! static ENGINE: FadeEngine<LedcOutput, GpTimer, 8> = FadeEngine::new();
//!
//! ENGINE.init(&EngineConfig::default(), ledc, gptimer)?;
//! ENGINE.set_channel_target(0, 255, Duration::from_millis(500))?;
//!
//! // In the timer interrupt
//! ENGINE.on_tick();
//! ```

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_time::Duration;
use heapless::Vec;

#[cfg(feature = "esp32-log")]
use esp_println::println;

use crate::PwmOutput;
use crate::duty::{DutyWriter, PwmTimerConfig};
use crate::error::{Error, InitError, Result};
use crate::fade::{ChannelFade, TickAction};
use crate::fixed::to_level;
use crate::gamma::{DEFAULT_GAMMA_CORRECTION, GAMMA_TABLE_SIZE, GammaTable};
use crate::timer::{TickTimer, TimerGate};

/// Default tick period
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(20);

/// Default part of each tick left unused by the hardware ramp
pub const DEFAULT_FADE_MARGIN: Duration = Duration::from_millis(10);

/// Configuration for the fade engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// PWM timer shared by all channels
    pub timer: PwmTimerConfig,
    /// Period of the tick timer
    pub tick_period: Duration,
    /// Time subtracted from the tick period to get the hardware ramp window
    pub fade_margin: Duration,
    /// Gamma correction exponent
    pub gamma_correction: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timer: PwmTimerConfig::default(),
            tick_period: DEFAULT_TICK_PERIOD,
            fade_margin: DEFAULT_FADE_MARGIN,
            gamma_correction: DEFAULT_GAMMA_CORRECTION,
        }
    }
}

impl EngineConfig {
    /// Check the configuration before any hardware is touched
    pub fn validate(&self) -> Result<()> {
        if self.tick_period.as_millis() == 0 || self.fade_margin >= self.tick_period {
            return Err(Error::InvalidConfig);
        }
        if !self.gamma_correction.is_finite() || self.gamma_correction <= 0.0 {
            return Err(Error::InvalidConfig);
        }
        self.timer.validate()
    }

    /// Longest hardware ramp that fits into one tick
    pub fn ramp_window(&self) -> Duration {
        self.tick_period
            .checked_sub(self.fade_margin)
            .unwrap_or(Duration::from_millis(0))
    }
}

struct EngineState<P: PwmOutput, T: TickTimer, const CHANNELS: usize> {
    writer: DutyWriter<P>,
    timer: TimerGate<T>,
    gamma: GammaTable,
    channels: [ChannelFade; CHANNELS],
    tick_period: Duration,
    ramp_window: Duration,
}

impl<P: PwmOutput, T: TickTimer, const CHANNELS: usize> EngineState<P, T, CHANNELS> {
    fn channel_mut(&mut self, channel: u8) -> Result<&mut ChannelFade> {
        self.channels
            .get_mut(usize::from(channel))
            .ok_or(Error::InvalidChannel)
    }

    fn channel(&self, channel: u8) -> Result<&ChannelFade> {
        self.channels
            .get(usize::from(channel))
            .ok_or(Error::InvalidChannel)
    }

    /// Number of ticks in half a blink period, counted in whole milliseconds
    #[allow(clippy::cast_possible_truncation)]
    fn blink_cycle(&self, period: Duration) -> u32 {
        let ticks = period.as_millis() / 2 / self.tick_period.as_millis();
        ticks.min(u64::from(u32::MAX)) as u32
    }

    /// Advance every channel and stop the timer once all of them are idle
    #[allow(clippy::cast_possible_truncation)]
    fn tick(&mut self) -> bool {
        let max_duty = self.writer.max_duty();
        let mut idle = 0;
        for (index, fade) in self.channels.iter_mut().enumerate() {
            let channel = index as u8;
            match fade.advance() {
                TickAction::Idle => idle += 1,
                TickAction::Ramp(level) => {
                    let duty = self.gamma.duty(level, max_duty);
                    self.writer.ramp_over_time(channel, duty, fade.ramp());
                }
                TickAction::Set(level) => {
                    let duty = self.gamma.duty(level, max_duty);
                    self.writer.set_duty_immediate(channel, duty);
                }
            }
        }

        if idle == CHANNELS {
            self.timer.stop();
        }
        self.timer.is_running()
    }
}

/// Fade and blink engine for `CHANNELS` PWM channels sharing one tick timer
pub struct FadeEngine<P: PwmOutput, T: TickTimer, const CHANNELS: usize> {
    state: Mutex<RefCell<Option<EngineState<P, T, CHANNELS>>>>,
}

impl<P: PwmOutput, T: TickTimer, const CHANNELS: usize> Default for FadeEngine<P, T, CHANNELS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PwmOutput, T: TickTimer, const CHANNELS: usize> FadeEngine<P, T, CHANNELS> {
    const CHANNELS_FIT: () = assert!(CHANNELS <= 256, "channel ids are u8");

    /// Create an uninitialized engine
    pub const fn new() -> Self {
        let () = Self::CHANNELS_FIT;
        Self {
            state: Mutex::new(RefCell::new(None)),
        }
    }

    /// Check if [`FadeEngine::init`] has been called
    pub fn is_initialized(&self) -> bool {
        critical_section::with(|cs| self.state.borrow(cs).borrow().is_some())
    }

    /// Configure the PWM timer and the tick alarm, and start with every
    /// channel idle at level zero
    ///
    /// Fails with [`Error::InvalidState`] if the engine is already running.
    /// On failure the output and the timer are handed back in the
    /// [`InitError`].
    pub fn init(
        &self,
        config: &EngineConfig,
        mut output: P,
        mut timer: T,
    ) -> core::result::Result<(), InitError<P, T>> {
        if let Err(error) = self.prepare(config, &mut output, &mut timer) {
            return Err(InitError {
                error,
                output,
                timer,
            });
        }
        let gamma = GammaTable::build(config.gamma_correction);

        critical_section::with(|cs| {
            let mut slot = self.state.borrow(cs).borrow_mut();
            if slot.is_some() {
                return Err(InitError {
                    error: Error::InvalidState,
                    output,
                    timer,
                });
            }
            *slot = Some(EngineState {
                writer: DutyWriter::new(output, config.timer),
                timer: TimerGate::new(timer),
                gamma,
                channels: [ChannelFade::new(); CHANNELS],
                tick_period: config.tick_period,
                ramp_window: config.ramp_window(),
            });
            Ok(())
        })?;

        #[cfg(feature = "esp32-log")]
        println!(
            "[FadeEngine.init] {} channels, tick {} ms, max duty {}",
            CHANNELS,
            config.tick_period.as_millis(),
            config.timer.max_duty()
        );
        Ok(())
    }

    /// Validate the configuration and program the hardware
    fn prepare(&self, config: &EngineConfig, output: &mut P, timer: &mut T) -> Result<()> {
        config.validate()?;
        if self.is_initialized() {
            return Err(Error::InvalidState);
        }
        output.configure_timer(&config.timer)?;
        timer.configure(config.tick_period)?;
        Ok(())
    }

    /// Stop the timer and hand the hardware back
    pub fn deinit(&self) -> Result<(P, T)> {
        let state = critical_section::with(|cs| self.state.borrow(cs).borrow_mut().take())
            .ok_or(Error::InvalidState)?;

        #[cfg(feature = "esp32-log")]
        println!("[FadeEngine.deinit] releasing timer");

        let timer = state.timer.release();
        Ok((state.writer.into_output(), timer))
    }

    /// Run `f` on the engine state inside a critical section
    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut EngineState<P, T, CHANNELS>) -> Result<R>,
    ) -> Result<R> {
        critical_section::with(|cs| {
            let mut slot = self.state.borrow(cs).borrow_mut();
            let state = slot.as_mut().ok_or(Error::InvalidState)?;
            f(state)
        })
    }

    /// Fade `channel` to `level`
    ///
    /// The fade always takes [`crate::fade::FADE_LEGS`] ticks; `fade` bounds
    /// the hardware ramp inside each tick, capped to the ramp window.
    pub fn set_channel_target(&self, channel: u8, level: u8, fade: Duration) -> Result<()> {
        self.with_state(|state| {
            let ramp = fade.min(state.ramp_window);
            state.channel_mut(channel)?.set_target(level, ramp);
            state.timer.ensure_running();
            Ok(())
        })?;

        #[cfg(feature = "esp32-log")]
        println!(
            "[FadeEngine.set_channel_target] channel {} -> {}",
            channel, level
        );
        Ok(())
    }

    /// Blink `channel` between `level` and zero with the given full period
    ///
    /// With `fade` the channel ramps down and up instead of toggling.
    pub fn start_blink(&self, channel: u8, level: u8, period: Duration, fade: bool) -> Result<()> {
        self.with_state(|state| {
            let cycle = state.blink_cycle(period);
            let ramp = state.ramp_window;
            state.channel_mut(channel)?.start_blink(level, cycle, fade, ramp);
            state.timer.ensure_running();
            Ok(())
        })?;

        #[cfg(feature = "esp32-log")]
        println!(
            "[FadeEngine.start_blink] channel {} level {} period {} ms fade {}",
            channel,
            level,
            period.as_millis(),
            fade
        );
        Ok(())
    }

    /// Stop blinking (or fading) `channel`; it keeps its last duty
    pub fn stop_blink(&self, channel: u8) -> Result<()> {
        self.with_state(|state| {
            state.channel_mut(channel)?.stop_blink();
            Ok(())
        })
    }

    /// Current level of `channel`
    pub fn channel_level(&self, channel: u8) -> Result<u8> {
        self.with_state(|state| Ok(state.channel(channel)?.level()))
    }

    /// Target level of `channel`
    pub fn channel_target(&self, channel: u8) -> Result<u8> {
        self.with_state(|state| Ok(to_level(state.channel(channel)?.target())))
    }

    /// Snapshot of the fade state of `channel`
    pub fn channel_state(&self, channel: u8) -> Result<ChannelFade> {
        self.with_state(|state| Ok(*state.channel(channel)?))
    }

    /// Check if `channel` is fading or blinking
    pub fn is_channel_active(&self, channel: u8) -> Result<bool> {
        self.with_state(|state| Ok(state.channel(channel)?.is_active()))
    }

    /// Ids of all fading or blinking channels
    #[allow(clippy::cast_possible_truncation)]
    pub fn active_channels(&self) -> Result<Vec<u8, CHANNELS>> {
        self.with_state(|state| {
            Ok(state
                .channels
                .iter()
                .enumerate()
                .filter(|(_, fade)| fade.is_active())
                .map(|(index, _)| index as u8)
                .collect())
        })
    }

    /// Check if the shared tick timer is running
    pub fn is_timer_running(&self) -> Result<bool> {
        self.with_state(|state| Ok(state.timer.is_running()))
    }

    /// Replace the gamma table, e.g. with a calibrated one
    ///
    /// The entries are not checked; see [`GammaTable::is_monotonic`].
    pub fn set_gamma_table(&self, entries: &[u16; GAMMA_TABLE_SIZE]) -> Result<()> {
        self.with_state(|state| {
            state.gamma.replace(entries);
            Ok(())
        })?;

        #[cfg(feature = "esp32-log")]
        println!("[FadeEngine.set_gamma_table] gamma table replaced");
        Ok(())
    }

    /// Tick handler, call once per timer period from the alarm callback
    ///
    /// Advances every channel and stops the timer after a pass in which all of
    /// them were idle. Returns whether the timer is still running. Never
    /// blocks or allocates; a tick that finds the state borrowed is skipped.
    pub fn on_tick(&self) -> bool {
        critical_section::with(|cs| {
            let Ok(mut slot) = self.state.borrow(cs).try_borrow_mut() else {
                return true;
            };
            match slot.as_mut() {
                Some(state) => state.tick(),
                None => false,
            }
        })
    }
}
