//! Shared test infrastructure for pwm-fader integration tests

#![allow(dead_code)] // Items used across multiple test files; Rust analyzes per-file

use std::cell::RefCell;
use std::rc::Rc;

use pwm_fader::{
    DutyConfig, DutyDirection, Duration, EngineConfig, FadeEngine, HardwareError, PwmOutput,
    PwmTimerConfig, TickTimer,
};

/// Channels used by the test engine
pub const CHANNELS: usize = 4;

pub type TestEngine = FadeEngine<MockPwm, SimTimer, CHANNELS>;

// ============================================================================
// Mock PWM output
// ============================================================================

/// Register state recorded by [`MockPwm`]
#[derive(Debug, Default)]
pub struct PwmLog {
    pub timer: Option<PwmTimerConfig>,
    pub fail_timer: bool,
    pub duties: [u32; CHANNELS],
    pub pending: [Option<DutyConfig>; CHANNELS],
    pub writes: Vec<(u8, DutyConfig)>,
    pub commits: usize,
}

/// PWM output that emulates the duty registers
///
/// A committed ramp completes instantly, so `duty` reads back the value the
/// hardware would reach at the end of the ramp.
#[derive(Debug, Clone, Default)]
pub struct MockPwm {
    log: Rc<RefCell<PwmLog>>,
}

impl MockPwm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let pwm = Self::default();
        pwm.log.borrow_mut().fail_timer = true;
        pwm
    }

    pub fn duty_of(&self, channel: u8) -> u32 {
        self.log.borrow().duties[usize::from(channel)]
    }

    pub fn set_duty_of(&self, channel: u8, duty: u32) {
        self.log.borrow_mut().duties[usize::from(channel)] = duty;
    }

    pub fn last_write(&self) -> Option<(u8, DutyConfig)> {
        self.log.borrow().writes.last().copied()
    }

    pub fn writes(&self) -> Vec<(u8, DutyConfig)> {
        self.log.borrow().writes.clone()
    }

    pub fn commits(&self) -> usize {
        self.log.borrow().commits
    }

    pub fn timer(&self) -> Option<PwmTimerConfig> {
        self.log.borrow().timer
    }
}

impl PwmOutput for MockPwm {
    fn configure_timer(&mut self, timer: &PwmTimerConfig) -> Result<(), HardwareError> {
        let mut log = self.log.borrow_mut();
        if log.fail_timer {
            return Err(HardwareError);
        }
        log.timer = Some(*timer);
        Ok(())
    }

    fn duty(&self, channel: u8) -> u32 {
        self.duty_of(channel)
    }

    fn write_config(&mut self, channel: u8, config: &DutyConfig) {
        let mut log = self.log.borrow_mut();
        log.pending[usize::from(channel)] = Some(*config);
        log.writes.push((channel, *config));
    }

    fn commit(&mut self, channel: u8) {
        let mut log = self.log.borrow_mut();
        let index = usize::from(channel);
        let Some(config) = log.pending[index].take() else {
            return;
        };
        let start = config.duty.unwrap_or(log.duties[index]);
        let distance = u32::from(config.steps) * u32::from(config.scale);
        log.duties[index] = match config.direction {
            DutyDirection::Increase => start + distance,
            DutyDirection::Decrease => start.saturating_sub(distance),
        };
        log.commits += 1;
    }
}

// ============================================================================
// Simulated tick timer
// ============================================================================

#[derive(Debug, Default)]
pub struct TimerLog {
    pub period: Option<Duration>,
    pub fail: bool,
    pub running: bool,
    pub starts: u32,
    pub stops: u32,
    pub released: bool,
}

/// Deterministic stand-in for the hardware alarm
#[derive(Debug, Clone, Default)]
pub struct SimTimer {
    log: Rc<RefCell<TimerLog>>,
}

impl SimTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let timer = Self::default();
        timer.log.borrow_mut().fail = true;
        timer
    }

    pub fn running(&self) -> bool {
        self.log.borrow().running
    }

    pub fn starts(&self) -> u32 {
        self.log.borrow().starts
    }

    pub fn stops(&self) -> u32 {
        self.log.borrow().stops
    }

    pub fn period(&self) -> Option<Duration> {
        self.log.borrow().period
    }

    pub fn released(&self) -> bool {
        self.log.borrow().released
    }
}

impl TickTimer for SimTimer {
    fn configure(&mut self, period: Duration) -> Result<(), HardwareError> {
        let mut log = self.log.borrow_mut();
        if log.fail {
            return Err(HardwareError);
        }
        log.period = Some(period);
        Ok(())
    }

    fn start(&mut self) {
        let mut log = self.log.borrow_mut();
        log.running = true;
        log.starts += 1;
    }

    fn stop(&mut self) {
        let mut log = self.log.borrow_mut();
        log.running = false;
        log.stops += 1;
    }

    fn release(&mut self) {
        self.log.borrow_mut().released = true;
    }
}

// ============================================================================
// Test helpers
// ============================================================================

/// Create an initialized engine with the default configuration
pub fn setup() -> (TestEngine, MockPwm, SimTimer) {
    let engine = TestEngine::new();
    let pwm = MockPwm::new();
    let timer = SimTimer::new();
    engine
        .init(&EngineConfig::default(), pwm.clone(), timer.clone())
        .expect("engine init");
    (engine, pwm, timer)
}

/// Fire the alarm up to `max` times, stopping early once the timer is stopped
///
/// Returns the number of ticks delivered.
pub fn run_ticks(engine: &TestEngine, timer: &SimTimer, max: u32) -> u32 {
    let mut delivered = 0;
    while delivered < max && timer.running() {
        engine.on_tick();
        delivered += 1;
    }
    delivered
}

/// Small deterministic xorshift generator for randomized inputs
pub struct XorShift(pub u32);

impl XorShift {
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    /// Value in `low..=high`
    pub fn range(&mut self, low: u32, high: u32) -> u32 {
        low + self.next_u32() % (high - low + 1)
    }
}
