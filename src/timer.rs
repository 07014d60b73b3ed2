//! Shared tick timer
//!
//! One periodic alarm drives every channel. Mutators start it, and only the
//! tick handler stops it, after a pass in which every channel was idle.

use embassy_time::Duration;

use crate::error::HardwareError;

/// Periodic alarm that calls [`crate::FadeEngine::on_tick`] once per period
///
/// Implement this for the platform's hardware timer. The alarm must only fire
/// again after the previous callback returned.
pub trait TickTimer {
    /// Create the alarm with the given period, without starting it
    fn configure(&mut self, period: Duration) -> Result<(), HardwareError>;

    /// Start (or resume) the periodic alarm
    fn start(&mut self);

    /// Stop the periodic alarm
    fn stop(&mut self);

    /// Release the alarm when the engine is torn down
    fn release(&mut self) {}
}

/// Timer with start/stop bookkeeping
#[derive(Debug)]
pub struct TimerGate<T: TickTimer> {
    timer: T,
    running: bool,
}

impl<T: TickTimer> TimerGate<T> {
    pub const fn new(timer: T) -> Self {
        Self {
            timer,
            running: false,
        }
    }

    /// Check if the alarm is running
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Start the alarm unless it already runs
    pub fn ensure_running(&mut self) {
        if !self.running {
            self.timer.start();
            self.running = true;
        }
    }

    /// Stop the alarm if it runs
    pub fn stop(&mut self) {
        if self.running {
            self.timer.stop();
            self.running = false;
        }
    }

    /// Stop and release the alarm, handing the timer back
    pub fn release(mut self) -> T {
        self.stop();
        self.timer.release();
        self.timer
    }
}
