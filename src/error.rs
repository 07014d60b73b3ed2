//! Engine errors

/// Failure reported by a hardware seam ([`crate::PwmOutput`] or
/// [`crate::TickTimer`])
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareError;

/// Errors returned by the public engine API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The engine is not initialized, or is already initialized on `init`
    InvalidState,

    /// Channel id is outside the engine's channel range
    InvalidChannel,

    /// Rejected engine or timer configuration
    InvalidConfig,

    /// Timer or PWM peripheral configuration failed
    Hardware,
}

impl From<HardwareError> for Error {
    fn from(_: HardwareError) -> Self {
        Self::Hardware
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidState => write!(f, "engine is not in a valid state for this call"),
            Self::InvalidChannel => write!(f, "channel id out of range"),
            Self::InvalidConfig => write!(f, "invalid engine configuration"),
            Self::Hardware => write!(f, "hardware configuration failed"),
        }
    }
}

/// Failed [`crate::FadeEngine::init`], with the hardware handed back so the
/// caller can retry
#[derive(Debug)]
pub struct InitError<P, T> {
    pub error: Error,
    pub output: P,
    pub timer: T,
}

impl<P, T> From<InitError<P, T>> for Error {
    fn from(err: InitError<P, T>) -> Self {
        err.error
    }
}

impl<P, T> core::fmt::Display for InitError<P, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "engine init failed: {}", self.error)
    }
}

/// Result alias for engine operations
pub type Result<T> = core::result::Result<T, Error>;
