pub mod gpiod;
pub mod keypad;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Specifies the active level of a GPIO line.
///
/// The annunciator board drives its LEDs active-low (a logical "on" pulls the
/// line low), so callers always work in logical values and pick the level at
/// request time.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default]
    High,
    Low,
}

/// Specifies the bias of a GPIO line (pull-up/pull-down resistors).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default]
    None,
    PullUp,
    PullDown,
}

/// Specifies the drive mode of an output line.
///
/// Open-drain leaves the line floating instead of driving it high, which the
/// keypad column strobe relies on so that two simultaneously pressed keys in
/// one row cannot short two driven columns together.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioDriveMode {
    #[default]
    PushPull,
    OpenDrain,
    OpenSource,
}

/// A single output line, owned by its holder and movable across threads.
pub trait GpioOutput: Debug + Send {
    /// Writes the logical state of the line.
    fn write(&self, value: bool) -> GpioResult<()>;
}

/// A group of `N` input lines read together.
pub trait GpioBusInput<const N: usize>: Debug + Send {
    /// Reads the logical values of all lines in the bus.
    fn read(&self) -> GpioResult<[bool; N]>;
}

/// A group of `N` output lines written together.
pub trait GpioBusOutput<const N: usize>: Debug + Send {
    /// Writes the logical values of all lines in the bus.
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;

    /// Drives exactly one line of the bus, all others inactive.
    fn write_one_hot(&self, index: usize) -> GpioResult<()> {
        if index >= N {
            return Err(GpioError::InvalidArgument);
        }
        let mut values = [false; N];
        values[index] = true;
        self.write(&values)
    }
}
