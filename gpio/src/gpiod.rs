//! GPIO backend using the Linux character device via the gpiod library.
//!
//! Unlike a register-mapped driver, line handles returned here own their
//! kernel request and are `Send`, so the annunciator outputs and the keypad
//! buses can live on different threads.

use crate::{
    GpioActiveLevel, GpioBias, GpioBusInput, GpioBusOutput, GpioDriveMode, GpioError, GpioOutput,
    GpioResult,
};
use log::debug;
use std::fmt::{Debug, Formatter};

pub struct GpiodChip {
    chip: gpiod::Chip,
}

impl GpiodChip {
    /// Opens a GPIO chip by path, e.g. `/dev/gpiochip0`.
    pub fn open(path: &str) -> GpioResult<Self> {
        let chip = gpiod::Chip::new(path)?;
        Ok(Self { chip })
    }

    pub fn num_lines(&self) -> usize {
        self.chip.num_lines() as usize
    }

    /// Requests a single output line.
    pub fn output_pin(&self, line: u32, active: GpioActiveLevel) -> GpioResult<GpiodOutput> {
        self.check_lines(&[line])?;
        debug!("Requesting output line {line} ({active:?})");
        let lines = self.chip.request_lines(
            gpiod::Options::output([line])
                .consumer(env!("CARGO_PKG_NAME"))
                .active(active.into()),
        )?;
        Ok(GpiodOutput { line, lines })
    }

    /// Requests a group of output lines written together.
    pub fn output_bus<const N: usize>(
        &self,
        line_numbers: [u32; N],
        active: GpioActiveLevel,
        drive: GpioDriveMode,
    ) -> GpioResult<GpiodBusOutput<N>> {
        self.check_lines(&line_numbers)?;
        debug!("Requesting output bus {line_numbers:?} ({active:?}, {drive:?})");
        let lines = self.chip.request_lines(
            gpiod::Options::output(line_numbers)
                .consumer(env!("CARGO_PKG_NAME"))
                .active(active.into())
                .drive(drive.into()),
        )?;
        Ok(GpiodBusOutput {
            line_numbers,
            lines,
        })
    }

    /// Requests a group of input lines read together.
    pub fn input_bus<const N: usize>(
        &self,
        line_numbers: [u32; N],
        active: GpioActiveLevel,
        bias: GpioBias,
    ) -> GpioResult<GpiodBusInput<N>> {
        self.check_lines(&line_numbers)?;
        debug!("Requesting input bus {line_numbers:?} ({active:?}, {bias:?})");
        let lines = self.chip.request_lines(
            gpiod::Options::input(line_numbers)
                .consumer(env!("CARGO_PKG_NAME"))
                .active(active.into())
                .bias(bias.into()),
        )?;
        Ok(GpiodBusInput {
            line_numbers,
            lines,
        })
    }

    fn check_lines(&self, line_numbers: &[u32]) -> GpioResult<()> {
        let n = self.chip.num_lines();
        if line_numbers.iter().any(|&line| line >= n) {
            return Err(GpioError::InvalidArgument);
        }
        Ok(())
    }
}

impl Debug for GpiodChip {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodChip({})", self.chip.name())
    }
}

impl From<GpioActiveLevel> for gpiod::Active {
    fn from(level: GpioActiveLevel) -> Self {
        match level {
            GpioActiveLevel::High => gpiod::Active::High,
            GpioActiveLevel::Low => gpiod::Active::Low,
        }
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

impl From<GpioDriveMode> for gpiod::Drive {
    fn from(mode: GpioDriveMode) -> Self {
        match mode {
            GpioDriveMode::PushPull => gpiod::Drive::PushPull,
            GpioDriveMode::OpenDrain => gpiod::Drive::OpenDrain,
            GpioDriveMode::OpenSource => gpiod::Drive::OpenSource,
        }
    }
}

pub struct GpiodOutput {
    line: u32,
    lines: gpiod::Lines<gpiod::Output>,
}

impl Debug for GpiodOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodOutput[{}]", self.line)
    }
}

impl GpioOutput for GpiodOutput {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.lines.set_values([value])?;
        Ok(())
    }
}

pub struct GpiodBusOutput<const N: usize> {
    line_numbers: [u32; N],
    lines: gpiod::Lines<gpiod::Output>,
}

impl<const N: usize> Debug for GpiodBusOutput<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodBusOutput{:?}", self.line_numbers)
    }
}

impl<const N: usize> GpioBusOutput<N> for GpiodBusOutput<N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        self.lines.set_values(*values)?;
        Ok(())
    }
}

pub struct GpiodBusInput<const N: usize> {
    line_numbers: [u32; N],
    lines: gpiod::Lines<gpiod::Input>,
}

impl<const N: usize> Debug for GpiodBusInput<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodBusInput{:?}", self.line_numbers)
    }
}

impl<const N: usize> GpioBusInput<N> for GpiodBusInput<N> {
    fn read(&self) -> GpioResult<[bool; N]> {
        let values = self.lines.get_values([false; N])?;
        Ok(values)
    }
}
