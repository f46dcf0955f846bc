//! The output side of the keypad: four status LEDs and a piezo buzzer.

use crate::render::Leds;
use alarmpad_gpio::GpioOutput;
use log::warn;

/// Output sink for the LED/buzzer board. Implementations are side-effect
/// only; a failed write must never surface into the state machine.
pub trait Annunciator: Send {
    fn set_leds(&mut self, leds: Leds);
    fn set_buzzer(&mut self, on: bool);
}

/// Annunciator backed by five GPIO output lines.
///
/// The LED lines are requested active-low (the board sinks current through
/// the LEDs) and the buzzer active-high; polarity is settled at request time
/// so this type only deals in logical values.
pub struct GpioAnnunciator {
    red: Box<dyn GpioOutput>,
    amber: Box<dyn GpioOutput>,
    green: Box<dyn GpioOutput>,
    blue: Box<dyn GpioOutput>,
    buzzer: Box<dyn GpioOutput>,
}

impl GpioAnnunciator {
    pub fn new(
        red: Box<dyn GpioOutput>,
        amber: Box<dyn GpioOutput>,
        green: Box<dyn GpioOutput>,
        blue: Box<dyn GpioOutput>,
        buzzer: Box<dyn GpioOutput>,
    ) -> Self {
        GpioAnnunciator {
            red,
            amber,
            green,
            blue,
            buzzer,
        }
    }

    fn write(line: &dyn GpioOutput, value: bool) {
        if let Err(e) = line.write(value) {
            warn!("Failed to write {line:?}: {e}");
        }
    }
}

impl Annunciator for GpioAnnunciator {
    fn set_leds(&mut self, leds: Leds) {
        Self::write(&*self.red, leds.red);
        Self::write(&*self.amber, leds.amber);
        Self::write(&*self.green, leds.green);
        Self::write(&*self.blue, leds.blue);
    }

    fn set_buzzer(&mut self, on: bool) {
        Self::write(&*self.buzzer, on);
    }
}
