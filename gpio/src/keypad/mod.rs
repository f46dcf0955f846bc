mod gpio;

use crate::GpioResult;
use std::fmt::Debug;
pub use gpio::*;

/// The `Keypad` trait defines the interface for keypad input devices.
///
/// A read reports every key currently held down, as the symbol printed on the
/// cap. Callers that want one event per physical press latch on the
/// transition themselves.
pub trait Keypad: Debug {
    fn read(&self) -> GpioResult<Vec<char>>;
}

/// Key layout of the common 4x4 membrane keypad.
pub const LAYOUT_4X4: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];
