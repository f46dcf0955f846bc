use crate::keypad::Keypad;
use crate::{GpioBusInput, GpioBusOutput, GpioResult};
use std::fmt::{Debug, Formatter};

/// A matrix keypad scanned over GPIO buses: `C` column lines strobed one at a
/// time, `R` row lines read back, with a `char` per switch position.
///
/// Columns are expected to be open-drain active-low and rows pulled up
/// active-low, so a pressed key reads logically true in the strobed column.
pub struct MatrixKeypad<const R: usize, const C: usize> {
    layout: [[char; C]; R],
    cols: Box<dyn GpioBusOutput<C>>,
    rows: Box<dyn GpioBusInput<R>>,
}

impl<const R: usize, const C: usize> Debug for MatrixKeypad<R, C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatrixKeypad({:?}, {:?})", self.cols, self.rows)
    }
}

impl<const R: usize, const C: usize> MatrixKeypad<R, C> {
    pub fn new(
        layout: [[char; C]; R],
        cols: Box<dyn GpioBusOutput<C>>,
        rows: Box<dyn GpioBusInput<R>>,
    ) -> Self {
        MatrixKeypad { layout, cols, rows }
    }
}

impl<const R: usize, const C: usize> Keypad for MatrixKeypad<R, C> {
    fn read(&self) -> GpioResult<Vec<char>> {
        let mut pressed = Vec::new();

        for col in 0..C {
            self.cols.write_one_hot(col)?;
            let rows = self.rows.read()?;
            for (row, &active) in rows.iter().enumerate() {
                if active {
                    pressed.push(self.layout[row][col]);
                }
            }
        }
        self.cols.write(&[false; C])?;

        Ok(pressed)
    }
}
