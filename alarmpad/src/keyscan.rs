//! Keypad polling thread and the key-activity interrupt flag.

use crate::controller::Intent;
use alarmpad_gpio::keypad::Keypad;
use log::error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

const SCAN_INTERVAL: Duration = Duration::from_millis(10);

/// Raised by the scanner the instant a key goes down, cleared by the worker
/// when it consumes the key intent. The frame player polls it so that an
/// animation in progress is abandoned as soon as the operator touches the
/// keypad, before the intent itself is processed.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn raised(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Polls the keypad, emitting one intent per physical press.
///
/// After reporting a key the loop holds until that key reads released, so a
/// held key cannot repeat. Chorded presses are ignored: a scan that sees more
/// than one key reports nothing.
pub fn scan_loop(keypad: &dyn Keypad, tx: &UnboundedSender<Intent>, interrupt: &Interrupt) {
    loop {
        match keypad.read() {
            Ok(keys) => {
                if let [key] = keys[..] {
                    interrupt.raise();
                    if tx.send(Intent::Key(key)).is_err() {
                        return;
                    }
                    wait_for_release(keypad, key);
                }
            }
            Err(e) => error!("Keypad read failed: {e}"),
        }
        thread::sleep(SCAN_INTERVAL);
    }
}

fn wait_for_release(keypad: &dyn Keypad, key: char) {
    loop {
        match keypad.read() {
            Ok(keys) if !keys.contains(&key) => return,
            Ok(_) => {}
            // A failed read counts as "still held", so a transient error
            // cannot turn one press into two.
            Err(e) => error!("Keypad read failed: {e}"),
        }
        thread::sleep(SCAN_INTERVAL);
    }
}
