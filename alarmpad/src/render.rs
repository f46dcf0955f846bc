//! Flash-pattern rendering: what the four LEDs and the buzzer do each tick.
//!
//! Rendering precedence is a data fact, not control flow: the controller
//! computes one [RenderIntent] per tick and this module turns it into a short
//! frame sequence and plays it. Playback re-checks key activity before every
//! frame, so typing always pre-empts an animation mid-sequence.

use crate::annunciator::Annunciator;
use crate::config::Timings;
use crate::keyscan::Interrupt;
use crate::state::AlarmState;
use std::thread;
use std::time::Duration;

/// Logical state of the four-channel annunciator.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Leds {
    pub red: bool,
    pub amber: bool,
    pub green: bool,
    pub blue: bool,
}

impl Leds {
    pub const OFF: Leds = Leds {
        red: false,
        amber: false,
        green: false,
        blue: false,
    };

    pub const ALL: Leds = Leds {
        red: true,
        amber: true,
        green: true,
        blue: true,
    };

    /// One channel lit, in heartbeat cycle order: red, amber, green, blue.
    pub fn single(channel: usize) -> Leds {
        Leds {
            red: channel % 4 == 0,
            amber: channel % 4 == 1,
            green: channel % 4 == 2,
            blue: channel % 4 == 3,
        }
    }
}

/// One step of a flash pattern. The buzzer sounds for the duration of the
/// hold and is silenced when the frame ends.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    pub leds: Leds,
    pub buzzer: bool,
    pub hold_ms: u64,
}

impl Frame {
    fn new(leds: Leds, buzzer: bool, hold_ms: u64) -> Frame {
        Frame {
            leds,
            buzzer,
            hold_ms,
        }
    }
}

/// What this tick should show, in priority order (highest first).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RenderIntent {
    /// Alarm sounding: all channels strobing.
    Strobe,
    /// Entry countdown running: directional chase, with a louder second
    /// phase once the countdown has been going a while.
    Chase { warning: bool },
    /// Exit grace period pending: requested state's color pulsing, beeping
    /// twice per tick once the warning threshold has passed.
    Grace {
        target: AlarmState,
        warning: bool,
    },
    /// A canonical state was announced recently: show its color.
    StateDisplay(AlarmState),
    /// Idle, aligned second: one channel of the heartbeat cycle.
    Heartbeat { channel: usize },
    /// Idle, off-beat second: all quiet.
    Rest,
}

/// The fixed color for a canonical state: one LED per armed mode, blue for
/// disarmed, nothing for the rest.
pub fn state_leds(state: AlarmState) -> Leds {
    Leds {
        red: state == AlarmState::ArmedAway,
        amber: state == AlarmState::ArmedNight,
        green: state == AlarmState::ArmedHome,
        blue: state == AlarmState::Disarmed,
    }
}

/// Progress indicator for an entered code of length `len`: a bijective
/// encoding of the length so the operator can count digits without the
/// display revealing them.
pub fn code_length_leds(len: usize) -> Leds {
    let wrap = len % 8 >= 5;
    Leds {
        red: wrap ^ (len % 4 == 1),
        amber: wrap ^ (len % 4 == 2),
        green: wrap ^ (len % 4 == 3),
        blue: wrap ^ (len > 0 && len % 4 == 0),
    }
}

/// Expands a render intent into its frame sequence. Every pattern is four
/// frames long, the last held at zero so it stays up until the next tick.
pub fn frames_for(intent: RenderIntent, timings: &Timings) -> [Frame; 4] {
    let hold = timings.flash_hold_ms;
    match intent {
        RenderIntent::Strobe => [
            Frame::new(Leds::ALL, false, hold),
            Frame::new(Leds::OFF, false, hold),
            Frame::new(Leds::ALL, false, hold),
            Frame::new(Leds::OFF, false, 0),
        ],
        RenderIntent::Chase { warning } => [
            Frame::new(Leds::single(3), true, hold),
            Frame::new(Leds::single(2), false, hold),
            Frame::new(Leds::single(1), warning, hold),
            Frame::new(Leds::single(0), false, 0),
        ],
        RenderIntent::Grace { target, warning } => [
            Frame::new(state_leds(target), true, hold),
            Frame::new(Leds::OFF, false, hold),
            Frame::new(state_leds(target), warning, hold),
            Frame::new(Leds::OFF, false, 0),
        ],
        RenderIntent::StateDisplay(state) => [
            Frame::new(state_leds(state), false, hold),
            Frame::new(Leds::OFF, false, hold),
            Frame::new(state_leds(state), false, hold),
            Frame::new(Leds::OFF, false, 0),
        ],
        RenderIntent::Heartbeat { channel } => [
            Frame::new(Leds::single(channel), false, hold),
            Frame::new(Leds::OFF, false, hold),
            Frame::new(Leds::OFF, false, hold),
            Frame::new(Leds::OFF, false, 0),
        ],
        RenderIntent::Rest => [
            Frame::new(Leds::OFF, false, hold),
            Frame::new(Leds::OFF, false, hold),
            Frame::new(Leds::OFF, false, hold),
            Frame::new(Leds::OFF, false, 0),
        ],
    }
}

/// Plays a frame sequence, abandoning it the moment a key press is observed.
pub fn play(frames: &[Frame], out: &mut dyn Annunciator, interrupt: &Interrupt) {
    for frame in frames {
        if interrupt.raised() {
            return;
        }
        out.set_leds(frame.leds);
        if frame.buzzer {
            out.set_buzzer(true);
        }
        if frame.hold_ms > 0 {
            thread::sleep(Duration::from_millis(frame.hold_ms));
        }
        if frame.buzzer {
            out.set_buzzer(false);
        }
    }
}
