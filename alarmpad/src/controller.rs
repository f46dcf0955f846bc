//! The alarm keypad state machine.
//!
//! One worker thread owns a [Controller] and drains an [Intent] queue fed by
//! the keypad scanner, the 1 Hz ticker and the notification server, so every
//! mutation of the alarm state, the code buffer and the timers is serialized
//! through here. Network delivery happens on the dispatcher thread; this
//! module only ever enqueues.

use crate::annunciator::Annunciator;
use crate::command::{Command, CommandSink};
use crate::config::Timings;
use crate::keyscan::Interrupt;
use crate::render::{self, RenderIntent};
use crate::state::AlarmState;
use log::info;
use std::thread;
use std::time::{Duration, Instant};

/// Entered codes longer than this are silently dropped.
const CODE_CAP: usize = 8;

/// One unit of work for the controller worker.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Intent {
    /// A key symbol from the scanner: `0-9`, `A-D`, `*` or `#`.
    Key(char),
    /// A canonical state pushed by the alarm server.
    Canonical(AlarmState),
    /// The 1 Hz tick, carrying the wall-clock second-of-minute for the
    /// heartbeat alignment.
    Tick { second: u8 },
}

/// An arm request awaiting its exit grace period.
///
/// All three pieces travel together by construction: the target, the code
/// captured at the moment the request was made (the live buffer is cleared
/// right after), and when the grace period started.
struct PendingExit {
    target: AlarmState,
    code: String,
    since: Instant,
}

pub struct Controller {
    timings: Timings,
    state: AlarmState,
    code: String,
    last_key_press: Option<Instant>,
    last_state_change: Option<Instant>,
    last_command: Option<Instant>,
    pending_exit: Option<PendingExit>,
    heartbeat_channel: usize,
    skip_heartbeat: bool,
    out: Box<dyn Annunciator>,
    commands: Box<dyn CommandSink>,
    interrupt: Interrupt,
}

impl Controller {
    pub fn new(
        timings: Timings,
        out: Box<dyn Annunciator>,
        commands: Box<dyn CommandSink>,
        interrupt: Interrupt,
    ) -> Controller {
        Controller {
            timings,
            state: AlarmState::Unknown,
            code: String::new(),
            last_key_press: None,
            last_state_change: None,
            last_command: None,
            pending_exit: None,
            heartbeat_channel: 0,
            skip_heartbeat: false,
            out,
            commands,
            interrupt,
        }
    }

    pub fn handle(&mut self, now: Instant, intent: Intent) {
        match intent {
            Intent::Key(key) => {
                self.interrupt.clear();
                self.on_key(now, key);
            }
            Intent::Canonical(state) => self.on_canonical(now, state),
            Intent::Tick { second } => self.tick(now, second),
        }
    }

    /// Handles one key symbol. Total over `char`: symbols outside the keypad
    /// alphabet are ignored. Any press cancels a pending exit first.
    pub fn on_key(&mut self, now: Instant, key: char) {
        self.pending_exit = None;
        info!("Key pressed: {key}");
        match key {
            '0'..='9' => self.handle_digit(now, key),
            'A'..='D' => self.handle_command(now, key),
            '*' => self.handle_delete(now),
            '#' => self.handle_show_state(now),
            _ => {}
        }
    }

    /// Handles an authoritative state push from the alarm server. Never
    /// dispatches anything; the decision was made upstream.
    pub fn on_canonical(&mut self, now: Instant, state: AlarmState) {
        self.state = state;
        self.last_state_change = Some(now);
        self.pending_exit = None;
        info!("Alarm state set to {}", state.command_name());
    }

    /// The 1 Hz tick: expires the code buffer and the grace period, then
    /// renders exactly one pattern for this second.
    pub fn tick(&mut self, now: Instant, second: u8) {
        if self.key_active(now) {
            // The operator is typing; the progress indicator owns the LEDs.
            return;
        }
        self.code.clear();

        let expired = self
            .pending_exit
            .as_ref()
            .is_some_and(|p| now.saturating_duration_since(p.since) >= self.timings.exit_timeout());
        if expired {
            if let Some(pending) = self.pending_exit.take() {
                info!("Grace period expired");
                self.commands
                    .submit(Command::new(pending.target.command_name(), &pending.code));
            }
            return;
        }

        let intent = self.render_intent(now, second);
        let frames = render::frames_for(intent, &self.timings);
        render::play(&frames, self.out.as_mut(), &self.interrupt);
    }

    fn handle_digit(&mut self, now: Instant, key: char) {
        if self.code.len() < CODE_CAP {
            self.last_key_press = Some(now);
            self.code.push(key);
            info!("Code entered: {} digits", self.code.len());
            self.out.set_leds(render::code_length_leds(self.code.len()));
            self.beep(self.timings.digit_beep_ms);
        }
    }

    fn handle_command(&mut self, now: Instant, key: char) {
        if self.code.is_empty() {
            return;
        }
        let Some(target) = AlarmState::from_command_key(key) else {
            return;
        };
        if self.state != AlarmState::Countdown && self.state != AlarmState::Triggered {
            if target == AlarmState::ArmedAway || target == AlarmState::ArmedNight {
                info!(
                    "Grace period entered for state change to: {}",
                    target.command_name()
                );
                self.beep(self.timings.command_beep_ms);
                self.out.set_leds(render::state_leds(target));
                self.pending_exit = Some(PendingExit {
                    target,
                    code: self.code.clone(),
                    since: now,
                });
                self.last_command = Some(now);
                self.commands.submit(Command::new("validate", &self.code));
            } else {
                self.beep(self.timings.command_beep_ms);
                self.last_command = Some(now);
                self.commands
                    .submit(Command::new(target.command_name(), &self.code));
            }
        } else if target == AlarmState::Disarmed {
            // While the alarm is counting down or sounding, disarm is the
            // only command the keypad honors.
            self.beep(self.timings.command_beep_ms);
            self.commands.submit(Command::new("disarmed", &self.code));
        }
        self.last_key_press = None;
        self.code.clear();
    }

    fn handle_delete(&mut self, now: Instant) {
        if self.code.is_empty() {
            return;
        }
        self.last_key_press = Some(now);
        self.code.pop();
        info!("Code entered: {} digits", self.code.len());
        self.out.set_leds(render::code_length_leds(self.code.len()));
        self.beep(self.timings.digit_beep_ms);
    }

    fn handle_show_state(&mut self, now: Instant) {
        self.code.clear();
        self.last_key_press = None;
        self.last_state_change = Some(now);
        info!("Showing current state: {}", self.state.command_name());
        self.out.set_leds(render::state_leds(self.state));
        self.beep(self.timings.command_beep_ms);
    }

    /// The rendering decision table, highest priority first.
    fn render_intent(&mut self, now: Instant, second: u8) -> RenderIntent {
        if self.state == AlarmState::Triggered {
            self.skip_heartbeat = true;
            return RenderIntent::Strobe;
        }
        if self.state == AlarmState::Countdown {
            self.skip_heartbeat = true;
            let warning = !self.within(self.last_state_change, now, self.timings.countdown_warning());
            return RenderIntent::Chase { warning };
        }
        if let Some(pending) = &self.pending_exit {
            self.skip_heartbeat = true;
            let warning =
                now.saturating_duration_since(pending.since) >= self.timings.exit_warning();
            return RenderIntent::Grace {
                target: pending.target,
                warning,
            };
        }
        if self.within(self.last_state_change, now, self.timings.state_display_window()) {
            self.skip_heartbeat = true;
            return RenderIntent::StateDisplay(self.state);
        }

        let period = self.timings.heartbeat_period_s;
        let aligned = period > 0 && second % period == 0;
        if aligned && !self.command_active(now) && !self.skip_heartbeat {
            let channel = self.heartbeat_channel;
            self.heartbeat_channel = (channel + 1) % 4;
            RenderIntent::Heartbeat { channel }
        } else {
            self.skip_heartbeat = false;
            RenderIntent::Rest
        }
    }

    fn beep(&mut self, ms: u64) {
        self.out.set_buzzer(true);
        if ms > 0 {
            thread::sleep(Duration::from_millis(ms));
        }
        self.out.set_buzzer(false);
    }

    fn key_active(&self, now: Instant) -> bool {
        self.within(self.last_key_press, now, self.timings.key_press_window())
    }

    fn command_active(&self, now: Instant) -> bool {
        self.within(self.last_command, now, self.timings.command_window())
    }

    fn within(&self, timer: Option<Instant>, now: Instant, window: Duration) -> bool {
        timer.is_some_and(|t| now.saturating_duration_since(t) < window)
    }

    #[cfg(test)]
    fn code_len(&self) -> usize {
        self.code.len()
    }

    #[cfg(test)]
    fn pending(&self) -> Option<(AlarmState, &str)> {
        self.pending_exit
            .as_ref()
            .map(|p| (p.target, p.code.as_str()))
    }

    #[cfg(test)]
    fn state(&self) -> AlarmState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annunciator::test_support::RecordingAnnunciator;
    use crate::command::test_support::RecordingSink;
    use crate::render::{Leds, code_length_leds, state_leds};
    use pretty_assertions::assert_eq;

    struct Fixture {
        controller: Controller,
        out: RecordingAnnunciator,
        sink: RecordingSink,
        interrupt: Interrupt,
        t0: Instant,
    }

    impl Fixture {
        fn at(&self, seconds: u64) -> Instant {
            self.t0 + Duration::from_secs(seconds)
        }

        fn type_code(&mut self, at: Instant, code: &str) {
            for digit in code.chars() {
                self.controller.on_key(at, digit);
            }
        }
    }

    fn fixture() -> Fixture {
        // Zero hold/beep durations so tests never sleep; the windows keep
        // their real defaults and are exercised with injected instants.
        let timings = Timings {
            flash_hold_ms: 0,
            digit_beep_ms: 0,
            command_beep_ms: 0,
            ..Timings::default()
        };
        let out = RecordingAnnunciator::default();
        let sink = RecordingSink::default();
        let interrupt = Interrupt::new();
        let controller = Controller::new(
            timings,
            Box::new(out.clone()),
            Box::new(sink.clone()),
            interrupt.clone(),
        );
        Fixture {
            controller,
            out,
            sink,
            interrupt,
            t0: Instant::now(),
        }
    }

    // --- code entry ---

    #[test]
    fn digits_accumulate_and_show_the_progress_indicator() {
        let mut f = fixture();
        let now = f.at(0);
        for (i, digit) in "12345678".chars().enumerate() {
            f.controller.on_key(now, digit);
            assert_eq!(f.out.last_leds(), Some(code_length_leds(i + 1)));
        }
        assert_eq!(f.controller.code_len(), 8);
    }

    #[test]
    fn digits_past_the_cap_are_dropped_entirely() {
        let mut f = fixture();
        let now = f.at(0);
        for digit in "1234567890".chars() {
            f.controller.on_key(now, digit);
        }
        assert_eq!(f.controller.code_len(), 8);
        // 8 progress renders, not 10: the dropped presses emit nothing.
        assert_eq!(f.out.leds().len(), 8);
    }

    #[test]
    fn delete_removes_the_last_digit_and_rerenders() {
        let mut f = fixture();
        let now = f.at(0);
        f.type_code(now, "123");
        f.controller.on_key(now, '*');
        assert_eq!(f.controller.code_len(), 2);
        assert_eq!(f.out.last_leds(), Some(code_length_leds(2)));
    }

    #[test]
    fn delete_on_empty_code_is_a_no_op() {
        let mut f = fixture();
        f.controller.on_key(f.at(0), '*');
        assert!(f.out.leds().is_empty());
        assert!(f.out.buzzer().is_empty());
        // No timer was touched: the very next tick still heartbeats.
        f.controller.tick(f.at(1), 0);
        assert!(!f.out.leds().is_empty());
    }

    #[test]
    fn symbols_outside_the_alphabet_are_ignored() {
        let mut f = fixture();
        for key in ['E', 'x', '!', '\n'] {
            f.controller.on_key(f.at(0), key);
        }
        assert_eq!(f.controller.code_len(), 0);
        assert!(f.out.leds().is_empty());
        assert!(f.sink.commands().is_empty());
    }

    #[test]
    fn code_expires_one_key_window_after_the_last_press() {
        let mut f = fixture();
        f.type_code(f.at(0), "123");
        f.controller.tick(f.at(6), 1);
        assert_eq!(f.controller.code_len(), 0);
    }

    // --- letter commands ---

    #[test]
    fn letter_with_empty_code_does_nothing() {
        let mut f = fixture();
        f.controller.on_key(f.at(0), 'A');
        assert!(f.sink.commands().is_empty());
        assert_eq!(f.controller.pending(), None);
    }

    #[test]
    fn disarm_and_arm_home_dispatch_directly() {
        let mut f = fixture();
        f.type_code(f.at(0), "1234");
        f.controller.on_key(f.at(1), 'D');
        f.type_code(f.at(2), "1234");
        f.controller.on_key(f.at(3), 'C');
        assert_eq!(
            f.sink.commands(),
            vec![
                Command::new("disarmed", "1234"),
                Command::new("armed_home", "1234"),
            ]
        );
        assert_eq!(f.controller.pending(), None);
    }

    #[test]
    fn arm_away_enters_grace_and_sends_validate() {
        let mut f = fixture();
        f.controller.on_canonical(f.at(0), AlarmState::Disarmed);
        f.type_code(f.at(10), "1234");
        f.controller.on_key(f.at(11), 'A');

        assert_eq!(f.controller.pending(), Some((AlarmState::ArmedAway, "1234")));
        assert_eq!(f.sink.commands(), vec![Command::new("validate", "1234")]);
        assert_eq!(f.controller.code_len(), 0);
        assert_eq!(f.out.last_leds(), Some(state_leds(AlarmState::ArmedAway)));
    }

    #[test]
    fn arm_night_enters_grace_too() {
        let mut f = fixture();
        f.type_code(f.at(0), "55");
        f.controller.on_key(f.at(1), 'B');
        assert_eq!(f.controller.pending(), Some((AlarmState::ArmedNight, "55")));
    }

    #[test]
    fn only_disarm_is_honored_during_countdown_and_triggered() {
        for state in [AlarmState::Countdown, AlarmState::Triggered] {
            let mut f = fixture();
            f.controller.on_canonical(f.at(0), state);
            for letter in ['A', 'B', 'C'] {
                f.type_code(f.at(1), "1234");
                f.controller.on_key(f.at(2), letter);
            }
            assert!(f.sink.commands().is_empty());
            assert_eq!(f.controller.pending(), None);

            f.type_code(f.at(3), "1234");
            f.controller.on_key(f.at(4), 'D');
            assert_eq!(f.sink.commands(), vec![Command::new("disarmed", "1234")]);
        }
    }

    // --- grace period ---

    fn enter_grace(f: &mut Fixture) -> Instant {
        f.controller.on_canonical(f.at(0), AlarmState::Disarmed);
        f.type_code(f.at(10), "1234");
        let entered = f.at(11);
        f.controller.on_key(entered, 'A');
        entered
    }

    #[test]
    fn any_key_cancels_a_pending_grace_period() {
        for key in ['5', '*', '#', 'D', '?'] {
            let mut f = fixture();
            enter_grace(&mut f);
            f.controller.on_key(f.at(12), key);
            assert_eq!(f.controller.pending(), None, "key {key:?}");
        }
    }

    #[test]
    fn canonical_notification_cancels_grace_without_dispatch() {
        let mut f = fixture();
        enter_grace(&mut f);
        f.controller.on_canonical(f.at(12), AlarmState::ArmedAway);
        assert_eq!(f.controller.pending(), None);
        // Only the validate pre-check ever went out.
        assert_eq!(f.sink.commands(), vec![Command::new("validate", "1234")]);
    }

    #[test]
    fn grace_commits_the_captured_code_exactly_once_at_expiry() {
        let mut f = fixture();
        enter_grace(&mut f);

        // One second short of expiry: still pending, nothing new sent.
        f.controller.tick(f.at(50), 0);
        assert!(f.controller.pending().is_some());
        assert_eq!(f.sink.commands().len(), 1);

        // At expiry (entered at t=11, timeout 40 s).
        f.controller.tick(f.at(51), 0);
        assert_eq!(
            f.sink.commands(),
            vec![
                Command::new("validate", "1234"),
                Command::new("armed_away", "1234"),
            ]
        );
        assert_eq!(f.controller.pending(), None);

        // Further ticks must not re-fire.
        f.controller.tick(f.at(52), 0);
        f.controller.tick(f.at(60), 0);
        assert_eq!(f.sink.commands().len(), 2);
    }

    #[test]
    fn grace_commit_uses_the_code_captured_at_entry() {
        let mut f = fixture();
        enter_grace(&mut f);
        // The buffer was cleared at entry; whatever happens to it afterwards
        // must not leak into the deferred command.
        assert_eq!(f.controller.code_len(), 0);
        f.controller.tick(f.at(51), 0);
        assert_eq!(f.sink.commands()[1], Command::new("armed_away", "1234"));
    }

    #[test]
    fn status_key_cancels_grace_so_no_arm_ever_fires() {
        let mut f = fixture();
        enter_grace(&mut f);
        f.controller.on_key(f.at(20), '#');
        f.controller.tick(f.at(60), 0);
        f.controller.tick(f.at(120), 0);
        assert_eq!(f.sink.commands(), vec![Command::new("validate", "1234")]);
    }

    // --- canonical notifications ---

    #[test]
    fn first_notification_leaves_unknown_for_good() {
        let mut f = fixture();
        assert_eq!(f.controller.state(), AlarmState::Unknown);
        f.controller.on_canonical(f.at(0), AlarmState::Disarmed);
        assert_eq!(f.controller.state(), AlarmState::Disarmed);
        assert!(f.sink.commands().is_empty());
        // The state-display window is now live.
        f.controller.tick(f.at(1), 1);
        assert_eq!(f.out.leds()[0], state_leds(AlarmState::Disarmed));
    }

    #[test]
    fn repeated_notifications_are_idempotent() {
        let mut f = fixture();
        f.controller.on_canonical(f.at(0), AlarmState::ArmedHome);
        f.controller.on_canonical(f.at(1), AlarmState::ArmedHome);
        assert_eq!(f.controller.state(), AlarmState::ArmedHome);
        assert!(f.sink.commands().is_empty());
    }

    #[test]
    fn status_key_shows_the_canonical_state() {
        let mut f = fixture();
        f.controller.on_canonical(f.at(0), AlarmState::ArmedNight);
        f.type_code(f.at(10), "12");
        f.controller.on_key(f.at(11), '#');
        assert_eq!(f.out.last_leds(), Some(state_leds(AlarmState::ArmedNight)));
        assert_eq!(f.controller.code_len(), 0);
    }

    // --- tick rendering ---

    #[test]
    fn tick_is_suppressed_while_the_operator_is_typing() {
        let mut f = fixture();
        f.type_code(f.at(0), "12");
        let writes = f.out.leds().len();
        f.controller.tick(f.at(1), 0);
        assert_eq!(f.out.leds().len(), writes);
        // The code survives a suppressed tick.
        assert_eq!(f.controller.code_len(), 2);
    }

    #[test]
    fn triggered_renders_the_strobe() {
        let mut f = fixture();
        f.controller.on_canonical(f.at(0), AlarmState::Triggered);
        f.controller.tick(f.at(1), 0);
        assert_eq!(f.out.leds()[0], Leds::ALL);
    }

    #[test]
    fn countdown_chase_escalates_after_the_warning_threshold() {
        let mut f = fixture();
        f.controller.on_canonical(f.at(0), AlarmState::Countdown);
        f.controller.tick(f.at(1), 1);
        // Information phase: one beep per tick.
        assert_eq!(f.out.buzzer(), vec![true, false]);

        f.controller.tick(f.at(21), 1);
        // Warning phase: two beeps per tick.
        assert_eq!(f.out.buzzer(), vec![true, false, true, false, true, false]);
    }

    #[test]
    fn grace_pattern_escalates_after_the_warning_threshold() {
        let mut f = fixture();
        enter_grace(&mut f);

        f.controller.tick(f.at(20), 0);
        let early_beeps = f.out.buzzer().len();
        f.controller.tick(f.at(45), 0);
        // The late pattern beeps twice where the early one beeps once.
        assert_eq!(f.out.buzzer().len(), early_beeps + 4);
    }

    #[test]
    fn heartbeat_fires_only_on_aligned_seconds_and_cycles_channels() {
        let mut f = fixture();
        f.controller.tick(f.at(0), 1);
        assert_eq!(f.out.leds()[0], Leds::OFF);

        f.controller.tick(f.at(1), 4);
        assert_eq!(f.out.leds()[4], Leds::single(0));

        f.controller.tick(f.at(5), 8);
        assert_eq!(f.out.leds()[8], Leds::single(1));
    }

    #[test]
    fn heartbeat_is_quiet_inside_the_command_window() {
        let mut f = fixture();
        f.type_code(f.at(0), "1234");
        f.controller.on_key(f.at(1), 'C');

        // 2 s after the command: aligned second, but still inside the 4 s
        // command window.
        let writes = f.out.leds().len();
        f.controller.tick(f.at(3), 0);
        assert_eq!(f.out.leds()[writes], Leds::OFF);

        // Well past the window: heartbeat resumes.
        let writes = f.out.leds().len();
        f.controller.tick(f.at(30), 0);
        assert_eq!(f.out.leds()[writes], Leds::single(0));
    }

    #[test]
    fn heartbeat_skips_one_beat_after_a_state_display() {
        let mut f = fixture();
        f.controller.on_canonical(f.at(0), AlarmState::Disarmed);
        f.controller.tick(f.at(1), 0);

        // Display window over; the first aligned tick after a pattern rests.
        let writes = f.out.leds().len();
        f.controller.tick(f.at(10), 0);
        assert_eq!(f.out.leds()[writes], Leds::OFF);

        // The one after flashes.
        let writes = f.out.leds().len();
        f.controller.tick(f.at(14), 0);
        assert_eq!(f.out.leds()[writes], Leds::single(0));
    }

    #[test]
    fn a_raised_interrupt_abandons_the_tick_render() {
        let mut f = fixture();
        f.controller.on_canonical(f.at(0), AlarmState::Triggered);
        f.interrupt.raise();
        f.controller.tick(f.at(10), 0);
        assert!(f.out.leds().is_empty());
    }

    #[test]
    fn handling_a_key_intent_clears_the_interrupt() {
        let mut f = fixture();
        f.interrupt.raise();
        f.controller.handle(f.at(0), Intent::Key('5'));
        assert!(!f.interrupt.raised());
        assert_eq!(f.controller.code_len(), 1);
    }
}
