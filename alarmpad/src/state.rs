//! The canonical alarm states as pushed by the alarm server.

/// Alarm state as authoritatively known to the remote alarm server.
///
/// The controller starts in `Unknown` and leaves it on the first notification,
/// never to return. `Countdown` and `Triggered` are only ever entered via
/// notification; no keypad command requests them.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AlarmState {
    Unknown,
    Disarmed,
    ArmedAway,
    ArmedHome,
    ArmedNight,
    Countdown,
    Triggered,
}

impl AlarmState {
    /// The name used on the command channel and the notification endpoints.
    pub fn command_name(self) -> &'static str {
        match self {
            AlarmState::Unknown => "unknown",
            AlarmState::Disarmed => "disarmed",
            AlarmState::ArmedAway => "armed_away",
            AlarmState::ArmedHome => "armed_home",
            AlarmState::ArmedNight => "armed_night",
            AlarmState::Countdown => "countdown",
            AlarmState::Triggered => "triggered",
        }
    }

    /// Parses a notification path segment. `unknown` is not accepted: the
    /// server never announces it.
    pub fn from_notification(name: &str) -> Option<AlarmState> {
        match name {
            "disarmed" => Some(AlarmState::Disarmed),
            "armed_away" => Some(AlarmState::ArmedAway),
            "armed_home" => Some(AlarmState::ArmedHome),
            "armed_night" => Some(AlarmState::ArmedNight),
            "countdown" => Some(AlarmState::Countdown),
            "triggered" => Some(AlarmState::Triggered),
            _ => None,
        }
    }

    /// The keypad command requested by a letter key.
    pub fn from_command_key(key: char) -> Option<AlarmState> {
        match key {
            'A' => Some(AlarmState::ArmedAway),
            'B' => Some(AlarmState::ArmedNight),
            'C' => Some(AlarmState::ArmedHome),
            'D' => Some(AlarmState::Disarmed),
            _ => None,
        }
    }
}
