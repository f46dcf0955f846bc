use dotenv::var;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::env::var_os;
use std::path::Path;
use std::time::Duration;

/// Every timing threshold of the controller, in one tweakable place.
///
/// The deployed keypads have historically disagreed on these values, so they
/// are configuration rather than constants. The defaults are the values the
/// hallway unit runs with.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Timings {
    /// How long after the last digit/star press the display is left alone
    /// and, once elapsed, the entered code is discarded.
    pub key_press_window_ms: u64,
    /// How long a freshly announced state is shown before the heartbeat
    /// resumes.
    pub state_display_window_ms: u64,
    /// How long after a dispatched command the heartbeat stays quiet.
    pub command_window_ms: u64,
    /// Grace period: start of the escalated warning pattern.
    pub exit_warning_ms: u64,
    /// Grace period: automatic commit of the pending arm command.
    pub exit_timeout_ms: u64,
    /// Countdown display: switch from the information to the warning pattern
    /// this long after the countdown notification.
    pub countdown_warning_ms: u64,
    /// Heartbeat flashes only when the second-of-minute is a multiple of
    /// this.
    pub heartbeat_period_s: u8,
    /// Hold time of one step of any flash pattern.
    pub flash_hold_ms: u64,
    /// Acknowledgment beep for digit entry and delete.
    pub digit_beep_ms: u64,
    /// Acknowledgment beep for a command or status request.
    pub command_beep_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            key_press_window_ms: 5_000,
            state_display_window_ms: 6_000,
            command_window_ms: 4_000,
            exit_warning_ms: 30_000,
            exit_timeout_ms: 40_000,
            countdown_warning_ms: 20_000,
            heartbeat_period_s: 4,
            flash_hold_ms: 250,
            digit_beep_ms: 100,
            command_beep_ms: 250,
        }
    }
}

impl Timings {
    pub fn try_load() -> Option<Self> {
        let config_str = var_os("ALARMPAD_TIMINGS_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("timings.json"));
        let config_path = Path::new(config_str);
        if config_path.exists() {
            let file = std::fs::File::open(config_path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader).ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let config_str = var("ALARMPAD_TIMINGS_FILE").unwrap_or_else(|_| "timings.json".to_string());
        let config_path = Path::new(&config_str);
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn key_press_window(&self) -> Duration {
        Duration::from_millis(self.key_press_window_ms)
    }

    pub fn state_display_window(&self) -> Duration {
        Duration::from_millis(self.state_display_window_ms)
    }

    pub fn command_window(&self) -> Duration {
        Duration::from_millis(self.command_window_ms)
    }

    pub fn exit_warning(&self) -> Duration {
        Duration::from_millis(self.exit_warning_ms)
    }

    pub fn exit_timeout(&self) -> Duration {
        Duration::from_millis(self.exit_timeout_ms)
    }

    pub fn countdown_warning(&self) -> Duration {
        Duration::from_millis(self.countdown_warning_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_escalate_in_order() {
        let timings = Timings::default();
        assert!(timings.exit_warning() < timings.exit_timeout());
        assert!(timings.countdown_warning() > timings.state_display_window());
    }

    #[test]
    fn serializes_round_trip() {
        let timings = Timings::default();
        let json = serde_json::to_string(&timings).unwrap();
        let back: Timings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.exit_timeout_ms, timings.exit_timeout_ms);
        assert_eq!(back.heartbeat_period_s, timings.heartbeat_period_s);
    }
}
