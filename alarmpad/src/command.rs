//! Outbound command channel to the alarm server.
//!
//! The worker never talks to the network itself: it drops a [Command] on a
//! channel and moves on, so a slow remote call can never stall key handling.
//! A dedicated dispatcher thread delivers each command as a create/clear
//! pair: POST with the JSON payload, then DELETE with an empty body, both
//! bearer-authenticated. Failures are logged and dropped; the keypad shows
//! nothing different and nothing is retried.

use log::{error, info};
use serde_json::json;
use std::sync::mpsc::Receiver;
use std::time::Duration;
use thiserror::Error;

const HTTP_TIMEOUT: Duration = Duration::from_secs(9);

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Command {
    pub state: String,
    pub code: String,
}

impl Command {
    pub fn new(state: &str, code: &str) -> Command {
        Command {
            state: state.to_string(),
            code: code.to_string(),
        }
    }

    /// The wire payload: `{"state": "<name>"}`, with the code appended after
    /// a single space when present.
    pub fn payload(&self) -> serde_json::Value {
        let state = if self.code.is_empty() {
            self.state.clone()
        } else {
            format!("{} {}", self.state, self.code)
        };
        json!({ "state": state })
    }
}

/// Where the controller hands off commands. The real implementation is a
/// channel into the dispatcher thread; tests substitute a recorder.
pub trait CommandSink: Send {
    fn submit(&self, command: Command);
}

pub struct ChannelSink(pub std::sync::mpsc::Sender<Command>);

impl CommandSink for ChannelSink {
    fn submit(&self, command: Command) {
        // The dispatcher outlives the worker in normal operation; during
        // shutdown a dropped receiver just swallows the command.
        let _ = self.0.send(command);
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct Dispatcher {
    endpoint: String,
    token: String,
    client: reqwest::blocking::Client,
}

impl Dispatcher {
    pub fn new(endpoint: String, token: String) -> Result<Dispatcher, DispatchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Dispatcher {
            endpoint,
            token,
            client,
        })
    }

    /// Drains the command channel until every sender is gone.
    pub fn run(&self, rx: Receiver<Command>) {
        for command in rx {
            info!("Sending command to update state to: {}", command.state);
            if let Err(e) = self.deliver(&command) {
                error!("Failed to send {} command: {e}", command.state);
            }
        }
    }

    fn deliver(&self, command: &Command) -> Result<(), DispatchError> {
        self.client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&command.payload())
            .send()?
            .error_for_status()?;

        self.client
            .delete(&self.endpoint)
            .bearer_auth(&self.token)
            .body("")
            .send()?
            .error_for_status()?;

        Ok(())
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records submitted commands for inspection; clones share the record.
    #[derive(Clone, Default)]
    pub struct RecordingSink {
        commands: Arc<Mutex<Vec<Command>>>,
    }

    impl RecordingSink {
        pub fn commands(&self) -> Vec<Command> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl CommandSink for RecordingSink {
        fn submit(&self, command: Command) {
            self.commands.lock().unwrap().push(command);
        }
    }
}
