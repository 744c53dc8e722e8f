// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound command decoding and dispatch.
//!
//! Exactly three commands exist: `on`, `off`, `status`. The dispatcher maps
//! each to a controller action under a fixed execution bound and decides what
//! status to report. Power commands publish their desired state
//! optimistically on success; any failure or timeout reports `unknown`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::controller::DisplayController;
use crate::error::{HardwareError, ParseError};
use crate::exec::CommandRunner;
use crate::types::DisplayState;

/// Upper bound on a single hardware command. The vendor tools settle well
/// below this; anything longer is treated as hung.
const COMMAND_BOUND: Duration = Duration::from_secs(10);

/// A recognized display command.
///
/// # Examples
///
/// ```
/// use displayctl::Command;
///
/// let command: Command = " ON ".parse().unwrap();
/// assert_eq!(command, Command::On);
/// assert!("reboot".parse::<Command>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Turn the display on.
    On,
    /// Turn the display off.
    Off,
    /// Query and report the observed state.
    Status,
}

impl Command {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "status" => Ok(Self::Status),
            _ => Err(ParseError::UnknownCommand(s.trim().to_string())),
        }
    }
}

/// Maps commands to controller actions and publication decisions.
#[derive(Debug)]
pub struct CommandDispatcher<R> {
    controller: DisplayController<R>,
    bound: Duration,
}

impl<R: CommandRunner> CommandDispatcher<R> {
    /// Wraps a controller with the default execution bound.
    pub fn new(controller: DisplayController<R>) -> Self {
        Self {
            controller,
            bound: COMMAND_BOUND,
        }
    }

    /// Decodes a raw payload and dispatches it.
    ///
    /// Returns the status to publish (retained), or `None` when the payload
    /// is not a recognized command; unrecognized payloads are logged and
    /// cause no state change and no publication.
    pub async fn handle_payload(&self, payload: &[u8]) -> Option<DisplayState> {
        let Ok(text) = std::str::from_utf8(payload) else {
            tracing::warn!("Ignoring non-UTF-8 command payload");
            return None;
        };

        match text.parse::<Command>() {
            Ok(command) => {
                tracing::info!(%command, "Received command");
                Some(self.dispatch(command).await)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring command");
                None
            }
        }
    }

    /// Runs a command against the controller within the execution bound and
    /// returns the status to report.
    pub async fn dispatch(&self, command: Command) -> DisplayState {
        match command {
            Command::On | Command::Off => {
                let on = command == Command::On;
                match self.bounded(self.controller.set_power(on)).await {
                    // Optimistic: the desired state is reported without a
                    // verification read-back.
                    Ok(()) => DisplayState::from(on),
                    Err(e) => {
                        tracing::error!(%command, error = %e, "Power command failed");
                        DisplayState::Unknown
                    }
                }
            }
            Command::Status => match self.bounded(self.controller.read_power()).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::error!(error = %e, "Status query failed");
                    DisplayState::Unknown
                }
            },
        }
    }

    /// Applies the execution bound to a controller call.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, HardwareError>>,
    ) -> Result<T, HardwareError> {
        // Safe: the bound is far below u64::MAX milliseconds
        #[allow(clippy::cast_possible_truncation)]
        let bound_ms = self.bound.as_millis() as u64;

        tokio::time::timeout(self.bound, call)
            .await
            .map_err(|_| HardwareError::Timeout(bound_ms))?
    }
}
