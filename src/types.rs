// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Display power state.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Observed or desired power state of the display.
///
/// Never persisted; the state is recomputed from hardware or set
/// optimistically after a successful power command, then republished.
///
/// # Examples
///
/// ```
/// use displayctl::DisplayState;
///
/// assert_eq!(DisplayState::On.as_str(), "on");
/// assert_eq!(DisplayState::from(false), DisplayState::Off);
/// assert_eq!("UNKNOWN".parse::<DisplayState>().unwrap(), DisplayState::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayState {
    /// The display is powered on.
    On,
    /// The display is powered off.
    Off,
    /// The state could not be determined.
    Unknown,
}

impl DisplayState {
    /// Returns the MQTT payload representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DisplayState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "unknown" => Ok(Self::Unknown),
            _ => Err(ParseError::InvalidState(s.to_string())),
        }
    }
}

impl From<bool> for DisplayState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}
