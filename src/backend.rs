// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vendor tool backends.
//!
//! Two incompatible tool sets can drive the display: `vcgencmd` (VideoCore
//! firmware interface, addresses each attached display separately) and the
//! legacy `tvservice` (single HDMI state). One backend is selected by a
//! priority probe at startup and stays fixed for the process lifetime.

use std::fmt;

use crate::error::HardwareError;
use crate::exec::{CommandRunner, Invocation};
use crate::types::DisplayState;

/// Sub-display identifiers known to the firmware: main LCD, secondary LCD,
/// HDMI 0, composite, HDMI 1.
const VC_DISPLAY_IDS: [&str; 5] = ["0", "1", "2", "3", "7"];

/// Marker in `vcgencmd display_power` query output for a powered display.
const VC_ON_MARKER: &str = "display_power=1";

/// Marker in `vcgencmd display_power` query output for an unpowered display.
const VC_OFF_MARKER: &str = "display_power=0";

/// Marker in `tvservice -s` output when HDMI is shut down.
const TV_OFF_MARKER: &str = "TV is off";

/// Marker in `tvservice -s` output when an HDMI mode is driven.
const TV_ACTIVE_MARKER: &str = "HDMI";

/// The vendor tool set driving the physical display.
///
/// A closed set: adding a tool means adding a variant and handling it in
/// every match below, checked at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// `vcgencmd display_power`, one call per known display identifier.
    Vcgencmd,
    /// `tvservice -p` / `-o`, a single HDMI activate/deactivate.
    Tvservice,
}

impl Backend {
    /// Probes the host for a usable vendor tool, `vcgencmd` first.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::NoBackend`] if neither tool can be executed.
    pub async fn detect<R: CommandRunner>(runner: &R) -> Result<Self, HardwareError> {
        for candidate in [Self::Vcgencmd, Self::Tvservice] {
            if candidate.probe(runner).await {
                tracing::info!(backend = %candidate, "Selected display backend");
                return Ok(candidate);
            }
        }
        Err(HardwareError::NoBackend)
    }

    async fn probe<R: CommandRunner>(self, runner: &R) -> bool {
        let invocation = match self {
            Self::Vcgencmd => Invocation::new("vcgencmd").arg("version"),
            Self::Tvservice => Invocation::new("tvservice").arg("-s"),
        };
        match runner.run(&invocation).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(backend = %self, error = %e, "Backend probe failed");
                false
            }
        }
    }

    /// Sets the display power through the vendor tool.
    ///
    /// `Vcgencmd` addresses the unqualified target and then every known
    /// sub-display identifier; each call is best-effort and a failure never
    /// aborts the remaining ones. `Tvservice` issues a single call whose
    /// failure is reported.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] only for the `Tvservice` variant, when the
    /// tool cannot be run or exits unsuccessfully.
    pub async fn set_power<R: CommandRunner>(
        self,
        runner: &R,
        on: bool,
    ) -> Result<(), HardwareError> {
        match self {
            Self::Vcgencmd => {
                let state = if on { "1" } else { "0" };
                let mut targets =
                    vec![Invocation::new("vcgencmd").arg("display_power").arg(state)];
                for id in VC_DISPLAY_IDS {
                    targets.push(
                        Invocation::new("vcgencmd")
                            .arg("display_power")
                            .arg(state)
                            .arg(id),
                    );
                }
                for invocation in &targets {
                    match runner.run(invocation).await {
                        Ok(output) if output.success() => {}
                        Ok(output) => tracing::warn!(
                            command = %invocation,
                            code = output.code.unwrap_or(-1),
                            "Display power call failed"
                        ),
                        Err(e) => tracing::warn!(
                            command = %invocation,
                            error = %e,
                            "Display power call failed"
                        ),
                    }
                }
                Ok(())
            }
            Self::Tvservice => {
                let flag = if on { "-p" } else { "-o" };
                let invocation = Invocation::new("tvservice").arg(flag);
                let output = runner.run(&invocation).await?;
                if output.success() {
                    Ok(())
                } else {
                    Err(output.into_failure(&invocation))
                }
            }
        }
    }

    /// Reads the display power state through the vendor tool.
    ///
    /// `Vcgencmd` aggregates over the unqualified target and all known
    /// sub-display identifiers: any query reporting on wins; off requires
    /// every query to have produced a parseable answer. `Tvservice` parses
    /// the free-text HDMI status.
    ///
    /// # Errors
    ///
    /// Returns a [`HardwareError`] only for the `Tvservice` variant, when the
    /// tool cannot be run or exits unsuccessfully; per-query failures of the
    /// `Vcgencmd` variant fold into the aggregate instead.
    pub async fn read_power<R: CommandRunner>(
        self,
        runner: &R,
    ) -> Result<DisplayState, HardwareError> {
        match self {
            Self::Vcgencmd => {
                let mut queries = vec![Invocation::new("vcgencmd").arg("display_power")];
                for id in VC_DISPLAY_IDS {
                    queries.push(
                        Invocation::new("vcgencmd")
                            .arg("display_power")
                            .arg("-1")
                            .arg(id),
                    );
                }

                let mut any_on = false;
                let mut all_parsed = true;
                for invocation in &queries {
                    match runner.run(invocation).await {
                        Ok(output) if output.success() && output.stdout.contains(VC_ON_MARKER) => {
                            any_on = true;
                        }
                        Ok(output)
                            if output.success() && output.stdout.contains(VC_OFF_MARKER) => {}
                        Ok(_) | Err(_) => {
                            tracing::debug!(command = %invocation, "Unparseable power query");
                            all_parsed = false;
                        }
                    }
                }

                Ok(if any_on {
                    DisplayState::On
                } else if all_parsed {
                    DisplayState::Off
                } else {
                    DisplayState::Unknown
                })
            }
            Self::Tvservice => {
                let invocation = Invocation::new("tvservice").arg("-s");
                let output = runner.run(&invocation).await?;
                if !output.success() {
                    return Err(output.into_failure(&invocation));
                }
                Ok(parse_tv_state(&output.stdout))
            }
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vcgencmd => write!(f, "vcgencmd"),
            Self::Tvservice => write!(f, "tvservice"),
        }
    }
}

/// Parses `tvservice -s` output.
fn parse_tv_state(stdout: &str) -> DisplayState {
    if stdout.contains(TV_OFF_MARKER) {
        DisplayState::Off
    } else if stdout.contains(TV_ACTIVE_MARKER) {
        DisplayState::On
    } else {
        DisplayState::Unknown
    }
}
