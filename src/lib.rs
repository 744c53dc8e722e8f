// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `displayctl` - MQTT power control for a dashboard HDMI display.
//!
//! This crate lets a home-automation hub observe and drive the power state
//! of a physical display over MQTT. It targets Raspberry Pi kiosk setups
//! and drives whichever vendor tool the host provides (`vcgencmd` or
//! `tvservice`), with a best-effort wake/suspend of the Wayland session
//! around power changes.
//!
//! # Operating Modes
//!
//! - **Listener**: a daemon holding a resilient broker session. Commands
//!   (`on`, `off`, `status`) arrive on `dashboard/display/command`; observed
//!   state goes out retained on `dashboard/display/status`; availability
//!   (`online`/`offline`, with a Last-Will) on
//!   `dashboard/display/availability`.
//! - **Schedule**: a standalone loop turning the display on and off along a
//!   daily window, with support for windows that wrap past midnight.
//! - **One-shot**: direct `on`/`off`/`status` from the command line.
//! - **Announce**: publishes retained Home Assistant discovery metadata so
//!   the hub auto-creates a switch and a refresh button for the display.
//!
//! # Quick Start
//!
//! ```no_run
//! use displayctl::{Command, CommandDispatcher, DisplayController, SystemRunner};
//!
//! #[tokio::main]
//! async fn main() -> displayctl::Result<()> {
//!     // Probe the host for a vendor power tool
//!     let controller = DisplayController::detect(SystemRunner).await?;
//!
//!     // Dispatch a status query under the standard execution bound
//!     let dispatcher = CommandDispatcher::new(controller);
//!     let state = dispatcher.dispatch(Command::Status).await;
//!     println!("display is {state}");
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod command;
pub mod config;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod schedule;
pub mod session;
pub mod topic;
pub mod types;

pub use backend::Backend;
pub use command::{Command, CommandDispatcher};
pub use config::Config;
pub use controller::DisplayController;
pub use error::{ConfigError, Error, HardwareError, ParseError, ProtocolError, Result};
pub use exec::{CommandRunner, ExecOutput, Invocation, SystemRunner};
pub use schedule::{ScheduleWindow, Scheduler, desired_state};
pub use session::{ReconnectPolicy, SessionEvent, SessionManager, SessionState};
pub use types::DisplayState;
