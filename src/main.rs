// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-line entry point for display control.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use displayctl::{
    Command, CommandDispatcher, Config, DisplayController, DisplayState, ScheduleWindow,
    Scheduler, SessionManager, SystemRunner, discovery,
};

/// Exit code when the display state cannot be determined.
const EXIT_UNKNOWN_STATE: u8 = 3;

#[derive(Debug, Parser)]
#[command(
    name = "displayctl",
    version,
    about = "MQTT power control for a dashboard HDMI display"
)]
struct Cli {
    /// Path to the broker configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Turn the display on.
    On,
    /// Turn the display off.
    Off,
    /// Print the observed display state.
    Status,
    /// Drive the display along a daily on/off window.
    Schedule {
        /// Time the display turns on (HH:MM).
        #[arg(long, value_parser = parse_time, default_value = "07:00")]
        on_time: NaiveTime,
        /// Time the display turns off (HH:MM).
        #[arg(long, value_parser = parse_time, default_value = "22:00")]
        off_time: NaiveTime,
        /// Seconds between schedule evaluations.
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
    /// Listen for commands on the MQTT bus.
    Listen,
    /// Publish Home Assistant discovery metadata and exit.
    Announce,
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("invalid time {s:?}: {e}"))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> displayctl::Result<ExitCode> {
    match cli.command {
        CliCommand::On => one_shot(Command::On).await,
        CliCommand::Off => one_shot(Command::Off).await,
        CliCommand::Status => {
            let dispatcher = dispatcher().await?;
            let state = dispatcher.dispatch(Command::Status).await;
            println!("{state}");
            Ok(if state == DisplayState::Unknown {
                ExitCode::from(EXIT_UNKNOWN_STATE)
            } else {
                ExitCode::SUCCESS
            })
        }
        CliCommand::Schedule {
            on_time,
            off_time,
            interval,
        } => {
            let window = ScheduleWindow {
                on_time,
                off_time,
                interval: Duration::from_secs(interval),
            };
            let controller = DisplayController::detect(SystemRunner).await?;
            Scheduler::new(controller, window).run(shutdown_token()).await;
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Listen => {
            let config = load_config(cli.config.as_deref())?;
            let mut session = SessionManager::new(dispatcher().await?);
            session.run(&config, shutdown_token()).await?;
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Announce => {
            let config = load_config(cli.config.as_deref())?;
            discovery::announce(&config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Runs a power command through the dispatcher; the command's bound and
/// failure handling match the listener path.
async fn one_shot(command: Command) -> displayctl::Result<ExitCode> {
    let dispatcher = dispatcher().await?;
    let state = dispatcher.dispatch(command).await;
    Ok(if state == DisplayState::Unknown {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn dispatcher() -> displayctl::Result<CommandDispatcher<SystemRunner>> {
    let controller = DisplayController::detect(SystemRunner).await?;
    Ok(CommandDispatcher::new(controller))
}

fn load_config(path: Option<&Path>) -> displayctl::Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };
    Ok(Config::load(&path)?)
}

/// Cancellation token wired to SIGINT and SIGTERM.
///
/// Repeated signals re-cancel the token, which is a no-op: shutdown stays
/// graceful and idempotent.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();

    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
            tracing::info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_time_accepts_hh_mm() {
        assert_eq!(
            parse_time("07:30").unwrap(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
    }

    #[test]
    fn parse_time_rejects_garbage() {
        assert!(parse_time("7pm").is_err());
        assert!(parse_time("25:00").is_err());
    }

    #[test]
    fn cli_schedule_defaults() {
        let cli = Cli::parse_from(["displayctl", "schedule"]);
        match cli.command {
            CliCommand::Schedule {
                on_time,
                off_time,
                interval,
            } => {
                assert_eq!(on_time, NaiveTime::from_hms_opt(7, 0, 0).unwrap());
                assert_eq!(off_time, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
                assert_eq!(interval, 60);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_config_flag_after_subcommand() {
        let cli = Cli::parse_from(["displayctl", "listen", "--config", "/tmp/mqtt.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/mqtt.json")));
    }
}
