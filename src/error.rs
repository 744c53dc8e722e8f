// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for display control.
//!
//! Configuration and initial-connection failures are fatal; hardware and
//! transport errors are recovered at their call sites (logged, with the
//! display state reported as `unknown` where a status is owed).

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Error in the broker configuration file.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error in the MQTT transport.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error driving the display hardware.
    #[error("hardware error: {0}")]
    Hardware(#[from] HardwareError),

    /// Error parsing a payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Errors loading or validating the broker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration file could not be read.
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        /// Path of the unreadable file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON or misses a required field.
    #[error("invalid config file: {0}")]
    Json(#[from] serde_json::Error),

    /// TLS is enabled but no CA certificate is configured.
    #[error("tls is enabled but no cafile is configured")]
    TlsWithoutCa,

    /// TLS material referenced by the configuration could not be read.
    #[error("failed to read TLS file {}: {source}", .path.display())]
    TlsIo {
        /// Path of the unreadable certificate or key.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// No home directory to resolve the default configuration path against.
    #[error("cannot determine the home directory for the default config path")]
    NoHomeDir,
}

/// Errors in the MQTT transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The MQTT client rejected a request.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// Errors driving the display hardware through a vendor tool.
#[derive(Debug, Error)]
pub enum HardwareError {
    /// No supported vendor power tool is present on the host.
    #[error("no supported display power tool found (tried vcgencmd, tvservice)")]
    NoBackend,

    /// A vendor tool could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// The tool that failed to start.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A vendor tool ran but exited unsuccessfully.
    ///
    /// `code` is `-1` when the tool was terminated by a signal.
    #[error("{command} exited with code {code}: {stderr}")]
    CommandFailed {
        /// The rendered invocation.
        command: String,
        /// The exit code.
        code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// A bounded hardware call exceeded its execution limit.
    #[error("command timed out after {0} ms")]
    Timeout(u64),
}

/// Errors parsing inbound payloads or building outbound ones.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An inbound command string is not one of `on`, `off`, `status`.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// A string is not a valid display state.
    #[error("invalid display state: {0:?}")]
    InvalidState(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::NotFound(PathBuf::from("/etc/displayctl/mqtt.json"));
        assert_eq!(
            err.to_string(),
            "config file not found: /etc/displayctl/mqtt.json"
        );
    }

    #[test]
    fn hardware_error_display() {
        let err = HardwareError::Timeout(10_000);
        assert_eq!(err.to_string(), "command timed out after 10000 ms");
    }

    #[test]
    fn error_from_hardware_error() {
        let err: Error = HardwareError::NoBackend.into();
        assert!(matches!(err, Error::Hardware(HardwareError::NoBackend)));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::UnknownCommand("reboot".to_string());
        assert_eq!(err.to_string(), "unknown command: \"reboot\"");
    }
}
