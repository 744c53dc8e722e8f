// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker configuration.
//!
//! The configuration is a small JSON object loaded once at startup and
//! immutable for the process lifetime. `broker` and `port` are required;
//! everything else is optional. A missing file or required field is fatal
//! before any network activity.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rumqttc::{MqttOptions, TlsConfiguration, Transport};
use serde::Deserialize;

use crate::error::ConfigError;

/// Location of the broker configuration below the home directory.
const DEFAULT_RELATIVE_PATH: &str = "dashboard-project/config/mqtt.json";

/// MQTT keep-alive interval.
const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Broker connection settings.
///
/// # Examples
///
/// ```json
/// {
///   "broker": "homeassistant.local",
///   "port": 8883,
///   "username": "dashboard",
///   "password": "secret",
///   "tls": true,
///   "cafile": "/etc/ssl/certs/broker-ca.pem"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Broker host name or address.
    pub broker: String,
    /// Broker port.
    pub port: u16,
    /// Optional authentication user name.
    #[serde(default)]
    pub username: Option<String>,
    /// Optional authentication password.
    #[serde(default)]
    pub password: Option<String>,
    /// Whether to wrap the connection in TLS.
    #[serde(default)]
    pub tls: bool,
    /// CA certificate (PEM). Required when `tls` is set.
    #[serde(default)]
    pub cafile: Option<PathBuf>,
    /// Client certificate (PEM) for mutual TLS.
    #[serde(default)]
    pub certfile: Option<PathBuf>,
    /// Client private key (PEM) for mutual TLS.
    #[serde(default)]
    pub keyfile: Option<PathBuf>,
}

impl Config {
    /// Loads and validates the configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is missing, unreadable, not
    /// valid JSON, misses a required field, or enables TLS without a CA
    /// certificate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default configuration path, `~/dashboard-project/config/mqtt.json`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoHomeDir`] if the home directory cannot be
    /// determined.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_RELATIVE_PATH))
            .ok_or(ConfigError::NoHomeDir)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tls && self.cafile.is_none() {
            return Err(ConfigError::TlsWithoutCa);
        }
        Ok(())
    }

    /// Returns the configured credentials, if a user name is set.
    ///
    /// A missing password is treated as empty, matching brokers that
    /// authenticate by user name only.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.username
            .as_deref()
            .map(|username| (username, self.password.as_deref().unwrap_or("")))
    }

    /// Builds MQTT options for this configuration under the given client id.
    ///
    /// Applies host, port, keep-alive, credentials, and the TLS transport.
    /// Session-level concerns (the Last-Will registration) are layered on by
    /// the caller.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if TLS material cannot be read.
    pub fn mqtt_options(&self, client_id: impl Into<String>) -> Result<MqttOptions, ConfigError> {
        let mut options = MqttOptions::new(client_id, &self.broker, self.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);

        if let Some((username, password)) = self.credentials() {
            options.set_credentials(username, password);
        }

        if self.tls {
            let ca = read_pem(self.cafile.as_ref().ok_or(ConfigError::TlsWithoutCa)?)?;
            let client_auth = match (&self.certfile, &self.keyfile) {
                (Some(cert), Some(key)) => Some((read_pem(cert)?, read_pem(key)?)),
                _ => None,
            };
            options.set_transport(Transport::Tls(TlsConfiguration::Simple {
                ca,
                alpn: None,
                client_auth,
            }));
        }

        Ok(options)
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|source| ConfigError::TlsIo {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_minimal_config() {
        let file = write_config(r#"{"broker": "192.168.1.10", "port": 1883}"#);
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.broker, "192.168.1.10");
        assert_eq!(config.port, 1883);
        assert!(config.username.is_none());
        assert!(!config.tls);
    }

    #[test]
    fn load_full_config() {
        let file = write_config(
            r#"{
                "broker": "homeassistant.local",
                "port": 8883,
                "username": "dashboard",
                "password": "secret",
                "tls": true,
                "cafile": "/etc/ssl/certs/broker-ca.pem"
            }"#,
        );
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.credentials(), Some(("dashboard", "secret")));
        assert!(config.tls);
        assert_eq!(
            config.cafile,
            Some(PathBuf::from("/etc/ssl/certs/broker-ca.pem"))
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Config::load(Path::new("/nonexistent/mqtt.json"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let file = write_config(r#"{"broker": "192.168.1.10"}"#);
        let result = Config::load(file.path());
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let file = write_config("not json");
        let result = Config::load(file.path());
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn tls_without_cafile_is_an_error() {
        let file = write_config(r#"{"broker": "b", "port": 8883, "tls": true}"#);
        let result = Config::load(file.path());
        assert!(matches!(result, Err(ConfigError::TlsWithoutCa)));
    }

    #[test]
    fn credentials_default_to_empty_password() {
        let file = write_config(r#"{"broker": "b", "port": 1883, "username": "dash"}"#);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.credentials(), Some(("dash", "")));
    }

    #[test]
    fn mqtt_options_carry_credentials() {
        let file = write_config(
            r#"{"broker": "b", "port": 1883, "username": "dash", "password": "pw"}"#,
        );
        let config = Config::load(file.path()).unwrap();
        let options = config.mqtt_options("displayctl_test").unwrap();

        assert_eq!(options.broker_address(), ("b".to_string(), 1883));
        assert_eq!(
            options.credentials(),
            Some(("dash".to_string(), "pw".to_string()))
        );
    }
}
