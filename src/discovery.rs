// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Home Assistant MQTT discovery metadata.
//!
//! A one-shot publisher: two retained JSON documents — a switch entity and a
//! "refresh status" button entity — both bound to the fixed display topics
//! and grouped under one device. Home Assistant picks the retained documents
//! up whenever its MQTT integration (re)starts. No subscription; the
//! publisher flushes and exits.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, Outgoing, QoS};
use serde::Serialize;

use crate::config::Config;
use crate::error::{ParseError, ProtocolError, Result};
use crate::topic;

/// Discovery prefix Home Assistant subscribes to by default.
const DISCOVERY_PREFIX: &str = "homeassistant";

/// Capacity of the client request queue.
const REQUEST_QUEUE_CAPACITY: usize = 10;

/// Delay before disconnecting, giving the broker time to persist the
/// retained documents.
const FLUSH_DELAY: Duration = Duration::from_millis(500);

/// Template mapping any payload other than `on`/`off` to `unknown`, so the
/// hub renders an undetermined display state instead of a stale one.
const STATE_TEMPLATE: &str =
    "{% if value == 'on' %}on{% elif value == 'off' %}off{% else %}unknown{% endif %}";

/// Device block shared by both entities so the hub groups them.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceBlock {
    identifiers: Vec<String>,
    name: &'static str,
    manufacturer: &'static str,
    model: &'static str,
}

impl DeviceBlock {
    /// The dashboard display device.
    #[must_use]
    pub fn dashboard() -> Self {
        Self {
            identifiers: vec!["raspi-dashboard-1".to_string()],
            name: "Raspberry Pi Dashboard",
            manufacturer: "Raspberry Pi",
            model: "Pi + HDMI Display",
        }
    }
}

/// Switch entity configuration: on/off over the command topic, state from
/// the status topic.
#[derive(Debug, Serialize)]
pub struct SwitchConfig {
    name: &'static str,
    unique_id: &'static str,
    command_topic: &'static str,
    state_topic: &'static str,
    availability_topic: &'static str,
    payload_on: &'static str,
    payload_off: &'static str,
    state_on: &'static str,
    state_off: &'static str,
    value_template: &'static str,
    device: DeviceBlock,
}

impl SwitchConfig {
    /// Builds the switch configuration for `device`.
    #[must_use]
    pub fn new(device: DeviceBlock) -> Self {
        Self {
            name: "Dashboard Display",
            unique_id: "dashboard_display_switch",
            command_topic: topic::COMMAND,
            state_topic: topic::STATUS,
            availability_topic: topic::AVAILABILITY,
            payload_on: "on",
            payload_off: "off",
            state_on: "on",
            state_off: "off",
            value_template: STATE_TEMPLATE,
            device,
        }
    }

    /// Discovery topic for the switch document.
    #[must_use]
    pub fn config_topic() -> String {
        format!("{DISCOVERY_PREFIX}/switch/dashboard_display/config")
    }
}

/// Button entity configuration: a press publishes `status` on the command
/// topic, forcing a re-read of the hardware state.
#[derive(Debug, Serialize)]
pub struct ButtonConfig {
    name: &'static str,
    unique_id: &'static str,
    command_topic: &'static str,
    payload_press: &'static str,
    availability_topic: &'static str,
    device: DeviceBlock,
}

impl ButtonConfig {
    /// Builds the button configuration for `device`.
    #[must_use]
    pub fn new(device: DeviceBlock) -> Self {
        Self {
            name: "Dashboard Display: Refresh Status",
            unique_id: "dashboard_display_status_button",
            command_topic: topic::COMMAND,
            payload_press: "status",
            availability_topic: topic::AVAILABILITY,
            device,
        }
    }

    /// Discovery topic for the button document.
    #[must_use]
    pub fn config_topic() -> String {
        format!("{DISCOVERY_PREFIX}/button/dashboard_display_status/config")
    }
}

/// Publishes the retained discovery documents and disconnects.
///
/// # Errors
///
/// Returns an error if the broker is unreachable or a publication is
/// rejected.
pub async fn announce(config: &Config) -> Result<()> {
    let client_id = format!("displayctl_discovery_{}", std::process::id());
    let options = config.mqtt_options(client_id)?;
    let (client, mut event_loop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);

    // Drive the connection in the background until the disconnect goes out.
    let driver = tokio::spawn(async move {
        loop {
            match event_loop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "MQTT event loop error");
                    break;
                }
            }
        }
    });

    let device = DeviceBlock::dashboard();
    let switch = serde_json::to_string(&SwitchConfig::new(device.clone())).map_err(ParseError::Json)?;
    let button = serde_json::to_string(&ButtonConfig::new(device)).map_err(ParseError::Json)?;

    client
        .publish(SwitchConfig::config_topic(), QoS::AtLeastOnce, true, switch)
        .await
        .map_err(ProtocolError::Mqtt)?;
    client
        .publish(ButtonConfig::config_topic(), QoS::AtLeastOnce, true, button)
        .await
        .map_err(ProtocolError::Mqtt)?;

    tokio::time::sleep(FLUSH_DELAY).await;

    client.disconnect().await.map_err(ProtocolError::Mqtt)?;
    let _ = driver.await;

    tracing::info!(
        switch = %SwitchConfig::config_topic(),
        button = %ButtonConfig::config_topic(),
        "Published discovery metadata"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_payload_points_at_fixed_topics() {
        let payload =
            serde_json::to_value(SwitchConfig::new(DeviceBlock::dashboard())).unwrap();

        assert_eq!(payload["command_topic"], topic::COMMAND);
        assert_eq!(payload["state_topic"], topic::STATUS);
        assert_eq!(payload["availability_topic"], topic::AVAILABILITY);
        assert_eq!(payload["payload_on"], "on");
        assert_eq!(payload["payload_off"], "off");
        assert!(
            payload["value_template"]
                .as_str()
                .unwrap()
                .contains("unknown")
        );
    }

    #[test]
    fn button_payload_presses_status() {
        let payload = serde_json::to_value(ButtonConfig::new(DeviceBlock::dashboard())).unwrap();

        assert_eq!(payload["command_topic"], topic::COMMAND);
        assert_eq!(payload["payload_press"], "status");
        assert_eq!(payload["availability_topic"], topic::AVAILABILITY);
    }

    #[test]
    fn entities_share_one_device_identifier_set() {
        let switch = serde_json::to_value(SwitchConfig::new(DeviceBlock::dashboard())).unwrap();
        let button = serde_json::to_value(ButtonConfig::new(DeviceBlock::dashboard())).unwrap();

        assert_eq!(switch["device"], button["device"]);
        assert_eq!(
            switch["device"]["identifiers"],
            serde_json::json!(["raspi-dashboard-1"])
        );
    }

    #[test]
    fn config_topics_live_under_the_discovery_prefix() {
        assert_eq!(
            SwitchConfig::config_topic(),
            "homeassistant/switch/dashboard_display/config"
        );
        assert_eq!(
            ButtonConfig::config_topic(),
            "homeassistant/button/dashboard_display_status/config"
        );
    }
}
