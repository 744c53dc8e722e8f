// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT session management for listener mode.
//!
//! The session manager owns the broker connection, the command
//! subscription, the Last-Will registration, and the retained status and
//! availability publications. Its lifecycle is
//! `Disconnected → Connecting → Connected → ShuttingDown → Stopped`;
//! transport drops re-enter `Connecting` with backoff, a shutdown signal
//! enters `ShuttingDown` exactly once.
//!
//! All broker activity is reduced to [`SessionEvent`]s consumed by a single
//! serial loop. Inbound commands run to completion (including their
//! execution bound) before the next event is polled, so no two hardware
//! operations can interleave.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use tokio_util::sync::CancellationToken;

use crate::command::{Command, CommandDispatcher};
use crate::config::Config;
use crate::error::{ConfigError, Error, ProtocolError, Result};
use crate::exec::CommandRunner;
use crate::topic;
use crate::types::DisplayState;

/// Capacity of the client request queue.
const REQUEST_QUEUE_CAPACITY: usize = 10;

/// Upper bound on draining the event loop during graceful shutdown.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

/// Lifecycle of the broker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection attempt has been made.
    Disconnected,
    /// A connection attempt (initial or reconnect) is in progress.
    Connecting,
    /// Subscribed and serving commands.
    Connected,
    /// A shutdown signal was received; the farewell is being published.
    ShuttingDown,
    /// The session has ended.
    Stopped,
}

/// Broker activity relevant to the session, reduced from the transport's
/// packet stream to the transitions the state machine acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The broker acknowledged the connection.
    Connected,
    /// The transport dropped, with a human-readable reason.
    Disconnected(String),
    /// A message arrived on the command topic.
    MessageReceived(Vec<u8>),
}

/// Backoff applied between reconnect attempts after a transport drop.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling for the exponential backoff.
    pub max_delay: Duration,
    /// Factor applied per successive failed attempt.
    pub multiplier: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2,
        }
    }
}

impl ReconnectPolicy {
    /// Returns the delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Owns the broker session and drives the command dispatcher.
#[derive(Debug)]
pub struct SessionManager<R> {
    dispatcher: CommandDispatcher<R>,
    reconnect: ReconnectPolicy,
    state: SessionState,
}

impl<R: CommandRunner> SessionManager<R> {
    /// Creates a session manager around a dispatcher.
    pub fn new(dispatcher: CommandDispatcher<R>) -> Self {
        Self {
            dispatcher,
            reconnect: ReconnectPolicy::default(),
            state: SessionState::Disconnected,
        }
    }

    /// Overrides the reconnect backoff policy.
    #[must_use]
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the listener session until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if the initial connection handshake
    /// fails; transport drops after a successful connect are recovered with
    /// backoff and are not errors.
    pub async fn run(&mut self, config: &Config, shutdown: CancellationToken) -> Result<()> {
        self.state = SessionState::Connecting;
        tracing::info!(
            broker = %config.broker,
            port = config.port,
            "Connecting to MQTT broker"
        );

        let options = listener_options(config)?;
        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);

        let mut ever_connected = false;
        let mut attempt: u32 = 0;

        loop {
            // The select only yields a value; acting on it happens after the
            // poll future released its borrow on the event loop.
            let step = tokio::select! {
                () = shutdown.cancelled() => None,
                polled = event_loop.poll() => Some(reduce_event(&polled)),
            };

            let Some(event) = step else {
                return self.shut_down(&client, &mut event_loop).await;
            };

            match event {
                Some(SessionEvent::Connected) => {
                    ever_connected = true;
                    attempt = 0;
                    self.state = SessionState::Connected;
                    self.on_connected(&client).await?;
                }
                Some(SessionEvent::MessageReceived(payload)) => {
                    self.on_message(&client, &payload).await;
                }
                Some(SessionEvent::Disconnected(reason)) => {
                    if !ever_connected {
                        // Listener mode treats a failed first handshake as
                        // fatal; there is nothing to recover to yet.
                        self.state = SessionState::Stopped;
                        return Err(Error::Protocol(ProtocolError::ConnectionFailed(reason)));
                    }

                    self.state = SessionState::Connecting;
                    let delay = self.reconnect.delay_for(attempt);
                    attempt = attempt.saturating_add(1);
                    tracing::warn!(
                        %reason,
                        delay_secs = delay.as_secs(),
                        "Transport dropped, reconnecting"
                    );

                    tokio::select! {
                        () = shutdown.cancelled() => {
                            return self.shut_down(&client, &mut event_loop).await;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                None => {}
            }
        }
    }

    /// First-connect and reconnect ritual: subscribe, announce availability,
    /// publish the observed state. The broker may not have retained any
    /// session state, so this runs identically on every handshake.
    async fn on_connected(&mut self, client: &AsyncClient) -> Result<()> {
        tracing::info!("Connected to MQTT broker");

        client
            .subscribe(topic::COMMAND, QoS::AtLeastOnce)
            .await
            .map_err(ProtocolError::Mqtt)?;
        tracing::info!(topic = topic::COMMAND, "Subscribed to command topic");

        client
            .publish(topic::AVAILABILITY, QoS::AtLeastOnce, true, topic::ONLINE)
            .await
            .map_err(ProtocolError::Mqtt)?;

        let state = self.dispatcher.dispatch(Command::Status).await;
        self.publish_status(client, state).await;
        Ok(())
    }

    /// Handles one inbound command message. The dispatch (including its
    /// execution bound) completes before the caller polls the next event,
    /// which serializes all hardware writes.
    async fn on_message(&self, client: &AsyncClient, payload: &[u8]) {
        if let Some(state) = self.dispatcher.handle_payload(payload).await {
            self.publish_status(client, state).await;
        }
    }

    async fn publish_status(&self, client: &AsyncClient, state: DisplayState) {
        match client
            .publish(topic::STATUS, QoS::AtLeastOnce, true, state.as_str())
            .await
        {
            Ok(()) => tracing::info!(status = %state, "Published status"),
            Err(e) => tracing::error!(error = %e, "Failed to publish status"),
        }
    }

    /// Publishes the farewell and closes the connection. Idempotent: a
    /// second entry is a no-op.
    async fn shut_down(&mut self, client: &AsyncClient, event_loop: &mut EventLoop) -> Result<()> {
        if matches!(
            self.state,
            SessionState::ShuttingDown | SessionState::Stopped
        ) {
            return Ok(());
        }
        self.state = SessionState::ShuttingDown;
        tracing::info!("Shutting down session");

        if let Err(e) = client
            .publish(topic::AVAILABILITY, QoS::AtLeastOnce, true, topic::OFFLINE)
            .await
        {
            tracing::warn!(error = %e, "Failed to publish offline availability");
        }
        if let Err(e) = client.disconnect().await {
            tracing::warn!(error = %e, "Failed to request disconnect");
        }

        // The farewell must reach the wire before the socket closes, which
        // requires driving the event loop until the disconnect goes out.
        let drain = async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_DRAIN, drain).await.is_err() {
            tracing::warn!("Timed out flushing the farewell publication");
        }

        self.state = SessionState::Stopped;
        tracing::info!("Session stopped");
        Ok(())
    }
}

/// Builds the listener's MQTT options: the configured transport plus the
/// retained `offline` Last-Will on the availability topic.
///
/// # Errors
///
/// Returns a [`ConfigError`] if TLS material cannot be read.
pub fn listener_options(config: &Config) -> std::result::Result<MqttOptions, ConfigError> {
    let client_id = format!("displayctl_{}", std::process::id());
    let mut options = config.mqtt_options(client_id)?;
    options.set_last_will(LastWill::new(
        topic::AVAILABILITY,
        topic::OFFLINE,
        QoS::AtLeastOnce,
        true,
    ));
    Ok(options)
}

/// Reduces one transport poll result to a session event.
fn reduce_event(
    polled: &std::result::Result<Event, rumqttc::ConnectionError>,
) -> Option<SessionEvent> {
    match polled {
        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
            tracing::debug!(?ack, "Connection acknowledged");
            Some(SessionEvent::Connected)
        }
        Ok(Event::Incoming(Packet::Publish(publish))) if publish.topic == topic::COMMAND => {
            Some(SessionEvent::MessageReceived(publish.payload.to_vec()))
        }
        Ok(Event::Incoming(Packet::Disconnect)) => Some(SessionEvent::Disconnected(
            "broker closed the connection".to_string(),
        )),
        Ok(_) => None,
        Err(e) => Some(SessionEvent::Disconnected(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use rumqttc::{ConnAck, ConnectReturnCode, Publish};

    use super::*;
    use crate::backend::Backend;
    use crate::controller::DisplayController;
    use crate::exec::fake::FakeRunner;

    fn config() -> Config {
        Config {
            broker: "127.0.0.1".to_string(),
            port: 1883,
            username: Some("dash".to_string()),
            password: Some("pw".to_string()),
            tls: false,
            cafile: None,
            certfile: None,
            keyfile: None,
        }
    }

    #[test]
    fn listener_options_register_last_will() {
        let options = listener_options(&config()).unwrap();
        let will = options.last_will().expect("last will must be registered");

        assert_eq!(will.topic, topic::AVAILABILITY);
        assert_eq!(will.message.as_ref(), topic::OFFLINE.as_bytes());
        assert_eq!(will.qos, QoS::AtLeastOnce);
        assert!(will.retain);
    }

    #[test]
    fn listener_options_carry_credentials() {
        let options = listener_options(&config()).unwrap();
        assert_eq!(
            options.credentials(),
            Some(("dash".to_string(), "pw".to_string()))
        );
    }

    #[test]
    fn reduce_connack() {
        let polled = Ok(Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
        })));
        assert_eq!(reduce_event(&polled), Some(SessionEvent::Connected));
    }

    #[test]
    fn reduce_command_publish() {
        let publish = Publish::new(topic::COMMAND, QoS::AtLeastOnce, "on");
        let polled = Ok(Event::Incoming(Packet::Publish(publish)));
        assert_eq!(
            reduce_event(&polled),
            Some(SessionEvent::MessageReceived(b"on".to_vec()))
        );
    }

    #[test]
    fn reduce_ignores_foreign_topics() {
        let publish = Publish::new("dashboard/other", QoS::AtLeastOnce, "on");
        let polled = Ok(Event::Incoming(Packet::Publish(publish)));
        assert_eq!(reduce_event(&polled), None);
    }

    #[test]
    fn reconnect_delay_backs_off_to_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(10), Duration::from_secs(60));
        // Far past the cap the factor saturates instead of overflowing.
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn new_session_starts_disconnected() {
        let dispatcher =
            CommandDispatcher::new(DisplayController::new(Backend::Vcgencmd, FakeRunner::silent()));
        let manager = SessionManager::new(dispatcher);
        assert_eq!(manager.state(), SessionState::Disconnected);
    }
}
