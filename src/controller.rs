// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Display controller.
//!
//! [`DisplayController`] is the single point that mutates display power.
//! Every mode (listener, schedule, one-shot CLI) funnels through it, which
//! keeps hardware writes from racing each other.

use crate::backend::Backend;
use crate::error::HardwareError;
use crate::exec::{CommandRunner, Invocation};
use crate::types::DisplayState;

/// Wayland socket of the kiosk session.
const WAYLAND_DISPLAY: &str = "wayland-0";

/// Fallback runtime directory when the environment does not provide one.
/// The kiosk image runs the session as the first regular user.
const DEFAULT_RUNTIME_DIR: &str = "/run/user/1000";

/// Controls the physical display through the selected backend, with a
/// best-effort wake or suspend of the windowing session around power changes.
#[derive(Debug)]
pub struct DisplayController<R> {
    backend: Backend,
    pub(crate) runner: R,
}

impl<R: CommandRunner> DisplayController<R> {
    /// Wraps an already selected backend.
    pub fn new(backend: Backend, runner: R) -> Self {
        Self { backend, runner }
    }

    /// Probes for a backend and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::NoBackend`] if no vendor tool is present.
    pub async fn detect(runner: R) -> Result<Self, HardwareError> {
        let backend = Backend::detect(&runner).await?;
        Ok(Self::new(backend, runner))
    }

    /// Returns the selected backend.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Sets the display power.
    ///
    /// The windowing session is woken (on) or suspended (off) first; that
    /// call is tolerant to its own failure and never affects the vendor
    /// call. No verification read-back is performed.
    ///
    /// # Errors
    ///
    /// Propagates [`HardwareError`] from the backend.
    pub async fn set_power(&self, on: bool) -> Result<(), HardwareError> {
        self.session_power(on).await;
        self.backend.set_power(&self.runner, on).await
    }

    /// Reads the observed display power state.
    ///
    /// # Errors
    ///
    /// Propagates [`HardwareError`] from the backend.
    pub async fn read_power(&self) -> Result<DisplayState, HardwareError> {
        self.backend.read_power(&self.runner).await
    }

    /// Best-effort compositor output wake/suspend via `wlopm`.
    async fn session_power(&self, on: bool) {
        let flag = if on { "--on" } else { "--off" };
        let invocation = Invocation::new("wlopm")
            .arg(flag)
            .arg("*")
            .env("WAYLAND_DISPLAY", WAYLAND_DISPLAY)
            .env("XDG_RUNTIME_DIR", runtime_dir());

        match self.runner.run(&invocation).await {
            Ok(output) if output.success() => {}
            Ok(output) => tracing::debug!(
                code = output.code.unwrap_or(-1),
                "Session power call failed"
            ),
            Err(e) => tracing::debug!(error = %e, "Session power call failed"),
        }
    }
}

fn runtime_dir() -> String {
    std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| DEFAULT_RUNTIME_DIR.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::fake::FakeRunner;

    #[tokio::test]
    async fn set_power_wakes_session_before_backend() {
        let runner = FakeRunner::silent();
        let controller = DisplayController::new(Backend::Tvservice, runner);
        controller.set_power(true).await.unwrap();

        let calls = controller.runner.calls();
        assert_eq!(calls, vec!["wlopm --on *".to_string(), "tvservice -p".to_string()]);
    }

    #[tokio::test]
    async fn session_failure_does_not_block_backend() {
        let runner = FakeRunner::new(|invocation| {
            if invocation.program() == "wlopm" {
                Err(HardwareError::Spawn {
                    program: "wlopm".to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
            } else {
                Ok(crate::exec::fake::ok(""))
            }
        });
        let controller = DisplayController::new(Backend::Tvservice, runner);
        controller.set_power(false).await.unwrap();

        let calls = controller.runner.calls();
        assert_eq!(calls, vec!["wlopm --off *".to_string(), "tvservice -o".to_string()]);
    }

    #[tokio::test]
    async fn repeated_set_power_is_idempotent() {
        let runner = FakeRunner::silent();
        let controller = DisplayController::new(Backend::Vcgencmd, runner);
        controller.set_power(true).await.unwrap();
        controller.set_power(true).await.unwrap();
    }

    #[tokio::test]
    async fn read_power_skips_session_calls() {
        let runner = FakeRunner::new(|_| Ok(crate::exec::fake::ok("display_power=1")));
        let controller = DisplayController::new(Backend::Vcgencmd, runner);
        let state = controller.read_power().await.unwrap();

        assert_eq!(state, DisplayState::On);
        assert!(
            controller
                .runner
                .calls()
                .iter()
                .all(|call| call.starts_with("vcgencmd"))
        );
    }
}
