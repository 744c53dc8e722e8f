// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall-clock scheduling of display power.
//!
//! The scheduler recomputes the desired on/off state every tick and drives
//! the controller only when that value changes (edge-triggered). The last
//! applied value lives in memory only, so a fresh process always performs one
//! corrective apply on its first tick.

use std::time::Duration;

use chrono::{Local, NaiveTime};
use tokio_util::sync::CancellationToken;

use crate::controller::DisplayController;
use crate::exec::CommandRunner;

/// Daily on/off window with a polling interval.
///
/// An off time earlier than the on time wraps the window past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    /// Time the display turns on.
    pub on_time: NaiveTime,
    /// Time the display turns off.
    pub off_time: NaiveTime,
    /// Interval between schedule evaluations.
    pub interval: Duration,
}

/// Computes the desired power state at `now`.
///
/// Equal on and off times mean always on.
///
/// # Examples
///
/// ```
/// use chrono::NaiveTime;
/// use displayctl::desired_state;
///
/// let on = NaiveTime::from_hms_opt(22, 0, 0).unwrap();
/// let off = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
/// let midnight_half = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
///
/// // Overnight window: on in the evening, off over the day.
/// assert!(desired_state(midnight_half, on, off));
/// ```
#[must_use]
pub fn desired_state(now: NaiveTime, on_time: NaiveTime, off_time: NaiveTime) -> bool {
    if on_time == off_time {
        true
    } else if on_time < off_time {
        on_time <= now && now < off_time
    } else {
        // Overnight window: the off period lies between off_time and on_time.
        !(off_time <= now && now < on_time)
    }
}

/// Edge-triggered scheduler driving the display controller.
#[derive(Debug)]
pub struct Scheduler<R> {
    controller: DisplayController<R>,
    window: ScheduleWindow,
    last_applied: Option<bool>,
}

impl<R: CommandRunner> Scheduler<R> {
    /// Creates a scheduler for the given window.
    pub fn new(controller: DisplayController<R>, window: ScheduleWindow) -> Self {
        Self {
            controller,
            window,
            last_applied: None,
        }
    }

    /// Runs the tick loop until `shutdown` is cancelled.
    ///
    /// Termination does not force a final state change; the last hardware
    /// state is left as-is.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        tracing::info!(
            on_time = %self.window.on_time,
            off_time = %self.window.off_time,
            interval_secs = self.window.interval.as_secs(),
            "Starting schedule"
        );

        loop {
            self.tick(Local::now().time()).await;

            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Schedule stopped");
                    return;
                }
                () = tokio::time::sleep(self.window.interval) => {}
            }
        }
    }

    /// Evaluates the window at `now` and applies the desired state if it
    /// differs from the last applied value.
    pub async fn tick(&mut self, now: NaiveTime) {
        let desired = desired_state(now, self.window.on_time, self.window.off_time);
        if self.last_applied == Some(desired) {
            return;
        }

        tracing::info!(desired = if desired { "on" } else { "off" }, "Applying scheduled state");
        match self.controller.set_power(desired).await {
            Ok(()) => self.last_applied = Some(desired),
            // last_applied stays stale so the next tick retries the write.
            Err(e) => tracing::error!(error = %e, "Scheduled power change failed"),
        }
    }
}
