// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed MQTT topic contract.
//!
//! The topics are part of the external contract with the home-automation hub
//! and are deliberately not derived from configuration.

/// Inbound commands: `on`, `off`, `status`. Subscribed, not retained.
pub const COMMAND: &str = "dashboard/display/command";

/// Observed display state: `on`, `off`, `unknown`. Published retained.
pub const STATUS: &str = "dashboard/display/status";

/// Daemon availability: `online`, `offline`. Published retained; also the
/// Last-Will topic so the broker reports `offline` on an ungraceful drop.
pub const AVAILABILITY: &str = "dashboard/display/availability";

/// Availability payload while the session is up.
pub const ONLINE: &str = "online";

/// Availability payload on (graceful or ungraceful) disconnect.
pub const OFFLINE: &str = "offline";
