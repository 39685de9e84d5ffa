// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic capability traits consumed by the bridge.
//
// The bridge does not read device sensors or drive navigation itself; the
// host supplies these collaborators. Platform implementations live in the
// `android`, `ios` and `stub` modules.

use embedwrap_core::error::Result;

/// Device information exposed to the embedded module.
pub trait DeviceInfo: Send + Sync {
    /// Human-readable platform name (e.g. "Android", "iOS").
    fn platform_name(&self) -> &str;

    /// Battery charge in percent (0–100), or `None` if it cannot be read.
    fn battery_percent(&self) -> Option<u8>;
}

/// Shows the embedded module's UI.
pub trait HostPresenter: Send + Sync {
    /// Present the module attached to the runtime cached under `engine_id`.
    /// `message` is the message the module was opened with, if any; it has
    /// already been queued for the module to pull.
    fn present(&self, engine_id: &str, message: Option<&str>) -> Result<()>;
}
