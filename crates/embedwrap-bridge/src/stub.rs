// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub capabilities for desktop/CI builds where native mobile APIs are
// unavailable.

use embedwrap_core::error::{BridgeError, Result};

use crate::traits::{DeviceInfo, HostPresenter};

/// Device info returned on non-mobile platforms. Battery is never available.
pub struct StubDeviceInfo;

impl DeviceInfo for StubDeviceInfo {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }

    fn battery_percent(&self) -> Option<u8> {
        tracing::debug!("DeviceInfo::battery_percent called on stub");
        None
    }
}

/// Presenter returned on non-mobile platforms. There is no UI to show.
pub struct StubPresenter;

impl HostPresenter for StubPresenter {
    fn present(&self, engine_id: &str, _message: Option<&str>) -> Result<()> {
        tracing::warn!(engine_id, "HostPresenter::present called on stub");
        Err(BridgeError::PlatformUnavailable)
    }
}
