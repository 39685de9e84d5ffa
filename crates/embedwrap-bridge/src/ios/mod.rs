// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// iOS capabilities via objc2.
//
// UIKit must be driven from the main thread. Inbound channel calls arrive on
// the platform (main) thread, so the battery read happens there; a read from
// any other thread reports "unavailable" instead of touching UIKit.
//
// Presentation needs the host's view controller and engine object, so iOS
// hosts supply their own `HostPresenter`.

#![cfg(target_os = "ios")]

use objc2::rc::Retained;
use objc2::runtime::Bool;
use objc2::{ClassType, MainThreadMarker, msg_send};
use objc2_ui_kit::UIDevice;
use tracing::{debug, warn};

use embedwrap_core::types::battery_percent_from_raw;

use crate::traits::DeviceInfo;

/// `UIDeviceBatteryStateUnknown`.
const BATTERY_STATE_UNKNOWN: isize = 0;

/// iOS device information.
pub struct IosDeviceInfo;

impl DeviceInfo for IosDeviceInfo {
    fn platform_name(&self) -> &str {
        "iOS"
    }

    fn battery_percent(&self) -> Option<u8> {
        if MainThreadMarker::new().is_none() {
            warn!("iOS: battery read requested off the main thread");
            return None;
        }

        // SAFETY: `currentDevice`, `setBatteryMonitoringEnabled:`,
        // `batteryState` and `batteryLevel` are public UIDevice selectors with
        // the signatures used here, and we are on the main thread.
        let (state, level): (isize, f32) = unsafe {
            let device: Retained<UIDevice> = msg_send![UIDevice::class(), currentDevice];
            let _: () = msg_send![&device, setBatteryMonitoringEnabled: Bool::YES];
            (
                msg_send![&device, batteryState],
                msg_send![&device, batteryLevel],
            )
        };

        if state == BATTERY_STATE_UNKNOWN {
            debug!("iOS: battery state unknown");
            return None;
        }
        battery_percent_from_raw((level * 100.0) as i32)
    }
}
