// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedwrap: method-channel bridge between a host application and the UI
// module embedded in it.
//
// The host boots the embedded runtime once (`BridgeContext::acquire`), binds
// a single named channel, and from then on pushes messages to the module on
// the runtime's UI executor. Messages sent before the channel exists are
// queued and handed over when the module asks for them (`getPendingMessages`).
//
// Native capabilities (battery level, presenting the module's screen) sit
// behind `DeviceInfo` and `HostPresenter`; `platform_device_info()` and
// `platform_presenter()` pick the implementation for the target OS.

pub mod bridge;
pub mod channel;
pub mod codec;
pub mod dispatch;
pub mod executor;
pub mod loopback;
pub mod queue;
pub mod runtime;
pub mod stub;
pub mod traits;

#[cfg(target_os = "ios")]
pub mod ios;

#[cfg(target_os = "android")]
pub mod android;

use std::sync::Arc;

pub use bridge::{BridgeContext, ModuleBridge};
pub use channel::{ChannelBinding, MethodCallHandler, MethodChannel};
pub use codec::JsonMethodCodec;
pub use dispatch::DispatchTable;
pub use executor::{ThreadExecutor, UiExecutor, UiTask};
pub use queue::PendingQueue;
pub use runtime::{BinaryMessageHandler, BinaryMessenger, EmbeddedRuntime};
pub use traits::{DeviceInfo, HostPresenter};

/// Device information for the target operating system.
pub fn platform_device_info() -> Arc<dyn DeviceInfo> {
    #[cfg(target_os = "ios")]
    {
        Arc::new(ios::IosDeviceInfo)
    }
    #[cfg(target_os = "android")]
    {
        Arc::new(android::AndroidDeviceInfo::new())
    }
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    {
        Arc::new(stub::StubDeviceInfo)
    }
}

/// Presenter for the target operating system.
///
/// iOS hosts present the module from their own view controller and pass
/// their presenter to `BridgeContext::new` directly; there this returns the
/// stub.
pub fn platform_presenter() -> Arc<dyn HostPresenter> {
    #[cfg(target_os = "android")]
    {
        Arc::new(android::AndroidPresenter)
    }
    #[cfg(not(target_os = "android"))]
    {
        Arc::new(stub::StubPresenter)
    }
}
