// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatch table for calls made by the embedded module.
//
// Every call yields exactly one `MethodResult`, computed synchronously on the
// thread the call arrived on. Failures are returned as error results; an
// unknown method name is `NotImplemented`, not an error.
//
// Argument validation differs per platform on purpose: the Android wrapper
// embeds missing `sendMessage` arguments as `null`, while the iOS wrapper
// rejects a missing `message` with `INVALID_ARGUMENTS`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use embedwrap_core::config::HostPlatform;
use embedwrap_core::types::{MethodCall, MethodResult, codes, methods};

use crate::channel::MethodCallHandler;
use crate::queue::PendingQueue;
use crate::traits::DeviceInfo;

type Handler = Box<dyn Fn(&MethodCall) -> MethodResult + Send + Sync>;

/// Maps method names to handlers.
#[derive(Default)]
pub struct DispatchTable {
    handlers: HashMap<String, Handler>,
}

impl DispatchTable {
    /// An empty table; every call is `NotImplemented`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table the host wrappers register on the platform channel.
    pub fn standard(
        platform: HostPlatform,
        pending: Arc<PendingQueue>,
        device: Arc<dyn DeviceInfo>,
    ) -> Self {
        let mut table = Self::new();

        match platform {
            HostPlatform::Android => {
                table.register(methods::SEND_MESSAGE, acknowledge_lenient);
            }
            HostPlatform::Ios => {
                table.register(methods::SEND_MESSAGE, acknowledge_validated);
                table.register(methods::MESSAGE_FROM_FLUTTER, receive_plain);
            }
        }

        table.register(methods::GET_BATTERY_LEVEL, move |_| battery_level(device.as_ref()));
        table.register(methods::GET_PENDING_MESSAGES, move |_| {
            let drained = pending.drain_all();
            MethodResult::Success(Value::Array(drained.into_iter().map(Value::String).collect()))
        });

        table
    }

    /// Register `handler` for `method`, replacing any previous handler.
    pub fn register<F>(&mut self, method: &str, handler: F) -> &mut Self
    where
        F: Fn(&MethodCall) -> MethodResult + Send + Sync + 'static,
    {
        self.handlers.insert(method.to_owned(), Box::new(handler));
        self
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[instrument(skip_all, fields(method = %call.method()))]
    pub fn dispatch(&self, call: &MethodCall) -> MethodResult {
        let result = match self.handlers.get(call.method()) {
            Some(handler) => handler(call),
            None => MethodResult::NotImplemented,
        };
        debug!(outcome = outcome_label(&result), "call dispatched");
        result
    }
}

impl MethodCallHandler for DispatchTable {
    fn handle(&self, call: &MethodCall) -> MethodResult {
        self.dispatch(call)
    }
}

fn outcome_label(result: &MethodResult) -> &'static str {
    match result {
        MethodResult::Success(_) => "success",
        MethodResult::Error { .. } => "error",
        MethodResult::NotImplemented => "not_implemented",
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Render an argument the way the acknowledgement embeds it: strings
/// verbatim, absent values as `null`, anything else as JSON.
fn display_arg(call: &MethodCall, key: &str) -> String {
    match call.argument(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "null".to_owned(),
        Some(other) => other.to_string(),
    }
}

/// `sendMessage`, Android flavour: never fails.
fn acknowledge_lenient(call: &MethodCall) -> MethodResult {
    let message = display_arg(call, "message");
    let timestamp = display_arg(call, "timestamp");
    MethodResult::success(format!(
        "{} received: {message} at {timestamp}",
        HostPlatform::Android.label()
    ))
}

/// `sendMessage`, iOS flavour: `message` must be a string.
fn acknowledge_validated(call: &MethodCall) -> MethodResult {
    let Some(message) = call.argument_str("message") else {
        return invalid_arguments();
    };
    let label = HostPlatform::Ios.label();
    match call.argument("timestamp") {
        Some(Value::Null) | None => MethodResult::success(format!("{label} processed: {message}")),
        Some(_) => MethodResult::success(format!(
            "{label} processed: {message} at {}",
            display_arg(call, "timestamp")
        )),
    }
}

/// `messageFromFlutter` (iOS only).
fn receive_plain(call: &MethodCall) -> MethodResult {
    match call.argument_str("message") {
        Some(message) => {
            debug!(text = message, "message from embedded module");
            MethodResult::success(format!("{} received: {message}", HostPlatform::Ios.label()))
        }
        None => invalid_arguments(),
    }
}

fn battery_level(device: &dyn DeviceInfo) -> MethodResult {
    match device.battery_percent() {
        Some(pct) => MethodResult::success(pct),
        None => MethodResult::error(codes::UNAVAILABLE, "Battery level not available."),
    }
}

fn invalid_arguments() -> MethodResult {
    MethodResult::error(codes::INVALID_ARGUMENTS, "Invalid arguments")
}
