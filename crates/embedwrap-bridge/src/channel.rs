// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Named method channel and its one-way binding slot.

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use tracing::{debug, warn};

use embedwrap_core::error::{BridgeError, Result};
use embedwrap_core::types::{MethodCall, MethodResult, codes};

use crate::codec::JsonMethodCodec;
use crate::executor::UiExecutor;
use crate::runtime::{BinaryMessageHandler, BinaryMessenger};

/// Handles decoded calls arriving on a method channel.
pub trait MethodCallHandler: Send + Sync {
    /// Produce exactly one result for `call`.
    fn handle(&self, call: &MethodCall) -> MethodResult;
}

/// A method channel over a `BinaryMessenger`.
#[derive(Clone)]
pub struct MethodChannel {
    name: Arc<str>,
    messenger: Arc<dyn BinaryMessenger>,
    codec: JsonMethodCodec,
}

impl MethodChannel {
    pub fn new(name: &str, messenger: Arc<dyn BinaryMessenger>) -> Self {
        Self {
            name: name.into(),
            messenger,
            codec: JsonMethodCodec,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executor that `invoke_method` must run on.
    pub fn ui_executor(&self) -> Arc<dyn UiExecutor> {
        self.messenger.ui_executor()
    }

    /// Invoke `method` on the embedded side. The caller must already be on
    /// the runtime's UI executor; see [`MethodChannel::post_invoke`].
    pub fn invoke_method(&self, method: &str, arguments: Value) -> Result<()> {
        let call = MethodCall::new(method, Some(arguments))?;
        let bytes = self.codec.encode_method_call(&call)?;
        self.messenger.send(&self.name, &bytes)
    }

    /// Post an invocation to the UI executor and return immediately.
    ///
    /// Fails only if the executor is closed, in which case nothing was sent.
    /// Send failures on the UI thread are logged; there is no caller left to
    /// report them to.
    pub fn post_invoke(&self, method: &str, arguments: Value) -> Result<()> {
        let channel = self.clone();
        let method = method.to_owned();
        self.ui_executor().post(Box::new(move || {
            if let Err(e) = channel.invoke_method(&method, arguments) {
                warn!(channel = %channel.name, method = %method, error = %e, "invocation failed");
            }
        }))
    }

    /// Install the inbound handler, or remove it with `None`.
    pub fn set_method_call_handler(&self, handler: Option<Arc<dyn MethodCallHandler>>) {
        let adapter = handler.map(|handler| {
            Arc::new(CallAdapter {
                channel: Arc::clone(&self.name),
                handler,
                codec: self.codec,
            }) as Arc<dyn BinaryMessageHandler>
        });
        self.messenger.set_message_handler(&self.name, adapter);
    }
}

impl std::fmt::Debug for MethodChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodChannel").field("name", &self.name).finish()
    }
}

/// Decodes raw messages into calls and encodes the handler's reply.
struct CallAdapter {
    channel: Arc<str>,
    handler: Arc<dyn MethodCallHandler>,
    codec: JsonMethodCodec,
}

impl BinaryMessageHandler for CallAdapter {
    fn on_message(&self, message: &[u8]) -> Option<Vec<u8>> {
        let result = match self.codec.decode_method_call(message) {
            Ok(call) => self.handler.handle(&call),
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "rejected malformed inbound call");
                MethodResult::error(codes::INVALID_ARGUMENTS, e.to_string())
            }
        };
        match self.codec.encode_envelope(&result) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "failed to encode reply");
                self.codec
                    .encode_envelope(&MethodResult::error(codes::INVALID_ARGUMENTS, e.to_string()))
                    .ok()
                    .flatten()
            }
        }
    }
}

/// Slot holding the live channel. Unbound until boot, then bound for good.
#[derive(Debug, Default)]
pub struct ChannelBinding {
    slot: OnceLock<MethodChannel>,
}

impl ChannelBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the channel. A second bind is rejected and leaves the first in
    /// place.
    pub fn bind(&self, channel: MethodChannel) -> Result<()> {
        let name = channel.name().to_owned();
        self.slot
            .set(channel)
            .map_err(|_| BridgeError::ChannelAlreadyBound { channel: name.clone() })?;
        debug!(channel = %name, "channel bound");
        Ok(())
    }

    pub fn get(&self) -> Option<&MethodChannel> {
        self.slot.get()
    }

    pub fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }
}
