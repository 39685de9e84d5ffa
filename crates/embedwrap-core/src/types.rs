// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the module bridge: the messages the host sends, the
// calls the embedded module makes, and the replies it gets back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

// ---------------------------------------------------------------------------
// Wire names
// ---------------------------------------------------------------------------

/// Method names fixed by the channel contract.
pub mod methods {
    /// Host → embedded: deliver a message to the module.
    pub const MESSAGE_FROM_NATIVE: &str = "messageFromNative";
    /// Embedded → host: acknowledge a message with its timestamp.
    pub const SEND_MESSAGE: &str = "sendMessage";
    /// Embedded → host: read the device battery percentage.
    pub const GET_BATTERY_LEVEL: &str = "getBatteryLevel";
    /// Embedded → host: pull everything queued while no channel existed.
    pub const GET_PENDING_MESSAGES: &str = "getPendingMessages";
    /// Embedded → host (iOS only): plain message acknowledgement.
    pub const MESSAGE_FROM_FLUTTER: &str = "messageFromFlutter";
}

/// Error codes carried in `MethodResult::Error`.
pub mod codes {
    /// A host capability could not produce a value.
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
    /// Arguments were missing or had the wrong shape.
    pub const INVALID_ARGUMENTS: &str = "INVALID_ARGUMENTS";
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// A structured host → module message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeMessage {
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Map<String, Value>>,
}

impl BridgeMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    /// Attach extra key/value pairs delivered alongside `message`.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref()
    }

    /// Flatten into the `messageFromNative` argument map.
    ///
    /// Starts from `{"message": text}` and copies every `data` key over it,
    /// so a `data` entry named `message` replaces the text.
    pub fn to_arguments(&self) -> Value {
        let mut arguments = Map::new();
        arguments.insert("message".to_owned(), Value::String(self.message.clone()));
        if let Some(data) = &self.data {
            arguments.extend(data.clone());
        }
        Value::Object(arguments)
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A call from the embedded module to the host.
///
/// Only constructible through [`MethodCall::new`], so `method` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    method: String,
    arguments: Option<Value>,
}

impl MethodCall {
    /// Build a call. The method name must be non-empty.
    pub fn new(method: impl Into<String>, arguments: Option<Value>) -> Result<Self> {
        let method = method.into();
        if method.is_empty() {
            return Err(BridgeError::InvalidMethodCall("empty method name".into()));
        }
        Ok(Self { method, arguments })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn arguments(&self) -> Option<&Value> {
        self.arguments.as_ref()
    }

    /// Look up a named argument. `None` when arguments are absent, are not a
    /// map, or lack the key.
    pub fn argument(&self, key: &str) -> Option<&Value> {
        self.arguments.as_ref()?.as_object()?.get(key)
    }

    /// Look up a named string argument.
    pub fn argument_str(&self, key: &str) -> Option<&str> {
        self.argument(key)?.as_str()
    }
}

/// Outcome of handling one `MethodCall`.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResult {
    Success(Value),
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },
    /// The method name has no handler. Distinct from an error.
    NotImplemented,
}

impl MethodResult {
    pub fn success(value: impl Into<Value>) -> Self {
        Self::Success(value.into())
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn error_with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The error code, if this is an error result.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Error { code, .. } => Some(code),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Convert a raw battery reading into a percentage.
///
/// Platform APIs report "unknown" as a negative sentinel; anything outside
/// 0–100 is treated the same way.
pub fn battery_percent_from_raw(raw: i32) -> Option<u8> {
    u8::try_from(raw).ok().filter(|pct| *pct <= 100)
}
