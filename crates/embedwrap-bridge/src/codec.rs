// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON method codec.
//
// Wire shapes, all UTF-8 JSON:
//
//   call           {"method": "<name>", "args": <any>}
//   success reply  [<value>]
//   error reply    ["<code>", "<message>", <details>]
//   not-implemented  empty reply (no bytes)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use embedwrap_core::error::{BridgeError, Result};
use embedwrap_core::types::{MethodCall, MethodResult};

#[derive(Serialize, Deserialize)]
struct WireCall {
    method: String,
    #[serde(default)]
    args: Value,
}

/// Encodes method calls and reply envelopes as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMethodCodec;

impl JsonMethodCodec {
    pub fn encode_method_call(&self, call: &MethodCall) -> Result<Vec<u8>> {
        let wire = WireCall {
            method: call.method().to_owned(),
            args: call.arguments().cloned().unwrap_or(Value::Null),
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    pub fn decode_method_call(&self, bytes: &[u8]) -> Result<MethodCall> {
        let wire: WireCall = serde_json::from_slice(bytes)
            .map_err(|e| BridgeError::Codec(format!("malformed method call: {e}")))?;
        let args = match wire.args {
            Value::Null => None,
            other => Some(other),
        };
        MethodCall::new(wire.method, args)
    }

    /// Encode a reply. `NotImplemented` becomes the empty reply.
    pub fn encode_envelope(&self, result: &MethodResult) -> Result<Option<Vec<u8>>> {
        let envelope = match result {
            MethodResult::Success(value) => Value::Array(vec![value.clone()]),
            MethodResult::Error {
                code,
                message,
                details,
            } => Value::Array(vec![
                Value::String(code.clone()),
                Value::String(message.clone()),
                details.clone().unwrap_or(Value::Null),
            ]),
            MethodResult::NotImplemented => return Ok(None),
        };
        Ok(Some(serde_json::to_vec(&envelope)?))
    }

    /// Decode a reply. An absent or empty reply is `NotImplemented`.
    pub fn decode_envelope(&self, reply: Option<&[u8]>) -> Result<MethodResult> {
        let bytes = match reply {
            None => return Ok(MethodResult::NotImplemented),
            Some(b) if b.is_empty() => return Ok(MethodResult::NotImplemented),
            Some(b) => b,
        };

        let envelope: Value = serde_json::from_slice(bytes)
            .map_err(|e| BridgeError::Codec(format!("malformed envelope: {e}")))?;
        let Value::Array(mut items) = envelope else {
            return Err(BridgeError::Codec("envelope is not a list".into()));
        };

        match items.len() {
            1 => Ok(MethodResult::Success(items.remove(0))),
            3 => {
                let details = items.pop().filter(|d| !d.is_null());
                let Some(Value::String(message)) = items.pop() else {
                    return Err(BridgeError::Codec("error envelope without a message".into()));
                };
                let Some(Value::String(code)) = items.pop() else {
                    return Err(BridgeError::Codec("error envelope without a code".into()));
                };
                Ok(MethodResult::Error {
                    code,
                    message,
                    details,
                })
            }
            n => Err(BridgeError::Codec(format!("envelope has {n} items"))),
        }
    }
}
