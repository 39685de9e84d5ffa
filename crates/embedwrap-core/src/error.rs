// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Embedwrap.

use thiserror::Error;

/// Top-level error type for all bridge operations.
///
/// None of these cross the method channel: dispatch failures are encoded as
/// `MethodResult::Error` replies instead.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Lifecycle --
    #[error("embedded runtime failed to boot: {0}")]
    Boot(String),

    #[error("channel {channel} is already bound")]
    ChannelAlreadyBound { channel: String },

    #[error("UI executor is no longer accepting tasks")]
    ExecutorClosed,

    // -- Wire --
    #[error("method codec error: {0}")]
    Codec(String),

    #[error("invalid method call: {0}")]
    InvalidMethodCall(String),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;
