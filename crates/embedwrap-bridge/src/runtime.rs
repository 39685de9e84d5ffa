// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Seams to the embedded runtime.
//
// The bridge never knows how the embedded module is packaged or started. A
// runtime implementation boots it and hands back a `BinaryMessenger`: the
// byte-level transport that method channels are layered on.

use std::sync::Arc;

use embedwrap_core::error::Result;

use crate::executor::UiExecutor;

/// Receives raw messages arriving on one channel.
pub trait BinaryMessageHandler: Send + Sync {
    /// Handle one message and produce the reply. `None` is the empty reply,
    /// which method channels read as "not implemented".
    fn on_message(&self, message: &[u8]) -> Option<Vec<u8>>;
}

/// Byte transport between host and embedded runtime.
pub trait BinaryMessenger: Send + Sync {
    /// Send a message to the embedded side of `channel`. Only valid on the
    /// runtime's UI executor.
    fn send(&self, channel: &str, message: &[u8]) -> Result<()>;

    /// Install (or with `None`, remove) the host-side handler for `channel`.
    fn set_message_handler(&self, channel: &str, handler: Option<Arc<dyn BinaryMessageHandler>>);

    /// The executor outbound sends must be posted to.
    fn ui_executor(&self) -> Arc<dyn UiExecutor>;
}

/// Something that can start the embedded runtime.
pub trait EmbeddedRuntime: Send + Sync {
    /// Start the runtime, cache it under `engine_id`, and return its
    /// messenger. Called at most once per successful bridge lifetime.
    fn boot(&self, engine_id: &str) -> Result<Arc<dyn BinaryMessenger>>;
}
