// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process embedded runtime for desktop/CI.
//
// `LoopbackRuntime` stands in for the real embedded engine. Booting it spawns
// a genuine single-threaded UI executor; its messenger records every
// host → module invocation and lets the caller play the module's side by
// calling host methods. Boots are counted, and boot failures and delays can
// be injected to exercise the bridge lifecycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use embedwrap_core::error::{BridgeError, Result};
use embedwrap_core::types::{MethodCall, MethodResult};

use crate::codec::JsonMethodCodec;
use crate::executor::{ThreadExecutor, UiExecutor};
use crate::runtime::{BinaryMessageHandler, BinaryMessenger, EmbeddedRuntime};

/// An invocation the module side received from the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedCall {
    pub channel: String,
    pub method: String,
    pub arguments: Option<Value>,
    /// Whether the send happened on the runtime's UI executor.
    pub on_ui_thread: bool,
}

/// Loopback stand-in for the embedded runtime.
pub struct LoopbackRuntime {
    ui_thread_name: String,
    boot_delay: Duration,
    failures_remaining: AtomicUsize,
    attempts: AtomicUsize,
    boots: AtomicUsize,
    messenger: Mutex<Option<Arc<LoopbackMessenger>>>,
}

impl LoopbackRuntime {
    pub fn new(ui_thread_name: &str) -> Self {
        Self {
            ui_thread_name: ui_thread_name.to_owned(),
            boot_delay: Duration::ZERO,
            failures_remaining: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
            boots: AtomicUsize::new(0),
            messenger: Mutex::new(None),
        }
    }

    /// Sleep this long inside every boot.
    pub fn with_boot_delay(mut self, delay: Duration) -> Self {
        self.boot_delay = delay;
        self
    }

    /// Fail the next `count` boots.
    pub fn failing_boots(self, count: usize) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Number of boots that completed.
    pub fn boot_count(&self) -> usize {
        self.boots.load(Ordering::SeqCst)
    }

    /// Number of boots attempted, failed ones included.
    pub fn boot_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Messenger of the most recent successful boot.
    pub fn messenger(&self) -> Option<Arc<LoopbackMessenger>> {
        self.messenger.lock().expect("loopback messenger lock poisoned").clone()
    }
}

impl EmbeddedRuntime for LoopbackRuntime {
    fn boot(&self, engine_id: &str) -> Result<Arc<dyn BinaryMessenger>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.boot_delay.is_zero() {
            std::thread::sleep(self.boot_delay);
        }

        let inject_failure = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if inject_failure {
            warn!(engine_id, attempt, "loopback boot failure injected");
            return Err(BridgeError::Boot(format!("loopback engine {engine_id} failed to start")));
        }

        let executor = Arc::new(ThreadExecutor::spawn(&self.ui_thread_name)?);
        let messenger = Arc::new(LoopbackMessenger::new(engine_id, executor));
        *self.messenger.lock().expect("loopback messenger lock poisoned") =
            Some(Arc::clone(&messenger));
        self.boots.fetch_add(1, Ordering::SeqCst);

        info!(engine_id, attempt, "loopback engine booted");
        Ok(messenger)
    }
}

/// Messenger of a booted loopback engine.
pub struct LoopbackMessenger {
    engine_id: String,
    executor: Arc<ThreadExecutor>,
    handlers: Mutex<HashMap<String, Arc<dyn BinaryMessageHandler>>>,
    received: Mutex<Vec<ReceivedCall>>,
    codec: JsonMethodCodec,
}

impl LoopbackMessenger {
    fn new(engine_id: &str, executor: Arc<ThreadExecutor>) -> Self {
        Self {
            engine_id: engine_id.to_owned(),
            executor,
            handlers: Mutex::new(HashMap::new()),
            received: Mutex::new(Vec::new()),
            codec: JsonMethodCodec,
        }
    }

    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }

    /// Whether a host handler is installed on `channel`.
    pub fn has_handler(&self, channel: &str) -> bool {
        self.handlers
            .lock()
            .expect("loopback handler lock poisoned")
            .contains_key(channel)
    }

    /// Everything the module side has received so far, in order.
    pub fn received(&self) -> Vec<ReceivedCall> {
        self.received.lock().expect("loopback inbox lock poisoned").clone()
    }

    /// Wait until every invocation posted so far has been sent.
    pub fn flush(&self) -> Result<()> {
        self.executor.flush()
    }

    /// Act as the module: call `method` on the host side of `channel`.
    pub fn call_host(
        &self,
        channel: &str,
        method: &str,
        arguments: Option<Value>,
    ) -> Result<MethodResult> {
        let call = MethodCall::new(method, arguments)?;
        let bytes = self.codec.encode_method_call(&call)?;
        let reply = self.call_host_raw(channel, &bytes)?;
        self.codec.decode_envelope(reply.as_deref())
    }

    /// Deliver raw bytes to the host handler on the UI executor and return
    /// the raw reply.
    pub fn call_host_raw(&self, channel: &str, message: &[u8]) -> Result<Option<Vec<u8>>> {
        let handler = self
            .handlers
            .lock()
            .expect("loopback handler lock poisoned")
            .get(channel)
            .cloned()
            .ok_or_else(|| BridgeError::Bridge(format!("no host handler on {channel}")))?;

        if self.executor.is_current() {
            return Ok(handler.on_message(message));
        }

        let (tx, rx) = std::sync::mpsc::channel();
        let message = message.to_vec();
        self.executor.post(Box::new(move || {
            let _ = tx.send(handler.on_message(&message));
        }))?;
        rx.recv().map_err(|_| BridgeError::ExecutorClosed)
    }
}

impl BinaryMessenger for LoopbackMessenger {
    fn send(&self, channel: &str, message: &[u8]) -> Result<()> {
        let call = self.codec.decode_method_call(message)?;
        let on_ui_thread = self.executor.is_current();
        if !on_ui_thread {
            warn!(channel, method = call.method(), "send issued off the UI executor");
        }
        debug!(channel, method = call.method(), "loopback received invocation");
        self.received
            .lock()
            .expect("loopback inbox lock poisoned")
            .push(ReceivedCall {
                channel: channel.to_owned(),
                method: call.method().to_owned(),
                arguments: call.arguments().cloned(),
                on_ui_thread,
            });
        Ok(())
    }

    fn set_message_handler(&self, channel: &str, handler: Option<Arc<dyn BinaryMessageHandler>>) {
        let mut handlers = self.handlers.lock().expect("loopback handler lock poisoned");
        match handler {
            Some(h) => {
                handlers.insert(channel.to_owned(), h);
            }
            None => {
                handlers.remove(channel);
            }
        }
    }

    fn ui_executor(&self) -> Arc<dyn UiExecutor> {
        Arc::clone(&self.executor) as Arc<dyn UiExecutor>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use embedwrap_core::types::codes;

    use crate::channel::{MethodCallHandler, MethodChannel};

    struct Echo;

    impl MethodCallHandler for Echo {
        fn handle(&self, call: &MethodCall) -> MethodResult {
            match call.method() {
                "echo" => MethodResult::Success(call.arguments().cloned().unwrap_or(Value::Null)),
                _ => MethodResult::NotImplemented,
            }
        }
    }

    fn booted(name: &str) -> (LoopbackRuntime, Arc<LoopbackMessenger>) {
        let runtime = LoopbackRuntime::new(name);
        runtime.boot("engine").expect("boot");
        let messenger = runtime.messenger().expect("messenger");
        (runtime, messenger)
    }

    #[test]
    fn boot_failures_are_injected_then_clear() {
        let runtime = LoopbackRuntime::new("lb-fail").failing_boots(2);
        assert!(runtime.boot("engine").is_err());
        assert!(runtime.boot("engine").is_err());
        assert!(runtime.messenger().is_none());
        assert!(runtime.boot("engine").is_ok());
        assert_eq!(runtime.boot_attempts(), 3);
        assert_eq!(runtime.boot_count(), 1);
    }

    #[test]
    fn channel_round_trip_through_handler() {
        let (_runtime, messenger) = booted("lb-echo");
        let channel = MethodChannel::new(
            "test/channel",
            Arc::clone(&messenger) as Arc<dyn BinaryMessenger>,
        );
        channel.set_method_call_handler(Some(Arc::new(Echo)));
        assert!(messenger.has_handler("test/channel"));

        assert_eq!(
            messenger.call_host("test/channel", "echo", Some(json!({"x": 1}))).expect("call"),
            MethodResult::success(json!({"x": 1}))
        );
        assert_eq!(
            messenger.call_host("test/channel", "other", None).expect("call"),
            MethodResult::NotImplemented
        );

        channel.set_method_call_handler(None);
        assert!(!messenger.has_handler("test/channel"));
        assert!(messenger.call_host("test/channel", "echo", None).is_err());
    }

    #[test]
    fn malformed_inbound_bytes_get_an_error_reply() {
        let (_runtime, messenger) = booted("lb-malformed");
        let channel = MethodChannel::new(
            "test/channel",
            Arc::clone(&messenger) as Arc<dyn BinaryMessenger>,
        );
        channel.set_method_call_handler(Some(Arc::new(Echo)));

        let reply = messenger
            .call_host_raw("test/channel", b"{ definitely not a call")
            .expect("call");
        let result = JsonMethodCodec.decode_envelope(reply.as_deref()).expect("decode");
        assert_eq!(result.error_code(), Some(codes::INVALID_ARGUMENTS));
    }

    #[test]
    fn direct_send_off_ui_thread_is_flagged() {
        let (_runtime, messenger) = booted("lb-offthread");
        let channel = MethodChannel::new(
            "test/channel",
            Arc::clone(&messenger) as Arc<dyn BinaryMessenger>,
        );

        channel.invoke_method("messageFromNative", json!({"message": "direct"})).expect("invoke");
        channel.post_invoke("messageFromNative", json!({"message": "posted"})).expect("post");
        messenger.flush().expect("flush");

        let flags: Vec<bool> = messenger.received().iter().map(|c| c.on_ui_thread).collect();
        assert_eq!(flags, vec![false, true]);
    }
}
