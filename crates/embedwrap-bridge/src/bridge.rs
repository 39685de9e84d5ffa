// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge lifecycle.
//
// `BridgeContext` is built once at application start and handed to whatever
// needs the embedded module. It owns the pending queue and the channel slot,
// so messages can be sent before anything has booted. `acquire()` boots the
// embedded runtime exactly once and returns the shared `ModuleBridge`.
//
// Boot is claimed under a mutex and runs outside it; concurrent callers wait
// on a condvar until the claimant publishes a bridge or gives the claim back.
// A failed boot publishes nothing, so the next `acquire()` starts over.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::ThreadId;

use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use embedwrap_core::config::BridgeConfig;
use embedwrap_core::error::{BridgeError, Result};
use embedwrap_core::types::{BridgeMessage, methods};

use crate::channel::{ChannelBinding, MethodChannel};
use crate::dispatch::DispatchTable;
use crate::queue::PendingQueue;
use crate::runtime::EmbeddedRuntime;
use crate::traits::{DeviceInfo, HostPresenter};

/// State reachable both before and after boot.
struct Shared {
    config: BridgeConfig,
    pending: Arc<PendingQueue>,
    channel: ChannelBinding,
    device: Arc<dyn DeviceInfo>,
}

impl Shared {
    /// Deliver through the channel if bound, otherwise queue `text`.
    fn deliver(&self, text: &str, arguments: Value) {
        let Some(channel) = self.channel.get() else {
            debug!("channel not bound, queueing message");
            self.pending.enqueue(text);
            return;
        };
        if let Err(e) = channel.post_invoke(methods::MESSAGE_FROM_NATIVE, arguments) {
            warn!(error = %e, "UI executor rejected delivery, queueing message");
            self.pending.enqueue(text);
        }
    }

    fn send_to_module(&self, message: &str) {
        self.deliver(message, json!({ "message": message }));
    }

    fn send_message(&self, message: &BridgeMessage) {
        if !self.channel.is_bound() {
            if let Some(data) = message.data().filter(|d| !d.is_empty()) {
                let keys: Vec<&str> = data.keys().map(String::as_str).collect();
                warn!(?keys, "channel not bound, queueing message text without its data");
            }
        }
        self.deliver(message.message(), message.to_arguments());
    }
}

/// Boot progress of the single bridge instance.
enum Slot {
    Empty,
    Booting(ThreadId),
    Ready(Arc<ModuleBridge>),
}

/// Process-wide entry point to the embedded module.
pub struct BridgeContext {
    shared: Arc<Shared>,
    runtime: Arc<dyn EmbeddedRuntime>,
    presenter: Arc<dyn HostPresenter>,
    slot: Mutex<Slot>,
    booted: Condvar,
}

impl BridgeContext {
    pub fn new(
        config: BridgeConfig,
        runtime: Arc<dyn EmbeddedRuntime>,
        device: Arc<dyn DeviceInfo>,
        presenter: Arc<dyn HostPresenter>,
    ) -> Self {
        let pending = Arc::new(PendingQueue::with_capacity(config.pending_capacity));
        Self {
            shared: Arc::new(Shared {
                config,
                pending,
                channel: ChannelBinding::new(),
                device,
            }),
            runtime,
            presenter,
            slot: Mutex::new(Slot::Empty),
            booted: Condvar::new(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    /// Return the bridge, booting the embedded runtime on first use.
    ///
    /// Callers arriving while another thread boots block until it finishes.
    /// A call made from inside the boot itself fails instead of deadlocking.
    pub fn acquire(&self) -> Result<Arc<ModuleBridge>> {
        let me = std::thread::current().id();
        {
            let mut slot = self.slot.lock().expect("bridge slot lock poisoned");
            loop {
                let wait = match &*slot {
                    Slot::Ready(bridge) => return Ok(Arc::clone(bridge)),
                    Slot::Booting(owner) if *owner == me => {
                        return Err(BridgeError::Boot("acquire() re-entered during boot".into()));
                    }
                    Slot::Booting(_) => true,
                    Slot::Empty => false,
                };
                if !wait {
                    *slot = Slot::Booting(me);
                    break;
                }
                slot = self.booted.wait(slot).expect("bridge slot lock poisoned");
            }
        }

        let claim = BootClaim { ctx: self, settled: false };
        let outcome = self.boot().map(Arc::new);
        claim.settle(match &outcome {
            Ok(bridge) => Slot::Ready(Arc::clone(bridge)),
            Err(_) => Slot::Empty,
        });
        outcome
    }

    /// The bridge if it has already booted. Never boots.
    pub fn get(&self) -> Option<Arc<ModuleBridge>> {
        match &*self.slot.lock().expect("bridge slot lock poisoned") {
            Slot::Ready(bridge) => Some(Arc::clone(bridge)),
            _ => None,
        }
    }

    /// Whether the channel to the embedded module is bound.
    pub fn is_ready(&self) -> bool {
        self.shared.channel.is_bound()
    }

    /// Send a message to the module, queueing it if no channel exists yet.
    pub fn send_to_module(&self, message: &str) {
        self.shared.send_to_module(message);
    }

    /// Send a structured message, queueing its text if no channel exists yet.
    pub fn send_message(&self, message: &BridgeMessage) {
        self.shared.send_message(message);
    }

    /// Queue a message for the module to pull, bypassing the channel.
    pub fn enqueue_pending(&self, message: &str) {
        self.shared.pending.enqueue(message);
    }

    /// Number of messages waiting for `getPendingMessages`.
    pub fn pending_len(&self) -> usize {
        self.shared.pending.len()
    }

    #[instrument(skip(self), fields(engine_id = %self.shared.config.engine_id))]
    fn boot(&self) -> Result<ModuleBridge> {
        let config = &self.shared.config;
        info!("booting embedded runtime");

        let messenger = self.runtime.boot(&config.engine_id)?;
        let channel = MethodChannel::new(&config.channel_name, messenger);
        let table = DispatchTable::standard(
            config.platform,
            Arc::clone(&self.shared.pending),
            Arc::clone(&self.shared.device),
        );
        channel.set_method_call_handler(Some(Arc::new(table)));

        if let Err(e) = self.shared.channel.bind(channel.clone()) {
            channel.set_method_call_handler(None);
            return Err(e);
        }

        info!(channel = %config.channel_name, "embedded runtime ready");
        Ok(ModuleBridge {
            shared: Arc::clone(&self.shared),
            presenter: Arc::clone(&self.presenter),
            channel,
        })
    }
}

/// Held while booting; publishes the outcome and wakes waiters. If the boot
/// panics the claim is released so waiters can retry.
struct BootClaim<'a> {
    ctx: &'a BridgeContext,
    settled: bool,
}

impl BootClaim<'_> {
    fn settle(mut self, state: Slot) {
        self.publish(state);
        self.settled = true;
    }

    fn publish(&self, state: Slot) {
        // Recover the guard on poison: this also runs while unwinding.
        let mut slot = self.ctx.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = state;
        self.ctx.booted.notify_all();
    }
}

impl Drop for BootClaim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("boot unwound, releasing claim");
            self.publish(Slot::Empty);
        }
    }
}

/// The booted bridge. Obtained from [`BridgeContext::acquire`]; every caller
/// shares the same instance.
pub struct ModuleBridge {
    shared: Arc<Shared>,
    presenter: Arc<dyn HostPresenter>,
    channel: MethodChannel,
}

impl ModuleBridge {
    pub fn engine_id(&self) -> &str {
        &self.shared.config.engine_id
    }

    pub fn channel(&self) -> &MethodChannel {
        &self.channel
    }

    /// Show the module, optionally queueing a message for it to pull first.
    ///
    /// Presentation failures are logged, not returned.
    pub fn open_module(&self, message: Option<&str>) {
        if let Some(message) = message {
            self.shared.pending.enqueue(message);
        }
        match self.presenter.present(self.engine_id(), message) {
            Ok(()) => info!(engine_id = %self.engine_id(), "embedded module presented"),
            Err(e) => {
                warn!(
                    engine_id = %self.engine_id(),
                    error = %e,
                    "failed to present embedded module"
                );
            }
        }
    }

    /// Push a message through the channel on the UI executor.
    pub fn send_to_module(&self, message: &str) {
        self.shared.send_to_module(message);
    }

    /// Push a structured message through the channel on the UI executor.
    pub fn send_message(&self, message: &BridgeMessage) {
        self.shared.send_message(message);
    }

    /// Queue a message for the module to pull, bypassing the channel.
    pub fn enqueue_pending(&self, message: &str) {
        self.shared.pending.enqueue(message);
    }

    /// Battery level as the host sees it; same source as `getBatteryLevel`.
    pub fn battery_level(&self) -> Option<u8> {
        self.shared.device.battery_percent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::time::Duration;

    use embedwrap_core::config::HostPlatform;
    use embedwrap_core::types::MethodResult;

    use crate::loopback::{LoopbackMessenger, LoopbackRuntime};

    struct FixedBattery(Option<u8>);

    impl DeviceInfo for FixedBattery {
        fn platform_name(&self) -> &str {
            "test"
        }

        fn battery_percent(&self) -> Option<u8> {
            self.0
        }
    }

    /// Presenter that records what it was asked to show.
    #[derive(Default)]
    struct RecordingPresenter {
        shown: Mutex<Vec<(String, Option<String>)>>,
    }

    impl HostPresenter for RecordingPresenter {
        fn present(&self, engine_id: &str, message: Option<&str>) -> Result<()> {
            self.shown
                .lock()
                .expect("presenter lock")
                .push((engine_id.to_owned(), message.map(str::to_owned)));
            Ok(())
        }
    }

    struct Harness {
        ctx: Arc<BridgeContext>,
        runtime: Arc<LoopbackRuntime>,
        presenter: Arc<RecordingPresenter>,
    }

    impl Harness {
        fn new(runtime: LoopbackRuntime) -> Self {
            Self::with_config(runtime, BridgeConfig {
                platform: HostPlatform::Android,
                ..BridgeConfig::default()
            })
        }

        fn with_config(runtime: LoopbackRuntime, config: BridgeConfig) -> Self {
            let runtime = Arc::new(runtime);
            let presenter = Arc::new(RecordingPresenter::default());
            let ctx = Arc::new(BridgeContext::new(
                config,
                Arc::clone(&runtime) as Arc<dyn EmbeddedRuntime>,
                Arc::new(FixedBattery(Some(64))),
                Arc::clone(&presenter) as Arc<dyn HostPresenter>,
            ));
            Self {
                ctx,
                runtime,
                presenter,
            }
        }

        fn messenger(&self) -> Arc<LoopbackMessenger> {
            self.runtime.messenger().expect("runtime booted")
        }

        fn pull_pending(&self) -> MethodResult {
            self.messenger()
                .call_host(&self.ctx.config().channel_name, "getPendingMessages", None)
                .expect("call host")
        }
    }

    #[test]
    fn concurrent_first_acquire_boots_once() {
        let runtime = LoopbackRuntime::new("ui-once").with_boot_delay(Duration::from_millis(50));
        let h = Harness::new(runtime);
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = Arc::clone(&h.ctx);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    ctx.acquire().expect("acquire")
                })
            })
            .collect();

        let bridges: Vec<Arc<ModuleBridge>> = handles
            .into_iter()
            .map(|h| h.join().expect("acquire thread panicked"))
            .collect();

        assert_eq!(h.runtime.boot_count(), 1);
        assert!(bridges.iter().all(|b| Arc::ptr_eq(b, &bridges[0])));
        assert!(h.ctx.is_ready());
    }

    #[test]
    fn acquire_is_idempotent() {
        let h = Harness::new(LoopbackRuntime::new("ui-idem"));
        assert!(h.ctx.get().is_none());

        let first = h.ctx.acquire().expect("first");
        let second = h.ctx.acquire().expect("second");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &h.ctx.get().expect("ready")));
        assert_eq!(h.runtime.boot_count(), 1);
    }

    #[test]
    fn send_before_boot_is_queued_not_delivered() {
        let h = Harness::new(LoopbackRuntime::new("ui-fallback"));
        h.ctx.send_to_module("hello");
        assert!(!h.ctx.is_ready());
        assert_eq!(h.ctx.pending_len(), 1);

        h.ctx.acquire().expect("acquire");
        let messenger = h.messenger();
        messenger.flush().expect("flush");
        assert!(messenger.received().is_empty());

        assert_eq!(h.pull_pending(), MethodResult::success(json!(["hello"])));
        assert_eq!(h.pull_pending(), MethodResult::success(json!([])));
    }

    #[test]
    fn send_after_boot_goes_through_ui_executor() {
        let h = Harness::new(LoopbackRuntime::new("ui-push"));
        let bridge = h.ctx.acquire().expect("acquire");

        bridge.send_to_module("one");
        h.ctx.send_to_module("two");
        let messenger = h.messenger();
        messenger.flush().expect("flush");

        let received = messenger.received();
        assert_eq!(received.len(), 2);
        for (call, text) in received.iter().zip(["one", "two"]) {
            assert_eq!(call.method, "messageFromNative");
            assert_eq!(call.arguments, Some(json!({ "message": text })));
            assert!(call.on_ui_thread);
        }
        assert_eq!(h.ctx.pending_len(), 0);
    }

    #[test]
    fn queued_messages_are_not_flushed_on_bind() {
        let h = Harness::new(LoopbackRuntime::new("ui-pull"));
        h.ctx.send_to_module("early");
        let bridge = h.ctx.acquire().expect("acquire");
        bridge.send_to_module("late");
        h.messenger().flush().expect("flush");

        let pushed: Vec<_> = h.messenger().received().into_iter().map(|c| c.arguments).collect();
        assert_eq!(pushed, vec![Some(json!({ "message": "late" }))]);
        assert_eq!(h.pull_pending(), MethodResult::success(json!(["early"])));
    }

    #[test]
    fn open_module_queues_then_presents() {
        let h = Harness::new(LoopbackRuntime::new("ui-open"));
        let bridge = h.ctx.acquire().expect("acquire");

        bridge.open_module(Some("deep-link"));
        bridge.open_module(None);

        let shown = h.presenter.shown.lock().expect("presenter lock").clone();
        assert_eq!(
            shown,
            vec![
                ("flutter_module_engine".to_owned(), Some("deep-link".to_owned())),
                ("flutter_module_engine".to_owned(), None),
            ]
        );
        // Opening never pushes through the channel.
        h.messenger().flush().expect("flush");
        assert!(h.messenger().received().is_empty());
        assert_eq!(h.pull_pending(), MethodResult::success(json!(["deep-link"])));
    }

    #[test]
    fn failed_boot_publishes_nothing_and_can_retry() {
        let h = Harness::new(LoopbackRuntime::new("ui-retry").failing_boots(1));

        assert!(matches!(h.ctx.acquire(), Err(BridgeError::Boot(_))));
        assert!(h.ctx.get().is_none());
        assert!(!h.ctx.is_ready());

        // Messages still fall back to the queue while nothing is bound.
        h.ctx.send_to_module("survives");

        let bridge = h.ctx.acquire().expect("second attempt");
        assert_eq!(h.runtime.boot_attempts(), 2);
        assert_eq!(h.runtime.boot_count(), 1);
        assert_eq!(bridge.engine_id(), "flutter_module_engine");
        assert_eq!(h.pull_pending(), MethodResult::success(json!(["survives"])));
    }

    #[test]
    fn structured_message_merges_data_into_arguments() {
        let h = Harness::new(LoopbackRuntime::new("ui-structured"));
        let bridge = h.ctx.acquire().expect("acquire");

        let mut data = serde_json::Map::new();
        data.insert("route".into(), json!("/checkout"));
        bridge.send_message(&BridgeMessage::new("navigate").with_data(data));
        h.messenger().flush().expect("flush");

        let received = h.messenger().received();
        assert_eq!(
            received[0].arguments,
            Some(json!({ "message": "navigate", "route": "/checkout" }))
        );
    }

    #[test]
    fn structured_message_before_boot_queues_text() {
        let h = Harness::new(LoopbackRuntime::new("ui-structured-early"));
        let mut data = serde_json::Map::new();
        data.insert("route".into(), json!("/checkout"));
        h.ctx.send_message(&BridgeMessage::new("navigate").with_data(data));

        h.ctx.acquire().expect("acquire");
        assert_eq!(h.pull_pending(), MethodResult::success(json!(["navigate"])));
    }

    #[test]
    fn enqueue_pending_bypasses_the_channel() {
        let h = Harness::new(LoopbackRuntime::new("ui-enqueue"));
        let bridge = h.ctx.acquire().expect("acquire");
        bridge.enqueue_pending("direct");
        h.ctx.enqueue_pending("via context");
        h.messenger().flush().expect("flush");

        assert!(h.messenger().received().is_empty());
        assert_eq!(h.ctx.pending_len(), 2);
        assert_eq!(h.pull_pending(), MethodResult::success(json!(["direct", "via context"])));
    }

    #[test]
    fn inbound_calls_reach_dispatch_table() {
        let h = Harness::new(LoopbackRuntime::new("ui-inbound"));
        let bridge = h.ctx.acquire().expect("acquire");
        let channel = h.ctx.config().channel_name.clone();
        let messenger = h.messenger();

        assert_eq!(
            messenger.call_host(&channel, "getBatteryLevel", None).expect("call"),
            MethodResult::success(64)
        );
        assert_eq!(bridge.battery_level(), Some(64));
        assert_eq!(
            messenger.call_host(&channel, "doesNotExist", None).expect("call"),
            MethodResult::NotImplemented
        );
        assert_eq!(
            messenger
                .call_host(
                    &channel,
                    "sendMessage",
                    Some(json!({"message": "hi", "timestamp": "T1"})),
                )
                .expect("call"),
            MethodResult::success("Android received: hi at T1")
        );
    }

    #[test]
    fn ios_flavour_validates_send_message() {
        let h = Harness::with_config(
            LoopbackRuntime::new("ui-ios"),
            BridgeConfig {
                platform: HostPlatform::Ios,
                ..BridgeConfig::default()
            },
        );
        h.ctx.acquire().expect("acquire");
        let channel = h.ctx.config().channel_name.clone();

        let result = h
            .messenger()
            .call_host(&channel, "sendMessage", Some(json!({"timestamp": "T1"})))
            .expect("call");
        assert_eq!(result.error_code(), Some("INVALID_ARGUMENTS"));
    }

    #[test]
    fn bounded_pending_queue_from_config() {
        let h = Harness::with_config(
            LoopbackRuntime::new("ui-bounded"),
            BridgeConfig {
                platform: HostPlatform::Android,
                pending_capacity: Some(2),
                ..BridgeConfig::default()
            },
        );
        for m in ["a", "b", "c"] {
            h.ctx.send_to_module(m);
        }
        h.ctx.acquire().expect("acquire");
        assert_eq!(h.pull_pending(), MethodResult::success(json!(["b", "c"])));
    }

    /// Runtime whose boot calls back into the context that is booting it.
    struct ReentrantRuntime {
        ctx: Mutex<Option<std::sync::Weak<BridgeContext>>>,
        inner: LoopbackRuntime,
        reentry: Mutex<Option<bool>>,
    }

    impl EmbeddedRuntime for ReentrantRuntime {
        fn boot(&self, engine_id: &str) -> Result<Arc<dyn crate::runtime::BinaryMessenger>> {
            let ctx = self
                .ctx
                .lock()
                .expect("ctx lock")
                .as_ref()
                .and_then(std::sync::Weak::upgrade);
            if let Some(ctx) = ctx {
                let failed = matches!(ctx.acquire(), Err(BridgeError::Boot(_)));
                *self.reentry.lock().expect("reentry lock") = Some(failed);
            }
            self.inner.boot(engine_id)
        }
    }

    #[test]
    fn reentrant_acquire_during_boot_does_not_boot_twice() {
        let runtime = Arc::new(ReentrantRuntime {
            ctx: Mutex::new(None),
            inner: LoopbackRuntime::new("ui-reentrant"),
            reentry: Mutex::new(None),
        });
        let ctx = Arc::new(BridgeContext::new(
            BridgeConfig::default(),
            Arc::clone(&runtime) as Arc<dyn EmbeddedRuntime>,
            Arc::new(FixedBattery(None)),
            Arc::new(RecordingPresenter::default()),
        ));
        *runtime.ctx.lock().expect("ctx lock") = Some(Arc::downgrade(&ctx));

        ctx.acquire().expect("outer acquire");
        assert_eq!(*runtime.reentry.lock().expect("reentry lock"), Some(true));
        assert_eq!(runtime.inner.boot_count(), 1);
    }

    /// Runtime whose first boot panics; later boots go to the loopback.
    struct PanicsOnFirstBoot {
        inner: LoopbackRuntime,
        crashed: std::sync::atomic::AtomicBool,
    }

    impl EmbeddedRuntime for PanicsOnFirstBoot {
        fn boot(&self, engine_id: &str) -> Result<Arc<dyn crate::runtime::BinaryMessenger>> {
            if !self.crashed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                panic!("engine crashed during start-up");
            }
            self.inner.boot(engine_id)
        }
    }

    #[test]
    fn panic_during_boot_releases_the_claim() {
        let runtime = Arc::new(PanicsOnFirstBoot {
            inner: LoopbackRuntime::new("ui-panic"),
            crashed: std::sync::atomic::AtomicBool::new(false),
        });
        let ctx = Arc::new(BridgeContext::new(
            BridgeConfig::default(),
            Arc::clone(&runtime) as Arc<dyn EmbeddedRuntime>,
            Arc::new(FixedBattery(None)),
            Arc::new(RecordingPresenter::default()),
        ));

        let first = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || ctx.acquire().map(|_| ())).join()
        };
        assert!(first.is_err(), "first boot should have panicked");
        assert!(ctx.get().is_none());
        assert!(!ctx.is_ready());

        ctx.acquire().expect("acquire after panicked boot");
        assert_eq!(runtime.inner.boot_count(), 1);
        assert!(ctx.is_ready());
    }
}
