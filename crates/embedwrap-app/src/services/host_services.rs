// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host session against the loopback runtime.
//
// `HostServices` owns the `BridgeContext` the way a mobile host owns it from
// application start. `run_session` plays both sides: the host sends, boots
// and presents, and the loopback messenger acts as the embedded module
// calling back over the channel.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::info;

use embedwrap_bridge::loopback::LoopbackRuntime;
use embedwrap_bridge::{BridgeContext, EmbeddedRuntime, HostPresenter, platform_device_info};
use embedwrap_core::BridgeConfig;
use embedwrap_core::error::{BridgeError, Result};
use embedwrap_core::types::{BridgeMessage, MethodResult, methods};

/// Presenter for a host without a screen to show: logs and succeeds.
struct ConsolePresenter;

impl HostPresenter for ConsolePresenter {
    fn present(&self, engine_id: &str, message: Option<&str>) -> Result<()> {
        info!(engine_id, initial = message.unwrap_or(""), "presenting embedded module");
        Ok(())
    }
}

/// Human-readable record of a session.
#[derive(Debug, Default)]
pub struct SessionReport {
    entries: Vec<String>,
}

impl SessionReport {
    fn push(&mut self, entry: impl Into<String>) {
        self.entries.push(entry.into());
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    #[cfg(test)]
    fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.contains(needle))
    }
}

pub struct HostServices {
    context: BridgeContext,
    runtime: Arc<LoopbackRuntime>,
}

impl HostServices {
    pub fn init(config: BridgeConfig) -> Self {
        let runtime = Arc::new(LoopbackRuntime::new(&config.ui_thread_name));
        let context = BridgeContext::new(
            config,
            Arc::clone(&runtime) as Arc<dyn EmbeddedRuntime>,
            platform_device_info(),
            Arc::new(ConsolePresenter),
        );
        Self { context, runtime }
    }

    /// Run one host session end to end.
    pub fn run_session(&self) -> Result<SessionReport> {
        let mut report = SessionReport::default();
        let channel = self.context.config().channel_name.clone();

        self.context.send_to_module("Hello before boot");
        report.push(format!("queued before boot: {}", self.context.pending_len()));

        let bridge = self.context.acquire()?;
        report.push(format!("booted engine {}", bridge.engine_id()));
        bridge.open_module(Some("Opened from host"));

        let module = self
            .runtime
            .messenger()
            .ok_or_else(|| BridgeError::Bridge("loopback runtime has no messenger".into()))?;

        let pending = module.call_host(&channel, methods::GET_PENDING_MESSAGES, None)?;
        report.push(describe(methods::GET_PENDING_MESSAGES, &pending));

        let timestamp = chrono::Utc::now().to_rfc3339();
        let ack = module.call_host(
            &channel,
            methods::SEND_MESSAGE,
            Some(json!({ "message": "Hello from the module", "timestamp": timestamp })),
        )?;
        report.push(describe(methods::SEND_MESSAGE, &ack));

        let battery = module.call_host(&channel, methods::GET_BATTERY_LEVEL, None)?;
        report.push(describe(methods::GET_BATTERY_LEVEL, &battery));

        let unknown = module.call_host(&channel, "openSettings", None)?;
        report.push(describe("openSettings", &unknown));

        let mut data = Map::new();
        data.insert("source".into(), Value::from("host"));
        data.insert("sequence".into(), Value::from(1));
        bridge.send_message(&BridgeMessage::new("Status update").with_data(data));
        bridge.send_to_module("Goodbye");
        module.flush()?;

        for call in module.received() {
            let arguments = call.arguments.unwrap_or(Value::Null);
            report.push(format!(
                "module received {} {} (ui thread: {})",
                call.method, arguments, call.on_ui_thread
            ));
        }

        info!(boots = self.runtime.boot_count(), "host session complete");
        Ok(report)
    }
}

fn describe(method: &str, result: &MethodResult) -> String {
    match result {
        MethodResult::Success(value) => format!("{method} -> {value}"),
        MethodResult::Error { code, message, .. } => format!("{method} -> error {code}: {message}"),
        MethodResult::NotImplemented => format!("{method} -> not implemented"),
    }
}
