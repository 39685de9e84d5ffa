// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android capabilities via JNI.
//
// Requires the Android NDK. The `JavaVM*` and hosting `Context` come from
// `ndk_context`, which the NDK glue populates before any Rust code runs.
//
// Battery: API 21+ reads `BatteryManager.BATTERY_PROPERTY_CAPACITY`; older
// releases read the sticky `ACTION_BATTERY_CHANGED` broadcast and scale
// `level` by `scale`.
//
// Presentation: launches the embedded module's activity bound to the cached
// engine. The activity finds the engine by id, so the runtime must have been
// booted (and cached) first.

#![cfg(target_os = "android")]

use jni::objects::{JObject, JValue};
use jni::{JNIEnv, JavaVM};
use tracing::{debug, warn};

use embedwrap_core::error::{BridgeError, Result};
use embedwrap_core::types::battery_percent_from_raw;

use crate::traits::{DeviceInfo, HostPresenter};

/// `BatteryManager.BATTERY_PROPERTY_CAPACITY`.
const BATTERY_PROPERTY_CAPACITY: i32 = 4;

/// First API level with `BatteryManager.getIntProperty`.
const API_LOLLIPOP: i32 = 21;

const BATTERY_SERVICE: &str = "batterymanager";
const ACTION_BATTERY_CHANGED: &str = "android.intent.action.BATTERY_CHANGED";

/// Activity class hosting the embedded module, and its cached-engine builder.
const EMBEDDED_ACTIVITY_CLASS: &str = "io/flutter/embedding/android/FlutterActivity";
const WITH_CACHED_ENGINE_SIG: &str =
    "(Ljava/lang/String;)Lio/flutter/embedding/android/FlutterActivity$CachedEngineIntentBuilder;";

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

/// Obtain the process `JavaVM` registered by the NDK glue.
fn java_vm() -> Result<JavaVM> {
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is valid for the lifetime of the process.
    unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| BridgeError::Bridge(format!("failed to obtain JavaVM: {e}")))
}

/// The hosting Android `Context` as a [`JObject`].
fn android_context() -> Result<JObject<'static>> {
    let ptr = ndk_context::android_context().context();
    if ptr.is_null() {
        return Err(BridgeError::Bridge(
            "Android context is null; native activity not initialised".into(),
        ));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global reference to
    // the hosting Context.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Map any `jni::errors::Error` into `BridgeError::Bridge`.
fn jni_err(context: &str, e: jni::errors::Error) -> BridgeError {
    BridgeError::Bridge(format!("{context}: {e}"))
}

// ---------------------------------------------------------------------------
// DeviceInfo: android.os.BatteryManager
// ---------------------------------------------------------------------------

/// Android device information.
pub struct AndroidDeviceInfo;

impl AndroidDeviceInfo {
    pub fn new() -> Self {
        Self
    }

    /// Raw battery reading, `-1` when the platform cannot tell.
    fn read_battery(&self) -> Result<i32> {
        let vm = java_vm()?;
        let mut env = vm
            .attach_current_thread()
            .map_err(|e| jni_err("attach_current_thread", e))?;
        let context = android_context()?;

        let sdk = env
            .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")
            .and_then(|v| v.i())
            .map_err(|e| jni_err("Build.VERSION.SDK_INT", e))?;

        if sdk >= API_LOLLIPOP {
            capacity_property(&mut env, &context)
        } else {
            sticky_broadcast_level(&mut env, &context)
        }
    }
}

impl Default for AndroidDeviceInfo {
    fn default() -> Self {
        Self::new()
    }
}

fn capacity_property(env: &mut JNIEnv<'_>, context: &JObject<'_>) -> Result<i32> {
    let service_name = env
        .new_string(BATTERY_SERVICE)
        .map_err(|e| jni_err("new_string(service)", e))?;
    let manager = env
        .call_method(
            context,
            "getSystemService",
            "(Ljava/lang/String;)Ljava/lang/Object;",
            &[JValue::Object(&service_name)],
        )
        .and_then(|v| v.l())
        .map_err(|e| jni_err("getSystemService", e))?;
    if manager.is_null() {
        return Ok(-1);
    }

    env.call_method(
        &manager,
        "getIntProperty",
        "(I)I",
        &[JValue::Int(BATTERY_PROPERTY_CAPACITY)],
    )
    .and_then(|v| v.i())
    .map_err(|e| jni_err("BatteryManager.getIntProperty", e))
}

fn sticky_broadcast_level(env: &mut JNIEnv<'_>, context: &JObject<'_>) -> Result<i32> {
    let action = env
        .new_string(ACTION_BATTERY_CHANGED)
        .map_err(|e| jni_err("new_string(action)", e))?;
    let filter = env
        .new_object(
            "android/content/IntentFilter",
            "(Ljava/lang/String;)V",
            &[JValue::Object(&action)],
        )
        .map_err(|e| jni_err("new IntentFilter", e))?;

    let no_receiver = JObject::null();
    let intent = env
        .call_method(
            context,
            "registerReceiver",
            "(Landroid/content/BroadcastReceiver;Landroid/content/IntentFilter;)Landroid/content/Intent;",
            &[JValue::Object(&no_receiver), JValue::Object(&filter)],
        )
        .and_then(|v| v.l())
        .map_err(|e| jni_err("registerReceiver", e))?;
    if intent.is_null() {
        return Ok(-1);
    }

    let level = int_extra(env, &intent, "level")?;
    let scale = int_extra(env, &intent, "scale")?;
    if level < 0 || scale <= 0 {
        return Ok(-1);
    }
    Ok((level as f32 * 100.0 / scale as f32) as i32)
}

fn int_extra(env: &mut JNIEnv<'_>, intent: &JObject<'_>, key: &str) -> Result<i32> {
    let j_key = env
        .new_string(key)
        .map_err(|e| jni_err("new_string(extra)", e))?;
    env.call_method(
        intent,
        "getIntExtra",
        "(Ljava/lang/String;I)I",
        &[JValue::Object(&j_key), JValue::Int(-1)],
    )
    .and_then(|v| v.i())
    .map_err(|e| jni_err("Intent.getIntExtra", e))
}

impl DeviceInfo for AndroidDeviceInfo {
    fn platform_name(&self) -> &str {
        "Android"
    }

    fn battery_percent(&self) -> Option<u8> {
        match self.read_battery() {
            Ok(raw) => {
                debug!(raw, "Android: battery read");
                battery_percent_from_raw(raw)
            }
            Err(e) => {
                warn!(error = %e, "Android: battery read failed");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HostPresenter: cached-engine activity
// ---------------------------------------------------------------------------

/// Starts the embedded module's activity from the hosting context.
pub struct AndroidPresenter;

impl HostPresenter for AndroidPresenter {
    fn present(&self, engine_id: &str, _message: Option<&str>) -> Result<()> {
        let vm = java_vm()?;
        let mut env = vm
            .attach_current_thread()
            .map_err(|e| jni_err("attach_current_thread", e))?;
        let context = android_context()?;

        let j_engine = env
            .new_string(engine_id)
            .map_err(|e| jni_err("new_string(engine_id)", e))?;
        let builder = env
            .call_static_method(
                EMBEDDED_ACTIVITY_CLASS,
                "withCachedEngine",
                WITH_CACHED_ENGINE_SIG,
                &[JValue::Object(&j_engine)],
            )
            .and_then(|v| v.l())
            .map_err(|e| jni_err("withCachedEngine", e))?;

        let intent = env
            .call_method(
                &builder,
                "build",
                "(Landroid/content/Context;)Landroid/content/Intent;",
                &[JValue::Object(&context)],
            )
            .and_then(|v| v.l())
            .map_err(|e| jni_err("CachedEngineIntentBuilder.build", e))?;

        env.call_method(
            &context,
            "startActivity",
            "(Landroid/content/Intent;)V",
            &[JValue::Object(&intent)],
        )
        .map_err(|e| jni_err("startActivity", e))?;

        debug!(engine_id, "Android: embedded activity started");
        Ok(())
    }
}
