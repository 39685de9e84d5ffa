// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Channel name shared with the embedded module.
pub const DEFAULT_CHANNEL_NAME: &str = "com.example.flutter_wrapper/platform_channel";

/// Cache key the embedded runtime is booted under.
pub const DEFAULT_ENGINE_ID: &str = "flutter_module_engine";

/// Thread name used by runtimes that spawn their own UI executor.
pub const DEFAULT_UI_THREAD_NAME: &str = "embedded-ui";

/// Which host wrapper flavour the bridge behaves as.
///
/// The two wrappers answer `sendMessage` differently and iOS registers an
/// extra `messageFromFlutter` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostPlatform {
    Android,
    Ios,
}

impl HostPlatform {
    /// The flavour matching the compilation target. Desktop builds behave
    /// like Android.
    pub fn current() -> Self {
        if cfg!(target_os = "ios") {
            Self::Ios
        } else {
            Self::Android
        }
    }

    /// Prefix used in acknowledgement strings ("Android", "iOS").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Android => "Android",
            Self::Ios => "iOS",
        }
    }
}

/// Settings for one bridge instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Name of the method channel to the embedded module.
    pub channel_name: String,
    /// Key the booted runtime is cached under; handed to the presenter.
    pub engine_id: String,
    /// Wrapper flavour for acknowledgement formatting and platform entries.
    pub platform: HostPlatform,
    /// Maximum number of pending messages. `None` keeps the queue unbounded;
    /// with a bound, the oldest message is dropped to make room.
    pub pending_capacity: Option<usize>,
    /// Thread name for runtimes that spawn their own UI executor.
    pub ui_thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_owned(),
            engine_id: DEFAULT_ENGINE_ID.to_owned(),
            platform: HostPlatform::current(),
            pending_capacity: None,
            ui_thread_name: DEFAULT_UI_THREAD_NAME.to_owned(),
        }
    }
}

impl BridgeConfig {
    /// Parse a JSON document. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&data)?;
        debug!(path = %path.as_ref().display(), "bridge config loaded");
        Ok(config)
    }

    /// Read configuration from a JSON file, falling back to defaults when the
    /// file is absent or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %e, "using default bridge config");
                Self::default()
            }
        }
    }

    /// Write configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}
