// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedwrap: core types, configuration and error definitions shared by the
// bridge and the host binary.

pub mod config;
pub mod error;
pub mod types;

pub use config::{BridgeConfig, HostPlatform};
pub use error::BridgeError;
pub use types::*;
