// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedwrap desktop host.
//
// Entry point. Initialises logging, loads the bridge configuration, and runs
// one host session against the loopback runtime: messages sent before boot,
// boot, presentation, the module pulling and calling back, and messages
// pushed after boot.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use embedwrap_core::BridgeConfig;

use services::host_services::HostServices;

const CONFIG_ENV: &str = "EMBEDWRAP_CONFIG";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Embedwrap host starting");

    let config = match config_path() {
        Some(path) => BridgeConfig::load_or_default(&path),
        None => BridgeConfig::default(),
    };
    tracing::info!(
        channel = %config.channel_name,
        engine_id = %config.engine_id,
        platform = config.platform.label(),
        "configuration loaded"
    );

    let services = HostServices::init(config);
    match services.run_session() {
        Ok(report) => {
            for line in report.lines() {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "host session failed");
            ExitCode::FAILURE
        }
    }
}

/// First command-line argument, else `EMBEDWRAP_CONFIG`.
fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(CONFIG_ENV))
        .map(PathBuf::from)
}
