//! Voice-chat appliance - emulator entry point
//!
//! Boots the full startup sequence against the simulated codec, session,
//! network and media platform, serves the console on stdin/stdout and then
//! supervises forever.

use std::sync::Arc;

use anyhow::Context as _;
use firmware::sim::{LoggingSession, LoopbackNetwork, RecordingPlatform, SimulatedCodec, StdioConsoleHost};
use firmware::{DeviceConfig, Startup};

fn main() -> anyhow::Result<()> {
    firmware::logging::init().context("installing log subscriber")?;

    let config = DeviceConfig::from_build_env()
        .map_err(|e| anyhow::anyhow!("build configuration: {e}"))?;

    let running = Startup::new(
        config,
        SimulatedCodec::new().into_bus(),
        RecordingPlatform::new(),
        StdioConsoleHost,
        Arc::new(LoggingSession::new()),
        Arc::new(LoopbackNetwork::new()),
    )
    .run();

    tracing::info!(status = %running.console().status_line(), "boot finished");
    running.supervise()
}
