//! Application configuration and constants
//!
//! Naming and fixed timing values shared by the platform and firmware
//! crates. Reference these rather than hardcoding values.

/// The application name
pub const APP_NAME: &str = "Voice Chat Appliance";

/// Application version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Board used when the build does not name one.
pub const DEFAULT_BOARD_NAME: &str = "MUSE_RADIO";

/// Interval between session liveness polls in the supervisory loop.
pub const SUPERVISOR_INTERVAL_MS: u64 = 2_000;
