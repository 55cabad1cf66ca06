//! Voice-chat appliance firmware
//!
//! Boots the appliance: configures the ES8388 codec over the control bus,
//! registers the thread resource policy, hands the board to the media stack,
//! joins the network, installs the command surface and supervises the
//! realtime session.
//!
//! # Architecture
//!
//! ```text
//! Application Layer (main.rs, console)
//!         ↓
//! Orchestration (orchestrator, lifecycle typestate)
//!         ↓
//! Collaborator seams (session, network, media platform, task factory)
//!         ↓
//! Platform crate (bus, codec bring-up, thread policy)
//! ```
//!
//! # Features
//!
//! - `emulator` - Desktop binary booting against the simulated collaborators
//! - `std` - Enable standard library (always on for this crate's host builds)
//!
//! # Examples
//!
//! ```bash
//! cargo run -p firmware --features emulator
//! VOICECHAT_WIFI_SSID=lab RUST_LOG=debug cargo run -p firmware --features emulator
//! ```

// Upgrade relevant warns to deny; keep pedantic as warn
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_code)]
// Logging discipline
#![warn(clippy::print_stdout)] // prefer tracing over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::missing_errors_doc)] // most errors are self-explanatory
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::new_without_default)]

pub mod config;
pub mod console;
pub mod lifecycle;
pub mod logging;
pub mod media;
pub mod network;
pub mod orchestrator;
pub mod session;
pub mod sim;
pub mod tasks;

// Re-export key types
pub use config::{ConfigError, DeviceConfig, WifiCredentials};
pub use console::{Command, CommandError, Console, ConsoleConfig, ConsoleHost};
pub use lifecycle::{CodecOutcome, Lifecycle, LifecycleState, StartupLog};
pub use media::{MediaPlatform, PlatformError};
pub use network::{ConnectivityCallback, NetworkError, NetworkJoin};
pub use orchestrator::{Running, StageError, Startup, StartupReport};
pub use session::{RealtimeSession, SessionController, SessionError, SessionStatus};
pub use tasks::{SpawnError, SpawnHook, TaskFactory, TaskHandle};
