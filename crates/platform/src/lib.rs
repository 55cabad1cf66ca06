//! Hardware bring-up layer for the voice-chat appliance
//!
//! This crate holds the hardware-agnostic pieces of startup: the two-wire
//! control bus transaction layer, the codec bring-up sequencer, board
//! variants and the thread resource policy. Everything is host-testable;
//! hardware drivers plug in through [`bus::TwoWireBus`].
//!
//! # Architecture Layers
//!
//! ```text
//! Firmware (lifecycle orchestrator, task factory, session control)
//!         ↓
//! Platform (this crate - bus, codec sequence, thread policy)
//!         ↓
//! Hardware Layer (embedded-hal I2C driver)
//! ```
//!
//! # Features
//!
//! - `std`: `std::error::Error` impls for the error types
//! - `defmt`: `defmt::Format` derives on public types
//!
//! # Example
//!
//! ```no_run
//! use platform::board::BoardVariant;
//! use platform::bus::{BusHandle, TwoWireBus};
//! use platform::codec_bringup::{bring_up, DEFAULT_WRITE_TIMEOUT};
//!
//! fn start_codec<B: TwoWireBus>(bus: &mut B) {
//!     let variant = BoardVariant::MuseRadio;
//!     if let Some(codec) = variant.codec_bus() {
//!         if let Ok(mut handle) = BusHandle::acquire(bus, codec.config) {
//!             let _ = bring_up(&mut handle, variant, DEFAULT_WRITE_TIMEOUT);
//!             handle.release();
//!         }
//!     }
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // plain accessors; callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::enum_glob_use)] // register tables read better with bare names

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod board;
pub mod bus;
pub mod codec_bringup;
pub mod config;
pub mod es8388;
pub mod thread_policy;

// Re-export the types startup code touches
pub use board::{BoardVariant, ChipTarget, CodecBus, CodecInitConfig, I2sInputMode, UnknownBoard};
pub use bus::{BusConfig, BusError, BusHandle, BusInitError, EmbeddedHalBus, TwoWireBus};
pub use codec_bringup::{
    bring_up, bring_up_report, run_sequence, BringUpError, BringUpReport, BringUpSequence,
    BringUpStage, FailureAccounting, RegisterWrite,
};
pub use thread_policy::{
    MediaProfile, PlatformThreadDefaults, PolicyError, ThreadBudget, ThreadPolicyEntry,
    ThreadPolicyTable, ThreadSpawnParams,
};
