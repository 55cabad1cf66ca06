//! Media platform adapter
//!
//! The pieces of startup that belong to the media library and the board
//! support package: the OS adapter, the scheduling hook through which
//! thread budgets reach the scheduler, codec-driver handoff and the media
//! system build-up.

use std::sync::Arc;

use platform::{BoardVariant, CodecInitConfig};

use crate::tasks::SpawnHook;

/// A platform startup step failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror_no_std::Error)]
pub enum PlatformError {
    /// The OS adapter could not be registered
    #[error("media adapter install failed: {0}")]
    AdapterInstall(String),
    /// The codec driver refused the board
    #[error("board {board} handoff failed: {reason}")]
    BoardHandoff {
        /// Board being handed off
        board: BoardVariant,
        /// Driver message
        reason: String,
    },
    /// Capture/playback system could not be built
    #[error("media system build-up failed: {0}")]
    MediaBuildup(String),
    /// The command surface could not be served
    #[error("console install failed: {0}")]
    ConsoleInstall(String),
}

/// Board support and media library glue
pub trait MediaPlatform {
    /// Register the default OS adapter with the media library.
    fn install_default_adapter(&mut self) -> Result<(), PlatformError>;

    /// Hook that applies resolved thread parameters, if the platform has one.
    fn spawn_hook(&self) -> Option<Arc<dyn SpawnHook>>;

    /// Hand the board to the codec driver.
    fn hand_off_board(
        &mut self,
        board: BoardVariant,
        codec: CodecInitConfig,
    ) -> Result<(), PlatformError>;

    /// Build the capture and playback system on top of the codec driver.
    fn build_media_system(&mut self) -> Result<(), PlatformError>;
}
