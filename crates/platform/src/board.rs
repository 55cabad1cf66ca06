//! Board variants and their fixed bring-up parameters
//!
//! The board is named by a configuration string at build time and resolved
//! once at startup into a [`BoardVariant`]. Everything board-specific in the
//! bring-up path (control bus wiring, whether the codec needs a manual
//! register sequence at all) hangs off the variant. The codec address lives
//! with the register sequence in [`crate::codec_bringup`].

use core::str::FromStr;

use crate::bus::{BusConfig, BusMode, PullUps};

/// Supported hardware SKUs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardVariant {
    /// Raspiaudio Muse Radio: ES8388 wired to I2C0 on GPIO11/18
    MuseRadio,
    /// Espressif ESP32-S3-Korvo-2 v3
    S3KorvoV2,
    /// Espressif ESP32-S3-BOX-3
    S3Box3,
    /// Espressif ESP32-LyraT-Mini v1.2
    LyratMini,
}

impl BoardVariant {
    /// Every supported variant, in declaration order.
    pub const ALL: [Self; 4] = [Self::MuseRadio, Self::S3KorvoV2, Self::S3Box3, Self::LyratMini];

    /// Board name understood by the codec driver.
    pub const fn name(self) -> &'static str {
        match self {
            Self::MuseRadio => "MUSE_RADIO",
            Self::S3KorvoV2 => "S3_Korvo_V2",
            Self::S3Box3 => "ESP32_S3_BOX_3",
            Self::LyratMini => "LYRAT_MINI",
        }
    }

    /// Control bus wiring for boards whose codec must be brought up by hand.
    ///
    /// `None` means the codec driver handles the chip on its own and no
    /// bring-up sequence runs.
    pub const fn codec_bus(self) -> Option<CodecBus> {
        match self {
            Self::MuseRadio => Some(CodecBus {
                config: BusConfig {
                    port: 0,
                    scl_pin: 11,
                    sda_pin: 18,
                    clock_hz: 400_000,
                    mode: BusMode::Master,
                    pull_ups: PullUps::BOTH,
                },
            }),
            Self::S3KorvoV2 | Self::S3Box3 | Self::LyratMini => None,
        }
    }

    /// Whether startup has to run a bring-up sequence for this board.
    pub const fn requires_bring_up(self) -> bool {
        self.codec_bus().is_some()
    }
}

impl core::fmt::Display for BoardVariant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// The configured board name matches no supported variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnknownBoard;

impl core::fmt::Display for UnknownBoard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown board name")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnknownBoard {}

impl FromStr for BoardVariant {
    type Err = UnknownBoard;

    /// Exact, case-sensitive match on [`BoardVariant::name`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.name() == s)
            .ok_or(UnknownBoard)
    }
}

/// Where the codec sits on the control bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecBus {
    /// Bus bring-up parameters
    pub config: BusConfig,
}

/// SoC family the firmware is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipTarget {
    /// ESP32 (classic, dual core)
    Esp32,
    /// ESP32-S3 (dual core, PSRAM, TDM capable I2S)
    #[default]
    Esp32S3,
}

/// Capture-side serial mode handed to the codec driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2sInputMode {
    /// Standard two-slot I2S
    Standard,
    /// Time-division multiplexed (microphone + reference channel)
    Tdm,
}

/// Parameters for handing the board over to the codec driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CodecInitConfig {
    /// Capture serial mode
    pub input_mode: I2sInputMode,
    /// Share one device handle between playback and record.
    ///
    /// Must be `false` when both run at the same time.
    pub reuse_device: bool,
}

impl CodecInitConfig {
    /// Driver handoff parameters for `chip`.
    pub const fn for_chip(chip: ChipTarget) -> Self {
        let input_mode = match chip {
            ChipTarget::Esp32S3 => I2sInputMode::Tdm,
            ChipTarget::Esp32 => I2sInputMode::Standard,
        };
        Self {
            input_mode,
            reuse_device: false,
        }
    }
}
