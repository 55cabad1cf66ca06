//! Device configuration
//!
//! Everything the appliance needs at boot is compiled in; nothing is read
//! from or written to persistent storage. Values come from build-time
//! environment variables:
//!
//! | variable                  | meaning                      | default      |
//! |---------------------------|------------------------------|--------------|
//! | `VOICECHAT_BOARD`         | board variant name           | `MUSE_RADIO` |
//! | `VOICECHAT_CHIP`          | `esp32s3` or `esp32`         | `esp32s3`    |
//! | `VOICECHAT_WIFI_SSID`     | network to join at boot      | none         |
//! | `VOICECHAT_WIFI_PASSWORD` | its passphrase               | none         |
//! | `VOICECHAT_OPUS`          | `1`/`0`, Opus encoder built in | `1`        |
//!
//! Tests and the emulator build configurations directly through
//! [`DeviceConfig::builder`].

use embassy_time::Duration;
use platform::codec_bringup::DEFAULT_WRITE_TIMEOUT;
use platform::config::{DEFAULT_BOARD_NAME, SUPERVISOR_INTERVAL_MS};
use platform::{BoardVariant, ChipTarget, MediaProfile, PlatformThreadDefaults};

use crate::console::ConsoleConfig;

/// A configuration value could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror_no_std::Error)]
pub enum ConfigError {
    /// Board name matches no supported variant (names are case-sensitive)
    #[error("unknown board `{0}`")]
    UnknownBoard(String),
    /// Chip name is neither `esp32s3` nor `esp32`
    #[error("unknown chip `{0}`")]
    UnknownChip(String),
    /// `VOICECHAT_OPUS` is not `0` or `1`
    #[error("invalid Opus flag `{0}`, expected 0 or 1")]
    InvalidOpusFlag(String),
    /// Credentials were given with an empty SSID
    #[error("network SSID must not be empty")]
    EmptySsid,
}

/// Network credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    /// Network name
    pub ssid: String,
    /// Passphrase, `None` for an open network
    pub password: Option<String>,
}

impl WifiCredentials {
    /// Credentials for `ssid`, rejecting an empty name.
    pub fn new(ssid: &str, password: Option<&str>) -> Result<Self, ConfigError> {
        if ssid.is_empty() {
            return Err(ConfigError::EmptySsid);
        }
        Ok(Self {
            ssid: ssid.to_owned(),
            password: password.filter(|p| !p.is_empty()).map(str::to_owned),
        })
    }
}

/// Raw build-time values, before validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildEnv {
    /// `VOICECHAT_BOARD`
    pub board: Option<&'static str>,
    /// `VOICECHAT_CHIP`
    pub chip: Option<&'static str>,
    /// `VOICECHAT_WIFI_SSID`
    pub wifi_ssid: Option<&'static str>,
    /// `VOICECHAT_WIFI_PASSWORD`
    pub wifi_password: Option<&'static str>,
    /// `VOICECHAT_OPUS`
    pub opus: Option<&'static str>,
}

impl BuildEnv {
    /// Values captured when this crate was compiled.
    pub const fn captured() -> Self {
        Self {
            board: option_env!("VOICECHAT_BOARD"),
            chip: option_env!("VOICECHAT_CHIP"),
            wifi_ssid: option_env!("VOICECHAT_WIFI_SSID"),
            wifi_password: option_env!("VOICECHAT_WIFI_PASSWORD"),
            opus: option_env!("VOICECHAT_OPUS"),
        }
    }
}

/// Parse a chip name as used in build configuration.
pub fn parse_chip(name: &str) -> Result<ChipTarget, ConfigError> {
    match name {
        "esp32s3" => Ok(ChipTarget::Esp32S3),
        "esp32" => Ok(ChipTarget::Esp32),
        other => Err(ConfigError::UnknownChip(other.to_owned())),
    }
}

fn parse_opus(flag: &str) -> Result<bool, ConfigError> {
    match flag {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(ConfigError::InvalidOpusFlag(other.to_owned())),
    }
}

/// Complete boot configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Board variant, resolved once
    pub board: BoardVariant,
    /// Target SoC
    pub chip: ChipTarget,
    /// Network to join at boot
    pub wifi: Option<WifiCredentials>,
    /// Opus encoder and its capture workers are built in
    pub opus_encoder: bool,
    /// Interval between session liveness polls
    pub supervisor_interval: Duration,
    /// Per-write timeout during codec bring-up
    pub codec_write_timeout: Duration,
    /// Values applied to unset thread budget fields
    pub thread_defaults: PlatformThreadDefaults,
    /// Command surface settings
    pub console: ConsoleConfig,
}

impl DeviceConfig {
    /// Start from the defaults.
    pub fn builder() -> DeviceConfigBuilder {
        DeviceConfigBuilder::default()
    }

    /// Configuration compiled into this build.
    pub fn from_build_env() -> Result<Self, ConfigError> {
        Self::from_env(BuildEnv::captured())
    }

    /// Validate raw build values.
    pub fn from_env(env: BuildEnv) -> Result<Self, ConfigError> {
        let mut builder = Self::builder().board_name(env.board.unwrap_or(DEFAULT_BOARD_NAME))?;
        if let Some(chip) = env.chip {
            builder = builder.chip(parse_chip(chip)?);
        }
        if let Some(flag) = env.opus {
            builder = builder.opus_encoder(parse_opus(flag)?);
        }
        if let Some(ssid) = env.wifi_ssid {
            builder = builder.wifi(WifiCredentials::new(ssid, env.wifi_password)?);
        }
        Ok(builder.build())
    }

    /// Which optional media workers this build runs.
    pub fn media_profile(&self) -> MediaProfile {
        MediaProfile {
            chip: self.chip,
            opus_encoder: self.opus_encoder,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfigBuilder::default().build()
    }
}

/// Builder for [`DeviceConfig`]
#[derive(Debug, Clone)]
pub struct DeviceConfigBuilder {
    config: DeviceConfig,
}

impl Default for DeviceConfigBuilder {
    fn default() -> Self {
        Self {
            config: DeviceConfig {
                board: BoardVariant::MuseRadio,
                chip: ChipTarget::default(),
                wifi: None,
                opus_encoder: true,
                supervisor_interval: Duration::from_millis(SUPERVISOR_INTERVAL_MS),
                codec_write_timeout: DEFAULT_WRITE_TIMEOUT,
                thread_defaults: PlatformThreadDefaults::default(),
                console: ConsoleConfig::default(),
            },
        }
    }
}

impl DeviceConfigBuilder {
    /// Select the board variant.
    pub fn board(mut self, board: BoardVariant) -> Self {
        self.config.board = board;
        self
    }

    /// Select the board variant by its configured name.
    pub fn board_name(self, name: &str) -> Result<Self, ConfigError> {
        let board = name
            .parse::<BoardVariant>()
            .map_err(|_| ConfigError::UnknownBoard(name.to_owned()))?;
        Ok(self.board(board))
    }

    /// Select the SoC.
    pub fn chip(mut self, chip: ChipTarget) -> Self {
        self.config.chip = chip;
        self
    }

    /// Join this network at boot.
    pub fn wifi(mut self, credentials: WifiCredentials) -> Self {
        self.config.wifi = Some(credentials);
        self
    }

    /// Build with or without the Opus encoder workers.
    pub fn opus_encoder(mut self, enabled: bool) -> Self {
        self.config.opus_encoder = enabled;
        self
    }

    /// Override the supervisory poll interval.
    pub fn supervisor_interval(mut self, interval: Duration) -> Self {
        self.config.supervisor_interval = interval;
        self
    }

    /// Override the codec write timeout.
    pub fn codec_write_timeout(mut self, timeout: Duration) -> Self {
        self.config.codec_write_timeout = timeout;
        self
    }

    /// Override the platform thread defaults.
    pub fn thread_defaults(mut self, defaults: PlatformThreadDefaults) -> Self {
        self.config.thread_defaults = defaults;
        self
    }

    /// Override the console settings.
    pub fn console(mut self, console: ConsoleConfig) -> Self {
        self.config.console = console;
        self
    }

    /// Finish.
    pub fn build(self) -> DeviceConfig {
        self.config
    }
}
