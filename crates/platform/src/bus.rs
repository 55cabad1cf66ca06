//! Two-wire control bus transaction layer
//!
//! Single `(register, value)` write transactions to a fixed target address,
//! synchronous, with a caller-supplied timeout. The bus is held through a
//! scoped [`BusHandle`]: installed on [`BusHandle::acquire`], uninstalled on
//! [`BusHandle::release`] or on drop, whichever comes first.
//!
//! No retries happen at this layer. Retry policy, if any, belongs to the
//! caller.
//!
//! # Example
//!
//! ```
//! use platform::bus::{BusConfig, BusHandle, EmbeddedHalBus, TwoWireBus};
//! use platform::board::BoardVariant;
//! # struct NullI2c;
//! # impl embedded_hal::i2c::ErrorType for NullI2c { type Error = core::convert::Infallible; }
//! # impl embedded_hal::i2c::I2c for NullI2c {
//! #     fn transaction(&mut self, _: u8, _: &mut [embedded_hal::i2c::Operation<'_>])
//! #         -> Result<(), Self::Error> { Ok(()) }
//! # }
//!
//! let mut bus = EmbeddedHalBus::new(NullI2c);
//! let config = BoardVariant::MuseRadio.codec_bus().unwrap().config;
//! let mut handle = BusHandle::acquire(&mut bus, config).unwrap();
//! handle
//!     .write_register(0x10, 0x19, 0x04, embassy_time::Duration::from_millis(100))
//!     .unwrap();
//! handle.release();
//! ```

use embassy_time::{Duration, Instant};
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

/// Highest clock rate accepted for the control bus (I2C fast-mode plus).
pub const MAX_BUS_CLOCK_HZ: u32 = 1_000_000;

/// Controller role on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusMode {
    /// This device drives the clock line and addresses targets
    Master,
}

/// Internal pull-up enables for the two bus lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PullUps {
    /// Pull-up on the clock line (SCL)
    pub scl: bool,
    /// Pull-up on the data line (SDA)
    pub sda: bool,
}

impl PullUps {
    /// Pull-ups enabled on both lines.
    pub const BOTH: Self = Self {
        scl: true,
        sda: true,
    };
}

/// Bus bring-up parameters, fixed per board variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// Controller index (I2C port number)
    pub port: u8,
    /// Clock-line GPIO
    pub scl_pin: u8,
    /// Data-line GPIO
    pub sda_pin: u8,
    /// Bus clock in Hz
    pub clock_hz: u32,
    /// Controller role
    pub mode: BusMode,
    /// Line pull-ups
    pub pull_ups: PullUps,
}

impl BusConfig {
    /// Check the parameters a controller cannot be installed with.
    pub fn validate(&self) -> Result<(), BusInitError> {
        if self.scl_pin == self.sda_pin {
            return Err(BusInitError::InvalidPins {
                scl: self.scl_pin,
                sda: self.sda_pin,
            });
        }
        if self.clock_hz == 0 || self.clock_hz > MAX_BUS_CLOCK_HZ {
            return Err(BusInitError::InvalidClock(self.clock_hz));
        }
        Ok(())
    }
}

/// The bus could not be configured or installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusInitError {
    /// Clock and data lines share a pin
    InvalidPins {
        /// Requested clock pin
        scl: u8,
        /// Requested data pin
        sda: u8,
    },
    /// Clock rate outside `1..=MAX_BUS_CLOCK_HZ`
    InvalidClock(u32),
    /// The controller is already owned by someone else
    AlreadyInstalled(u8),
    /// The controller refused the configuration
    Controller(u8),
}

impl core::fmt::Display for BusInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidPins { scl, sda } => {
                write!(f, "invalid bus pins: scl={scl} sda={sda}")
            }
            Self::InvalidClock(hz) => write!(f, "invalid bus clock: {hz} Hz"),
            Self::AlreadyInstalled(port) => write!(f, "bus port {port} already installed"),
            Self::Controller(port) => write!(f, "bus port {port} could not be installed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BusInitError {}

/// A single write transaction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// No acknowledgment within the transaction timeout
    Timeout,
    /// Target answered with a negative acknowledgment
    Nack,
    /// Any other controller fault (arbitration loss, overrun, ...)
    Fault,
    /// The handle has already been released
    NotInstalled,
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Timeout => write!(f, "bus transaction timed out"),
            Self::Nack => write!(f, "bus target did not acknowledge"),
            Self::Fault => write!(f, "bus controller fault"),
            Self::NotInstalled => write!(f, "bus not installed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BusError {}

/// Controller seam for the two-wire bus.
///
/// Implemented by hardware drivers and by the host-side simulators.
pub trait TwoWireBus {
    /// Configure and install the controller for `config`.
    fn install(&mut self, config: &BusConfig) -> Result<(), BusInitError>;

    /// Blocking write of `bytes` to `address`.
    ///
    /// A write that fails after `timeout` has elapsed reports
    /// [`BusError::Timeout`] rather than the controller's own error.
    fn write(&mut self, address: u8, bytes: &[u8], timeout: Duration) -> Result<(), BusError>;

    /// Tear the controller down. Must tolerate being called when not installed.
    fn uninstall(&mut self, port: u8);
}

/// Exclusively owned, installed bus.
///
/// Releasing is idempotent and happens on drop if the owner did not release
/// explicitly, so early returns never leak the controller.
pub struct BusHandle<'a, B: TwoWireBus> {
    bus: &'a mut B,
    config: BusConfig,
    installed: bool,
}

impl<'a, B: TwoWireBus> BusHandle<'a, B> {
    /// Validate `config`, install the controller and take ownership of it.
    pub fn acquire(bus: &'a mut B, config: BusConfig) -> Result<Self, BusInitError> {
        config.validate()?;
        bus.install(&config)?;
        Ok(Self {
            bus,
            config,
            installed: true,
        })
    }

    /// Perform one two-byte `(register, value)` write.
    pub fn write_register(
        &mut self,
        device_address: u8,
        register: u8,
        value: u8,
        timeout: Duration,
    ) -> Result<(), BusError> {
        if !self.installed {
            return Err(BusError::NotInstalled);
        }
        self.bus.write(device_address, &[register, value], timeout)
    }

    /// Configuration the bus was installed with.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Whether the controller is still installed.
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Uninstall the controller. Safe to call more than once.
    pub fn release(&mut self) {
        if self.installed {
            self.installed = false;
            self.bus.uninstall(self.config.port);
        }
    }
}

impl<B: TwoWireBus> Drop for BusHandle<'_, B> {
    fn drop(&mut self) {
        self.release();
    }
}

/// [`TwoWireBus`] over any blocking `embedded-hal` I2C implementation.
///
/// The HAL peripheral is configured when it is constructed, so `install`
/// only tracks ownership. The HAL cannot be interrupted mid-transaction, so
/// the per-call timeout is checked against `embassy_time::Instant` once the
/// transaction returns: a failure past the deadline is a `Timeout`.
pub struct EmbeddedHalBus<I> {
    i2c: I,
    installed_port: Option<u8>,
}

impl<I: I2c> EmbeddedHalBus<I> {
    /// Wrap a configured I2C peripheral.
    pub fn new(i2c: I) -> Self {
        Self {
            i2c,
            installed_port: None,
        }
    }

    /// The wrapped peripheral
    pub fn inner(&self) -> &I {
        &self.i2c
    }

    /// Give the peripheral back.
    pub fn into_inner(self) -> I {
        self.i2c
    }
}

/// Map an `embedded-hal` error kind onto the bus error taxonomy.
pub fn classify(kind: ErrorKind) -> BusError {
    match kind {
        ErrorKind::NoAcknowledge(_) => BusError::Nack,
        _ => BusError::Fault,
    }
}

impl<I: I2c> TwoWireBus for EmbeddedHalBus<I> {
    fn install(&mut self, config: &BusConfig) -> Result<(), BusInitError> {
        if let Some(port) = self.installed_port {
            return Err(BusInitError::AlreadyInstalled(port));
        }
        self.installed_port = Some(config.port);
        Ok(())
    }

    fn write(&mut self, address: u8, bytes: &[u8], timeout: Duration) -> Result<(), BusError> {
        if self.installed_port.is_none() {
            return Err(BusError::NotInstalled);
        }
        let started = Instant::now();
        self.i2c.write(address, bytes).map_err(|e| {
            if started.elapsed() > timeout {
                BusError::Timeout
            } else {
                classify(e.kind())
            }
        })
    }

    fn uninstall(&mut self, _port: u8) {
        self.installed_port = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use embedded_hal::i2c::NoAcknowledgeSource;

    #[derive(Default)]
    struct MockI2c {
        writes: std::vec::Vec<(u8, std::vec::Vec<u8>)>,
        fail_with: Option<ErrorKind>,
        stall: Option<std::time::Duration>,
    }
    impl embedded_hal::i2c::ErrorType for MockI2c {
        type Error = ErrorKind;
    }
    impl embedded_hal::i2c::I2c for MockI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [embedded_hal::i2c::Operation<'_>],
        ) -> Result<(), Self::Error> {
            if let Some(stall) = self.stall {
                std::thread::sleep(stall);
            }
            if let Some(kind) = self.fail_with {
                return Err(kind);
            }
            for op in operations.iter() {
                if let embedded_hal::i2c::Operation::Write(data) = op {
                    self.writes.push((address, data.to_vec()));
                }
            }
            Ok(())
        }
    }

    fn config() -> BusConfig {
        BusConfig {
            port: 0,
            scl_pin: 11,
            sda_pin: 18,
            clock_hz: 400_000,
            mode: BusMode::Master,
            pull_ups: PullUps::BOTH,
        }
    }

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[test]
    fn write_register_sends_two_bytes() {
        let mut bus = EmbeddedHalBus::new(MockI2c::default());
        {
            let mut handle = BusHandle::acquire(&mut bus, config()).unwrap();
            handle.write_register(0x10, 0x19, 0x04, TIMEOUT).unwrap();
        }
        let i2c = bus.into_inner();
        assert_eq!(i2c.writes, vec![(0x10, vec![0x19, 0x04])]);
    }

    #[test]
    fn same_pin_for_both_lines_is_rejected() {
        let mut bus = EmbeddedHalBus::new(MockI2c::default());
        let bad = BusConfig {
            sda_pin: 11,
            ..config()
        };
        let err = BusHandle::acquire(&mut bus, bad).err();
        assert_eq!(err, Some(BusInitError::InvalidPins { scl: 11, sda: 11 }));
    }

    #[test]
    fn zero_and_excessive_clock_are_rejected() {
        let zero = BusConfig {
            clock_hz: 0,
            ..config()
        };
        let fast = BusConfig {
            clock_hz: 3_400_000,
            ..config()
        };
        assert_eq!(zero.validate(), Err(BusInitError::InvalidClock(0)));
        assert_eq!(fast.validate(), Err(BusInitError::InvalidClock(3_400_000)));
    }

    #[test]
    fn second_install_reports_already_installed() {
        let mut bus = EmbeddedHalBus::new(MockI2c::default());
        bus.install(&config()).unwrap();
        let err = BusHandle::acquire(&mut bus, config()).err();
        assert_eq!(err, Some(BusInitError::AlreadyInstalled(0)));
    }

    #[test]
    fn release_is_idempotent_and_blocks_writes() {
        let mut bus = EmbeddedHalBus::new(MockI2c::default());
        let mut handle = BusHandle::acquire(&mut bus, config()).unwrap();
        handle.release();
        handle.release();
        assert!(!handle.is_installed());
        assert_eq!(
            handle.write_register(0x10, 0x00, 0x00, TIMEOUT),
            Err(BusError::NotInstalled)
        );
    }

    #[test]
    fn drop_uninstalls_so_bus_can_be_reacquired() {
        let mut bus = EmbeddedHalBus::new(MockI2c::default());
        {
            let _handle = BusHandle::acquire(&mut bus, config()).unwrap();
        }
        assert!(BusHandle::acquire(&mut bus, config()).is_ok());
    }

    #[test]
    fn nack_is_classified_as_nack() {
        let mut bus = EmbeddedHalBus::new(MockI2c {
            fail_with: Some(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)),
            ..MockI2c::default()
        });
        let mut handle = BusHandle::acquire(&mut bus, config()).unwrap();
        assert_eq!(
            handle.write_register(0x10, 0x00, 0x12, TIMEOUT),
            Err(BusError::Nack)
        );
    }

    #[test]
    fn failure_past_the_deadline_is_a_timeout() {
        let mut bus = EmbeddedHalBus::new(MockI2c {
            fail_with: Some(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
            stall: Some(std::time::Duration::from_millis(20)),
            ..MockI2c::default()
        });
        let mut handle = BusHandle::acquire(&mut bus, config()).unwrap();
        assert_eq!(
            handle.write_register(0x10, 0x00, 0x12, Duration::from_millis(2)),
            Err(BusError::Timeout)
        );
        // The same failure inside the deadline keeps its own classification.
        assert_eq!(
            handle.write_register(0x10, 0x00, 0x12, Duration::from_secs(5)),
            Err(BusError::Nack)
        );
    }

    #[test]
    fn slow_success_is_still_success() {
        let mut bus = EmbeddedHalBus::new(MockI2c {
            stall: Some(std::time::Duration::from_millis(5)),
            ..MockI2c::default()
        });
        let mut handle = BusHandle::acquire(&mut bus, config()).unwrap();
        assert_eq!(
            handle.write_register(0x10, 0x00, 0x12, Duration::from_millis(1)),
            Ok(())
        );
    }

    #[test]
    fn other_hal_errors_are_faults() {
        assert_eq!(classify(ErrorKind::ArbitrationLoss), BusError::Fault);
        assert_eq!(classify(ErrorKind::Bus), BusError::Fault);
        assert_eq!(classify(ErrorKind::Other), BusError::Fault);
    }
}
