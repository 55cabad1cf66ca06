//! Codec bring-up sequencer.
//!
//! Drives the codec from its undefined power-on state to a configured,
//! unmuted, bidirectional audio state by applying one fixed table of
//! register writes over an acquired [`BusHandle`].
//!
//! ## Ordering
//!
//! ```text
//! MuteDac -> ClockingAndChipPower -> DacPowerAndOutputs -> DacSerialFormat
//!   -> MixRouting -> FrameClockAlignment -> DacDigitalVolume -> AdcSetup
//!   -> MonoOutput -> OutputVolume -> ConvertersOnAndUnmute
//! ```
//!
//! The DAC is muted before anything is powered so enabling the outputs does
//! not pop or drive an unconfigured stage. Unmute comes last, after format
//! and routing are final. Entries are never skipped or reordered.
//!
//! ## Failure accounting
//!
//! A failed write does not abort the sequence: every entry is attempted and
//! failures are collected into a [`BringUpReport`]. Each entry carries a
//! [`FailureAccounting`] policy. `Ignored` entries (the ALC block) are still
//! written and their failures are still recorded, but they never make the
//! aggregate [`BringUpError`].

use embassy_time::Duration;
use heapless::Vec;

use crate::board::BoardVariant;
use crate::bus::{BusError, BusHandle, TwoWireBus};
use crate::es8388::*;

/// Upper bound on entries in any bring-up sequence.
pub const MAX_SEQUENCE_LEN: usize = 48;

/// Per-write timeout used by the orchestrator.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// One `(register, value)` write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterWrite {
    /// Register address
    pub register: u8,
    /// Absolute value to store
    pub value: u8,
}

/// Bring-up stages in required order.
///
/// Declaration order is the order the stages must run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpStage {
    /// Digital mute on the DAC
    MuteDac,
    /// Slave clocking, reference and chip power state
    ClockingAndChipPower,
    /// DAC power-up and analog output enables
    DacPowerAndOutputs,
    /// DAC serial interface format
    DacSerialFormat,
    /// Analog mixer routing
    MixRouting,
    /// DAC/ADC share one frame clock
    FrameClockAlignment,
    /// DAC digital volume 0 dB
    DacDigitalVolume,
    /// ADC power, gain and automatic level control
    AdcSetup,
    /// Mono output
    MonoOutput,
    /// Output stage volume 0 dB
    OutputVolume,
    /// Converters powered, DAC unmuted
    ConvertersOnAndUnmute,
}

/// How a failed write contributes to the aggregate result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailureAccounting {
    /// A failure makes the whole bring-up fail
    Counted,
    /// A failure is recorded in the report only
    Ignored,
}

/// One entry of a bring-up sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceEntry {
    /// The write to issue
    pub write: RegisterWrite,
    /// Stage the write belongs to
    pub stage: BringUpStage,
    /// Failure accounting for this write
    pub accounting: FailureAccounting,
}

const fn counted(stage: BringUpStage, register: u8, value: u8) -> SequenceEntry {
    SequenceEntry {
        write: RegisterWrite { register, value },
        stage,
        accounting: FailureAccounting::Counted,
    }
}

/// ALC configuration writes. Their failures are not part of the aggregate.
const fn alc(register: u8, value: u8) -> SequenceEntry {
    SequenceEntry {
        write: RegisterWrite { register, value },
        stage: BringUpStage::AdcSetup,
        accounting: FailureAccounting::Ignored,
    }
}

use BringUpStage::*;

const ES8388_ENTRIES: [SequenceEntry; 36] = [
    counted(MuteDac, DACCONTROL3, DAC_MUTED),
    counted(ClockingAndChipPower, CONTROL2, 0x50),
    counted(ClockingAndChipPower, CHIPPOWER, 0x00),
    counted(ClockingAndChipPower, MASTERMODE, MASTERMODE_SLAVE),
    counted(DacPowerAndOutputs, DACPOWER, DACPOWER_OUTPUTS_ON),
    counted(DacPowerAndOutputs, CONTROL1, 0x12),
    counted(DacSerialFormat, DACCONTROL1, DAC_I2S_16BIT),
    counted(DacSerialFormat, DACCONTROL2, DAC_FS_RATIO_256),
    counted(MixRouting, DACCONTROL16, 0x1b),
    counted(MixRouting, DACCONTROL17, 0x90),
    counted(MixRouting, DACCONTROL20, 0x90),
    counted(FrameClockAlignment, DACCONTROL21, SAME_LRCK),
    counted(FrameClockAlignment, DACCONTROL23, 0x00),
    counted(DacDigitalVolume, DACCONTROL5, DIGITAL_VOLUME_0DB),
    counted(DacDigitalVolume, DACCONTROL4, DIGITAL_VOLUME_0DB),
    counted(AdcSetup, ADCPOWER, ADCPOWER_ALL_DOWN),
    counted(AdcSetup, ADCCONTROL1, 0x88),
    counted(AdcSetup, ADCCONTROL2, 0xfc),
    counted(AdcSetup, ADCCONTROL3, 0x02),
    counted(AdcSetup, ADCCONTROL4, 0x0c),
    counted(AdcSetup, ADCCONTROL5, 0x02),
    counted(AdcSetup, ADCCONTROL8, DIGITAL_VOLUME_0DB),
    counted(AdcSetup, ADCCONTROL9, DIGITAL_VOLUME_0DB),
    alc(ADCCONTROL10, 0xf8),
    alc(ADCCONTROL11, 0x30),
    alc(ADCCONTROL12, 0x57),
    alc(ADCCONTROL13, 0x06),
    alc(ADCCONTROL14, 0x89),
    counted(MonoOutput, DACCONTROL7, DAC_MONO),
    counted(OutputVolume, DACCONTROL24, OUTPUT_VOLUME_0DB),
    counted(OutputVolume, DACCONTROL25, OUTPUT_VOLUME_0DB),
    counted(OutputVolume, DACCONTROL26, OUTPUT_VOLUME_0DB),
    counted(OutputVolume, DACCONTROL27, OUTPUT_VOLUME_0DB),
    counted(ConvertersOnAndUnmute, DACPOWER, DACPOWER_RUNNING),
    counted(ConvertersOnAndUnmute, DACCONTROL3, DAC_UNMUTED),
    counted(ConvertersOnAndUnmute, ADCPOWER, ADCPOWER_ALL_UP),
];

const _: () = assert!(ES8388_ENTRIES.len() <= MAX_SEQUENCE_LEN);

/// Ordered, read-only register sequence for one codec wiring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BringUpSequence {
    device_address: u8,
    entries: &'static [SequenceEntry],
}

/// ES8388 at address 0x10: slave mode, 16-bit I2S, mono out, 0 dB paths.
pub static ES8388_REFERENCE: BringUpSequence = BringUpSequence {
    device_address: ES8388_I2C_ADDR,
    entries: &ES8388_ENTRIES,
};

impl BringUpSequence {
    /// Sequence for `variant`, or `None` when the board needs no bring-up.
    pub fn for_variant(variant: BoardVariant) -> Option<&'static Self> {
        match variant {
            BoardVariant::MuseRadio => Some(&ES8388_REFERENCE),
            BoardVariant::S3KorvoV2 | BoardVariant::S3Box3 | BoardVariant::LyratMini => None,
        }
    }

    /// Target device address.
    pub fn device_address(&self) -> u8 {
        self.device_address
    }

    /// Entries in application order.
    pub fn entries(&self) -> &'static [SequenceEntry] {
        self.entries
    }

    /// Writes only, in application order.
    pub fn writes(&self) -> impl Iterator<Item = RegisterWrite> + '_ {
        self.entries.iter().map(|entry| entry.write)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the sequence has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries whose failures are not counted.
    pub fn ignored_len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.accounting == FailureAccounting::Ignored)
            .count()
    }
}

/// A write that failed during bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FailedWrite {
    /// Position in the sequence
    pub index: usize,
    /// Register that was being written
    pub register: u8,
    /// What the bus reported
    pub error: BusError,
}

/// Outcome of one full pass over a sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BringUpReport {
    attempted: usize,
    failures: Vec<FailedWrite, MAX_SEQUENCE_LEN>,
    ignored_failures: Vec<FailedWrite, MAX_SEQUENCE_LEN>,
}

impl BringUpReport {
    fn record(&mut self, entry: &SequenceEntry, failed: FailedWrite) {
        let list = match entry.accounting {
            FailureAccounting::Counted => &mut self.failures,
            FailureAccounting::Ignored => &mut self.ignored_failures,
        };
        // Capacity equals the longest sequence, so a push cannot fail.
        let _ = list.push(failed);
    }

    /// Writes issued on the bus.
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// Failures that make the bring-up fail.
    pub fn failures(&self) -> &[FailedWrite] {
        &self.failures
    }

    /// Failures of `Ignored` entries.
    pub fn ignored_failures(&self) -> &[FailedWrite] {
        &self.ignored_failures
    }

    /// True when no counted write failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse into the aggregate result.
    pub fn into_result(self) -> Result<(), BringUpError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(BringUpError {
                attempted: self.attempted,
                failures: self.failures,
            })
        }
    }
}

/// At least one counted write failed during bring-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BringUpError {
    attempted: usize,
    failures: Vec<FailedWrite, MAX_SEQUENCE_LEN>,
}

impl BringUpError {
    /// Number of counted failures.
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// The counted failures, in sequence order.
    pub fn failures(&self) -> &[FailedWrite] {
        &self.failures
    }

    /// Registers whose writes failed, in sequence order.
    pub fn failed_registers(&self) -> impl Iterator<Item = u8> + '_ {
        self.failures.iter().map(|f| f.register)
    }

    /// Writes issued on the bus.
    pub fn attempted(&self) -> usize {
        self.attempted
    }
}

impl core::fmt::Display for BringUpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "codec bring-up: {} of {} writes failed",
            self.failures.len(),
            self.attempted
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BringUpError {}

/// Apply `sequence` in order and collect every outcome.
pub fn run_sequence<B: TwoWireBus>(
    bus: &mut BusHandle<'_, B>,
    sequence: &BringUpSequence,
    timeout: Duration,
) -> BringUpReport {
    let mut report = BringUpReport::default();
    for (index, entry) in sequence.entries().iter().enumerate() {
        report.attempted = report.attempted.saturating_add(1);
        let RegisterWrite { register, value } = entry.write;
        if let Err(error) = bus.write_register(sequence.device_address(), register, value, timeout)
        {
            report.record(
                entry,
                FailedWrite {
                    index,
                    register,
                    error,
                },
            );
        }
    }
    report
}

/// Bring the codec of `variant` up, returning the full report.
///
/// Boards without a sequence produce an empty report and no bus traffic.
pub fn bring_up_report<B: TwoWireBus>(
    bus: &mut BusHandle<'_, B>,
    variant: BoardVariant,
    timeout: Duration,
) -> BringUpReport {
    match BringUpSequence::for_variant(variant) {
        Some(sequence) => run_sequence(bus, sequence, timeout),
        None => BringUpReport::default(),
    }
}

/// Bring the codec of `variant` up.
///
/// Every write is attempted; the error aggregates the counted failures.
pub fn bring_up<B: TwoWireBus>(
    bus: &mut BusHandle<'_, B>,
    variant: BoardVariant,
    timeout: Duration,
) -> Result<(), BringUpError> {
    bring_up_report(bus, variant, timeout).into_result()
}
