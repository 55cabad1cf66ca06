//! Tests for the codec bring-up sequencer against a recording bus.
//!
//! The recording bus keeps a transaction log and a model of the codec's
//! register file, and can be told to fail chosen transactions. That is
//! enough to check ordering, accumulate-and-continue error handling, the
//! ALC failure policy and idempotence without hardware.
//!
//! Run with: cargo test -p platform --test codec_bringup

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use embassy_time::Duration;
use platform::board::BoardVariant;
use platform::bus::{BusConfig, BusError, BusHandle, BusInitError, TwoWireBus};
use platform::codec_bringup::{
    bring_up, bring_up_report, run_sequence, BringUpSequence, FailureAccounting, RegisterWrite,
    ES8388_REFERENCE,
};
use platform::es8388;

const TIMEOUT: Duration = Duration::from_millis(100);

// -- Recording bus ---------------------------------------------------------

struct RecordingBus {
    log: Vec<(u8, RegisterWrite)>,
    registers: [u8; es8388::REGISTER_COUNT],
    fail_at: Vec<(usize, BusError)>,
    installs: usize,
    uninstalls: usize,
    refuse_install: bool,
}

impl Default for RecordingBus {
    fn default() -> Self {
        Self {
            log: Vec::new(),
            registers: [0; es8388::REGISTER_COUNT],
            fail_at: Vec::new(),
            installs: 0,
            uninstalls: 0,
            refuse_install: false,
        }
    }
}

impl RecordingBus {
    fn failing(fail_at: &[(usize, BusError)]) -> Self {
        Self {
            fail_at: fail_at.to_vec(),
            ..Self::default()
        }
    }

    fn writes(&self) -> Vec<RegisterWrite> {
        self.log.iter().map(|(_, w)| *w).collect()
    }
}

impl TwoWireBus for RecordingBus {
    fn install(&mut self, config: &BusConfig) -> Result<(), BusInitError> {
        if self.refuse_install {
            return Err(BusInitError::Controller(config.port));
        }
        self.installs += 1;
        Ok(())
    }

    fn write(&mut self, address: u8, bytes: &[u8], _timeout: Duration) -> Result<(), BusError> {
        let index = self.log.len();
        let write = RegisterWrite {
            register: bytes[0],
            value: bytes[1],
        };
        self.log.push((address, write));
        if let Some((_, err)) = self.fail_at.iter().find(|(i, _)| *i == index) {
            return Err(*err);
        }
        self.registers[usize::from(write.register)] = write.value;
        Ok(())
    }

    fn uninstall(&mut self, _port: u8) {
        self.uninstalls += 1;
    }
}

fn muse_bus() -> BusConfig {
    BoardVariant::MuseRadio.codec_bus().unwrap().config
}

fn index_of(register: u8) -> usize {
    ES8388_REFERENCE
        .writes()
        .position(|w| w.register == register)
        .unwrap()
}

// -- Ordering ---------------------------------------------------------------

#[test]
fn all_writes_succeed_and_log_equals_canonical_sequence() {
    let mut bus = RecordingBus::default();
    let mut handle = BusHandle::acquire(&mut bus, muse_bus()).unwrap();

    let result = bring_up(&mut handle, BoardVariant::MuseRadio, TIMEOUT);
    assert_eq!(result, Ok(()));
    assert!(handle.is_installed(), "bring_up must not release the bus");
    handle.release();
    drop(handle);

    let expected: Vec<RegisterWrite> = ES8388_REFERENCE.writes().collect();
    assert_eq!(bus.writes(), expected);
    assert_eq!(bus.log.len(), 36);
    assert!(bus.log.iter().all(|(addr, _)| *addr == es8388::ES8388_I2C_ADDR));
    assert_eq!(bus.uninstalls, 1);
}

#[test]
fn swapping_two_adjacent_writes_is_observable() {
    let mut bus = RecordingBus::default();
    let mut handle = BusHandle::acquire(&mut bus, muse_bus()).unwrap();
    bring_up(&mut handle, BoardVariant::MuseRadio, TIMEOUT).unwrap();
    drop(handle);

    let mut permuted: Vec<RegisterWrite> = ES8388_REFERENCE.writes().collect();
    permuted.swap(0, 1);
    assert_ne!(bus.writes(), permuted);
}

#[test]
fn boards_without_sequence_issue_no_traffic() {
    for variant in [BoardVariant::S3KorvoV2, BoardVariant::S3Box3, BoardVariant::LyratMini] {
        let mut bus = RecordingBus::default();
        let mut handle = BusHandle::acquire(&mut bus, muse_bus()).unwrap();
        let report = bring_up_report(&mut handle, variant, TIMEOUT);
        drop(handle);
        assert_eq!(report.attempted(), 0);
        assert!(report.is_success());
        assert!(bus.log.is_empty());
    }
}

// -- Failure injection -------------------------------------------------------

#[test]
fn timeout_mid_sequence_still_attempts_the_rest() {
    let n = 5;
    let mut bus = RecordingBus::failing(&[(n, BusError::Timeout)]);
    let mut handle = BusHandle::acquire(&mut bus, muse_bus()).unwrap();

    let err = bring_up(&mut handle, BoardVariant::MuseRadio, TIMEOUT).unwrap_err();
    drop(handle);

    assert_eq!(bus.log.len(), ES8388_REFERENCE.len());
    assert_eq!(err.failure_count(), 1);
    assert_eq!(err.attempted(), ES8388_REFERENCE.len());
    let failed = err.failures()[0];
    assert_eq!(failed.index, n);
    assert_eq!(failed.error, BusError::Timeout);
    assert_eq!(failed.register, ES8388_REFERENCE.entries()[n].write.register);
}

#[test]
fn several_failures_are_all_reported_in_order() {
    let mut bus = RecordingBus::failing(&[
        (0, BusError::Nack),
        (17, BusError::Timeout),
        (35, BusError::Fault),
    ]);
    let mut handle = BusHandle::acquire(&mut bus, muse_bus()).unwrap();
    let err = bring_up(&mut handle, BoardVariant::MuseRadio, TIMEOUT).unwrap_err();
    drop(handle);

    let indices: Vec<usize> = err.failures().iter().map(|f| f.index).collect();
    assert_eq!(indices, vec![0, 17, 35]);
    let registers: Vec<u8> = err.failed_registers().collect();
    assert_eq!(
        registers,
        vec![es8388::DACCONTROL3, es8388::ADCCONTROL2, es8388::ADCPOWER]
    );
}

#[test]
fn alc_failures_never_fail_the_aggregate() {
    let alc: Vec<(usize, BusError)> = (index_of(es8388::ADCCONTROL10)
        ..=index_of(es8388::ADCCONTROL14))
        .map(|i| (i, BusError::Nack))
        .collect();
    assert_eq!(alc.len(), 5);

    let mut bus = RecordingBus::failing(&alc);
    let mut handle = BusHandle::acquire(&mut bus, muse_bus()).unwrap();
    let report = bring_up_report(&mut handle, BoardVariant::MuseRadio, TIMEOUT);
    drop(handle);

    assert!(report.is_success());
    assert_eq!(report.ignored_failures().len(), 5);
    assert!(report.failures().is_empty());
    assert_eq!(report.into_result(), Ok(()));
    assert_eq!(bus.log.len(), ES8388_REFERENCE.len());
}

#[test]
fn alc_failure_alongside_counted_failure_reports_only_the_counted_one() {
    let alc_index = index_of(es8388::ADCCONTROL12);
    let mono_index = index_of(es8388::DACCONTROL7);
    let mut bus = RecordingBus::failing(&[
        (alc_index, BusError::Timeout),
        (mono_index, BusError::Timeout),
    ]);
    let mut handle = BusHandle::acquire(&mut bus, muse_bus()).unwrap();
    let err = bring_up(&mut handle, BoardVariant::MuseRadio, TIMEOUT).unwrap_err();

    assert_eq!(err.failure_count(), 1);
    assert_eq!(err.failures()[0].register, es8388::DACCONTROL7);
}

#[test]
fn every_counted_entry_fails_the_aggregate_on_its_own() {
    for (index, entry) in ES8388_REFERENCE.entries().iter().enumerate() {
        let mut bus = RecordingBus::failing(&[(index, BusError::Nack)]);
        let mut handle = BusHandle::acquire(&mut bus, muse_bus()).unwrap();
        let result = bring_up(&mut handle, BoardVariant::MuseRadio, TIMEOUT);
        match entry.accounting {
            FailureAccounting::Counted => assert!(result.is_err(), "entry {index} must count"),
            FailureAccounting::Ignored => assert!(result.is_ok(), "entry {index} is ALC"),
        }
    }
}

// -- Bus lifetime -------------------------------------------------------------

#[test]
fn bus_is_released_even_when_writes_fail() {
    let mut bus = RecordingBus::failing(&[(0, BusError::Nack), (1, BusError::Nack)]);
    {
        let mut handle = BusHandle::acquire(&mut bus, muse_bus()).unwrap();
        let _ = bring_up(&mut handle, BoardVariant::MuseRadio, TIMEOUT);
    }
    assert_eq!(bus.installs, 1);
    assert_eq!(bus.uninstalls, 1);
}

#[test]
fn controller_refusing_install_yields_bus_init_error() {
    let mut bus = RecordingBus {
        refuse_install: true,
        ..RecordingBus::default()
    };
    let err = BusHandle::acquire(&mut bus, muse_bus()).err();
    assert_eq!(err, Some(BusInitError::Controller(0)));
    assert_eq!(bus.uninstalls, 0);
}

#[test]
fn writes_after_release_fail_without_traffic() {
    let mut bus = RecordingBus::default();
    let mut handle = BusHandle::acquire(&mut bus, muse_bus()).unwrap();
    handle.release();
    let report = run_sequence(&mut handle, &ES8388_REFERENCE, TIMEOUT);
    drop(handle);
    assert_eq!(report.failures().len(), 31);
    assert_eq!(report.ignored_failures().len(), 5);
    assert!(report.failures().iter().all(|f| f.error == BusError::NotInstalled));
    assert!(bus.log.is_empty());
}

// -- Idempotence -------------------------------------------------------------

#[test]
fn running_twice_leaves_same_register_state_as_once() {
    let mut once = RecordingBus::default();
    {
        let mut handle = BusHandle::acquire(&mut once, muse_bus()).unwrap();
        bring_up(&mut handle, BoardVariant::MuseRadio, TIMEOUT).unwrap();
    }

    let mut twice = RecordingBus::default();
    for _ in 0..2 {
        let mut handle = BusHandle::acquire(&mut twice, muse_bus()).unwrap();
        bring_up(&mut handle, BoardVariant::MuseRadio, TIMEOUT).unwrap();
    }

    assert_eq!(once.registers, twice.registers);
    assert_eq!(twice.log.len(), 2 * ES8388_REFERENCE.len());
}

#[test]
fn final_state_is_unmuted_and_powered() {
    let mut bus = RecordingBus::default();
    {
        let mut handle = BusHandle::acquire(&mut bus, muse_bus()).unwrap();
        bring_up(&mut handle, BoardVariant::MuseRadio, TIMEOUT).unwrap();
    }
    let reg = |r: u8| bus.registers[usize::from(r)];
    assert_eq!(reg(es8388::DACCONTROL3), es8388::DAC_UNMUTED);
    assert_eq!(reg(es8388::DACPOWER), es8388::DACPOWER_RUNNING);
    assert_eq!(reg(es8388::ADCPOWER), es8388::ADCPOWER_ALL_UP);
    assert_eq!(reg(es8388::MASTERMODE), es8388::MASTERMODE_SLAVE);
    assert_eq!(reg(es8388::DACCONTROL24), es8388::OUTPUT_VOLUME_0DB);
}

#[test]
fn sequence_for_variant_is_the_shared_reference_table() {
    let seq = BringUpSequence::for_variant(BoardVariant::MuseRadio).unwrap();
    assert!(core::ptr::eq(seq, &ES8388_REFERENCE));
}
