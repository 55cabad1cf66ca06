//! ES8388 audio codec register map.
//!
//! Reference: Everest Semiconductor ES8388 datasheet, register descriptions.
//!
//! The ES8388 is a low-power stereo codec with an I2C control port. The
//! 7-bit address is 0x10 with CE tied low, 0x11 with CE tied high.
//! Registers are write-only "set absolute value": writing the same value
//! twice leaves the chip in the same state.

/// 7-bit I2C device address with CE low.
pub const ES8388_I2C_ADDR: u8 = 0x10;
/// 7-bit I2C device address with CE high.
pub const ES8388_I2C_ADDR_CE_HIGH: u8 = 0x11;

// ---------------------------------------------------------------------------
// Chip control
// ---------------------------------------------------------------------------

/// Chip control 1: VMID divider, reference enable, SCP reset.
pub const CONTROL1: u8 = 0x00;
/// Chip control 2: analog reference power, low-power modes.
pub const CONTROL2: u8 = 0x01;
/// Chip power management: DSM/DEM/state-machine resets and power-down.
pub const CHIPPOWER: u8 = 0x02;
/// ADC power management.
pub const ADCPOWER: u8 = 0x03;
/// DAC power management, analog output enables.
pub const DACPOWER: u8 = 0x04;
/// Chip low-power 1.
pub const CHIPLOPOW1: u8 = 0x05;
/// Chip low-power 2.
pub const CHIPLOPOW2: u8 = 0x06;
/// Analog voltage management.
pub const ANAVOLMANAG: u8 = 0x07;
/// Master/slave mode, MCLK divider.
pub const MASTERMODE: u8 = 0x08;

// ---------------------------------------------------------------------------
// ADC
// ---------------------------------------------------------------------------

/// ADC control 1: microphone PGA gain.
pub const ADCCONTROL1: u8 = 0x09;
/// ADC control 2: input selection.
pub const ADCCONTROL2: u8 = 0x0a;
/// ADC control 3: mono mix, tri-state.
pub const ADCCONTROL3: u8 = 0x0b;
/// ADC control 4: serial format and word length.
pub const ADCCONTROL4: u8 = 0x0c;
/// ADC control 5: MCLK/LRCK ratio.
pub const ADCCONTROL5: u8 = 0x0d;
/// ADC control 6: polarity, high-pass.
pub const ADCCONTROL6: u8 = 0x0e;
/// ADC control 7: soft ramp, mute.
pub const ADCCONTROL7: u8 = 0x0f;
/// ADC control 8: left digital volume.
pub const ADCCONTROL8: u8 = 0x10;
/// ADC control 9: right digital volume.
pub const ADCCONTROL9: u8 = 0x11;
/// ADC control 10: ALC enable, max/min PGA gain.
pub const ADCCONTROL10: u8 = 0x12;
/// ADC control 11: ALC target level, hold time.
pub const ADCCONTROL11: u8 = 0x13;
/// ADC control 12: ALC decay/attack.
pub const ADCCONTROL12: u8 = 0x14;
/// ADC control 13: ALC mode, zero-cross, window.
pub const ADCCONTROL13: u8 = 0x15;
/// ADC control 14: noise gate.
pub const ADCCONTROL14: u8 = 0x16;

// ---------------------------------------------------------------------------
// DAC
// ---------------------------------------------------------------------------

/// DAC control 1: serial format and word length.
pub const DACCONTROL1: u8 = 0x17;
/// DAC control 2: MCLK/LRCK ratio.
pub const DACCONTROL2: u8 = 0x18;
/// DAC control 3: soft ramp, digital mute.
pub const DACCONTROL3: u8 = 0x19;
/// DAC control 4: left digital volume.
pub const DACCONTROL4: u8 = 0x1a;
/// DAC control 5: right digital volume.
pub const DACCONTROL5: u8 = 0x1b;
/// DAC control 6: de-emphasis, polarity.
pub const DACCONTROL6: u8 = 0x1c;
/// DAC control 7: zero-cross, mono, 3D.
pub const DACCONTROL7: u8 = 0x1d;
/// DAC control 8: shelving filter a.
pub const DACCONTROL8: u8 = 0x1e;
/// DAC control 9: shelving filter b.
pub const DACCONTROL9: u8 = 0x1f;
/// DAC control 10.
pub const DACCONTROL10: u8 = 0x20;
/// DAC control 11.
pub const DACCONTROL11: u8 = 0x21;
/// DAC control 12.
pub const DACCONTROL12: u8 = 0x22;
/// DAC control 13.
pub const DACCONTROL13: u8 = 0x23;
/// DAC control 14.
pub const DACCONTROL14: u8 = 0x24;
/// DAC control 15.
pub const DACCONTROL15: u8 = 0x25;
/// DAC control 16: left/right mixer input selection.
pub const DACCONTROL16: u8 = 0x26;
/// DAC control 17: left mixer.
pub const DACCONTROL17: u8 = 0x27;
/// DAC control 18.
pub const DACCONTROL18: u8 = 0x28;
/// DAC control 19.
pub const DACCONTROL19: u8 = 0x29;
/// DAC control 20: right mixer.
pub const DACCONTROL20: u8 = 0x2a;
/// DAC control 21: DAC/ADC LRCK sharing, ADC DLL power.
pub const DACCONTROL21: u8 = 0x2b;
/// DAC control 22: offset.
pub const DACCONTROL22: u8 = 0x2c;
/// DAC control 23: VROI.
pub const DACCONTROL23: u8 = 0x2d;
/// DAC control 24: LOUT1 volume.
pub const DACCONTROL24: u8 = 0x2e;
/// DAC control 25: ROUT1 volume.
pub const DACCONTROL25: u8 = 0x2f;
/// DAC control 26: LOUT2 volume.
pub const DACCONTROL26: u8 = 0x30;
/// DAC control 27: ROUT2 volume.
pub const DACCONTROL27: u8 = 0x31;
/// DAC control 28.
pub const DACCONTROL28: u8 = 0x32;
/// DAC control 29.
pub const DACCONTROL29: u8 = 0x33;
/// DAC control 30.
pub const DACCONTROL30: u8 = 0x34;

/// Number of addressable registers (0x00..=0x34).
pub const REGISTER_COUNT: usize = 0x35;

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// DACCONTROL3: digital mute on.
pub const DAC_MUTED: u8 = 0x04;
/// DACCONTROL3: digital mute off.
pub const DAC_UNMUTED: u8 = 0x00;
/// MASTERMODE: codec is a serial-port slave, host drives the clocks.
pub const MASTERMODE_SLAVE: u8 = 0x00;
/// DACPOWER: both DACs up, LOUT1/ROUT1/LOUT2/ROUT2 enabled (setup).
pub const DACPOWER_OUTPUTS_ON: u8 = 0x3e;
/// DACPOWER: final operating value.
pub const DACPOWER_RUNNING: u8 = 0x3c;
/// ADCPOWER: everything powered down.
pub const ADCPOWER_ALL_DOWN: u8 = 0xff;
/// ADCPOWER: everything powered up.
pub const ADCPOWER_ALL_UP: u8 = 0x00;
/// DACCONTROL1: I2S, 16-bit word length.
pub const DAC_I2S_16BIT: u8 = 0x18;
/// DACCONTROL2: single speed, MCLK/LRCK = 256.
pub const DAC_FS_RATIO_256: u8 = 0x02;
/// Digital volume 0 dB (DACCONTROL4/5, ADCCONTROL8/9).
pub const DIGITAL_VOLUME_0DB: u8 = 0x00;
/// Output stage volume 0 dB (DACCONTROL24..27).
pub const OUTPUT_VOLUME_0DB: u8 = 0x21;
/// DACCONTROL21: DAC and ADC share one LRCK.
pub const SAME_LRCK: u8 = 0x80;
/// DACCONTROL7: mono output.
pub const DAC_MONO: u8 = 0x20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_address_matches_ce_low() {
        assert_eq!(ES8388_I2C_ADDR, 0x10);
    }
    #[test]
    fn addresses_are_adjacent() {
        assert_eq!(ES8388_I2C_ADDR_CE_HIGH, ES8388_I2C_ADDR + 1);
    }
    #[test]
    fn adc_block_ends_where_dac_block_starts() {
        assert_eq!(ADCCONTROL14 + 1, DACCONTROL1);
    }
    #[test]
    fn last_register_is_dac_control_30() {
        assert_eq!(usize::from(DACCONTROL30) + 1, REGISTER_COUNT);
    }
    #[test]
    fn mute_and_unmute_are_distinct() {
        assert_ne!(DAC_MUTED, DAC_UNMUTED);
    }
    #[test]
    fn alc_block_is_contiguous() {
        assert_eq!(ADCCONTROL11, ADCCONTROL10 + 1);
        assert_eq!(ADCCONTROL14, ADCCONTROL10 + 4);
    }
}
