/*!
A platform agnostic Rust driver for the drv2605 haptic controller, based on
the [`embedded-hal`] traits.

The driver talks to the chip through any blocking I²C bus implementing
`Write` + `WriteRead`. On parts without a usable HAL I²C implementation the
[`bus::BusMaster`] engine provides one on top of a polled peripheral.

Besides plain register access the driver carries the timed routines needed
to make an actuator move: default initialization, auto-calibration and
diagnostics, continuous drive, frequency/amplitude bursts and looping
real-time action groups.

```ignore
let mut haptic = Drv2605::new(i2c, delay);
haptic.init_defaults()?;
haptic.calibrate(&AutoCalConfig::default())?;

let mut session = FreqAmpSession::new();
haptic.play_freq_amp(&mut session, 175, 0x60)?;
```

[`embedded-hal`]: https://docs.rs/embedded-hal/0.2
*/
#![cfg_attr(not(test), no_std)]

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c::{Write, WriteRead};

pub mod action;
pub mod bus;
pub mod calibration;
pub mod continuous;
mod registers;
pub mod tone;
pub mod voltage;

#[cfg(test)]
mod mock;

pub use crate::action::{ActionGroup, RtpFrame};
pub use crate::calibration::{AutoCalConfig, AutoCalResult};
pub use crate::continuous::{ContinuousConfig, ContinuousSession};
pub use crate::registers::*;
pub use crate::tone::{FreqAmpSession, FreqAmpTiming};

/// 7-bit I²C address of the device
pub const ADDRESS: u8 = 0x5a;

/// Settling time after leaving standby or changing the mode before the
/// actuator configuration is touched.
pub const SETTLE_DELAY_MS: u32 = 5;

/// Largest value written to the real-time playback register.
pub const RTP_MAX: u8 = 0x7f;

const DEFAULT_AUDIO_MAX: u8 = 0x64;

pub struct Drv2605<I2C, D> {
    i2c: I2C,
    delay: D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrvError<E> {
    /// The bus reported a failure
    ConnectionError(E),
    /// Rejected before touching the bus
    InvalidArgument,
    /// Continuous drive started before it was configured
    NotConfigured,
    /// The GO bit did not self-clear in time
    Timeout,
    /// Diagnostics reported a missing, shorted or out-of-range actuator
    DiagnosticFailed,
}

impl<I2C, D, E> Drv2605<I2C, D>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// Construct a driver instance, but don't do any initialization
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self { i2c, delay }
    }

    /// Give back the bus and the delay provider
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// Write `value` to `register`
    pub fn write_register(&mut self, register: Register, value: u8) -> Result<(), DrvError<E>> {
        self.i2c
            .write(ADDRESS, &[register as u8, value])
            .map_err(DrvError::ConnectionError)
    }

    /// Read an 8-bit value from the register
    pub fn read_register(&mut self, register: Register) -> Result<u8, DrvError<E>> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(ADDRESS, &[register as u8], &mut buf)
            .map_err(DrvError::ConnectionError)?;
        Ok(buf[0])
    }

    pub fn get_status(&mut self) -> Result<StatusReg, DrvError<E>> {
        self.read_register(Register::Status).map(StatusReg)
    }

    /// Writes the whole mode register, so this also clears STANDBY and
    /// DEV_RESET.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), DrvError<E>> {
        self.write_register(Register::Mode, mode.into())
    }

    pub fn get_mode(&mut self) -> Result<Mode, DrvError<E>> {
        self.read_register(Register::Mode)
            .map(|value| ModeReg(value).mode())
    }

    /// Put the device into standby mode, or wake it up from standby
    pub fn set_standby(&mut self, standby: bool) -> Result<(), DrvError<E>> {
        let mut mode = ModeReg(self.read_register(Register::Mode)?);
        mode.set_standby(standby);
        self.write_register(Register::Mode, mode.0)
    }

    /// Software power cycle: playback stops and every register returns to
    /// its reset value.
    pub fn reset(&mut self) -> Result<(), DrvError<E>> {
        let mut mode = ModeReg(0);
        mode.set_dev_reset(true);
        self.write_register(Register::Mode, mode.0)
    }

    /// Selects the library the playback engine selects when the GO bit is set.
    pub fn set_library(&mut self, library: Library) -> Result<(), DrvError<E>> {
        let mut reg = LibrarySelectionReg(0);
        reg.set_library_selection(u8::from(library));
        self.write_register(Register::LibrarySelection, reg.0)
    }

    pub fn get_library(&mut self) -> Result<Library, DrvError<E>> {
        self.read_register(Register::LibrarySelection)
            .map(|value| LibrarySelectionReg(value).library_selection())
    }

    /// Place `effect` in sequencer slot `slot` (0..=7).
    pub fn set_waveform(&mut self, slot: u8, effect: Effect) -> Result<(), DrvError<E>> {
        let slot = WaveformSlot::new(slot).ok_or(DrvError::InvalidArgument)?;
        self.write_register(slot.register(), effect.into())
    }

    pub fn get_waveform(&mut self, slot: u8) -> Result<Effect, DrvError<E>> {
        let slot = WaveformSlot::new(slot).ok_or(DrvError::InvalidArgument)?;
        self.read_register(slot.register()).map(Effect::from)
    }

    /// Stop the sequence after slot 0 by zeroing slots 1 through 7. Slot 0
    /// keeps its effect.
    pub fn clear_waveforms(&mut self) -> Result<(), DrvError<E>> {
        for index in 1..WaveformSlot::COUNT {
            if let Some(slot) = WaveformSlot::new(index) {
                self.write_register(slot.register(), Effect::Stop.into())?;
            }
        }
        Ok(())
    }

    /// Loads up to eight effects starting at slot 0 in a single
    /// auto-increment write. A shorter sequence is terminated with
    /// [`Effect::Stop`].
    pub fn set_rom(&mut self, effects: &[Effect]) -> Result<(), DrvError<E>> {
        let count = usize::from(WaveformSlot::COUNT);
        if effects.len() > count {
            return Err(DrvError::InvalidArgument);
        }

        let mut buf = [0u8; 9];
        buf[0] = Register::WaveformSequence0 as u8;
        for (dst, &effect) in buf[1..].iter_mut().zip(effects) {
            *dst = effect.into();
        }
        let len = if effects.len() < count {
            effects.len() + 2
        } else {
            buf.len()
        };
        self.i2c
            .write(ADDRESS, &buf[..len])
            .map_err(DrvError::ConnectionError)
    }

    /// Fire whatever process the current mode selects
    pub fn go(&mut self) -> Result<(), DrvError<E>> {
        let mut reg = GoReg(0);
        reg.set_go(true);
        self.write_register(Register::Go, reg.0)
    }

    /// Cancel playback, calibration or diagnostics
    pub fn stop(&mut self) -> Result<(), DrvError<E>> {
        self.write_register(Register::Go, GoReg(0).0)
    }

    /// Raw write of the real-time playback input. The routines in this crate
    /// never pass more than [`RTP_MAX`].
    pub fn set_realtime_value(&mut self, value: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::RealTimePlaybackInput, value)
    }

    pub fn get_realtime_value(&mut self) -> Result<u8, DrvError<E>> {
        self.read_register(Register::RealTimePlaybackInput)
    }

    /// Time offset added to the overdrive portion of library waveforms,
    /// in playback intervals (2s complement). Only used in open loop.
    pub fn set_overdrive_time_offset(&mut self, value: i8) -> Result<(), DrvError<E>> {
        self.write_register(Register::OverdriveTimeOffset, value as u8)
    }

    /// Positive then negative sustain time offsets. Stops at the first
    /// failed write.
    pub fn set_sustain_time_offset(
        &mut self,
        positive: i8,
        negative: i8,
    ) -> Result<(), DrvError<E>> {
        self.write_register(Register::SustainTimeOffsetPositive, positive as u8)?;
        self.write_register(Register::SustainTimeOffsetNegative, negative as u8)
    }

    pub fn set_brake_time_offset(&mut self, value: i8) -> Result<(), DrvError<E>> {
        self.write_register(Register::BrakeTimeOffset, value as u8)
    }

    pub fn set_audio_control(&mut self, value: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::AudioToVibeControl, value)
    }

    pub fn set_audio_min(&mut self, value: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::AudioToVibeMinimumInputLevel, value)
    }

    pub fn set_audio_max(&mut self, value: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::AudioToVibeMaximumInputLevel, value)
    }

    /// Rated voltage code, see [`voltage::encode_rated_voltage_mv`]
    pub fn set_rated_voltage(&mut self, code: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::RatedVoltage, code)
    }

    /// Overdrive clamp voltage code, see [`voltage::encode_clamp_voltage_mv`]
    pub fn set_clamp_voltage(&mut self, code: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::OverdriveClampVoltage, code)
    }

    pub fn set_auto_cal_compensation(&mut self, value: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::AutoCalibrationCompensationResult, value)
    }

    pub fn set_auto_cal_back_emf(&mut self, value: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::AutoCalibrationBackEMFResult, value)
    }

    pub fn set_control1(&mut self, value: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::Control1, value)
    }

    pub fn set_control2(&mut self, value: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::Control2, value)
    }

    pub fn set_control3(&mut self, value: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::Control3, value)
    }

    pub fn set_control4(&mut self, value: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::Control4, value)
    }

    pub fn set_control5(&mut self, value: u8) -> Result<(), DrvError<E>> {
        self.write_register(Register::Control5, value)
    }

    /// Supply voltage monitor. VDD = code × 5.6 V / 255
    pub fn read_battery(&mut self) -> Result<u8, DrvError<E>> {
        self.read_register(Register::VBatVoltageMonitor)
    }

    /// Measured LRA drive period. Period = code × 98.46 µs
    pub fn read_lra_resonance(&mut self) -> Result<u8, DrvError<E>> {
        self.read_register(Register::LraResonancePeriod)
    }

    /// Switch the feedback loop to the closed-loop preset for `motor`
    pub fn select_motor(&mut self, motor: MotorType) -> Result<(), DrvError<E>> {
        self.write_register(
            Register::FeedbackControl,
            FeedbackControlReg::for_motor(motor).0,
        )
    }

    pub fn select_lra(&mut self) -> Result<(), DrvError<E>> {
        self.select_motor(MotorType::Lra)
    }

    pub fn select_erm(&mut self) -> Result<(), DrvError<E>> {
        self.select_motor(MotorType::Erm)
    }

    /// Bring the chip into a known LRA configuration: a strong click queued
    /// in slot 0, neutral time offsets and real-time playback mode. Stops at
    /// the first failed write.
    pub fn init_defaults(&mut self) -> Result<(), DrvError<E>> {
        self.set_mode(Mode::InternalTrigger)?;
        self.delay.delay_ms(SETTLE_DELAY_MS);

        self.select_lra()?;
        self.set_library(Library::Lra)?;

        self.set_waveform(0, Effect::StrongClick100)?;
        self.clear_waveforms()?;

        self.set_overdrive_time_offset(0)?;
        self.set_sustain_time_offset(0, 0)?;
        self.set_brake_time_offset(0)?;
        self.set_audio_max(DEFAULT_AUDIO_MAX)?;

        self.set_mode(Mode::RealTimePlayback)
    }
}
