//! Direct frequency/amplitude drive.
//!
//! The real-time playback input is toggled between the requested amplitude
//! and zero at the requested frequency, producing a square-wave burst
//! followed by a pause.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::{Drv2605, DrvError, Library, Mode, RTP_MAX, SETTLE_DELAY_MS};

pub const DEFAULT_BURST_MS: u16 = 800;
pub const DEFAULT_PAUSE_MS: u16 = 300;
pub const DEFAULT_MAX_MILLIVOLTS: u16 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FreqAmpTiming {
    /// Length of the square-wave burst
    pub burst_ms: u16,
    /// Silence after the burst, skipped when zero
    pub pause_ms: u16,
}

impl Default for FreqAmpTiming {
    fn default() -> Self {
        Self {
            burst_ms: DEFAULT_BURST_MS,
            pause_ms: DEFAULT_PAUSE_MS,
        }
    }
}

/// State carried between frequency/amplitude bursts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FreqAmpSession {
    ready: bool,
    timing: FreqAmpTiming,
    max_millivolts: u16,
}

impl Default for FreqAmpSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FreqAmpSession {
    pub const fn new() -> Self {
        Self {
            ready: false,
            timing: FreqAmpTiming {
                burst_ms: DEFAULT_BURST_MS,
                pause_ms: DEFAULT_PAUSE_MS,
            },
            max_millivolts: DEFAULT_MAX_MILLIVOLTS,
        }
    }

    /// Whether the chip has been put in real-time playback by this session
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn timing(&self) -> FreqAmpTiming {
        self.timing
    }

    /// A zero burst length is raised to 1 ms
    pub fn set_timing(&mut self, timing: FreqAmpTiming) {
        self.timing = FreqAmpTiming {
            burst_ms: timing.burst_ms.max(1),
            pause_ms: timing.pause_ms,
        };
    }

    pub fn max_millivolts(&self) -> u16 {
        self.max_millivolts
    }

    /// Voltage mapped to full amplitude. Zero is ignored.
    pub fn set_voltage_range(&mut self, max_millivolts: u16) {
        if max_millivolts != 0 {
            self.max_millivolts = max_millivolts;
        }
    }

    /// Scale `millivolts` onto 1..=[`RTP_MAX`], saturating at the range
    pub fn amplitude_for(&self, millivolts: u16) -> u8 {
        let max = u32::from(self.max_millivolts.max(1));
        let mv = u32::from(millivolts).min(max);
        let amplitude = (mv * u32::from(RTP_MAX) + max / 2) / max;
        (amplitude as u8).max(1)
    }
}

impl<I2C, D, E> Drv2605<I2C, D>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// Put the chip in LRA real-time playback. Runs once per session.
    pub fn prepare_realtime(&mut self, session: &mut FreqAmpSession) -> Result<(), DrvError<E>> {
        if session.ready {
            return Ok(());
        }

        self.set_mode(Mode::InternalTrigger)?;
        self.delay.delay_ms(SETTLE_DELAY_MS);
        self.select_lra()?;
        self.set_library(Library::Lra)?;
        self.set_mode(Mode::RealTimePlayback)?;

        session.ready = true;
        Ok(())
    }

    /// Play one burst at `frequency_hz` and `amplitude`, then pause.
    ///
    /// Blocks for roughly `burst_ms + pause_ms`. The first failed write ends
    /// the burst.
    pub fn play_freq_amp(
        &mut self,
        session: &mut FreqAmpSession,
        frequency_hz: u16,
        amplitude: u8,
    ) -> Result<(), DrvError<E>> {
        if frequency_hz == 0 || amplitude == 0 {
            return Err(DrvError::InvalidArgument);
        }

        self.prepare_realtime(session)?;

        let period_us = (1_000_000 / u32::from(frequency_hz)).max(1);
        let half_period_us = (period_us / 2).max(1);
        let cycles = (u32::from(session.timing.burst_ms) * 1000 / period_us).max(1);
        let drive = amplitude.min(RTP_MAX);

        for _ in 0..cycles {
            self.set_realtime_value(drive)?;
            self.delay.delay_us(half_period_us);
            self.set_realtime_value(0)?;
            self.delay.delay_us(half_period_us);
        }

        if session.timing.pause_ms != 0 {
            self.delay.delay_ms(u32::from(session.timing.pause_ms));
        }
        Ok(())
    }

    /// Like [`play_freq_amp`](Self::play_freq_amp) with the amplitude
    /// derived from a drive voltage within the session's range.
    pub fn play_freq_voltage(
        &mut self,
        session: &mut FreqAmpSession,
        frequency_hz: u16,
        millivolts: u16,
    ) -> Result<(), DrvError<E>> {
        if millivolts == 0 {
            return Err(DrvError::InvalidArgument);
        }
        let amplitude = session.amplitude_for(millivolts);
        self.play_freq_amp(session, frequency_hz, amplitude)
    }
}
