//! Looping sequences of real-time playback frames.
//!
//! An [`ActionGroup`] is advanced one step per call to
//! [`Drv2605::run_action_group`], so the caller decides the pacing and can
//! interleave other work between frames. After the last frame the next call
//! silences the actuator, waits out the group's pause and rewinds.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c::{Write, WriteRead};
use heapless::Vec;

use crate::{Drv2605, DrvError, RTP_MAX};

/// One step of an action group: drive `amplitude` for `hold_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtpFrame {
    pub amplitude: u8,
    pub hold_ms: u16,
}

impl RtpFrame {
    pub const fn new(amplitude: u8, hold_ms: u16) -> Self {
        Self { amplitude, hold_ms }
    }
}

/// Up to `N` frames played in order, then a pause, then again from the
/// start.
pub struct ActionGroup<const N: usize> {
    frames: Vec<RtpFrame, N>,
    pause_ms: u16,
    cursor: usize,
}

enum Step {
    Frame(RtpFrame),
    Rewind(u16),
}

impl<const N: usize> ActionGroup<N> {
    pub const fn new(pause_ms: u16) -> Self {
        Self {
            frames: Vec::new(),
            pause_ms,
            cursor: 0,
        }
    }

    /// Returns `None` if `frames` does not fit in `N`
    pub fn from_frames(frames: &[RtpFrame], pause_ms: u16) -> Option<Self> {
        let frames = Vec::from_slice(frames).ok()?;
        Some(Self {
            frames,
            pause_ms,
            cursor: 0,
        })
    }

    /// Append a frame, handing it back if the group is full
    pub fn push(&mut self, frame: RtpFrame) -> Result<(), RtpFrame> {
        self.frames.push(frame)
    }

    pub fn frames(&self) -> &[RtpFrame] {
        &self.frames
    }

    pub fn pause_ms(&self) -> u16 {
        self.pause_ms
    }

    pub fn set_pause_ms(&mut self, pause_ms: u16) {
        self.pause_ms = pause_ms;
    }

    /// Index of the frame the next step plays; equal to the frame count
    /// when the next step is the pause.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn advance(&mut self) -> Step {
        match self.frames.get(self.cursor) {
            Some(&frame) => {
                self.cursor += 1;
                Step::Frame(frame)
            }
            None => {
                self.cursor = 0;
                Step::Rewind(self.pause_ms)
            }
        }
    }
}

impl<I2C, D, E> Drv2605<I2C, D>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// Run one step of `group`.
    ///
    /// The cursor moves even when the write fails, so a flaky bus never
    /// stalls the sequence. The pause step always waits and rewinds and
    /// reports whether silencing the actuator worked.
    pub fn run_action_group<const N: usize>(
        &mut self,
        group: &mut ActionGroup<N>,
    ) -> Result<(), DrvError<E>> {
        if group.frames.is_empty() {
            return Err(DrvError::InvalidArgument);
        }

        match group.advance() {
            Step::Frame(frame) => {
                self.set_realtime_value(frame.amplitude.min(RTP_MAX))?;
                self.delay.delay_ms(u32::from(frame.hold_ms));
                Ok(())
            }
            Step::Rewind(pause_ms) => {
                let silenced = self.set_realtime_value(0);
                self.delay.delay_ms(u32::from(pause_ms));
                silenced
            }
        }
    }
}
