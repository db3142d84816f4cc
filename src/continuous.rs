//! Continuous real-time drive: configure once, then start and stop the
//! actuator at a fixed strength.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::{Control2Reg, Drv2605, DrvError, Library, Mode, MotorType, Register, RTP_MAX};

/// Control2 bits kept when the drive time is programmed
const CONTROL2_KEEP_MASK: u8 = 0xc0;
const DRIVE_TIME_MASK: u8 = 0x3f;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ContinuousConfig {
    pub motor: MotorType,
    /// 6-bit drive time field
    pub drive_time: u8,
    /// Real-time playback value, clamped to [`RTP_MAX`]
    pub strength: u8,
    pub library: Library,
}

impl Default for ContinuousConfig {
    fn default() -> Self {
        Self {
            motor: MotorType::Lra,
            drive_time: 0x20,
            strength: 0x50,
            library: Library::Lra,
        }
    }
}

/// Remembers the strength latched by the last successful
/// [`Drv2605::configure_continuous`]. Whether the actuator is running is
/// only known to the chip.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ContinuousSession {
    strength: Option<u8>,
}

impl ContinuousSession {
    pub const fn new() -> Self {
        Self { strength: None }
    }

    pub fn is_configured(&self) -> bool {
        self.strength.is_some()
    }

    pub fn strength(&self) -> Option<u8> {
        self.strength
    }
}

impl<I2C, D, E> Drv2605<I2C, D>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// Program motor type, library and drive time, then latch the strength
    /// into `session`. A failure leaves the session unconfigured.
    ///
    /// If Control2 cannot be read back its reset value is used as the base
    /// for the drive time bits.
    pub fn configure_continuous(
        &mut self,
        session: &mut ContinuousSession,
        config: &ContinuousConfig,
    ) -> Result<(), DrvError<E>> {
        session.strength = None;

        self.select_motor(config.motor)?;
        self.set_library(config.library)?;

        let control2 = match self.read_register(Register::Control2) {
            Ok(value) => value,
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("control2 unreadable, using reset value");
                Control2Reg::default().0
            }
        };
        let control2 = (control2 & CONTROL2_KEEP_MASK) | (config.drive_time & DRIVE_TIME_MASK);
        self.set_control2(control2)?;

        session.strength = Some(config.strength.min(RTP_MAX));
        Ok(())
    }

    pub fn start_continuous(&mut self, session: &ContinuousSession) -> Result<(), DrvError<E>> {
        let strength = match session.strength {
            Some(strength) => strength,
            None => {
                #[cfg(feature = "defmt")]
                defmt::warn!("continuous drive started before configuration");
                return Err(DrvError::NotConfigured);
            }
        };

        self.set_mode(Mode::RealTimePlayback)?;
        self.set_realtime_value(strength)?;
        self.go()
    }

    /// Zero the drive, then clear GO
    pub fn stop_continuous(&mut self) -> Result<(), DrvError<E>> {
        self.set_realtime_value(0)?;
        self.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDelay, MockI2c};

    fn driver(i2c: MockI2c) -> Drv2605<MockI2c, MockDelay> {
        Drv2605::new(i2c, MockDelay::default())
    }

    #[test]
    fn start_before_configure_is_rejected() {
        let mut drv = driver(MockI2c::default());
        let session = ContinuousSession::new();
        assert_eq!(
            drv.start_continuous(&session),
            Err(DrvError::NotConfigured)
        );
        let (i2c, _) = drv.release();
        assert_eq!(i2c.transactions, 0);
    }

    #[test]
    fn configure_merges_drive_time_into_control2() {
        let mut i2c = MockI2c::default();
        i2c.regs[0x1c] = 0x75;
        let mut drv = driver(i2c);
        let mut session = ContinuousSession::new();
        let config = ContinuousConfig {
            motor: MotorType::Erm,
            drive_time: 0xd3,
            strength: 0xff,
            library: Library::B,
        };
        drv.configure_continuous(&mut session, &config).unwrap();
        assert_eq!(session.strength(), Some(0x7f));
        let (i2c, _) = drv.release();
        assert_eq!(i2c.writes, vec![(0x1a, 0x36), (0x03, 0x02), (0x1c, 0x53)]);
    }

    #[test]
    fn unreadable_control2_falls_back_to_reset_value() {
        let mut drv = driver(MockI2c {
            fail_read: Some(Register::Control2 as u8),
            ..Default::default()
        });
        let mut session = ContinuousSession::new();
        drv.configure_continuous(&mut session, &ContinuousConfig::default())
            .unwrap();
        assert!(session.is_configured());
        let (i2c, _) = drv.release();
        assert_eq!(i2c.writes_to(Register::Control2), vec![0xe0]);
    }

    #[test]
    fn failed_configure_leaves_session_unconfigured() {
        let mut drv = driver(MockI2c::default());
        let mut session = ContinuousSession::new();
        drv.configure_continuous(&mut session, &ContinuousConfig::default())
            .unwrap();

        let (mut i2c, delay) = drv.release();
        i2c.fail_write = Some(Register::Control2 as u8);
        let mut drv = Drv2605::new(i2c, delay);
        assert!(drv
            .configure_continuous(&mut session, &ContinuousConfig::default())
            .is_err());
        assert!(!session.is_configured());
    }

    #[test]
    fn start_and_stop_drive_realtime_input() {
        let mut drv = driver(MockI2c::default());
        let mut session = ContinuousSession::new();
        drv.configure_continuous(&mut session, &ContinuousConfig::default())
            .unwrap();
        drv.start_continuous(&session).unwrap();
        drv.stop_continuous().unwrap();
        let (i2c, _) = drv.release();
        assert_eq!(
            &i2c.writes[3..],
            &[
                (0x01, 0x05),
                (0x02, 0x50),
                (0x0c, 0x01),
                (0x02, 0x00),
                (0x0c, 0x00),
            ]
        );
    }
}
