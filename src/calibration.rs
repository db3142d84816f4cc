//! Auto-calibration and actuator diagnostics.
//!
//! Both processes are fired with GO and run on the chip. The host polls the
//! GO bit once per millisecond until it self-clears, then forces GO back to
//! zero whatever the outcome.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::voltage::{encode_clamp_voltage_mv, encode_rated_voltage_mv};
use crate::{
    Control2Reg, Control4Reg, Control5Reg, Drv2605, DrvError, GoReg, Library, Mode, ModeReg,
    Register, StatusReg, SETTLE_DELAY_MS,
};

/// Polling budget used when a timeout of zero is requested
pub const DEFAULT_TIMEOUT_MS: u32 = 2000;

const GO_POLL_INTERVAL_MS: u32 = 1;

/// Inputs of the auto-calibration process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AutoCalConfig {
    pub rated_voltage: u8,
    pub overdrive_clamp: u8,
    /// Control1 (drive time, boost)
    pub control1: u8,
    /// Control2 (sample, blanking and current dissipation times)
    pub control2: u8,
    pub control3: u8,
    /// Control4 (auto-calibration time)
    pub control4: u8,
    pub control5: u8,
    /// Polls of the GO bit before giving up; 0 selects [`DEFAULT_TIMEOUT_MS`]
    pub timeout_ms: u32,
}

impl Default for AutoCalConfig {
    fn default() -> Self {
        Self {
            rated_voltage: 0x50,
            overdrive_clamp: 0x90,
            control1: 0x20,
            control2: Control2Reg::default().0,
            control3: 0x80,
            control4: Control4Reg::default().0,
            control5: Control5Reg::default().0,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl AutoCalConfig {
    /// The default preset with rated and clamp voltages given in millivolts
    pub fn with_voltages_mv(rated_mv: u16, clamp_mv: u16) -> Self {
        Self {
            rated_voltage: encode_rated_voltage_mv(rated_mv),
            overdrive_clamp: encode_clamp_voltage_mv(clamp_mv),
            ..Self::default()
        }
    }
}

/// Register values read back after a completed calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AutoCalResult {
    pub status: u8,
    pub compensation: u8,
    pub back_emf: u8,
    pub rated_voltage: u8,
    pub overdrive_clamp: u8,
    /// `None` when the supply monitor could not be read
    pub battery: Option<u8>,
    /// `None` when the resonance period could not be read
    pub resonance: Option<u8>,
}

impl AutoCalResult {
    pub fn status_reg(&self) -> StatusReg {
        StatusReg(self.status)
    }

    /// DIAG_RESULT clear: the calibration converged
    pub fn converged(&self) -> bool {
        !self.status_reg().diagnostic_result()
    }
}

impl<I2C, D, E> Drv2605<I2C, D>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// Run the auto-calibration process for an LRA.
    ///
    /// GO is always written back to zero, exactly once, before this returns.
    /// A setup failure stops the chip and reports the first error.
    pub fn calibrate(&mut self, config: &AutoCalConfig) -> Result<(), DrvError<E>> {
        if let Err(err) = self.program_calibration(config) {
            let _ = self.stop();
            return Err(err);
        }
        self.fire_and_wait(config.timeout_ms)
    }

    fn program_calibration(&mut self, config: &AutoCalConfig) -> Result<(), DrvError<E>> {
        self.set_mode(Mode::InternalTrigger)?;
        self.delay.delay_ms(SETTLE_DELAY_MS);

        self.select_lra()?;
        self.set_library(Library::Lra)?;

        self.set_rated_voltage(config.rated_voltage)?;
        self.set_clamp_voltage(config.overdrive_clamp)?;
        self.set_control1(config.control1)?;
        self.set_control2(config.control2)?;
        self.set_control3(config.control3)?;
        self.set_control4(config.control4)?;
        self.set_control5(config.control5)?;

        self.set_mode(Mode::AutoCalibration)
    }

    /// [`calibrate`](Self::calibrate), then collect the results.
    ///
    /// Status, compensation, back-EMF, rated and clamp registers must all
    /// read back. The supply and resonance monitors are best effort.
    pub fn run_auto_calibration(
        &mut self,
        config: &AutoCalConfig,
    ) -> Result<AutoCalResult, DrvError<E>> {
        self.calibrate(config)?;

        let status = self.read_register(Register::Status)?;
        let compensation = self.read_register(Register::AutoCalibrationCompensationResult)?;
        let back_emf = self.read_register(Register::AutoCalibrationBackEMFResult)?;
        let rated_voltage = self.read_register(Register::RatedVoltage)?;
        let overdrive_clamp = self.read_register(Register::OverdriveClampVoltage)?;

        let battery = self.read_battery().ok();
        let resonance = self.read_lra_resonance().ok();
        #[cfg(feature = "defmt")]
        {
            if battery.is_none() || resonance.is_none() {
                defmt::warn!("calibration done, monitor registers unavailable");
            }
        }

        Ok(AutoCalResult {
            status,
            compensation,
            back_emf,
            rated_voltage,
            overdrive_clamp,
            battery,
            resonance,
        })
    }

    /// Run the actuator diagnostic. Leaves standby, fires the diagnostic
    /// process and checks DIAG_RESULT once GO has cleared.
    pub fn run_diagnostics(&mut self, timeout_ms: u32) -> Result<(), DrvError<E>> {
        let mut mode = ModeReg(self.read_register(Register::Mode)?);
        mode.set_standby(false);
        mode.set_mode(u8::from(Mode::Diagnostics));
        self.write_register(Register::Mode, mode.0)?;

        self.fire_and_wait(timeout_ms)?;

        if self.get_status()?.diagnostic_result() {
            #[cfg(feature = "defmt")]
            defmt::warn!("actuator diagnostic failed");
            return Err(DrvError::DiagnosticFailed);
        }
        Ok(())
    }

    /// GO, poll until it self-clears, then write GO=0 no matter what.
    fn fire_and_wait(&mut self, timeout_ms: u32) -> Result<(), DrvError<E>> {
        let outcome = match self.go() {
            Ok(()) => self.wait_go_clear(timeout_ms),
            Err(err) => Err(err),
        };
        let stopped = self.stop();
        outcome.and(stopped)
    }

    fn wait_go_clear(&mut self, timeout_ms: u32) -> Result<(), DrvError<E>> {
        let polls = if timeout_ms == 0 {
            DEFAULT_TIMEOUT_MS
        } else {
            timeout_ms
        };

        for _ in 0..polls {
            // A failed read is just a wasted poll
            if let Ok(value) = self.read_register(Register::Go) {
                if !GoReg(value).go() {
                    return Ok(());
                }
            }
            self.delay.delay_ms(GO_POLL_INTERVAL_MS);
        }

        #[cfg(feature = "defmt")]
        defmt::warn!("GO still set after {=u32} polls", polls);
        Err(DrvError::Timeout)
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
    fn default_preset_matches_recommended_values() {
        let config = AutoCalConfig::default();
        assert_eq!(
            [
                config.rated_voltage,
                config.overdrive_clamp,
                config.control1,
                config.control2,
                config.control3,
                config.control4,
                config.control5,
            ],
            [0x50, 0x90, 0x20, 0xf5, 0x80, 0x20, 0x80]
        );
        assert_eq!(config.timeout_ms, 2000);
    }

    #[test]
    fn voltages_are_encoded_into_the_preset() {
        let config = AutoCalConfig::with_voltages_mv(3300, 806);
        assert_eq!(config.rated_voltage, 155);
        assert_eq!(config.overdrive_clamp, 0x90);
        assert_eq!(config.control2, 0xf5);
    }

    #[test]
    fn calibration_programs_inputs_then_fires() {
        let mut drv = driver(MockI2c {
            go_busy_polls: 3,
            ..Default::default()
        });
        drv.calibrate(&AutoCalConfig::default()).unwrap();
        let (i2c, delay) = drv.release();
        assert_eq!(
            i2c.writes,
            vec![
                (0x01, 0x00),
                (0x1a, 0xb6),
                (0x03, 0x06),
                (0x16, 0x50),
                (0x17, 0x90),
                (0x1b, 0x20),
                (0x1c, 0xf5),
                (0x1d, 0x80),
                (0x1e, 0x20),
                (0x1f, 0x80),
                (0x01, 0x07),
                (0x0c, 0x01),
                (0x0c, 0x00),
            ]
        );
        assert_eq!(i2c.go_reads, 4);
        assert_eq!(delay.ms, vec![5, 1, 1, 1]);
    }

    #[test]
    fn stuck_go_times_out_after_budget_and_stops_once() {
        let mut drv = driver(MockI2c {
            go_never_clears: true,
            ..Default::default()
        });
        let config = AutoCalConfig {
            timeout_ms: 50,
            ..Default::default()
        };
        assert_eq!(drv.calibrate(&config), Err(DrvError::Timeout));
        let (i2c, delay) = drv.release();
        assert!(i2c.go_reads >= 50);
        assert_eq!(delay.total_ms(), 5 + 50);
        assert_eq!(i2c.writes_to(Register::Go), vec![1, 0]);
        assert_eq!(i2c.regs[Register::Go as usize], 0);
    }

    #[test]
    fn zero_timeout_uses_default_budget() {
        let mut drv = driver(MockI2c {
            go_never_clears: true,
            ..Default::default()
        });
        let config = AutoCalConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(drv.calibrate(&config), Err(DrvError::Timeout));
        let (i2c, _) = drv.release();
        assert_eq!(i2c.go_reads, 2000);
    }

    #[test]
    fn failed_go_reads_count_as_polls() {
        let mut drv = driver(MockI2c {
            fail_read: Some(Register::Go as u8),
            ..Default::default()
        });
        let config = AutoCalConfig {
            timeout_ms: 10,
            ..Default::default()
        };
        assert_eq!(drv.calibrate(&config), Err(DrvError::Timeout));
        let (i2c, delay) = drv.release();
        assert_eq!(delay.ms.len(), 1 + 10);
        assert_eq!(i2c.writes_to(Register::Go), vec![1, 0]);
    }

    #[test]
    fn setup_failure_stops_running_playback() {
        let mut i2c = MockI2c {
            fail_write: Some(Register::RatedVoltage as u8),
            ..Default::default()
        };
        i2c.regs[Register::Go as usize] = 1;
        let mut drv = driver(i2c);
        assert!(matches!(
            drv.calibrate(&AutoCalConfig::default()),
            Err(DrvError::ConnectionError(_))
        ));
        let (i2c, _) = drv.release();
        assert_eq!(i2c.writes_to(Register::Go), vec![0]);
        assert_eq!(i2c.regs[Register::Go as usize], 0);
        assert!(i2c.writes_to(Register::Control1).is_empty());
    }

    #[test]
    fn result_collects_readback() {
        let mut i2c = MockI2c::default();
        i2c.regs[0x00] = 0xe0;
        i2c.regs[0x18] = 0x0c;
        i2c.regs[0x19] = 0x6d;
        i2c.regs[0x21] = 0xb4;
        i2c.regs[0x22] = 0x3a;
        let mut drv = driver(i2c);
        let result = drv.run_auto_calibration(&AutoCalConfig::default()).unwrap();
        assert_eq!(
            result,
            AutoCalResult {
                status: 0xe0,
                compensation: 0x0c,
                back_emf: 0x6d,
                rated_voltage: 0x50,
                overdrive_clamp: 0x90,
                battery: Some(0xb4),
                resonance: Some(0x3a),
            }
        );
        assert!(result.converged());
        assert_eq!(result.status_reg().device_id(), 7);
    }

    #[test]
    fn monitor_read_failures_do_not_fail_calibration() {
        let mut drv = driver(MockI2c {
            fail_read: Some(Register::VBatVoltageMonitor as u8),
            ..Default::default()
        });
        let result = drv.run_auto_calibration(&AutoCalConfig::default()).unwrap();
        assert_eq!(result.battery, None);
        assert_eq!(result.resonance, Some(0));
    }

    #[test]
    fn mandatory_readback_failure_aborts() {
        let mut drv = driver(MockI2c {
            fail_read: Some(Register::AutoCalibrationBackEMFResult as u8),
            ..Default::default()
        });
        assert!(drv.run_auto_calibration(&AutoCalConfig::default()).is_err());
    }

    #[test]
    fn diagnostics_wakes_device_and_checks_result() {
        let mut i2c = MockI2c::default();
        i2c.regs[0x01] = 0x40;
        let mut drv = driver(i2c);
        drv.run_diagnostics(100).unwrap();
        let (i2c, _) = drv.release();
        assert_eq!(i2c.writes_to(Register::Mode), vec![0x06]);
        assert_eq!(i2c.writes_to(Register::Go), vec![1, 0]);
    }

    #[test]
    fn diagnostics_timeout_stops_once() {
        let mut drv = driver(MockI2c {
            go_never_clears: true,
            ..Default::default()
        });
        assert_eq!(drv.run_diagnostics(20), Err(DrvError::Timeout));
        let (i2c, delay) = drv.release();
        assert_eq!(i2c.go_reads, 20);
        assert_eq!(delay.total_ms(), 20);
        assert_eq!(i2c.writes_to(Register::Go), vec![1, 0]);
        assert_eq!(i2c.regs[Register::Go as usize], 0);
    }

    #[test]
    fn diagnostics_reports_faulty_actuator() {
        let mut i2c = MockI2c::default();
        i2c.regs[0x00] = 0x08;
        let mut drv = driver(i2c);
        assert_eq!(drv.run_diagnostics(100), Err(DrvError::DiagnosticFailed));
    }
}
