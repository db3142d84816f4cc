//! Register-file stand-in for the chip and a recording delay, used by the
//! driver tests.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::{Register, ADDRESS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

pub struct MockI2c {
    pub regs: [u8; 256],
    /// Every register successfully written, in order
    pub writes: Vec<(u8, u8)>,
    /// Attempted transactions, failed ones included
    pub transactions: usize,
    pub fail_write: Option<u8>,
    pub fail_read: Option<u8>,
    /// GO stays set forever once written
    pub go_never_clears: bool,
    /// Reads of a set GO bit that still see it set before it self-clears
    pub go_busy_polls: usize,
    pub go_reads: usize,
}

impl Default for MockI2c {
    fn default() -> Self {
        Self {
            regs: [0; 256],
            writes: Vec::new(),
            transactions: 0,
            fail_write: None,
            fail_read: None,
            go_never_clears: false,
            go_busy_polls: 0,
            go_reads: 0,
        }
    }
}

impl MockI2c {
    /// Values written to `register`, in order
    pub fn writes_to(&self, register: Register) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(reg, _)| *reg == register as u8)
            .map(|&(_, value)| value)
            .collect()
    }

    fn read_one(&mut self, reg: u8) -> u8 {
        if reg == Register::Go as u8 {
            self.go_reads += 1;
            if self.regs[reg as usize] & 1 != 0 && !self.go_never_clears {
                if self.go_busy_polls == 0 {
                    self.regs[reg as usize] = 0;
                } else {
                    self.go_busy_polls -= 1;
                }
            }
        }
        self.regs[reg as usize]
    }
}

impl Write for MockI2c {
    type Error = MockError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), MockError> {
        assert_eq!(address, ADDRESS);
        self.transactions += 1;
        let (&start, data) = bytes.split_first().ok_or(MockError)?;
        if self.fail_write == Some(start) {
            return Err(MockError);
        }
        for (offset, &value) in data.iter().enumerate() {
            let reg = start.wrapping_add(offset as u8);
            self.regs[reg as usize] = value;
            self.writes.push((reg, value));
        }
        Ok(())
    }
}

impl WriteRead for MockI2c {
    type Error = MockError;

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), MockError> {
        assert_eq!(address, ADDRESS);
        self.transactions += 1;
        let start = *bytes.first().ok_or(MockError)?;
        if self.fail_read == Some(start) {
            return Err(MockError);
        }
        for (offset, slot) in buffer.iter_mut().enumerate() {
            *slot = self.read_one(start.wrapping_add(offset as u8));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockDelay {
    pub ms: Vec<u32>,
    pub us: Vec<u32>,
}

impl MockDelay {
    pub fn total_ms(&self) -> u32 {
        self.ms.iter().sum()
    }
}

impl DelayMs<u32> for MockDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.ms.push(ms);
    }
}

impl DelayUs<u32> for MockDelay {
    fn delay_us(&mut self, us: u32) {
        self.us.push(us);
    }
}
