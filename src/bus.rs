//! Polled I²C master transaction engine.
//!
//! [`BusMaster`] drives a single-master, byte-at-a-time I²C peripheral
//! (the START/ADDR/TXE/BTF/RXNE style found on STM32F1-class and CH32
//! parts) and exposes it through the `embedded-hal` blocking I²C traits.
//! Every wait is a bounded busy-poll; any latched acknowledge, bus or
//! arbitration error ends the wait immediately. A failed transaction always
//! leaves the bus with STOP issued and the error flags cleared.

use bitfield::bitfield;
use embedded_hal::blocking::i2c::{SevenBitAddress, Write, WriteRead};

/// Per-wait polling budget used when no [`BusConfig`] is given.
pub const DEFAULT_TIMEOUT_CYCLES: u32 = 0x4fff;

/// Direction bit sent with the slave address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Transmitter,
    Receiver,
}

/// Compound status conditions the engine waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// START generated, bus owned in master mode
    MasterModeSelect,
    /// Address acknowledged for a write
    TransmitterModeSelected,
    /// Address acknowledged for a read
    ReceiverModeSelected,
    /// Data byte shifted out and acknowledged
    ByteTransmitted,
    /// Data byte available in the receive register
    ByteReceived,
}

// Latched error conditions of the peripheral.
bitfield! {
    pub struct ErrorFlags(u8);
    impl Debug;
    /// The addressed device (or a data byte) was not acknowledged
    pub ack_failure, set_ack_failure: 0;
    /// Misplaced START or STOP detected on the bus
    pub bus_error, set_bus_error: 1;
    /// Another master won arbitration
    pub arbitration_lost, set_arbitration_lost: 2;
}

/// An initialized I²C peripheral in master mode.
///
/// Clock and pin setup happen before the handle is given to [`BusMaster`].
/// Status accessors take `&mut self` because reading status registers
/// clears hardware state on most parts.
pub trait I2cPeripheral {
    /// Bus busy flag (SDA or SCL held low, or a transfer in progress)
    fn is_busy(&mut self) -> bool;
    /// Whether all the status bits making up `event` are currently set
    fn check_event(&mut self, event: Event) -> bool;
    /// Transmit data register empty
    fn tx_empty(&mut self) -> bool;
    fn error_flags(&mut self) -> ErrorFlags;
    fn clear_error_flags(&mut self, flags: ErrorFlags);
    fn generate_start(&mut self);
    fn generate_stop(&mut self);
    fn send_address(&mut self, address: SevenBitAddress, direction: Direction);
    fn send_data(&mut self, byte: u8);
    fn receive_data(&mut self) -> u8;
    fn set_acknowledge(&mut self, enable: bool);
}

/// Reasons a transaction did not complete. No partial transfer is ever
/// reported: a failed transaction moved nothing usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// The bus never became idle before START
    Busy,
    /// An awaited event did not occur within the polling budget
    Timeout,
    AcknowledgeFailure,
    BusFault,
    ArbitrationLost,
}

impl BusError {
    fn from_flags(flags: ErrorFlags) -> Option<BusError> {
        if flags.ack_failure() {
            Some(BusError::AcknowledgeFailure)
        } else if flags.bus_error() {
            Some(BusError::BusFault)
        } else if flags.arbitration_lost() {
            Some(BusError::ArbitrationLost)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// How many times a wait re-checks its condition before giving up
    pub timeout_cycles: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            timeout_cycles: DEFAULT_TIMEOUT_CYCLES,
        }
    }
}

pub struct BusMaster<P> {
    periph: P,
    config: BusConfig,
}

impl<P> BusMaster<P>
where
    P: I2cPeripheral,
{
    pub fn new(periph: P) -> Self {
        Self::with_config(periph, BusConfig::default())
    }

    pub fn with_config(periph: P, config: BusConfig) -> Self {
        Self { periph, config }
    }

    /// Give back the peripheral
    pub fn free(self) -> P {
        self.periph
    }

    /// Wait for the bus to go idle, issue START and address the device.
    ///
    /// If the bus never frees up nothing is put on the wire; a flag latched
    /// while waiting is cleared. Any later failure issues STOP and clears the
    /// latched error flags.
    pub fn start(
        &mut self,
        address: SevenBitAddress,
        direction: Direction,
    ) -> Result<(), BusError> {
        match self.wait_idle() {
            Ok(()) => {}
            Err(BusError::Timeout) => return Err(BusError::Busy),
            Err(err) => {
                self.clear_errors();
                return Err(err);
            }
        }

        self.periph.generate_start();
        if let Err(err) = self.address_phase(address, direction) {
            self.abort();
            return Err(err);
        }
        Ok(())
    }

    fn address_phase(
        &mut self,
        address: SevenBitAddress,
        direction: Direction,
    ) -> Result<(), BusError> {
        self.wait_event(Event::MasterModeSelect)?;
        self.periph.send_address(address, direction);
        self.wait_event(match direction {
            Direction::Transmitter => Event::TransmitterModeSelected,
            Direction::Receiver => Event::ReceiverModeSelected,
        })
    }

    fn transmit(&mut self, byte: u8) -> Result<(), BusError> {
        self.poll(|p| p.tx_empty())?;
        self.periph.send_data(byte);
        self.wait_event(Event::ByteTransmitted)
    }

    /// Register-address phase, repeated START and the receive loop of a
    /// combined-format read. STOP for the final byte is requested before
    /// waiting for it, with acknowledge already disabled.
    fn combined_read(
        &mut self,
        address: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
        stop_issued: &mut bool,
    ) -> Result<(), BusError> {
        for &byte in bytes {
            self.transmit(byte)?;
        }

        self.periph.generate_start();
        self.wait_event(Event::MasterModeSelect)?;
        self.periph.send_address(address, Direction::Receiver);
        self.wait_event(Event::ReceiverModeSelected)?;

        let last = buffer.len() - 1;
        for (index, slot) in buffer.iter_mut().enumerate() {
            if index == last {
                self.periph.set_acknowledge(false);
                self.periph.generate_stop();
                *stop_issued = true;
            }
            self.wait_event(Event::ByteReceived)?;
            *slot = self.periph.receive_data();
        }
        Ok(())
    }

    fn wait_event(&mut self, event: Event) -> Result<(), BusError> {
        self.poll(|p| p.check_event(event))
    }

    fn wait_idle(&mut self) -> Result<(), BusError> {
        self.poll(|p| !p.is_busy())
    }

    fn poll<F>(&mut self, mut ready: F) -> Result<(), BusError>
    where
        F: FnMut(&mut P) -> bool,
    {
        let mut remaining = self.config.timeout_cycles;
        loop {
            if ready(&mut self.periph) {
                return Ok(());
            }
            if let Some(err) = BusError::from_flags(self.periph.error_flags()) {
                return Err(err);
            }
            if remaining == 0 {
                return Err(BusError::Timeout);
            }
            remaining -= 1;
        }
    }

    fn abort(&mut self) {
        self.periph.generate_stop();
        self.clear_errors();
    }

    fn clear_errors(&mut self) {
        let flags = self.periph.error_flags();
        #[cfg(feature = "defmt")]
        defmt::debug!("i2c recovery, clearing flags {=u8:#04x}", flags.0);
        self.periph.clear_error_flags(flags);
    }
}

impl<P> Write for BusMaster<P>
where
    P: I2cPeripheral,
{
    type Error = BusError;

    fn write(&mut self, address: SevenBitAddress, bytes: &[u8]) -> Result<(), BusError> {
        if bytes.is_empty() {
            return Ok(());
        }

        self.start(address, Direction::Transmitter)?;
        for &byte in bytes {
            if let Err(err) = self.transmit(byte) {
                self.abort();
                return Err(err);
            }
        }
        self.periph.generate_stop();
        Ok(())
    }
}

impl<P> WriteRead for BusMaster<P>
where
    P: I2cPeripheral,
{
    type Error = BusError;

    fn write_read(
        &mut self,
        address: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), BusError> {
        if buffer.is_empty() {
            return Ok(());
        }

        self.start(address, Direction::Transmitter)?;

        let mut stop_issued = false;
        let result = self.combined_read(address, bytes, buffer, &mut stop_issued);

        self.periph.set_acknowledge(true);
        if !stop_issued {
            self.periph.generate_stop();
        }
        // Cleanup runs regardless of outcome; a bus that stays busy here
        // is reported by the next start().
        let _ = self.wait_idle();
        if result.is_err() {
            self.clear_errors();
        }
        result
    }
}
