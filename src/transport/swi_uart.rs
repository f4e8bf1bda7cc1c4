// Licensed under the Apache-2.0 license

//! Single-wire interface emulated with a UART.
//!
//! The single-wire line is clocked by the UART at 230 400 baud and every
//! protocol bit travels as one UART character: `0x7F` for a one, `0x7D` for a
//! zero, least significant bit first. Every transfer starts with a flag byte
//! telling the device what follows. The wake pulse is a single `0x00`
//! character sent at 115 200 baud, long enough to hold the line low for the
//! wake low duration.
//!
//! The UART must drop its own echo and return `Ok(0)` from `read` when the
//! line stays quiet; a quiet line while reading the length byte is reported as
//! `nb::Error::WouldBlock`.

use embedded_io::{ErrorType, Read, Write};
use log::trace;

use crate::device::{Bus, IfaceConfig};
use crate::error::Error;
use crate::transport::{Control, Transport, WordAddress};

/// Baud rate used while transferring data.
pub const SWI_DATA_BAUD: u32 = 230_400;

/// Baud rate used for the wake pulse.
pub const SWI_WAKE_BAUD: u32 = 115_200;

const BIT_ONE: u8 = 0x7F;
const BIT_ZERO: u8 = 0x7D;

/// Flag bytes opening every single-wire transfer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SwiFlag {
    Command = 0x77,
    Transmit = 0x88,
    Idle = 0xBB,
    Sleep = 0xCC,
}

/// UART that can change its baud rate on the fly.
pub trait UartBaud: ErrorType {
    /// Reprogram the baud rate.
    ///
    /// # Errors
    ///
    /// Returns the UART error when the rate cannot be configured.
    fn set_baud(&mut self, baud: u32) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwiError<E> {
    Uart(E),
    /// Line went quiet in the middle of a response
    Truncated,
    BufferTooSmall,
    /// Word address without a single-wire flag
    Unsupported(WordAddress),
}

/// Single-wire transport over a UART.
pub struct SwiUartTransport<U> {
    uart: U,
    baud: u32,
}

impl<U: Read + Write + UartBaud> SwiUartTransport<U> {
    pub fn new(uart: U) -> Self {
        Self {
            uart,
            baud: SWI_DATA_BAUD,
        }
    }

    /// Build the transport for a single-wire interface configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] when the configuration describes another bus.
    pub fn for_config(uart: U, config: &IfaceConfig) -> Result<Self, Error> {
        match config.bus {
            Bus::SwiUart => Ok(Self {
                uart,
                baud: config.baud,
            }),
            Bus::I2c { .. } => Err(Error::BadParam),
        }
    }

    /// Give the UART back.
    pub fn release(self) -> U {
        self.uart
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), SwiError<U::Error>> {
        self.uart
            .write_all(&encode_byte(byte))
            .map_err(SwiError::Uart)
    }

    fn write_flag(&mut self, flag: SwiFlag) -> Result<(), SwiError<U::Error>> {
        self.write_byte(flag as u8)?;
        self.uart.flush().map_err(SwiError::Uart)
    }

    /// Read one protocol byte, `None` when the line is quiet.
    fn read_byte(&mut self) -> Result<Option<u8>, SwiError<U::Error>> {
        let mut chars = [0u8; 8];
        let mut filled = 0;
        while let Some(rest) = chars.get_mut(filled..).filter(|rest| !rest.is_empty()) {
            match self.uart.read(rest).map_err(SwiError::Uart)? {
                0 if filled == 0 => return Ok(None),
                0 => return Err(SwiError::Truncated),
                n => filled += n,
            }
        }
        Ok(Some(decode_byte(&chars)))
    }
}

/// Expand a byte into eight line characters, LSB first.
#[must_use]
pub fn encode_byte(byte: u8) -> [u8; 8] {
    core::array::from_fn(|bit| {
        if byte & (1 << bit) != 0 {
            BIT_ONE
        } else {
            BIT_ZERO
        }
    })
}

/// Collapse eight line characters into a byte. A character within one bit of
/// `0x7F` counts as a one.
#[must_use]
pub fn decode_byte(chars: &[u8; 8]) -> u8 {
    chars
        .iter()
        .enumerate()
        .filter(|(_, c)| (**c ^ BIT_ONE) < 2)
        .fold(0u8, |byte, (bit, _)| byte | (1 << bit))
}

impl<U: Read + Write + UartBaud> Transport for SwiUartTransport<U> {
    type Error = SwiError<U::Error>;

    fn send(&mut self, word_address: WordAddress, data: &[u8]) -> Result<(), Self::Error> {
        let flag = match word_address {
            WordAddress::Command => SwiFlag::Command,
            WordAddress::Idle => SwiFlag::Idle,
            WordAddress::Sleep => SwiFlag::Sleep,
            WordAddress::Reset => return Err(SwiError::Unsupported(word_address)),
        };
        trace!("swi tx flag {:#04x} {:02x?}", flag as u8, data);
        self.write_byte(flag as u8)?;
        for &byte in data {
            self.write_byte(byte)?;
        }
        self.uart.flush().map_err(SwiError::Uart)
    }

    fn receive(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error> {
        let (count, rest) = buf
            .split_first_mut()
            .ok_or(nb::Error::Other(SwiError::BufferTooSmall))?;

        self.write_flag(SwiFlag::Transmit)?;
        *count = self.read_byte()?.ok_or(nb::Error::WouldBlock)?;

        let remaining = usize::from(*count).saturating_sub(1).min(rest.len());
        for slot in rest.iter_mut().take(remaining) {
            *slot = self.read_byte()?.ok_or(nb::Error::Other(SwiError::Truncated))?;
        }
        trace!("swi rx {} bytes", remaining + 1);
        Ok(remaining + 1)
    }

    fn control(&mut self, option: Control) -> Result<(), Self::Error> {
        match option {
            Control::Wake => {
                self.uart.set_baud(SWI_WAKE_BAUD).map_err(SwiError::Uart)?;
                self.uart.write_all(&[0x00]).map_err(SwiError::Uart)?;
                self.uart.flush().map_err(SwiError::Uart)?;
                self.uart.set_baud(self.baud).map_err(SwiError::Uart)
            }
            Control::Idle => self.write_flag(SwiFlag::Idle),
            Control::Sleep => self.write_flag(SwiFlag::Sleep),
            Control::Select | Control::Deselect => Ok(()),
            Control::ChangeBaud(baud) => {
                self.uart.set_baud(baud).map_err(SwiError::Uart)?;
                self.baud = baud;
                Ok(())
            }
        }
    }
}
