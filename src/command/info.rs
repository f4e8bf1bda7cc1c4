// Licensed under the Apache-2.0 license

use embedded_hal::delay::DelayNs;

use crate::command::{Command, Opcode, WORD_SIZE};
use crate::error::Error;
use crate::execution::Device;
use crate::transport::Transport;

/// Info command modes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum InfoMode {
    /// Device revision
    Revision = 0x00,
    /// Whether the ECC private key in slot param2 is valid
    KeyValid = 0x01,
    /// Volatile state of the device
    State = 0x02,
    /// GPIO pin state
    Gpio = 0x03,
    /// Volatile key permit latch
    VolatileKeyPermit = 0x04,
}

impl<T: Transport, D: DelayNs> Device<T, D> {
    /// Read the 4-byte device revision.
    ///
    /// # Errors
    ///
    /// Propagates transaction failures.
    pub fn info(&mut self) -> Result<[u8; WORD_SIZE], Error> {
        self.info_mode(InfoMode::Revision, 0)
    }

    /// Run Info in any mode and return its 4-byte result.
    ///
    /// # Errors
    ///
    /// Propagates transaction failures.
    pub fn info_mode(&mut self, mode: InfoMode, param2: u16) -> Result<[u8; WORD_SIZE], Error> {
        let command = Command::new(Opcode::Info, mode as u8, param2).with_response_len(WORD_SIZE);
        let response = self.execute(&command)?;
        Ok(response.to_array()?)
    }

    /// Whether the private key in `slot` is valid.
    ///
    /// # Errors
    ///
    /// Propagates transaction failures.
    pub fn is_key_valid(&mut self, slot: u16) -> Result<bool, Error> {
        let [valid, ..] = self.info_mode(InfoMode::KeyValid, slot)?;
        Ok(valid == 0x01)
    }
}
