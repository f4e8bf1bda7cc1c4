// Licensed under the Apache-2.0 license

//! Nonce command: load or generate the value later commands consume.

use embedded_hal::delay::DelayNs;

use crate::command::{require, Command, Opcode, BLOCK_SIZE};
use crate::device::{Capability, DeviceType};
use crate::error::Error;
use crate::execution::{Device, Response};
use crate::transport::Transport;

const NONCE_MODE_SEED_UPDATE: u8 = 0x00;
const NONCE_MODE_PASSTHROUGH: u8 = 0x03;
const NONCE_MODE_INPUT_LEN_64: u8 = 0x20;

/// Size of the host input to a random nonce.
pub const NUM_IN_SIZE: usize = 20;

/// Where a pass-through nonce is stored.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum NonceTarget {
    #[default]
    TempKey = 0x00,
    /// Message digest buffer (ATECC608)
    MsgDigestBuffer = 0x40,
    /// Alternate key buffer (ATECC608)
    AltKeyBuffer = 0x80,
}

impl<T: Transport, D: DelayNs> Device<T, D> {
    fn nonce_load_command(&self, target: NonceTarget, data: &[u8]) -> Result<Command, Error> {
        let is_608 = self.device_type() == DeviceType::Atecc608;
        if target != NonceTarget::TempKey && !is_608 {
            return Err(Error::Unsupported);
        }
        let mode = match data.len() {
            32 => NONCE_MODE_PASSTHROUGH | target as u8,
            64 if is_608 => NONCE_MODE_PASSTHROUGH | NONCE_MODE_INPUT_LEN_64 | target as u8,
            64 => return Err(Error::Unsupported),
            _ => return Err(Error::BadParam),
        };
        Command::new(Opcode::Nonce, mode, 0).with_data(data)
    }

    /// Load a 32 or 64 byte value into a nonce target without modification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] for other lengths and
    /// [`Error::Unsupported`] for targets or sizes only the ATECC608 has.
    pub fn nonce_load(&mut self, target: NonceTarget, data: &[u8]) -> Result<(), Error> {
        let command = self.nonce_load_command(target, data)?;
        self.execute(&command).map(|_| ())
    }

    /// Same as [`Device::nonce_load`] but keeps the device awake.
    pub(crate) fn nonce_load_keep_awake(
        &mut self,
        target: NonceTarget,
        data: &[u8],
    ) -> Result<(), Error> {
        let command = self.nonce_load_command(target, data)?;
        self.execute_keep_awake(&command).map(|_| ())
    }

    /// Generate a random nonce in TempKey from the RNG and `num_in`.
    ///
    /// Returns the random number the device combined with `num_in`; the host
    /// needs it to compute the same TempKey.
    ///
    /// # Errors
    ///
    /// Propagates transaction failures.
    pub fn nonce_rand(&mut self, num_in: &[u8; NUM_IN_SIZE]) -> Result<[u8; BLOCK_SIZE], Error> {
        require(self.device_type(), Capability::Nonce)?;
        let command = Command::new(Opcode::Nonce, NONCE_MODE_SEED_UPDATE, 0)
            .with_data(num_in)?
            .with_response_len(BLOCK_SIZE);
        let response: Response = self.execute(&command)?;
        Ok(response.to_array()?)
    }
}
