// Licensed under the Apache-2.0 license

use embedded_hal::delay::DelayNs;

use crate::command::{require, Command, Opcode};
use crate::device::Capability;
use crate::error::Error;
use crate::execution::Device;
use crate::transport::Transport;

const GENKEY_MODE_PUBLIC: u8 = 0x00;
const GENKEY_MODE_PRIVATE: u8 = 0x04;

/// Uncompressed P-256 public key, X then Y.
pub const PUBLIC_KEY_SIZE: usize = 64;

impl<T: Transport, D: DelayNs> Device<T, D> {
    fn genkey_base(&mut self, mode: u8, slot: u16) -> Result<[u8; PUBLIC_KEY_SIZE], Error> {
        require(self.device_type(), Capability::Ecc)?;
        if slot >= self.device_type().slot_count() {
            return Err(Error::BadParam);
        }
        let command = Command::new(Opcode::GenKey, mode, slot).with_response_len(PUBLIC_KEY_SIZE);
        let response = self.execute(&command)?;
        Ok(response.to_array()?)
    }

    /// Create a new private key in `slot` and return its public key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] on families without ECC and
    /// [`Error::BadParam`] for a slot the device does not have.
    pub fn genkey(&mut self, slot: u16) -> Result<[u8; PUBLIC_KEY_SIZE], Error> {
        self.genkey_base(GENKEY_MODE_PRIVATE, slot)
    }

    /// Compute the public key of the private key already in `slot`.
    ///
    /// # Errors
    ///
    /// Same as [`Device::genkey`].
    pub fn get_pubkey(&mut self, slot: u16) -> Result<[u8; PUBLIC_KEY_SIZE], Error> {
        self.genkey_base(GENKEY_MODE_PUBLIC, slot)
    }
}
