// Licensed under the Apache-2.0 license

use embedded_hal::delay::DelayNs;

use crate::command::{require, Command, Opcode};
use crate::device::Capability;
use crate::error::Error;
use crate::execution::Device;
use crate::transport::Transport;

const AES_MODE_ENCRYPT: u8 = 0x00;
const AES_MODE_DECRYPT: u8 = 0x01;
const AES_MODE_KEY_BLOCK_POS: u8 = 6;

/// AES-128 block size.
pub const AES_BLOCK_SIZE: usize = 16;

impl<T: Transport, D: DelayNs> Device<T, D> {
    fn aes(
        &mut self,
        mode: u8,
        key_id: u16,
        key_block: u8,
        input: &[u8; AES_BLOCK_SIZE],
    ) -> Result<[u8; AES_BLOCK_SIZE], Error> {
        require(self.device_type(), Capability::Aes)?;
        // a slot holds at most four 16-byte keys
        if key_block > 3 {
            return Err(Error::BadParam);
        }
        let mode = mode | (key_block << AES_MODE_KEY_BLOCK_POS);
        let command = Command::new(Opcode::Aes, mode, key_id)
            .with_data(input)?
            .with_response_len(AES_BLOCK_SIZE);
        let response = self.execute(&command)?;
        Ok(response.to_array()?)
    }

    /// Encrypt one block with key `key_block` of slot `key_id`
    /// (`0xFFFF` selects TempKey).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] on anything but the ATECC608.
    pub fn aes_encrypt(
        &mut self,
        key_id: u16,
        key_block: u8,
        plaintext: &[u8; AES_BLOCK_SIZE],
    ) -> Result<[u8; AES_BLOCK_SIZE], Error> {
        self.aes(AES_MODE_ENCRYPT, key_id, key_block, plaintext)
    }

    /// Decrypt one block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] on anything but the ATECC608.
    pub fn aes_decrypt(
        &mut self,
        key_id: u16,
        key_block: u8,
        ciphertext: &[u8; AES_BLOCK_SIZE],
    ) -> Result<[u8; AES_BLOCK_SIZE], Error> {
        self.aes(AES_MODE_DECRYPT, key_id, key_block, ciphertext)
    }
}
