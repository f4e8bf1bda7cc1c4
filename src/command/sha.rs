// Licensed under the Apache-2.0 license

//! SHA-256 over the device's SHA engine.
//!
//! A digest is a chain of commands: start, one update per 64-byte block and
//! an end carrying the remaining bytes. The device keeps the context in
//! volatile memory, so the chain runs without idling in between.

use embedded_hal::delay::DelayNs;

use crate::command::{require, Command, Opcode, BLOCK_SIZE};
use crate::device::Capability;
use crate::error::Error;
use crate::execution::Device;
use crate::transport::Transport;

const SHA_MODE_START: u8 = 0x00;
const SHA_MODE_UPDATE: u8 = 0x01;
const SHA_MODE_END: u8 = 0x02;

/// Message block consumed by one update.
pub const SHA_BLOCK_SIZE: usize = 64;

impl<T: Transport, D: DelayNs> Device<T, D> {
    /// Begin a digest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] on the ATSHA204A.
    pub fn sha_start(&mut self) -> Result<(), Error> {
        require(self.device_type(), Capability::Sha)?;
        let command = Command::new(Opcode::Sha, SHA_MODE_START, 0);
        self.execute_keep_awake(&command).map(|_| ())
    }

    /// Add exactly one 64-byte block to the running digest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] unless `block` is 64 bytes.
    pub fn sha_update(&mut self, block: &[u8]) -> Result<(), Error> {
        if block.len() != SHA_BLOCK_SIZE {
            return Err(Error::BadParam);
        }
        let command = Command::new(Opcode::Sha, SHA_MODE_UPDATE, SHA_BLOCK_SIZE as u16)
            .with_data(block)?;
        self.execute_keep_awake(&command).map(|_| ())
    }

    /// Finish the digest with up to 63 trailing bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] for 64 or more bytes.
    pub fn sha_end(&mut self, tail: &[u8]) -> Result<[u8; BLOCK_SIZE], Error> {
        let len = u16::try_from(tail.len())
            .ok()
            .filter(|len| usize::from(*len) < SHA_BLOCK_SIZE)
            .ok_or(Error::BadParam)?;
        let command = Command::new(Opcode::Sha, SHA_MODE_END, len)
            .with_data(tail)?
            .with_response_len(BLOCK_SIZE);
        let response = self.execute(&command)?;
        Ok(response.to_array()?)
    }

    /// SHA-256 digest of `message`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] on the ATSHA204A, otherwise propagates
    /// transaction failures.
    pub fn sha(&mut self, message: &[u8]) -> Result<[u8; BLOCK_SIZE], Error> {
        self.chain(|dev| {
            dev.sha_start()?;
            let mut blocks = message.chunks_exact(SHA_BLOCK_SIZE);
            for block in blocks.by_ref() {
                dev.sha_update(block)?;
            }
            dev.sha_end(blocks.remainder())
        })
    }
}
