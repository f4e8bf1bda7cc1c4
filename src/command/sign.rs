// Licensed under the Apache-2.0 license

use embedded_hal::delay::DelayNs;

use crate::command::{require, Command, NonceTarget, Opcode, BLOCK_SIZE};
use crate::device::{Capability, DeviceType};
use crate::error::Error;
use crate::execution::Device;
use crate::transport::Transport;

const SIGN_MODE_EXTERNAL: u8 = 0x80;
const SIGN_MODE_SOURCE_TEMPKEY: u8 = 0x00;
const SIGN_MODE_SOURCE_MSGDIGBUF: u8 = 0x20;

/// ECDSA P-256 signature, R then S.
pub const SIGNATURE_SIZE: usize = 64;

impl<T: Transport, D: DelayNs> Device<T, D> {
    /// Sign a 32-byte digest with the private key in `slot`.
    ///
    /// The RNG seed is refreshed first, then the digest is loaded as a
    /// nonce (into the message digest buffer on the ATECC608, TempKey
    /// elsewhere) and signed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] on families without ECC and
    /// [`Error::BadParam`] for a slot the device does not have.
    pub fn sign(&mut self, slot: u16, digest: &[u8; BLOCK_SIZE]) -> Result<[u8; SIGNATURE_SIZE], Error> {
        require(self.device_type(), Capability::Ecc)?;
        if slot >= self.device_type().slot_count() {
            return Err(Error::BadParam);
        }
        let (target, source) = if self.device_type() == DeviceType::Atecc608 {
            (NonceTarget::MsgDigestBuffer, SIGN_MODE_SOURCE_MSGDIGBUF)
        } else {
            (NonceTarget::TempKey, SIGN_MODE_SOURCE_TEMPKEY)
        };

        self.chain(|dev| {
            dev.update_seed()?;
            dev.nonce_load_keep_awake(target, digest)
        })?;

        let command = Command::new(Opcode::Sign, SIGN_MODE_EXTERNAL | source, slot)
            .with_response_len(SIGNATURE_SIZE);
        let response = self.execute(&command)?;
        Ok(response.to_array()?)
    }
}
