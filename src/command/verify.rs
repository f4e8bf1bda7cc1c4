// Licensed under the Apache-2.0 license

use embedded_hal::delay::DelayNs;

use crate::command::genkey::PUBLIC_KEY_SIZE;
use crate::command::sign::SIGNATURE_SIZE;
use crate::command::{require, Command, NonceTarget, Opcode, BLOCK_SIZE};
use crate::device::{Capability, DeviceType};
use crate::error::{DeviceStatus, Error};
use crate::execution::Device;
use crate::transport::Transport;

const VERIFY_MODE_EXTERNAL: u8 = 0x02;
const VERIFY_MODE_SOURCE_TEMPKEY: u8 = 0x00;
const VERIFY_MODE_SOURCE_MSGDIGBUF: u8 = 0x20;
const VERIFY_KEY_P256: u16 = 0x0004;

impl<T: Transport, D: DelayNs> Device<T, D> {
    /// Verify a signature over a 32-byte digest with an external public key.
    ///
    /// Returns `Ok(false)` when the device reports a miscompare.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] on families without external verify,
    /// otherwise propagates transaction failures.
    pub fn verify_extern(
        &mut self,
        digest: &[u8; BLOCK_SIZE],
        signature: &[u8; SIGNATURE_SIZE],
        public_key: &[u8; PUBLIC_KEY_SIZE],
    ) -> Result<bool, Error> {
        require(self.device_type(), Capability::Verify)?;
        let (target, source) = if self.device_type() == DeviceType::Atecc608 {
            (NonceTarget::MsgDigestBuffer, VERIFY_MODE_SOURCE_MSGDIGBUF)
        } else {
            (NonceTarget::TempKey, VERIFY_MODE_SOURCE_TEMPKEY)
        };

        self.chain(|dev| {
            dev.update_seed()?;
            dev.nonce_load_keep_awake(target, digest)
        })?;

        let command = Command::new(
            Opcode::Verify,
            VERIFY_MODE_EXTERNAL | source,
            VERIFY_KEY_P256,
        )
        .with_data(signature)?
        .with_data(public_key)?;
        match self.execute(&command) {
            Ok(_) => Ok(true),
            Err(Error::Device(DeviceStatus::Miscompare)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
