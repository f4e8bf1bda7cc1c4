// Licensed under the Apache-2.0 license

use embedded_hal::delay::DelayNs;

use crate::command::{Command, Opcode, BLOCK_SIZE};
use crate::error::Error;
use crate::execution::Device;
use crate::transport::Transport;

impl<T: Transport, D: DelayNs> Device<T, D> {
    /// 32 random bytes from the device RNG. The RNG seed is updated.
    ///
    /// Until the configuration zone is locked the device answers with a
    /// fixed test pattern.
    ///
    /// # Errors
    ///
    /// Propagates transaction failures.
    pub fn random(&mut self) -> Result<[u8; BLOCK_SIZE], Error> {
        let command = Command::new(Opcode::Random, 0x00, 0x0000).with_response_len(BLOCK_SIZE);
        let response = self.execute(&command)?;
        Ok(response.to_array()?)
    }

    /// Refresh the RNG seed, keeping the device awake for a following
    /// command that consumes it.
    pub(crate) fn update_seed(&mut self) -> Result<(), Error> {
        let command = Command::new(Opcode::Random, 0x00, 0x0000).with_response_len(BLOCK_SIZE);
        self.execute_keep_awake(&command).map(|_| ())
    }
}
