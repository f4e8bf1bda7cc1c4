// Licensed under the Apache-2.0 license

use embedded_hal::delay::DelayNs;

use crate::command::read::zone_size;
use crate::command::{get_addr, Command, Opcode, Zone, BLOCK_SIZE, WORD_SIZE, ZONE_READWRITE_32};
use crate::error::Error;
use crate::execution::Device;
use crate::transport::Transport;

impl<T: Transport, D: DelayNs> Device<T, D> {
    /// Write one word or one block of a zone in the clear.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] unless `data` is 4 or 32 bytes and the
    /// address is in range.
    pub fn write_zone(
        &mut self,
        zone: Zone,
        slot: u16,
        block: u8,
        offset: u8,
        data: &[u8],
    ) -> Result<(), Error> {
        let param1 = match data.len() {
            WORD_SIZE => zone as u8,
            BLOCK_SIZE => zone as u8 | ZONE_READWRITE_32,
            _ => return Err(Error::BadParam),
        };
        zone_size(self.device_type(), zone, slot)?;
        let addr = get_addr(self.device_type(), zone, slot, block, offset)?;

        let command = Command::new(Opcode::Write, param1, addr).with_data(data)?;
        self.execute(&command).map(|_| ())
    }

    /// Write a word aligned byte range, using block writes where a whole
    /// block is covered and word writes elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] when the offset or length is not a multiple
    /// of 4 or the range runs past the end of the zone.
    pub fn write_bytes_zone(
        &mut self,
        zone: Zone,
        slot: u16,
        offset: usize,
        data: &[u8],
    ) -> Result<(), Error> {
        if offset % WORD_SIZE != 0 || data.len() % WORD_SIZE != 0 {
            return Err(Error::BadParam);
        }
        let size = zone_size(self.device_type(), zone, slot)?;
        let end = offset.checked_add(data.len()).ok_or(Error::BadParam)?;
        if end > size {
            return Err(Error::BadParam);
        }

        let mut pos = offset;
        let mut rest = data;
        while !rest.is_empty() {
            let block = u8::try_from(pos / BLOCK_SIZE).map_err(|_| Error::BadParam)?;
            let word = u8::try_from((pos % BLOCK_SIZE) / WORD_SIZE).map_err(|_| Error::BadParam)?;
            let len = if word == 0 && rest.len() >= BLOCK_SIZE {
                BLOCK_SIZE
            } else {
                WORD_SIZE
            };
            let (chunk, tail) = rest.split_at(len);
            self.write_zone(zone, slot, block, word, chunk)?;
            rest = tail;
            pos += len;
        }
        Ok(())
    }
}
