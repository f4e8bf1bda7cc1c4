// Licensed under the Apache-2.0 license

//! Read command and the helpers built on it.

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use log::{debug, warn};

use crate::command::{get_addr, Command, Opcode, Zone, BLOCK_SIZE, WORD_SIZE, ZONE_READWRITE_32};
use crate::device::{Capability, DeviceType};
use crate::error::Error;
use crate::execution::{ClockDivider, Device};
use crate::transport::Transport;

/// Largest configuration zone of any supported family.
pub const CONFIG_ZONE_MAX: usize = 128;

/// Serial number bytes spread over the first configuration block.
pub const SERIAL_NUMBER_SIZE: usize = 9;

/// Size of an OTP zone.
pub const OTP_ZONE_SIZE: usize = 64;

/// Byte of the configuration zone holding ChipMode.
const CHIP_MODE_INDEX: usize = 19;

/// Bytes of the public key pad the device places in front of X and Y.
const PUB_KEY_PAD: usize = 4;

/// Size in bytes of a zone, or of a slot for the data zone.
///
/// # Errors
///
/// Returns [`Error::BadParam`] for a slot the device does not have and
/// [`Error::Unsupported`] for the ECC204, whose zones use another layout.
pub fn zone_size(device_type: DeviceType, zone: Zone, slot: u16) -> Result<usize, Error> {
    if device_type == DeviceType::Ecc204 {
        return Err(Error::Unsupported);
    }
    match zone {
        Zone::Config => Ok(device_type.config_zone_size()),
        Zone::Otp => Ok(OTP_ZONE_SIZE),
        Zone::Data if slot >= device_type.slot_count() => Err(Error::BadParam),
        Zone::Data if device_type == DeviceType::Atsha204a => Ok(32),
        Zone::Data => Ok(match slot {
            0..=7 => 36,
            8 => 416,
            _ => 72,
        }),
    }
}

impl<T: Transport, D: DelayNs> Device<T, D> {
    /// Read one word or one block from a zone.
    ///
    /// `data` must be 4 or 32 bytes long; its length selects the access size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] for any other length or an out of range
    /// address, otherwise whatever the transaction reports.
    pub fn read_zone(
        &mut self,
        zone: Zone,
        slot: u16,
        block: u8,
        offset: u8,
        data: &mut [u8],
    ) -> Result<(), Error> {
        let param1 = match data.len() {
            WORD_SIZE => zone as u8,
            BLOCK_SIZE => zone as u8 | ZONE_READWRITE_32,
            _ => return Err(Error::BadParam),
        };
        if self.device_type() == DeviceType::Ecc204 {
            return Err(Error::Unsupported);
        }
        let addr = get_addr(self.device_type(), zone, slot, block, offset)?;

        let command = Command::new(Opcode::Read, param1, addr).with_response_len(data.len());
        let response = self.execute(&command)?;
        let payload = response.get(..data.len()).ok_or(Error::BadParam)?;
        data.copy_from_slice(payload);
        Ok(())
    }

    /// Read an arbitrary byte range of a zone, issuing as many block and
    /// word reads as needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] when the range runs past the end of the
    /// zone.
    pub fn read_bytes_zone(
        &mut self,
        zone: Zone,
        slot: u16,
        offset: usize,
        data: &mut [u8],
    ) -> Result<(), Error> {
        let size = zone_size(self.device_type(), zone, slot)?;
        let end = offset.checked_add(data.len()).ok_or(Error::BadParam)?;
        if end > size {
            return Err(Error::BadParam);
        }

        let mut pos = offset;
        let mut filled = 0;
        while filled < data.len() {
            let block = pos / BLOCK_SIZE;
            let block_start = block * BLOCK_SIZE;
            // a trailing partial block can only be read a word at a time
            let (start, len, word) = if size - block_start >= BLOCK_SIZE {
                (block_start, BLOCK_SIZE, 0)
            } else {
                let word = (pos - block_start) / WORD_SIZE;
                (block_start + word * WORD_SIZE, WORD_SIZE, word)
            };

            let mut buf = [0u8; BLOCK_SIZE];
            let chunk = buf.get_mut(..len).ok_or(Error::BadParam)?;
            self.read_zone(
                zone,
                slot,
                u8::try_from(block).map_err(|_| Error::BadParam)?,
                u8::try_from(word).map_err(|_| Error::BadParam)?,
                chunk,
            )?;

            let skip = pos - start;
            let count = (len - skip).min(data.len() - filled);
            let src = chunk.get(skip..skip + count).ok_or(Error::BadParam)?;
            let dst = data
                .get_mut(filled..filled + count)
                .ok_or(Error::BadParam)?;
            dst.copy_from_slice(src);
            filled += count;
            pos += count;
        }
        Ok(())
    }

    /// Read the whole configuration zone.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn read_config_zone(&mut self) -> Result<Vec<u8, CONFIG_ZONE_MAX>, Error> {
        let mut config = [0u8; CONFIG_ZONE_MAX];
        let size = self.device_type().config_zone_size();
        let buf = config.get_mut(..size).ok_or(Error::Unsupported)?;
        self.read_bytes_zone(Zone::Config, 0, 0, buf)?;
        Vec::from_slice(buf).map_err(|()| Error::BadParam)
    }

    /// Compare the static part of a configuration image against the device.
    ///
    /// The serial number, counters, key use bytes and lock bytes differ
    /// between devices or change at runtime and are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] when `expected` is shorter than the
    /// device's configuration zone.
    pub fn cmp_config_zone(&mut self, expected: &[u8]) -> Result<bool, Error> {
        let actual = self.read_config_zone()?;
        let size = actual.len();
        if expected.len() < size {
            return Err(Error::BadParam);
        }

        let mut ranges: Vec<(usize, usize), 3> = Vec::new();
        let _ = ranges.push((16, 52));
        if self.device_type() == DeviceType::Atecc608 {
            let _ = ranges.push((68, 84));
        }
        if size > 90 {
            let _ = ranges.push((90, size));
        }
        Ok(ranges
            .iter()
            .all(|&(start, end)| actual.get(start..end) == expected.get(start..end)))
    }

    /// Read the 9-byte serial number.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn read_serial_number(&mut self) -> Result<[u8; SERIAL_NUMBER_SIZE], Error> {
        let mut block = [0u8; BLOCK_SIZE];
        self.read_zone(Zone::Config, 0, 0, 0, &mut block)?;

        let mut serial = [0u8; SERIAL_NUMBER_SIZE];
        let (head, tail) = serial.split_at_mut(4);
        head.copy_from_slice(block.get(0..4).ok_or(Error::BadParam)?);
        tail.copy_from_slice(block.get(8..13).ok_or(Error::BadParam)?);
        Ok(serial)
    }

    /// Read a P-256 public key stored in a data slot.
    ///
    /// Only slots 8 to 15 are large enough. The key is stored as X and Y,
    /// each preceded by a 4-byte pad.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] for a slot below 8.
    pub fn read_pubkey(&mut self, slot: u16) -> Result<[u8; 64], Error> {
        if !(8..16).contains(&slot) {
            return Err(Error::BadParam);
        }
        let mut stored = [0u8; 72];
        self.read_bytes_zone(Zone::Data, slot, 0, &mut stored)?;

        let mut public_key = [0u8; 64];
        let (x, y) = public_key.split_at_mut(32);
        x.copy_from_slice(stored.get(PUB_KEY_PAD..PUB_KEY_PAD + 32).ok_or(Error::BadParam)?);
        y.copy_from_slice(stored.get(2 * PUB_KEY_PAD + 32..).ok_or(Error::BadParam)?);
        Ok(public_key)
    }

    /// Read a 64-byte signature (R then S) stored in a data slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] for a slot below 8.
    pub fn read_sig(&mut self, slot: u16) -> Result<[u8; 64], Error> {
        if !(8..16).contains(&slot) {
            return Err(Error::BadParam);
        }
        let mut signature = [0u8; 64];
        let (r, s) = signature.split_at_mut(BLOCK_SIZE);
        self.read_zone(Zone::Data, slot, 0, 0, r)?;
        self.read_zone(Zone::Data, slot, 1, 0, s)?;
        Ok(signature)
    }

    /// Bring the handle in line with the device after power up.
    ///
    /// On an ATECC608 this reads ChipMode and selects the execution time
    /// table matching the configured clock divider. Other families need no
    /// setup.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn init(&mut self) -> Result<(), Error> {
        if !self.device_type().supports(Capability::ClockDivider) {
            return Ok(());
        }
        let mut word = [0u8; WORD_SIZE];
        let word_offset = CHIP_MODE_INDEX / WORD_SIZE;
        self.read_zone(Zone::Config, 0, 0, word_offset as u8, &mut word)?;

        let chip_mode = word
            .get(CHIP_MODE_INDEX % WORD_SIZE)
            .copied()
            .ok_or(Error::BadParam)?;
        let divider = ClockDivider::from_chip_mode(chip_mode).unwrap_or_else(|| {
            warn!("unknown clock divider in ChipMode {:#04x}", chip_mode);
            ClockDivider::default()
        });
        debug!("clock divider {:?}", divider);
        self.set_clock_divider(divider);
        Ok(())
    }
}
