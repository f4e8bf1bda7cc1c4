// Licensed under the Apache-2.0 license

//! Lock command and lock status queries.

use embedded_hal::delay::DelayNs;

use crate::command::{Command, Opcode, Zone, WORD_SIZE};
use crate::error::Error;
use crate::execution::Device;
use crate::packet::crc16;
use crate::transport::Transport;

/// Lock mode bits of param1.
const LOCK_ZONE_CONFIG: u8 = 0x00;
const LOCK_ZONE_DATA: u8 = 0x01;
const LOCK_ZONE_DATA_SLOT: u8 = 0x02;
const LOCK_ZONE_NO_CRC: u8 = 0x80;

/// Value of a lock byte that has not been locked.
const UNLOCKED: u8 = 0x55;

/// Zones locked as a whole.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LockZone {
    Config,
    Data,
}

/// Summary CRC the device expects when locking a zone with verification.
#[must_use]
pub fn zone_crc(contents: &[u8]) -> u16 {
    crc16(contents)
}

impl<T: Transport, D: DelayNs> Device<T, D> {
    fn lock(&mut self, mode: u8, summary_crc: u16) -> Result<(), Error> {
        let command = Command::new(Opcode::Lock, mode, summary_crc);
        self.execute(&command).map(|_| ())
    }

    /// Lock the configuration zone without checking its contents.
    ///
    /// # Errors
    ///
    /// `Error::Device(ExecutionError)` when the zone is already locked.
    pub fn lock_config_zone(&mut self) -> Result<(), Error> {
        self.lock(LOCK_ZONE_NO_CRC | LOCK_ZONE_CONFIG, 0)
    }

    /// Lock the configuration zone if its contents match `summary_crc`.
    ///
    /// # Errors
    ///
    /// `Error::Device(Miscompare)` when the CRC does not match.
    pub fn lock_config_zone_crc(&mut self, summary_crc: u16) -> Result<(), Error> {
        self.lock(LOCK_ZONE_CONFIG, summary_crc)
    }

    /// Lock the data and OTP zones without checking their contents.
    ///
    /// # Errors
    ///
    /// Propagates transaction failures.
    pub fn lock_data_zone(&mut self) -> Result<(), Error> {
        self.lock(LOCK_ZONE_NO_CRC | LOCK_ZONE_DATA, 0)
    }

    /// Lock the data and OTP zones if their contents match `summary_crc`.
    ///
    /// # Errors
    ///
    /// Propagates transaction failures.
    pub fn lock_data_zone_crc(&mut self, summary_crc: u16) -> Result<(), Error> {
        self.lock(LOCK_ZONE_DATA, summary_crc)
    }

    /// Lock a single data slot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] for a slot the device does not have.
    pub fn lock_data_slot(&mut self, slot: u16) -> Result<(), Error> {
        if slot >= self.device_type().slot_count() {
            return Err(Error::BadParam);
        }
        // slot is below 16, so it fits bits 2..5
        let mode = ((slot as u8) << 2) | LOCK_ZONE_DATA_SLOT;
        self.lock(mode, 0)
    }

    /// Whether a zone has been locked.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn is_locked(&mut self, zone: LockZone) -> Result<bool, Error> {
        let word = self.lock_word(5)?;
        let byte = match zone {
            LockZone::Config => word.get(3),
            LockZone::Data => word.get(2),
        };
        Ok(byte.copied().ok_or(Error::BadParam)? != UNLOCKED)
    }

    /// Whether an individual slot has been locked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] for a slot the device does not have.
    pub fn is_slot_locked(&mut self, slot: u16) -> Result<bool, Error> {
        if slot >= self.device_type().slot_count() {
            return Err(Error::BadParam);
        }
        let word = self.lock_word(6)?;
        let [lo, hi, ..] = word;
        let slot_locked = u16::from_le_bytes([lo, hi]);
        // a cleared bit marks a locked slot
        Ok(slot_locked & (1 << slot) == 0)
    }

    fn lock_word(&mut self, offset: u8) -> Result<[u8; WORD_SIZE], Error> {
        let mut word = [0u8; WORD_SIZE];
        self.read_zone(Zone::Config, 0, 2, offset, &mut word)?;
        Ok(word)
    }
}
