// Licensed under the Apache-2.0 license

//! Typical command execution times used by the fixed-wait policy.

use heapless::LinearMap;

use crate::command::Opcode;
use crate::device::DeviceType;
use crate::error::Error;

/// Mask of the clock divider bits in the ChipMode configuration byte.
pub const CHIP_MODE_CLOCK_DIV_MASK: u8 = 0xF8;

/// Opcode slots in an [`ExecutionTimes`] table.
pub const MAX_ENTRIES: usize = 32;

/// Internal clock divider of the ATECC608, read from ChipMode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ClockDivider {
    #[default]
    M0 = 0x00,
    M1 = 0x08,
    M2 = 0x68,
}

impl ClockDivider {
    /// Decode the divider from a raw ChipMode byte.
    #[must_use]
    pub const fn from_chip_mode(chip_mode: u8) -> Option<Self> {
        match chip_mode & CHIP_MODE_CLOCK_DIV_MASK {
            0x00 => Some(Self::M0),
            0x08 => Some(Self::M1),
            0x68 => Some(Self::M2),
            _ => None,
        }
    }
}

type Table = &'static [(Opcode, u16)];

const ATSHA204A: Table = &[
    (Opcode::CheckMac, 38),
    (Opcode::DeriveKey, 62),
    (Opcode::GenDig, 43),
    (Opcode::Hmac, 69),
    (Opcode::Info, 2),
    (Opcode::Lock, 24),
    (Opcode::Mac, 35),
    (Opcode::Nonce, 60),
    (Opcode::Pause, 2),
    (Opcode::Random, 50),
    (Opcode::Read, 5),
    (Opcode::Sha, 22),
    (Opcode::UpdateExtra, 12),
    (Opcode::Write, 42),
];

const ATECC108A: Table = &[
    (Opcode::CheckMac, 13),
    (Opcode::Counter, 20),
    (Opcode::DeriveKey, 50),
    (Opcode::GenDig, 11),
    (Opcode::GenKey, 115),
    (Opcode::Hmac, 23),
    (Opcode::Info, 2),
    (Opcode::Lock, 32),
    (Opcode::Mac, 14),
    (Opcode::Nonce, 29),
    (Opcode::Pause, 3),
    (Opcode::PrivWrite, 48),
    (Opcode::Random, 23),
    (Opcode::Read, 5),
    (Opcode::Sign, 60),
    (Opcode::Sha, 9),
    (Opcode::UpdateExtra, 10),
    (Opcode::Verify, 72),
    (Opcode::Write, 26),
];

const ATECC508A: Table = &[
    (Opcode::CheckMac, 13),
    (Opcode::Counter, 20),
    (Opcode::DeriveKey, 50),
    (Opcode::Ecdh, 58),
    (Opcode::GenDig, 11),
    (Opcode::GenKey, 115),
    (Opcode::Hmac, 23),
    (Opcode::Info, 1),
    (Opcode::Lock, 32),
    (Opcode::Mac, 14),
    (Opcode::Nonce, 7),
    (Opcode::Pause, 3),
    (Opcode::PrivWrite, 48),
    (Opcode::Random, 23),
    (Opcode::Read, 1),
    (Opcode::Sign, 60),
    (Opcode::Sha, 9),
    (Opcode::UpdateExtra, 10),
    (Opcode::Verify, 72),
    (Opcode::Write, 26),
];

const ATECC608_M0: Table = &[
    (Opcode::Aes, 27),
    (Opcode::CheckMac, 40),
    (Opcode::Counter, 25),
    (Opcode::DeriveKey, 50),
    (Opcode::Ecdh, 75),
    (Opcode::GenDig, 25),
    (Opcode::GenKey, 115),
    (Opcode::Info, 5),
    (Opcode::Kdf, 165),
    (Opcode::Lock, 35),
    (Opcode::Mac, 55),
    (Opcode::Nonce, 20),
    (Opcode::PrivWrite, 50),
    (Opcode::Random, 23),
    (Opcode::Read, 5),
    (Opcode::SecureBoot, 80),
    (Opcode::SelfTest, 250),
    (Opcode::Sign, 115),
    (Opcode::Sha, 36),
    (Opcode::UpdateExtra, 10),
    (Opcode::Verify, 105),
    (Opcode::Write, 45),
];

const ATECC608_M1: Table = &[
    (Opcode::Aes, 27),
    (Opcode::CheckMac, 40),
    (Opcode::Counter, 25),
    (Opcode::DeriveKey, 50),
    (Opcode::Ecdh, 172),
    (Opcode::GenDig, 35),
    (Opcode::GenKey, 215),
    (Opcode::Info, 5),
    (Opcode::Kdf, 165),
    (Opcode::Lock, 35),
    (Opcode::Mac, 55),
    (Opcode::Nonce, 20),
    (Opcode::PrivWrite, 50),
    (Opcode::Random, 23),
    (Opcode::Read, 5),
    (Opcode::SecureBoot, 160),
    (Opcode::SelfTest, 625),
    (Opcode::Sign, 220),
    (Opcode::Sha, 42),
    (Opcode::UpdateExtra, 10),
    (Opcode::Verify, 295),
    (Opcode::Write, 45),
];

const ATECC608_M2: Table = &[
    (Opcode::Aes, 27),
    (Opcode::CheckMac, 40),
    (Opcode::Counter, 25),
    (Opcode::DeriveKey, 50),
    (Opcode::Ecdh, 531),
    (Opcode::GenDig, 35),
    (Opcode::GenKey, 653),
    (Opcode::Info, 5),
    (Opcode::Kdf, 165),
    (Opcode::Lock, 35),
    (Opcode::Mac, 55),
    (Opcode::Nonce, 20),
    (Opcode::PrivWrite, 50),
    (Opcode::Random, 23),
    (Opcode::Read, 5),
    (Opcode::SecureBoot, 480),
    (Opcode::SelfTest, 2324),
    (Opcode::Sign, 665),
    (Opcode::Sha, 75),
    (Opcode::UpdateExtra, 10),
    (Opcode::Verify, 1085),
    (Opcode::Write, 45),
];

const ECC204: Table = &[
    (Opcode::Counter, 20),
    (Opcode::GenKey, 115),
    (Opcode::Info, 5),
    (Opcode::Lock, 35),
    (Opcode::Nonce, 20),
    (Opcode::Random, 23),
    (Opcode::Read, 5),
    (Opcode::SelfTest, 250),
    (Opcode::Sha, 36),
    (Opcode::Sign, 115),
    (Opcode::Write, 45),
];

const fn table(device_type: DeviceType, divider: ClockDivider) -> Table {
    match (device_type, divider) {
        (DeviceType::Atsha204a, _) => ATSHA204A,
        (DeviceType::Atecc108a, _) => ATECC108A,
        (DeviceType::Atecc508a, _) => ATECC508A,
        (DeviceType::Atecc608, ClockDivider::M0) => ATECC608_M0,
        (DeviceType::Atecc608, ClockDivider::M1) => ATECC608_M1,
        (DeviceType::Atecc608, ClockDivider::M2) => ATECC608_M2,
        (DeviceType::Ecc204, _) => ECC204,
    }
}

fn table_max(table: Table) -> u16 {
    table.iter().map(|(_, ms)| *ms).max().unwrap_or(0)
}

/// Built-in execution time in milliseconds, or the slowest command of the
/// family when the opcode is not listed.
#[must_use]
pub fn typical_ms(device_type: DeviceType, divider: ClockDivider, opcode: u8) -> u16 {
    let table = table(device_type, divider);
    table
        .iter()
        .find(|(op, _)| *op as u8 == opcode)
        .map_or_else(|| table_max(table), |(_, ms)| *ms)
}

/// Opcode to execution time table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionTimes {
    entries: LinearMap<u8, u16, MAX_ENTRIES>,
    fallback_ms: u16,
}

impl ExecutionTimes {
    /// Empty table answering `fallback_ms` for every opcode.
    #[must_use]
    pub fn new(fallback_ms: u16) -> Self {
        Self {
            entries: LinearMap::new(),
            fallback_ms,
        }
    }

    /// Built-in table for a device family and clock divider.
    #[must_use]
    pub fn for_device(device_type: DeviceType, divider: ClockDivider) -> Self {
        let table = table(device_type, divider);
        let mut times = Self::new(table_max(table));
        for (opcode, ms) in table {
            // every built-in table is smaller than MAX_ENTRIES
            let _ = times.entries.insert(*opcode as u8, *ms);
        }
        times
    }

    /// Set the time of one opcode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] when the table is full.
    pub fn insert(&mut self, opcode: Opcode, ms: u16) -> Result<(), Error> {
        self.entries
            .insert(opcode as u8, ms)
            .map(|_| ())
            .map_err(|_| Error::BadParam)
    }

    /// Execution time of `opcode` in milliseconds.
    #[must_use]
    pub fn get(&self, opcode: u8) -> u16 {
        self.entries.get(&opcode).copied().unwrap_or(self.fallback_ms)
    }

    /// Time used for opcodes missing from the table.
    #[must_use]
    pub fn fallback(&self) -> u16 {
        self.fallback_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chip_mode_decoding() {
        assert_eq!(ClockDivider::from_chip_mode(0x00), Some(ClockDivider::M0));
        // low bits belong to other ChipMode fields
        assert_eq!(ClockDivider::from_chip_mode(0x0F), Some(ClockDivider::M1));
        assert_eq!(ClockDivider::from_chip_mode(0x6D), Some(ClockDivider::M2));
        assert_eq!(ClockDivider::from_chip_mode(0x10), None);
    }

    #[test]
    fn test_documented_ecc508_times() {
        let times = ExecutionTimes::for_device(DeviceType::Atecc508a, ClockDivider::M0);
        assert_eq!(times.get(Opcode::Info as u8), 1);
        assert_eq!(times.get(Opcode::Sign as u8), 60);
        assert_eq!(times.get(Opcode::GenKey as u8), 115);
        assert_eq!(times.get(Opcode::Verify as u8), 72);
    }

    #[test]
    fn test_unlisted_opcode_uses_family_maximum() {
        let times = ExecutionTimes::for_device(DeviceType::Atecc508a, ClockDivider::M0);
        assert_eq!(times.get(Opcode::Aes as u8), 115);
        assert_eq!(times.fallback(), 115);
        assert_eq!(typical_ms(DeviceType::Atecc508a, ClockDivider::M0, 0xFE), 115);
    }

    #[test]
    fn test_divider_slows_608() {
        let m0 = typical_ms(DeviceType::Atecc608, ClockDivider::M0, Opcode::Sign as u8);
        let m2 = typical_ms(DeviceType::Atecc608, ClockDivider::M2, Opcode::Sign as u8);
        assert!(m2 > m0);
    }

    #[test]
    fn test_custom_table() {
        let mut times = ExecutionTimes::new(100);
        times.insert(Opcode::Read, 3).unwrap();
        assert_eq!(times.get(Opcode::Read as u8), 3);
        assert_eq!(times.get(Opcode::Sign as u8), 100);
    }
}
