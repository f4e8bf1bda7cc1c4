// Licensed under the Apache-2.0 license

//! CRC-16 used on every request and response packet.
//!
//! Polynomial 0x8005 with the data bits fed LSB first into a non-reflected
//! register, zero initial value and no final xor. The result travels
//! little-endian after the covered bytes.

use ::crc::{Algorithm, Crc};

pub const CRC_16_CRYPTOAUTH: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x8005,
    init: 0x0000,
    refin: true,
    refout: false,
    xorout: 0x0000,
    check: 0xbcdd,
    residue: 0x0000,
};

const CRYPTOAUTH: Crc<u16> = Crc::<u16>::new(&CRC_16_CRYPTOAUTH);

/// CRC over `data`.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    CRYPTOAUTH.checksum(data)
}

/// CRC over `data` in wire order.
#[must_use]
pub fn crc16_le(data: &[u8]) -> [u8; 2] {
    crc16(data).to_le_bytes()
}
