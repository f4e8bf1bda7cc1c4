// Licensed under the Apache-2.0 license

//! Commands understood by the device and the typed builders that run them.
//!
//! A builder validates its arguments, fills a [`Command`], hands it to
//! [`Device::execute`](crate::execution::Device::execute) and maps the
//! response payload into a typed result.

pub mod aes;
pub mod genkey;
pub mod info;
pub mod lock;
pub mod nonce;
pub mod random;
pub mod read;
pub mod sha;
pub mod sign;
pub mod verify;
pub mod write;

use heapless::Vec;

use crate::device::{Capability, DeviceType};
use crate::error::Error;
use crate::packet::{self, CodecError, Packet, CRC_SIZE, MAX_PACKET_SIZE, REQUEST_OVERHEAD};

pub use lock::LockZone;
pub use nonce::NonceTarget;

/// Largest payload a request can carry.
pub const MAX_PAYLOAD: usize = MAX_PACKET_SIZE - REQUEST_OVERHEAD;

/// Size of a word, the smallest unit of zone access.
pub const WORD_SIZE: usize = 4;

/// Size of a block, the largest unit of zone access.
pub const BLOCK_SIZE: usize = 32;

/// Command opcodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Pause = 0x01,
    Read = 0x02,
    Mac = 0x08,
    Hmac = 0x11,
    Write = 0x12,
    GenDig = 0x15,
    Nonce = 0x16,
    Lock = 0x17,
    Random = 0x1B,
    DeriveKey = 0x1C,
    UpdateExtra = 0x20,
    Counter = 0x24,
    CheckMac = 0x28,
    Info = 0x30,
    GenKey = 0x40,
    Sign = 0x41,
    Ecdh = 0x43,
    Verify = 0x45,
    PrivWrite = 0x46,
    Sha = 0x47,
    Aes = 0x51,
    Kdf = 0x56,
    SelfTest = 0x77,
    SecureBoot = 0x80,
}

/// Memory zones addressed by Read, Write and Lock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Zone {
    Config = 0x00,
    Otp = 0x01,
    Data = 0x02,
}

/// Bit 7 of param1 selects a 32-byte access instead of a 4-byte one.
pub const ZONE_READWRITE_32: u8 = 0x80;

/// One request for the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub opcode: Opcode,
    pub param1: u8,
    pub param2: u16,
    pub data: Vec<u8, MAX_PAYLOAD>,
    /// Largest response, in wire bytes, the command can produce
    pub rx_size: usize,
}

impl Command {
    /// Command without payload that answers with a status byte.
    #[must_use]
    pub fn new(opcode: Opcode, param1: u8, param2: u16) -> Self {
        Self {
            opcode,
            param1,
            param2,
            data: Vec::new(),
            rx_size: packet::RESPONSE_MIN_SIZE,
        }
    }

    /// Append payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] when the payload outgrows a packet.
    pub fn with_data(mut self, data: &[u8]) -> Result<Self, Error> {
        self.data
            .extend_from_slice(data)
            .map_err(|()| Error::Encoding)?;
        Ok(self)
    }

    /// Size the receive buffer for a response carrying `len` payload bytes.
    #[must_use]
    pub fn with_response_len(mut self, len: usize) -> Self {
        self.rx_size = 1 + len + CRC_SIZE;
        self
    }

    /// Encode into a wire packet.
    ///
    /// # Errors
    ///
    /// Fails when the packet exceeds `max_packet_size`.
    pub fn encode(&self, max_packet_size: usize) -> Result<Packet, CodecError> {
        packet::encode(
            self.opcode as u8,
            self.param1,
            self.param2,
            &self.data,
            max_packet_size,
        )
    }
}

/// Compute the param2 address of a zone access.
///
/// Config and OTP words are addressed by `block << 3 | offset`; data zone
/// words also carry the slot in bits 3..6 and the block in bits 8..15.
///
/// # Errors
///
/// Returns [`Error::BadParam`] for an offset outside a block or a slot the
/// device does not have.
pub fn get_addr(
    device_type: DeviceType,
    zone: Zone,
    slot: u16,
    block: u8,
    offset: u8,
) -> Result<u16, Error> {
    if usize::from(offset) >= BLOCK_SIZE / WORD_SIZE {
        return Err(Error::BadParam);
    }
    let offset = u16::from(offset);
    match zone {
        Zone::Config | Zone::Otp => Ok((u16::from(block) << 3) | offset),
        Zone::Data => {
            if slot >= device_type.slot_count() {
                return Err(Error::BadParam);
            }
            Ok((slot << 3) | (u16::from(block) << 8) | offset)
        }
    }
}

/// Fail with [`Error::Unsupported`] unless `device_type` has `capability`.
pub(crate) fn require(device_type: DeviceType, capability: Capability) -> Result<(), Error> {
    if device_type.supports(capability) {
        Ok(())
    } else {
        Err(Error::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_command_encode() {
        let command = Command::new(Opcode::Info, 0x00, 0x0000);
        assert_eq!(command.encode(151).unwrap().as_slice(), hex!("07 30 00 00 00 03 5D"));
    }

    #[test]
    fn test_command_payload_overflow() {
        let data = [0u8; MAX_PAYLOAD + 1];
        assert_eq!(
            Command::new(Opcode::Write, 0, 0).with_data(&data),
            Err(Error::Encoding)
        );
    }

    #[test]
    fn test_response_len() {
        let command = Command::new(Opcode::Random, 0, 0).with_response_len(32);
        assert_eq!(command.rx_size, 35);
    }

    #[test]
    fn test_config_and_otp_addresses() {
        assert_eq!(get_addr(DeviceType::Atecc608, Zone::Config, 0, 0, 4), Ok(0x0004));
        assert_eq!(get_addr(DeviceType::Atecc608, Zone::Config, 0, 2, 5), Ok(0x0015));
        assert_eq!(get_addr(DeviceType::Atecc608, Zone::Otp, 0, 1, 0), Ok(0x0008));
    }

    #[test]
    fn test_data_addresses() {
        assert_eq!(get_addr(DeviceType::Atecc608, Zone::Data, 8, 1, 2), Ok(0x0142));
        assert_eq!(get_addr(DeviceType::Atecc608, Zone::Data, 15, 0, 0), Ok(0x0078));
    }

    #[test]
    fn test_address_range_checks() {
        assert_eq!(
            get_addr(DeviceType::Atecc608, Zone::Config, 0, 0, 8),
            Err(Error::BadParam)
        );
        assert_eq!(
            get_addr(DeviceType::Atecc608, Zone::Data, 16, 0, 0),
            Err(Error::BadParam)
        );
        assert_eq!(
            get_addr(DeviceType::Ecc204, Zone::Data, 4, 0, 0),
            Err(Error::BadParam)
        );
    }
}
