// Licensed under the Apache-2.0 license

//! Request and response packet codec.
//!
//! Request on the wire:
//!
//! ```text
//! | len | opcode | param1 | param2 (LE) | payload ... | crc (LE) |
//! ```
//!
//! Response on the wire:
//!
//! ```text
//! | len | payload or status ... | crc (LE) |
//! ```
//!
//! In both directions `len` counts every byte of the packet, itself and the
//! CRC trailer included. A response of exactly four bytes carries a single
//! status byte.

pub mod crc;

use core::fmt;
use core::ops::Deref;

use heapless::Vec;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::DeviceStatus;
pub use self::crc::{crc16, crc16_le};

/// Largest packet the codec will ever build or accept.
pub const MAX_PACKET_SIZE: usize = 192;

/// Length byte, opcode, param1 and param2.
pub const REQUEST_HEADER_SIZE: usize = 5;

/// CRC trailer.
pub const CRC_SIZE: usize = 2;

/// Header plus trailer of a request with an empty payload.
pub const REQUEST_OVERHEAD: usize = REQUEST_HEADER_SIZE + CRC_SIZE;

/// Length byte, one status byte and the CRC trailer.
pub const RESPONSE_MIN_SIZE: usize = 4;

/// Response sent by a device that just came out of sleep.
pub const WAKE_SIGNATURE: [u8; 4] = [0x04, 0x11, 0x33, 0x43];

/// Response sent on wake by a device whose power-on self test failed.
pub const WAKE_SELF_TEST_FAILED: [u8; 4] = [0x04, 0x07, 0xC4, 0x40];

/// Encoded request packet.
pub type Packet = Vec<u8, MAX_PACKET_SIZE>;

/// Fixed part of a request packet.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct RequestHeader {
    pub length: u8,
    pub opcode: u8,
    pub param1: u8,
    pub param2: U16,
}

/// Packet layer failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Request would exceed the device's maximum packet size
    PayloadTooLarge { len: usize, max: usize },
    /// Fewer than [`RESPONSE_MIN_SIZE`] bytes
    ShortResponse,
    /// Length byte disagrees with the bytes received
    LengthMismatch { declared: u8, received: usize },
    /// CRC trailer does not match
    ChecksumMismatch { expected: u16, received: u16 },
    /// Error-only response carrying a device status
    Device(DeviceStatus),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge { len, max } => {
                write!(f, "packet of {len} bytes exceeds maximum of {max}")
            }
            Self::ShortResponse => f.write_str("short response"),
            Self::LengthMismatch { declared, received } => {
                write!(f, "length byte {declared}, received {received} bytes")
            }
            Self::ChecksumMismatch { expected, received } => {
                write!(f, "crc 0x{received:04X}, expected 0x{expected:04X}")
            }
            Self::Device(status) => write!(f, "{status}"),
        }
    }
}

/// Build a request packet.
///
/// `max_packet_size` is the device family limit; the codec's own buffer caps
/// it at [`MAX_PACKET_SIZE`].
///
/// # Errors
///
/// Returns [`CodecError::PayloadTooLarge`] when the complete packet would not
/// fit.
pub fn encode(
    opcode: u8,
    param1: u8,
    param2: u16,
    payload: &[u8],
    max_packet_size: usize,
) -> Result<Packet, CodecError> {
    let max = max_packet_size.min(MAX_PACKET_SIZE);
    let len = REQUEST_OVERHEAD + payload.len();
    let length = u8::try_from(len).map_err(|_| CodecError::PayloadTooLarge { len, max })?;
    if len > max {
        return Err(CodecError::PayloadTooLarge { len, max });
    }

    let header = RequestHeader {
        length,
        opcode,
        param1,
        param2: U16::new(param2),
    };

    let overflow = |()| CodecError::PayloadTooLarge { len, max };
    let mut packet = Packet::new();
    packet.extend_from_slice(header.as_bytes()).map_err(overflow)?;
    packet.extend_from_slice(payload).map_err(overflow)?;
    let crc = crc16_le(&packet);
    packet.extend_from_slice(&crc).map_err(overflow)?;
    Ok(packet)
}

/// A request parsed back from its wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    pub opcode: u8,
    pub param1: u8,
    pub param2: u16,
    pub payload: &'a [u8],
}

/// Parse an encoded request.
///
/// # Errors
///
/// Fails on truncated packets, a length byte that disagrees with the slice,
/// or a bad CRC.
pub fn decode_request(bytes: &[u8]) -> Result<Request<'_>, CodecError> {
    let body = verify_frame(bytes, REQUEST_OVERHEAD)?;
    let (header, payload) =
        RequestHeader::read_from_prefix(body).map_err(|_| CodecError::ShortResponse)?;
    Ok(Request {
        opcode: header.opcode,
        param1: header.param1,
        param2: header.param2.get(),
        payload,
    })
}

/// Payload of a validated response: everything between the length byte and
/// the CRC trailer.
#[derive(Clone, PartialEq, Eq)]
pub struct Response {
    data: Vec<u8, MAX_PACKET_SIZE>,
}

impl Response {
    /// Wrap already validated payload bytes.
    ///
    /// # Errors
    ///
    /// Fails when `data` is larger than [`MAX_PACKET_SIZE`].
    pub fn from_payload(data: &[u8]) -> Result<Self, CodecError> {
        let data = Vec::from_slice(data).map_err(|()| CodecError::PayloadTooLarge {
            len: data.len(),
            max: MAX_PACKET_SIZE,
        })?;
        Ok(Self { data })
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Status byte of a single byte response.
    #[must_use]
    pub fn status(&self) -> Option<DeviceStatus> {
        match self.data.as_slice() {
            [code] => DeviceStatus::from_code(*code),
            _ => None,
        }
    }

    /// Copy the first `N` payload bytes into an array.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::ShortResponse`] when the payload holds fewer than
    /// `N` bytes.
    pub fn to_array<const N: usize>(&self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        let src = self.data.get(..N).ok_or(CodecError::ShortResponse)?;
        out.copy_from_slice(src);
        Ok(out)
    }
}

impl Deref for Response {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Response {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Response").field(&self.data.as_slice()).finish()
    }
}

/// Validate a response and extract its payload.
///
/// # Errors
///
/// * [`CodecError::ShortResponse`] for fewer than four bytes
/// * [`CodecError::LengthMismatch`] when the length byte is wrong
/// * [`CodecError::ChecksumMismatch`] when the CRC does not verify
/// * [`CodecError::Device`] for a four byte response carrying an error status
pub fn decode(bytes: &[u8]) -> Result<Response, CodecError> {
    let body = verify_frame(bytes, RESPONSE_MIN_SIZE)?;
    let payload = body.get(1..).ok_or(CodecError::ShortResponse)?;

    if let [code] = payload {
        if let Some(status) = DeviceStatus::from_code(*code).filter(|s| s.is_error()) {
            return Err(CodecError::Device(status));
        }
    }

    Response::from_payload(payload)
}

/// Outcome of reading back the four wake bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCheck {
    Awake,
    SelfTestFailed,
    Unexpected,
}

/// Compare a wake readback against the known signatures.
#[must_use]
pub fn check_wake(bytes: &[u8]) -> WakeCheck {
    if bytes == WAKE_SIGNATURE {
        WakeCheck::Awake
    } else if bytes == WAKE_SELF_TEST_FAILED {
        WakeCheck::SelfTestFailed
    } else {
        WakeCheck::Unexpected
    }
}

/// Check length and CRC framing and return the bytes covered by the CRC.
fn verify_frame(bytes: &[u8], min: usize) -> Result<&[u8], CodecError> {
    if bytes.len() < min {
        return Err(CodecError::ShortResponse);
    }
    let declared = bytes.first().copied().ok_or(CodecError::ShortResponse)?;
    if usize::from(declared) != bytes.len() {
        return Err(CodecError::LengthMismatch {
            declared,
            received: bytes.len(),
        });
    }

    let (body, trailer) = bytes.split_at(bytes.len() - CRC_SIZE);
    let received = match trailer {
        [lo, hi] => u16::from_le_bytes([*lo, *hi]),
        _ => return Err(CodecError::ShortResponse),
    };
    let expected = crc16(body);
    if expected != received {
        return Err(CodecError::ChecksumMismatch { expected, received });
    }
    Ok(body)
}
