// Licensed under the Apache-2.0 license

//! Error types shared by the packet codec, the execution engine and the
//! command builders.

use core::fmt;

use crate::packet::CodecError;

/// Status codes a device places in the single data byte of a 4-byte response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceStatus {
    /// Command executed successfully
    Success = 0x00,
    /// CheckMac or Verify miscompare
    Miscompare = 0x01,
    /// Command received with an illegal opcode or parameter
    ParseError = 0x03,
    /// ECC computation failed, retry with a new nonce
    EccFault = 0x05,
    /// Self test failed and the device refuses the command
    SelfTestError = 0x07,
    /// Random number generator health test failed
    HealthTestError = 0x08,
    /// Command could not be executed in the current device state
    ExecutionError = 0x0F,
    /// Device just woke up; the command was not executed
    AfterWake = 0x11,
    /// Watchdog will expire before the command can finish
    WatchdogAboutToExpire = 0xEE,
    /// Device detected a CRC or framing error on the request
    CommError = 0xFF,
}

impl DeviceStatus {
    /// Raw status byte as reported on the wire.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Map a status byte to a known status, `None` for unrecognised values.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Success),
            0x01 => Some(Self::Miscompare),
            0x03 => Some(Self::ParseError),
            0x05 => Some(Self::EccFault),
            0x07 => Some(Self::SelfTestError),
            0x08 => Some(Self::HealthTestError),
            0x0F => Some(Self::ExecutionError),
            0x11 => Some(Self::AfterWake),
            0xEE => Some(Self::WatchdogAboutToExpire),
            0xFF => Some(Self::CommError),
            _ => None,
        }
    }

    /// Whether a 4-byte response carrying this status is a failure report.
    #[must_use]
    pub const fn is_error(self) -> bool {
        !matches!(self, Self::Success)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::Miscompare => "miscompare",
            Self::ParseError => "parse error",
            Self::EccFault => "ECC fault",
            Self::SelfTestError => "self test error",
            Self::HealthTestError => "health test error",
            Self::ExecutionError => "execution error",
            Self::AfterWake => "unexpected wake status",
            Self::WatchdogAboutToExpire => "watchdog about to expire",
            Self::CommError => "device reported CRC or communication error",
        };
        write!(f, "{text} (0x{:02X})", self.code())
    }
}

/// Malformed response detected on the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxError {
    /// Fewer bytes than the smallest valid response
    Short,
    /// Length byte disagrees with the number of bytes received
    LengthMismatch { declared: u8, received: usize },
    /// CRC trailer does not match the response contents
    Checksum { expected: u16, received: u16 },
}

/// Errors surfaced by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Transport send or receive failed after every retry
    CommFail,
    /// Device did not answer the wake sequence with the expected signature
    WakeFailed,
    /// Response was truncated or corrupted
    Rx(RxError),
    /// Polling budget elapsed without a response
    Timeout,
    /// Device executed the command and reported a failure
    Device(DeviceStatus),
    /// Request does not fit into a single packet
    Encoding,
    /// Argument rejected before anything was sent
    BadParam,
    /// Device family does not implement the command
    Unsupported,
    /// No device registered with the default device cell
    NotInitialized,
}

impl Error {
    /// Failures that may clear up when the whole transaction is repeated.
    ///
    /// Device reported errors and argument errors are results, not faults,
    /// and are excluded.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::CommFail | Self::WakeFailed | Self::Rx(_) | Self::Timeout
        )
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::PayloadTooLarge { .. } => Self::Encoding,
            CodecError::ShortResponse => Self::Rx(RxError::Short),
            CodecError::LengthMismatch { declared, received } => {
                Self::Rx(RxError::LengthMismatch { declared, received })
            }
            CodecError::ChecksumMismatch { expected, received } => {
                Self::Rx(RxError::Checksum { expected, received })
            }
            CodecError::Device(status) => Self::Device(status),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommFail => f.write_str("communication with the device failed"),
            Self::WakeFailed => f.write_str("device did not wake up"),
            Self::Rx(RxError::Short) => f.write_str("response too short"),
            Self::Rx(RxError::LengthMismatch { declared, received }) => write!(
                f,
                "response length byte {declared} does not match {received} bytes received"
            ),
            Self::Rx(RxError::Checksum { expected, received }) => write!(
                f,
                "response CRC mismatch: expected 0x{expected:04X}, received 0x{received:04X}"
            ),
            Self::Timeout => f.write_str("timed out waiting for the device"),
            Self::Device(status) => write!(f, "device error: {status}"),
            Self::Encoding => f.write_str("request exceeds the maximum packet size"),
            Self::BadParam => f.write_str("invalid parameter"),
            Self::Unsupported => f.write_str("command not supported by this device"),
            Self::NotInitialized => f.write_str("default device not initialized"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
