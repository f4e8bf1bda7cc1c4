// Licensed under the Apache-2.0 license

// Enforce Copilot coding guidelines - prevent panic-prone patterns in production code only
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::indexing_slicing))]
#![cfg_attr(not(test), warn(clippy::expect_used))]
#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! Driver for CryptoAuthentication secure elements (ATSHA204A, ATECC108A,
//! ATECC508A, ATECC608, ECC204).
//!
//! The heart of the crate is the transaction engine in [`execution`]: it wakes
//! the device, sends an encoded [`packet`], waits or polls for completion,
//! validates the CRC and status of the response and puts the device back to
//! idle. Transports are written against `embedded-hal` and `embedded-io` so any
//! board HAL can plug in.

pub mod basic;
pub mod command;
pub mod device;
pub mod error;
pub mod execution;
pub mod packet;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use basic::DeviceCell;
pub use command::{Command, LockZone, NonceTarget, Opcode, Zone};
pub use device::{
    Bus, Capability, DeviceState, DeviceType, IfaceConfig, IfaceConfigBuilder, WaitPolicy,
};
pub use error::{DeviceStatus, Error, RxError};
pub use execution::{Device, Response};
pub use transport::{Control, Transport, WordAddress};
