// Licensed under the Apache-2.0 license

//! Byte transports between the host and the secure element.
//!
//! The execution engine only talks to a device through the [`Transport`]
//! trait. Two implementations are provided:
//!
//! - [`I2cTransport`] on top of any `embedded-hal` 1.0 I2C bus
//! - [`SwiUartTransport`] which emulates the single-wire interface with a UART
//!
//! ## Transport contract
//!
//! ```text
//! send(word_address, bytes)   one complete request or power command
//! receive(buf)                one complete response, nb::WouldBlock while busy
//! control(Control)            wake pulse, idle, sleep, select, baud change
//! ```

pub mod i2c;
pub mod swi_uart;

pub use i2c::I2cTransport;
pub use swi_uart::{SwiUartTransport, UartBaud};

/// First byte of every I2C write, selecting what the device does with it.
///
/// The single-wire interface maps these onto its own flag bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WordAddress {
    /// Reset the device's IO buffer pointer
    Reset = 0x00,
    /// Enter sleep, volatile state is lost
    Sleep = 0x01,
    /// Enter idle, TempKey and other volatile state survive
    Idle = 0x02,
    /// A command packet follows
    Command = 0x03,
}

/// Out-of-band requests to the transport.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Control {
    /// Emit the wake signal. Reading back the wake response is the caller's job.
    Wake,
    /// Put the device into idle
    Idle,
    /// Put the device into sleep
    Sleep,
    /// Start of a bracketed exchange on shared buses
    Select,
    /// End of a bracketed exchange
    Deselect,
    /// Switch the line to a new baud rate or bus frequency
    ChangeBaud(u32),
}

/// Byte channel to one device.
///
/// Implementations own the physical addressing; every call is addressed to
/// the device the transport was built for.
pub trait Transport {
    /// Bus specific error
    type Error: core::fmt::Debug;

    /// Send one request, prefixed by `word_address` where the bus needs it.
    ///
    /// # Errors
    ///
    /// Returns the bus error when the device does not acknowledge or the
    /// transfer fails.
    fn send(&mut self, word_address: WordAddress, data: &[u8]) -> Result<(), Self::Error>;

    /// Read one response into `buf` and return the number of bytes stored.
    ///
    /// Fewer bytes than announced by the length byte may be returned when
    /// `buf` is too small; the packet codec reports that as a length mismatch.
    ///
    /// # Errors
    ///
    /// `nb::Error::WouldBlock` while the device is still executing, the bus
    /// error otherwise.
    fn receive(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error>;

    /// Perform an out-of-band operation.
    ///
    /// # Errors
    ///
    /// Returns the bus error, or a transport specific error for options the
    /// transport cannot perform.
    fn control(&mut self, option: Control) -> Result<(), Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn send(&mut self, word_address: WordAddress, data: &[u8]) -> Result<(), Self::Error> {
        T::send(self, word_address, data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error> {
        T::receive(self, buf)
    }

    fn control(&mut self, option: Control) -> Result<(), Self::Error> {
        T::control(self, option)
    }
}
