// Licensed under the Apache-2.0 license

//! Process-wide default device.
//!
//! Applications that talk to a single secure element can park its
//! [`Device`] in a `static DeviceCell` after bringing up the bus and call
//! commands without threading the handle around. Access is serialized by a
//! critical section that only guards taking the device out and putting it
//! back, so interrupts are never masked for the duration of a command.

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use log::debug;

use crate::command::Command;
use crate::error::Error;
use crate::execution::{Device, Response};
use crate::transport::Transport;

pub struct DeviceCell<T, D> {
    inner: Mutex<RefCell<Option<Device<T, D>>>>,
}

impl<T, D> Default for DeviceCell<T, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, D> DeviceCell<T, D> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Install the default device, returning the one it replaces.
    pub fn init(&self, device: Device<T, D>) -> Option<Device<T, D>> {
        debug!("default device installed");
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(device))
    }

    /// Remove the default device.
    pub fn release(&self) -> Option<Device<T, D>> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).is_some())
    }
}

impl<T: Transport, D: DelayNs> DeviceCell<T, D> {
    /// Run `f` with exclusive access to the default device.
    ///
    /// The device is checked out for the duration of `f`; a nested call
    /// from inside `f` sees an empty cell.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] when no device is installed,
    /// otherwise whatever `f` returns.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut Device<T, D>) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let mut device = self.release().ok_or(Error::NotInitialized)?;
        let result = f(&mut device);
        critical_section::with(|cs| {
            self.inner.borrow_ref_mut(cs).get_or_insert(device);
        });
        result
    }

    /// [`Device::execute`] on the default device.
    ///
    /// # Errors
    ///
    /// See [`DeviceCell::with`].
    pub fn execute(&self, command: &Command) -> Result<Response, Error> {
        self.with(|device| device.execute(command))
    }

    /// [`Device::info`] on the default device.
    ///
    /// # Errors
    ///
    /// See [`DeviceCell::with`].
    pub fn info(&self) -> Result<[u8; 4], Error> {
        self.with(Device::info)
    }

    /// [`Device::random`] on the default device.
    ///
    /// # Errors
    ///
    /// See [`DeviceCell::with`].
    pub fn random(&self) -> Result<[u8; 32], Error> {
        self.with(Device::random)
    }

    /// [`Device::read_serial_number`] on the default device.
    ///
    /// # Errors
    ///
    /// See [`DeviceCell::with`].
    pub fn read_serial_number(&self) -> Result<[u8; 9], Error> {
        self.with(Device::read_serial_number)
    }
}
