// Licensed under the Apache-2.0 license

//! I2C transport on top of an `embedded-hal` 1.0 bus.
//!
//! Every write starts with a [`WordAddress`] byte. Responses are read in two
//! parts: the length byte first, then the remainder. A device that is still
//! executing a command does not acknowledge its address, which is reported as
//! `nb::Error::WouldBlock` so the engine can keep polling.

use embedded_hal::i2c::{Error as _, ErrorKind, I2c, SevenBitAddress};
use heapless::Vec;
use log::trace;

use crate::device::{Bus, IfaceConfig};
use crate::error::Error;
use crate::packet::MAX_PACKET_SIZE;
use crate::transport::{Control, Transport, WordAddress};

/// Default 7-bit address of an unconfigured device.
pub const DEFAULT_ADDRESS: SevenBitAddress = 0x60;

/// Address the wake pulse is clocked out to. Holding SDA low during the
/// general call byte is what wakes the device, so a NACK is expected.
const WAKE_ADDRESS: SevenBitAddress = 0x00;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum I2cSpeed {
    Standard = 100_000,
    Fast = 400_000,
    FastPlus = 1_000_000,
}

/// Failures of the I2C transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cTransportError<E> {
    /// Underlying bus error
    Bus(E),
    /// Packet does not fit the transmit buffer
    Overflow,
    /// Receive buffer cannot hold even the length byte
    BufferTooSmall,
    /// The bus cannot perform the requested control option
    Unsupported(Control),
}

/// Transport to one device on an I2C bus.
pub struct I2cTransport<I> {
    bus: I,
    address: SevenBitAddress,
}

impl<I: I2c> I2cTransport<I> {
    pub fn new(bus: I, address: SevenBitAddress) -> Self {
        Self { bus, address }
    }

    /// Build the transport for an I2C interface configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadParam`] when the configuration describes another bus.
    pub fn for_config(bus: I, config: &IfaceConfig) -> Result<Self, Error> {
        match config.bus {
            Bus::I2c { address, .. } => Ok(Self::new(bus, address)),
            Bus::SwiUart => Err(Error::BadParam),
        }
    }

    #[must_use]
    pub fn address(&self) -> SevenBitAddress {
        self.address
    }

    /// Give the bus back.
    pub fn release(self) -> I {
        self.bus
    }

    fn write_word(&mut self, word_address: WordAddress) -> Result<(), I2cTransportError<I::Error>> {
        self.bus
            .write(self.address, &[word_address as u8])
            .map_err(I2cTransportError::Bus)
    }
}

impl<I: I2c> Transport for I2cTransport<I> {
    type Error = I2cTransportError<I::Error>;

    fn send(&mut self, word_address: WordAddress, data: &[u8]) -> Result<(), Self::Error> {
        let mut frame: Vec<u8, { MAX_PACKET_SIZE + 1 }> = Vec::new();
        frame
            .push(word_address as u8)
            .map_err(|_| I2cTransportError::Overflow)?;
        frame
            .extend_from_slice(data)
            .map_err(|()| I2cTransportError::Overflow)?;
        trace!("i2c {:#04x} tx {:02x?}", self.address, frame.as_slice());
        self.bus
            .write(self.address, &frame)
            .map_err(I2cTransportError::Bus)
    }

    fn receive(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error> {
        let (count, rest) = buf
            .split_first_mut()
            .ok_or(nb::Error::Other(I2cTransportError::BufferTooSmall))?;

        if let Err(err) = self.bus.read(self.address, core::slice::from_mut(count)) {
            return match err.kind() {
                ErrorKind::NoAcknowledge(_) => Err(nb::Error::WouldBlock),
                _ => Err(nb::Error::Other(I2cTransportError::Bus(err))),
            };
        }

        let remaining = usize::from(*count).saturating_sub(1).min(rest.len());
        if let Some(tail) = rest.get_mut(..remaining).filter(|tail| !tail.is_empty()) {
            self.bus
                .read(self.address, tail)
                .map_err(|err| nb::Error::Other(I2cTransportError::Bus(err)))?;
        }
        trace!("i2c {:#04x} rx {} bytes", self.address, remaining + 1);
        Ok(remaining + 1)
    }

    fn control(&mut self, option: Control) -> Result<(), Self::Error> {
        match option {
            Control::Wake => {
                if let Err(err) = self.bus.write(WAKE_ADDRESS, &[0x00]) {
                    trace!("wake pulse not acknowledged: {:?}", err.kind());
                }
                Ok(())
            }
            Control::Idle => self.write_word(WordAddress::Idle),
            Control::Sleep => self.write_word(WordAddress::Sleep),
            Control::Select | Control::Deselect => Ok(()),
            Control::ChangeBaud(_) => Err(I2cTransportError::Unsupported(option)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::IfaceConfigBuilder;
    use crate::execution::Device;
    use crate::testing::RecordingDelay;
    use embedded_hal::i2c::NoAcknowledgeSource;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use hex_literal::hex;

    const ADDR: u8 = DEFAULT_ADDRESS;

    fn nack() -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }

    #[test]
    fn test_send_prefixes_word_address() {
        let expectations = [I2cTransaction::write(
            ADDR,
            hex!("03 07 30 00 00 00 03 5D").to_vec(),
        )];
        let mut transport = I2cTransport::new(I2cMock::new(&expectations), ADDR);

        transport
            .send(WordAddress::Command, &hex!("07 30 00 00 00 03 5D"))
            .unwrap();

        transport.release().done();
    }

    #[test]
    fn test_receive_reads_length_then_remainder() {
        let expectations = [
            I2cTransaction::read(ADDR, vec![0x07]),
            I2cTransaction::read(ADDR, hex!("00 00 60 02 80 38").to_vec()),
        ];
        let mut transport = I2cTransport::new(I2cMock::new(&expectations), ADDR);
        let mut buf = [0u8; 16];

        let n = transport.receive(&mut buf).unwrap();

        assert_eq!(&buf[..n], &hex!("07 00 00 60 02 80 38"));
        transport.release().done();
    }

    #[test]
    fn test_receive_nack_is_would_block() {
        let expectations = [I2cTransaction::read(ADDR, vec![0x00]).with_error(nack())];
        let mut transport = I2cTransport::new(I2cMock::new(&expectations), ADDR);
        let mut buf = [0u8; 8];

        assert!(matches!(
            transport.receive(&mut buf),
            Err(nb::Error::WouldBlock)
        ));
        transport.release().done();
    }

    #[test]
    fn test_receive_other_errors_are_reported() {
        let expectations =
            [I2cTransaction::read(ADDR, vec![0x00]).with_error(ErrorKind::ArbitrationLoss)];
        let mut transport = I2cTransport::new(I2cMock::new(&expectations), ADDR);
        let mut buf = [0u8; 8];

        assert!(matches!(
            transport.receive(&mut buf),
            Err(nb::Error::Other(I2cTransportError::Bus(ErrorKind::ArbitrationLoss)))
        ));
        transport.release().done();
    }

    #[test]
    fn test_receive_truncates_to_buffer() {
        let expectations = [
            I2cTransaction::read(ADDR, vec![0x23]),
            I2cTransaction::read(ADDR, vec![0xAA; 3]),
        ];
        let mut transport = I2cTransport::new(I2cMock::new(&expectations), ADDR);
        let mut buf = [0u8; 4];

        assert_eq!(transport.receive(&mut buf).unwrap(), 4);
        assert_eq!(buf, [0x23, 0xAA, 0xAA, 0xAA]);
        transport.release().done();
    }

    #[test]
    fn test_wake_ignores_nack_and_power_words() {
        let expectations = [
            I2cTransaction::write(WAKE_ADDRESS, vec![0x00]).with_error(nack()),
            I2cTransaction::write(ADDR, vec![0x02]),
            I2cTransaction::write(ADDR, vec![0x01]),
        ];
        let mut transport = I2cTransport::new(I2cMock::new(&expectations), ADDR);

        transport.control(Control::Wake).unwrap();
        transport.control(Control::Idle).unwrap();
        transport.control(Control::Sleep).unwrap();
        assert_eq!(
            transport.control(Control::ChangeBaud(400_000)),
            Err(I2cTransportError::Unsupported(Control::ChangeBaud(400_000)))
        );
        transport.release().done();
    }

    #[test]
    fn test_for_config_uses_configured_address() {
        let config = IfaceConfigBuilder::i2c(0x35).build();
        let expectations: [I2cTransaction; 0] = [];
        let transport = I2cTransport::for_config(I2cMock::new(&expectations), &config).unwrap();
        assert_eq!(transport.address(), 0x35);
        transport.release().done();
    }

    #[test]
    fn test_info_transaction_over_i2c() {
        let expectations = [
            I2cTransaction::write(WAKE_ADDRESS, vec![0x00]).with_error(nack()),
            I2cTransaction::read(ADDR, vec![0x04]),
            I2cTransaction::read(ADDR, hex!("11 33 43").to_vec()),
            I2cTransaction::write(ADDR, hex!("03 07 30 00 00 00 03 5D").to_vec()),
            I2cTransaction::read(ADDR, vec![0x07]),
            I2cTransaction::read(ADDR, hex!("00 00 60 02 80 38").to_vec()),
            I2cTransaction::write(ADDR, vec![0x02]),
        ];
        let config = IfaceConfigBuilder::default().build();
        let transport = I2cTransport::for_config(I2cMock::new(&expectations), &config).unwrap();
        let mut device = Device::new(transport, RecordingDelay::default(), config);

        assert_eq!(device.info().unwrap(), hex!("00 00 60 02"));

        let (transport, _) = device.release();
        transport.release().done();
    }
}
