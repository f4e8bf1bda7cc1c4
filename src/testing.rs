// Licensed under the Apache-2.0 license

//! Scripted transport and recording delay shared by the unit tests.

use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::device::IfaceConfig;
use crate::execution::Device;
use crate::packet::{crc16_le, WAKE_SIGNATURE};
use crate::transport::{Control, Transport, WordAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

/// Transport that replays scripted results and records every call.
pub struct MockTransport {
    /// Packets passed to `send`, failed attempts included
    pub sent: Vec<Vec<u8>>,
    /// Results for successive sends, `Ok` once exhausted
    pub send_results: VecDeque<Result<(), MockError>>,
    /// Results for successive receives, `WouldBlock` once exhausted
    pub responses: VecDeque<nb::Result<Vec<u8>, MockError>>,
    /// Bytes queued in front of `responses` by every wake pulse
    pub wake_reply: Option<Vec<u8>>,
    pub fail_idle: bool,
    pub wakes: usize,
    pub idles: usize,
    pub sleeps: usize,
    pub receives: usize,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            sent: Vec::new(),
            send_results: VecDeque::new(),
            responses: VecDeque::new(),
            wake_reply: Some(WAKE_SIGNATURE.to_vec()),
            fail_idle: false,
            wakes: 0,
            idles: 0,
            sleeps: 0,
            receives: 0,
        }
    }
}

impl MockTransport {
    /// Queue a well formed response carrying `payload`.
    pub fn respond(&mut self, payload: &[u8]) -> &mut Self {
        self.responses.push_back(Ok(response(payload)));
        self
    }

    /// Queue raw response bytes.
    pub fn respond_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.responses.push_back(Ok(bytes.to_vec()));
        self
    }

    /// Decoded requests in the order they were sent.
    pub fn requests(&self) -> Vec<(u8, u8, u16, Vec<u8>)> {
        self.sent
            .iter()
            .map(|bytes| {
                let request = crate::packet::decode_request(bytes).unwrap();
                (
                    request.opcode,
                    request.param1,
                    request.param2,
                    request.payload.to_vec(),
                )
            })
            .collect()
    }
}

/// Frame `payload` as a device response.
pub fn response(payload: &[u8]) -> Vec<u8> {
    let mut bytes = std::vec![(payload.len() + 3) as u8];
    bytes.extend_from_slice(payload);
    let crc = crc16_le(&bytes);
    bytes.extend_from_slice(&crc);
    bytes
}

impl Transport for MockTransport {
    type Error = MockError;

    fn send(&mut self, word_address: WordAddress, data: &[u8]) -> Result<(), Self::Error> {
        assert_eq!(word_address, WordAddress::Command);
        self.sent.push(data.to_vec());
        self.send_results.pop_front().unwrap_or(Ok(()))
    }

    fn receive(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error> {
        self.receives += 1;
        let bytes = self
            .responses
            .pop_front()
            .unwrap_or(Err(nb::Error::WouldBlock))?;
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }

    fn control(&mut self, option: Control) -> Result<(), Self::Error> {
        match option {
            Control::Wake => {
                self.wakes += 1;
                if let Some(reply) = &self.wake_reply {
                    self.responses.push_front(Ok(reply.clone()));
                }
                Ok(())
            }
            Control::Idle if self.fail_idle => Err(MockError),
            Control::Idle => {
                self.idles += 1;
                Ok(())
            }
            Control::Sleep => {
                self.sleeps += 1;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Delay that only adds up what it was asked to wait.
#[derive(Default)]
pub struct RecordingDelay {
    pub total_ns: u64,
    pub calls: usize,
}

impl RecordingDelay {
    pub fn total_us(&self) -> u64 {
        self.total_ns / 1000
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.calls += 1;
        self.total_ns += u64::from(us) * 1000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ms) * 1_000_000;
    }
}

/// Device over a fresh mock with `config`.
pub fn device(config: IfaceConfig) -> Device<MockTransport, RecordingDelay> {
    Device::new(MockTransport::default(), RecordingDelay::default(), config)
}
