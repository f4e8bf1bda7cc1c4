// Licensed under the Apache-2.0 license

//! Transaction engine.
//!
//! One transaction wakes the device when it is not known to be awake, sends
//! the encoded request, waits for completion (a fixed sleep or bounded
//! polling), validates the response and sends the device back to idle:
//!
//! ```text
//! Idle -> wake -> Active -> send -> awaiting response -> receive -> Active -> idle -> Idle
//! ```
//!
//! Only send failures and hard receive failures are retried locally, bounded
//! by [`IfaceConfig::rx_retries`]. Corrupted responses, timeouts, wake
//! failures and device reported errors surface immediately.

pub mod timeout;
pub mod timing;

use embedded_hal::delay::DelayNs;
use fugit::{MicrosDurationU32, MillisDurationU32};
use log::{debug, error, trace, warn};

use crate::command::Command;
use crate::device::state::StateTracker;
use crate::device::{DeviceState, DeviceType, IfaceConfig, WaitPolicy};
use crate::error::{DeviceStatus, Error};
use crate::packet::{self, Packet, WakeCheck, MAX_PACKET_SIZE, RESPONSE_MIN_SIZE, WAKE_SIGNATURE};
use crate::transport::{Control, Transport, WordAddress};

pub use crate::packet::Response;
pub use timeout::Deadline;
pub use timing::{ClockDivider, ExecutionTimes};

/// Handle to one secure element.
pub struct Device<T, D> {
    transport: T,
    delay: D,
    config: IfaceConfig,
    state: StateTracker,
    clock_divider: ClockDivider,
}

impl<T: Transport, D: DelayNs> Device<T, D> {
    pub fn new(transport: T, delay: D, config: IfaceConfig) -> Self {
        Self {
            transport,
            delay,
            config,
            state: StateTracker::new(),
            clock_divider: ClockDivider::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.state.get()
    }

    #[must_use]
    pub fn config(&self) -> &IfaceConfig {
        &self.config
    }

    #[must_use]
    pub fn device_type(&self) -> DeviceType {
        self.config.device_type
    }

    #[must_use]
    pub fn clock_divider(&self) -> ClockDivider {
        self.clock_divider
    }

    pub(crate) fn set_clock_divider(&mut self, divider: ClockDivider) {
        self.clock_divider = divider;
    }

    /// Direct access to the transport, bypassing the engine.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Tear the handle down and give back the transport and delay.
    pub fn release(self) -> (T, D) {
        (self.transport, self.delay)
    }

    /// Run one command and put the device back to idle.
    ///
    /// The device is idled after a successful command and after a command
    /// the device rejected with a status code. Transport and framing
    /// failures leave the state `Unknown` so the next call wakes again.
    ///
    /// # Errors
    ///
    /// * [`Error::WakeFailed`] when the device does not answer the wake
    /// * [`Error::CommFail`] when every send or receive attempt failed
    /// * [`Error::Timeout`] when polling ran out of budget
    /// * [`Error::Rx`] for a truncated or corrupted response
    /// * [`Error::Device`] for a status reported by the device
    /// * [`Error::Encoding`] when the request does not fit a packet
    pub fn execute(&mut self, command: &Command) -> Result<Response, Error> {
        let packet = self.encode(command)?;
        self.ensure_awake()?;
        let result = self.transact(command, &packet);
        if matches!(result, Ok(_) | Err(Error::Device(_))) {
            self.finish();
        }
        result
    }

    /// Run one command and leave the device awake for the next one.
    ///
    /// # Errors
    ///
    /// Same as [`Device::execute`].
    pub fn execute_keep_awake(&mut self, command: &Command) -> Result<Response, Error> {
        let packet = self.encode(command)?;
        self.ensure_awake()?;
        self.transact(command, &packet)
    }

    /// Run a command chain that keeps the device awake between steps.
    ///
    /// A device-reported error from any step idles the device the same way
    /// [`Device::execute`] does. Bus and framing failures leave the state
    /// `Unknown`.
    pub(crate) fn chain<R>(
        &mut self,
        steps: impl FnOnce(&mut Self) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let result = steps(self);
        if matches!(result, Err(Error::Device(_))) && self.state() == DeviceState::Active {
            self.finish();
        }
        result
    }

    /// Wake the device and check its wake response.
    ///
    /// The response is read once after `wake_delay`. A device still booting
    /// gets `wake_retry_delay` more before the second and last readback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WakeFailed`] when neither readback matches the wake
    /// signature and `Error::Device(SelfTestError)` when the device reports a
    /// failed power-on self test.
    pub fn wake(&mut self) -> Result<(), Error> {
        if let Err(err) = self.transport.control(Control::Wake) {
            error!("wake pulse failed: {:?}", err);
            self.state.lost();
            return Err(Error::WakeFailed);
        }
        self.delay.delay_us(self.config.wake_delay.ticks());

        let mut check = self.read_wake();
        if check == WakeCheck::Unexpected {
            warn!(
                "no wake response, retrying after {} ms",
                self.config.wake_retry_delay.ticks()
            );
            self.delay.delay_ms(self.config.wake_retry_delay.ticks());
            check = self.read_wake();
        }

        match check {
            WakeCheck::Awake => {
                self.state.awake();
                Ok(())
            }
            WakeCheck::SelfTestFailed => {
                error!("device reports a failed self test on wake");
                self.state.lost();
                Err(Error::Device(DeviceStatus::SelfTestError))
            }
            WakeCheck::Unexpected => {
                error!("device did not wake up");
                self.state.lost();
                Err(Error::WakeFailed)
            }
        }
    }

    /// Put the device in idle, keeping its volatile state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommFail`] when the transport cannot send the idle.
    pub fn idle(&mut self) -> Result<(), Error> {
        self.power_down(Control::Idle)
    }

    /// Put the device to sleep, clearing its volatile state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommFail`] when the transport cannot send the sleep.
    pub fn sleep(&mut self) -> Result<(), Error> {
        self.power_down(Control::Sleep)
    }

    fn power_down(&mut self, option: Control) -> Result<(), Error> {
        match self.transport.control(option) {
            Ok(()) => {
                self.state.idle();
                Ok(())
            }
            Err(err) => {
                warn!("{:?} failed: {:?}", option, err);
                self.state.lost();
                Err(Error::CommFail)
            }
        }
    }

    fn ensure_awake(&mut self) -> Result<(), Error> {
        if self.state.needs_wake() {
            self.wake()?;
        }
        Ok(())
    }

    fn finish(&mut self) {
        if self.config.skip_idle {
            return;
        }
        self.idle().ok();
    }

    fn encode(&self, command: &Command) -> Result<Packet, Error> {
        Ok(command.encode(self.config.device_type.max_packet_size())?)
    }

    fn transact(&mut self, command: &Command, packet: &[u8]) -> Result<Response, Error> {
        debug!(
            "execute {:?} param1 {:#04x} param2 {:#06x} ({} bytes)",
            command.opcode,
            command.param1,
            command.param2,
            packet.len()
        );
        self.send_packet(packet)?;

        let mut buf = [0u8; MAX_PACKET_SIZE];
        let capacity = command.rx_size.clamp(RESPONSE_MIN_SIZE, MAX_PACKET_SIZE);
        let rx = buf.get_mut(..capacity).ok_or(Error::BadParam)?;
        let received = self.receive_response(command.opcode as u8, rx)?;
        let bytes = rx.get(..received).ok_or(Error::CommFail)?;
        trace!("response {:02x?}", bytes);

        packet::decode(bytes).map_err(|err| {
            let err = Error::from(err);
            if !matches!(err, Error::Device(_)) {
                warn!("invalid response: {}", err);
                self.state.lost();
            }
            err
        })
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<(), Error> {
        let attempts = self.config.rx_retries.max(1);
        for attempt in 1..=attempts {
            match self.transport.send(WordAddress::Command, packet) {
                Ok(()) => {
                    self.state.awake();
                    return Ok(());
                }
                Err(err) => {
                    self.state.lost();
                    warn!("send attempt {}/{} failed: {:?}", attempt, attempts, err);
                }
            }
        }
        error!("send failed after {} attempts", attempts);
        Err(Error::CommFail)
    }

    fn receive_response(&mut self, opcode: u8, buf: &mut [u8]) -> Result<usize, Error> {
        match self.config.wait_policy {
            WaitPolicy::Fixed => {
                self.delay.delay_ms(u32::from(self.execution_time_ms(opcode)));
                self.receive_fixed(buf)
            }
            WaitPolicy::Poll {
                initial,
                interval,
                max,
            } => self.receive_polled(buf, initial, interval, max),
        }
    }

    fn execution_time_ms(&self, opcode: u8) -> u16 {
        match &self.config.execution_times {
            Some(times) => times.get(opcode),
            None => timing::typical_ms(self.config.device_type, self.clock_divider, opcode),
        }
    }

    /// Receive after the full execution time: a busy device has overrun the
    /// table, only hard bus errors are retried.
    fn receive_fixed(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let attempts = self.config.rx_retries.max(1);
        for attempt in 1..=attempts {
            match self.transport.receive(buf) {
                Ok(received) => return Ok(received),
                Err(nb::Error::WouldBlock) => {
                    error!("device still busy after its execution time");
                    self.state.lost();
                    return Err(Error::Timeout);
                }
                Err(nb::Error::Other(err)) => {
                    warn!("receive attempt {}/{} failed: {:?}", attempt, attempts, err);
                }
            }
        }
        error!("no response after {} attempts", attempts);
        self.state.lost();
        Err(Error::CommFail)
    }

    fn receive_polled(
        &mut self,
        buf: &mut [u8],
        initial: MicrosDurationU32,
        interval: MicrosDurationU32,
        max: MillisDurationU32,
    ) -> Result<usize, Error> {
        let attempts = self.config.rx_retries.max(1);
        let mut failures = 0u8;
        let mut deadline = Deadline::new(max);
        let mut step = initial;

        while deadline.sleep(&mut self.delay, step) {
            match self.transport.receive(buf) {
                Ok(received) => {
                    trace!("response after {} us", deadline.elapsed().ticks());
                    return Ok(received);
                }
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(err)) => {
                    failures = failures.saturating_add(1);
                    warn!("receive attempt {}/{} failed: {:?}", failures, attempts, err);
                    if failures >= attempts {
                        error!("receive failed after {} attempts", attempts);
                        self.state.lost();
                        return Err(Error::CommFail);
                    }
                }
            }
            step = interval;
        }

        error!("no response within {} ms", max.ticks());
        self.state.lost();
        Err(Error::Timeout)
    }

    fn read_wake(&mut self) -> WakeCheck {
        let mut buf = [0u8; WAKE_SIGNATURE.len()];
        match self.transport.receive(&mut buf) {
            Ok(received) => packet::check_wake(buf.get(..received).unwrap_or_default()),
            Err(nb::Error::WouldBlock) => WakeCheck::Unexpected,
            Err(nb::Error::Other(err)) => {
                debug!("wake readback failed: {:?}", err);
                WakeCheck::Unexpected
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Opcode;
    use crate::device::IfaceConfigBuilder;
    use crate::error::RxError;
    use crate::testing::{device, response, MockError, MockTransport, RecordingDelay};
    use hex_literal::hex;

    fn info() -> Command {
        Command::new(Opcode::Info, 0x00, 0x0000).with_response_len(4)
    }

    fn default_device() -> Device<MockTransport, RecordingDelay> {
        device(IfaceConfigBuilder::default().build())
    }

    #[test]
    fn test_execute_wakes_sends_and_idles() {
        let mut dev = default_device();
        dev.transport_mut().respond(&hex!("00 00 60 02"));

        let response = dev.execute(&info()).unwrap();

        assert_eq!(response.as_slice(), &hex!("00 00 60 02"));
        assert_eq!(dev.state(), DeviceState::Idle);
        let (transport, _) = dev.release();
        assert_eq!(transport.wakes, 1);
        assert_eq!(transport.idles, 1);
        assert_eq!(transport.sent, [hex!("07 30 00 00 00 03 5D").to_vec()]);
    }

    #[test]
    fn test_unknown_state_wakes_exactly_once() {
        let mut dev = default_device();
        dev.transport_mut()
            .send_results
            .extend([Err(MockError), Err(MockError)]);
        dev.transport_mut().respond(&hex!("00 00 60 02"));

        dev.execute(&info()).unwrap();

        let (transport, _) = dev.release();
        assert_eq!(transport.wakes, 1);
        assert_eq!(transport.sent.len(), 3);
    }

    #[test]
    fn test_active_state_skips_wake() {
        let mut dev = default_device();
        dev.wake().unwrap();
        dev.transport_mut().respond(&hex!("00 00 60 02"));
        dev.transport_mut().respond(&hex!("00 00 60 02"));

        dev.execute_keep_awake(&info()).unwrap();
        assert_eq!(dev.state(), DeviceState::Active);
        dev.execute_keep_awake(&info()).unwrap();

        let (transport, _) = dev.release();
        assert_eq!(transport.wakes, 1);
        assert_eq!(transport.idles, 0);
    }

    #[test]
    fn test_send_succeeds_on_last_attempt() {
        let mut dev = device(IfaceConfigBuilder::default().rx_retries(5).build());
        dev.transport_mut()
            .send_results
            .extend(core::iter::repeat(Err(MockError)).take(4));
        dev.transport_mut().respond(&hex!("00 00 60 02"));

        assert!(dev.execute(&info()).is_ok());
        assert_eq!(dev.release().0.sent.len(), 5);
    }

    #[test]
    fn test_send_gives_up_after_rx_retries() {
        let mut dev = device(IfaceConfigBuilder::default().rx_retries(5).build());
        dev.transport_mut()
            .send_results
            .extend(core::iter::repeat(Err(MockError)).take(10));

        assert_eq!(dev.execute(&info()), Err(Error::CommFail));
        assert_eq!(dev.state(), DeviceState::Unknown);
        let (transport, _) = dev.release();
        assert_eq!(transport.sent.len(), 5);
        assert_eq!(transport.idles, 0);
    }

    #[test]
    fn test_poll_times_out_within_budget() {
        let mut dev = default_device();

        assert_eq!(dev.execute(&info()), Err(Error::Timeout));
        assert_eq!(dev.state(), DeviceState::Unknown);

        let (transport, delay) = dev.release();
        assert_eq!(transport.idles, 0);
        // wake delay plus the whole polling budget, nothing more
        assert_eq!(delay.total_us(), 1500 + 2_500_000);
        assert!(transport.receives > 1);
    }

    #[test]
    fn test_poll_waits_for_busy_device() {
        let mut dev = default_device();
        let transport = dev.transport_mut();
        transport.responses.extend([
            Err(nb::Error::WouldBlock),
            Err(nb::Error::WouldBlock),
            Ok(response(&[0x00])),
        ]);

        let response = dev.execute(&info()).unwrap();
        assert_eq!(response.as_slice(), &[0x00]);
        let (_, delay) = dev.release();
        // wake, initial, two intervals
        assert_eq!(delay.total_us(), 1500 + 1000 + 2 * 2000);
    }

    #[test]
    fn test_poll_hard_errors_bounded_by_rx_retries() {
        let mut dev = device(IfaceConfigBuilder::default().rx_retries(3).build());
        dev.transport_mut()
            .responses
            .extend(core::iter::repeat(Err(nb::Error::Other(MockError))).take(3));

        assert_eq!(dev.execute(&info()), Err(Error::CommFail));
    }

    #[test]
    fn test_fixed_wait_sleeps_execution_time() {
        let config = IfaceConfigBuilder::default()
            .device_type(DeviceType::Atecc508a)
            .fixed_wait()
            .build();
        let mut dev = device(config);
        dev.transport_mut().respond(&[0x00; 32]);

        let random = Command::new(Opcode::Random, 0, 0).with_response_len(32);
        dev.execute(&random).unwrap();

        let (_, delay) = dev.release();
        assert_eq!(delay.total_us(), 1500 + 23_000);
    }

    #[test]
    fn test_fixed_wait_uses_configured_table() {
        let mut times = ExecutionTimes::new(7);
        times.insert(Opcode::Info, 3).unwrap();
        let config = IfaceConfigBuilder::default()
            .fixed_wait()
            .execution_times(times)
            .build();
        let mut dev = device(config);
        dev.transport_mut().respond(&hex!("00 00 60 02"));

        dev.execute(&info()).unwrap();
        assert_eq!(dev.release().1.total_us(), 1500 + 3000);
    }

    #[test]
    fn test_fixed_wait_without_response_times_out() {
        let mut dev = device(IfaceConfigBuilder::default().fixed_wait().rx_retries(2).build());
        assert_eq!(dev.execute(&info()), Err(Error::Timeout));
        assert_eq!(dev.state(), DeviceState::Unknown);
        // wake readback, then a single busy receive
        assert_eq!(dev.release().0.receives, 1 + 1);
    }

    #[test]
    fn test_fixed_wait_retries_hard_receive_errors() {
        let mut dev = device(IfaceConfigBuilder::default().fixed_wait().rx_retries(3).build());
        dev.transport_mut()
            .responses
            .extend(core::iter::repeat(Err(nb::Error::Other(MockError))).take(2));
        dev.transport_mut().respond(&hex!("00 00 60 02"));

        assert_eq!(dev.execute(&info()).unwrap().as_slice(), &hex!("00 00 60 02"));
        assert_eq!(dev.release().0.receives, 1 + 3);
    }

    #[test]
    fn test_fixed_wait_hard_errors_bounded_by_rx_retries() {
        let mut dev = device(IfaceConfigBuilder::default().fixed_wait().rx_retries(2).build());
        dev.transport_mut()
            .responses
            .extend(core::iter::repeat(Err(nb::Error::Other(MockError))).take(2));

        assert_eq!(dev.execute(&info()), Err(Error::CommFail));
        assert_eq!(dev.state(), DeviceState::Unknown);
    }

    #[test]
    fn test_device_error_is_reported_and_idles() {
        let mut dev = default_device();
        dev.transport_mut().respond_raw(&hex!("04 0F 23 42"));

        assert_eq!(
            dev.execute(&info()),
            Err(Error::Device(DeviceStatus::ExecutionError))
        );
        assert_eq!(dev.state(), DeviceState::Idle);
        let (transport, _) = dev.release();
        assert_eq!(transport.idles, 1);
        assert_eq!(transport.sent.len(), 1);
    }

    #[test]
    fn test_corrupt_response_is_not_retried() {
        let mut dev = default_device();
        let mut bytes = response(&hex!("00 00 60 02"));
        bytes[2] ^= 0x01;
        dev.transport_mut().respond_raw(&bytes);

        assert!(matches!(
            dev.execute(&info()),
            Err(Error::Rx(RxError::Checksum { .. }))
        ));
        assert_eq!(dev.state(), DeviceState::Unknown);
        let (transport, _) = dev.release();
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(transport.idles, 0);
    }

    #[test]
    fn test_wake_retries_once_after_boot_delay() {
        let mut dev = default_device();
        dev.transport_mut().wake_reply = Some(std::vec![0xFF; 4]);
        dev.transport_mut().respond_raw(&WAKE_SIGNATURE);

        dev.wake().unwrap();
        assert_eq!(dev.state(), DeviceState::Active);
        let (transport, delay) = dev.release();
        assert_eq!(transport.wakes, 1);
        assert_eq!(delay.total_us(), 1500 + 10_000);
    }

    #[test]
    fn test_wake_failure() {
        let mut dev = default_device();
        dev.transport_mut().wake_reply = None;

        assert_eq!(dev.execute(&info()), Err(Error::WakeFailed));
        assert_eq!(dev.state(), DeviceState::Unknown);
        assert!(dev.release().0.sent.is_empty());
    }

    #[test]
    fn test_wake_self_test_failure() {
        let mut dev = default_device();
        dev.transport_mut().wake_reply = Some(packet::WAKE_SELF_TEST_FAILED.to_vec());

        assert_eq!(
            dev.wake(),
            Err(Error::Device(DeviceStatus::SelfTestError))
        );
        assert_eq!(dev.state(), DeviceState::Unknown);
    }

    #[test]
    fn test_family_without_idle_stays_awake() {
        let mut dev = device(
            IfaceConfigBuilder::default()
                .device_type(DeviceType::Ecc204)
                .build(),
        );
        dev.transport_mut().respond(&hex!("00 00 60 02"));

        dev.execute(&info()).unwrap();
        assert_eq!(dev.state(), DeviceState::Active);
        assert_eq!(dev.release().0.idles, 0);
    }

    #[test]
    fn test_failed_idle_keeps_result() {
        let mut dev = default_device();
        dev.transport_mut().fail_idle = true;
        dev.transport_mut().respond(&hex!("00 00 60 02"));

        assert!(dev.execute(&info()).is_ok());
        assert_eq!(dev.state(), DeviceState::Unknown);
    }

    #[test]
    fn test_pause_scenario_round_trip() {
        let mut dev = default_device();
        dev.transport_mut()
            .respond_raw(&hex!("07 00 01 00 00 00 27"));

        let pause = Command::new(Opcode::Pause, 0, 0).with_response_len(4);
        let result = dev.execute(&pause).unwrap();
        assert_eq!(result.as_slice(), &[0x00, 0x01, 0x00, 0x00]);
        let (transport, _) = dev.release();
        assert_eq!(transport.requests(), [(0x01, 0, 0, std::vec![])]);
    }

    #[test]
    fn test_sleep_and_idle_update_state() {
        let mut dev = default_device();
        dev.wake().unwrap();
        dev.sleep().unwrap();
        assert_eq!(dev.state(), DeviceState::Idle);
        dev.wake().unwrap();
        dev.idle().unwrap();
        assert_eq!(dev.state(), DeviceState::Idle);
        let (transport, _) = dev.release();
        assert_eq!(transport.sleeps, 1);
        assert_eq!(transport.idles, 1);
    }

    #[test]
    fn test_oversized_command_is_rejected_before_send() {
        let mut dev = device(
            IfaceConfigBuilder::default()
                .device_type(DeviceType::Atsha204a)
                .build(),
        );
        let command = Command::new(Opcode::Write, 0, 0).with_data(&[0u8; 100]).unwrap();
        assert_eq!(dev.execute(&command), Err(Error::Encoding));
        assert_eq!(dev.execute_keep_awake(&command), Err(Error::Encoding));
        assert_eq!(dev.state(), DeviceState::Unknown);
        let (transport, _) = dev.release();
        assert_eq!(transport.wakes, 0);
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_chain_idles_on_device_error() {
        let mut dev = default_device();
        dev.transport_mut().respond_raw(&hex!("04 0F 23 42"));

        let result = dev.chain(|dev| dev.execute_keep_awake(&info()));
        assert_eq!(result, Err(Error::Device(DeviceStatus::ExecutionError)));
        assert_eq!(dev.state(), DeviceState::Idle);
        assert_eq!(dev.release().0.idles, 1);
    }

    #[test]
    fn test_chain_leaves_lost_device_unknown() {
        let mut dev = default_device();
        dev.transport_mut().respond_raw(&hex!("04 00 00 00"));

        let result = dev.chain(|dev| dev.execute_keep_awake(&info()));
        assert!(matches!(result, Err(Error::Rx(_))));
        assert_eq!(dev.state(), DeviceState::Unknown);
        assert_eq!(dev.release().0.idles, 0);
    }
}
