// Licensed under the Apache-2.0 license

//! Interface configuration.
//!
//! A configuration is assembled once with [`IfaceConfigBuilder`] and is never
//! modified after it is handed to a [`Device`](crate::execution::Device).

use fugit::{MicrosDurationU32, MillisDurationU32};

use crate::device::DeviceType;
use crate::execution::timing::ExecutionTimes;
use crate::transport::i2c::{I2cSpeed, DEFAULT_ADDRESS};
use crate::transport::swi_uart::SWI_DATA_BAUD;

/// Post-wake settle time (tWHI plus margin).
pub const DEFAULT_WAKE_DELAY: MicrosDurationU32 = MicrosDurationU32::micros(1500);

/// Extra boot time granted before the second wake readback.
pub const DEFAULT_WAKE_RETRY_DELAY: MillisDurationU32 = MillisDurationU32::millis(10);

/// Transport attempts per send or receive.
pub const DEFAULT_RX_RETRIES: u8 = 20;

/// Default polling budget.
pub const DEFAULT_POLL_MAX: MillisDurationU32 = MillisDurationU32::millis(2500);

/// Physical bus the device sits on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bus {
    /// I2C with the device's 7-bit address
    I2c { address: u8 },
    /// Single-wire interface emulated over a UART
    SwiUart,
}

/// How the engine waits for a command to finish.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Sleep the typical execution time of the opcode, then read once.
    Fixed,
    /// Sleep `initial`, then read every `interval` until a response arrives
    /// or `max` has elapsed.
    Poll {
        initial: MicrosDurationU32,
        interval: MicrosDurationU32,
        max: MillisDurationU32,
    },
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::Poll {
            initial: MicrosDurationU32::millis(1),
            interval: MicrosDurationU32::millis(2),
            max: DEFAULT_POLL_MAX,
        }
    }
}

/// Everything the engine needs to talk to one device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IfaceConfig {
    pub device_type: DeviceType,
    pub bus: Bus,
    /// Bus clock for I2C, line rate for the single-wire UART
    pub baud: u32,
    pub wake_delay: MicrosDurationU32,
    pub wake_retry_delay: MillisDurationU32,
    /// Total transport attempts per send or receive, at least one
    pub rx_retries: u8,
    pub wait_policy: WaitPolicy,
    /// Leave the device awake after a command instead of idling it
    pub skip_idle: bool,
    /// Caller supplied execution times; `None` selects the built-in table for
    /// the device type and its current clock divider.
    pub execution_times: Option<ExecutionTimes>,
}

pub struct IfaceConfigBuilder {
    device_type: DeviceType,
    bus: Bus,
    baud: u32,
    wake_delay: MicrosDurationU32,
    wake_retry_delay: MillisDurationU32,
    rx_retries: u8,
    wait_policy: WaitPolicy,
    skip_idle: Option<bool>,
    execution_times: Option<ExecutionTimes>,
}

impl Default for IfaceConfigBuilder {
    fn default() -> Self {
        Self::i2c(DEFAULT_ADDRESS)
    }
}

impl IfaceConfigBuilder {
    #[must_use]
    pub fn new(bus: Bus) -> Self {
        let baud = match bus {
            Bus::I2c { .. } => I2cSpeed::Standard as u32,
            Bus::SwiUart => SWI_DATA_BAUD,
        };
        Self {
            device_type: DeviceType::default(),
            bus,
            baud,
            wake_delay: DEFAULT_WAKE_DELAY,
            wake_retry_delay: DEFAULT_WAKE_RETRY_DELAY,
            rx_retries: DEFAULT_RX_RETRIES,
            wait_policy: WaitPolicy::default(),
            skip_idle: None,
            execution_times: None,
        }
    }

    /// Device at a 7-bit I2C address.
    #[must_use]
    pub fn i2c(address: u8) -> Self {
        Self::new(Bus::I2c { address })
    }

    #[must_use]
    pub fn swi_uart() -> Self {
        Self::new(Bus::SwiUart)
    }

    #[must_use]
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }
    #[must_use]
    pub fn baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }
    #[must_use]
    pub fn i2c_speed(mut self, speed: I2cSpeed) -> Self {
        self.baud = speed as u32;
        self
    }
    #[must_use]
    pub fn wake_delay(mut self, delay: MicrosDurationU32) -> Self {
        self.wake_delay = delay;
        self
    }
    #[must_use]
    pub fn wake_retry_delay(mut self, delay: MillisDurationU32) -> Self {
        self.wake_retry_delay = delay;
        self
    }
    #[must_use]
    pub fn rx_retries(mut self, retries: u8) -> Self {
        self.rx_retries = retries;
        self
    }
    #[must_use]
    pub fn wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }
    #[must_use]
    pub fn fixed_wait(self) -> Self {
        self.wait_policy(WaitPolicy::Fixed)
    }
    #[must_use]
    pub fn polling(
        self,
        initial: MicrosDurationU32,
        interval: MicrosDurationU32,
        max: MillisDurationU32,
    ) -> Self {
        self.wait_policy(WaitPolicy::Poll {
            initial,
            interval,
            max,
        })
    }
    /// Override the family default for idling after each command.
    #[must_use]
    pub fn skip_idle(mut self, skip: bool) -> Self {
        self.skip_idle = Some(skip);
        self
    }
    #[must_use]
    pub fn execution_times(mut self, times: ExecutionTimes) -> Self {
        self.execution_times = Some(times);
        self
    }
    #[must_use]
    pub fn build(self) -> IfaceConfig {
        IfaceConfig {
            device_type: self.device_type,
            bus: self.bus,
            baud: self.baud,
            wake_delay: self.wake_delay,
            wake_retry_delay: self.wake_retry_delay,
            rx_retries: self.rx_retries.max(1),
            wait_policy: self.wait_policy,
            skip_idle: self
                .skip_idle
                .unwrap_or_else(|| self.device_type.skips_idle()),
            execution_times: self.execution_times,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i2c_defaults() {
        let config = IfaceConfigBuilder::default().build();
        assert_eq!(config.bus, Bus::I2c { address: 0x60 });
        assert_eq!(config.baud, 100_000);
        assert_eq!(config.device_type, DeviceType::Atecc608);
        assert_eq!(config.wake_delay, MicrosDurationU32::micros(1500));
        assert_eq!(config.rx_retries, 20);
        assert!(!config.skip_idle);
        assert_eq!(
            config.wait_policy,
            WaitPolicy::Poll {
                initial: MicrosDurationU32::millis(1),
                interval: MicrosDurationU32::millis(2),
                max: MillisDurationU32::millis(2500),
            }
        );
        assert!(config.execution_times.is_none());
    }

    #[test]
    fn test_swi_uses_data_baud() {
        let config = IfaceConfigBuilder::swi_uart().build();
        assert_eq!(config.bus, Bus::SwiUart);
        assert_eq!(config.baud, SWI_DATA_BAUD);
    }

    #[test]
    fn test_skip_idle_follows_family_unless_overridden() {
        let ecc204 = IfaceConfigBuilder::i2c(0x33)
            .device_type(DeviceType::Ecc204)
            .build();
        assert!(ecc204.skip_idle);

        let forced = IfaceConfigBuilder::i2c(0x33)
            .device_type(DeviceType::Ecc204)
            .skip_idle(false)
            .build();
        assert!(!forced.skip_idle);
    }

    #[test]
    fn test_rx_retries_at_least_one() {
        let config = IfaceConfigBuilder::default().rx_retries(0).build();
        assert_eq!(config.rx_retries, 1);
    }

    #[test]
    fn test_setters() {
        let config = IfaceConfigBuilder::i2c(0x58)
            .i2c_speed(I2cSpeed::Fast)
            .fixed_wait()
            .wake_retry_delay(MillisDurationU32::millis(20))
            .build();
        assert_eq!(config.baud, 400_000);
        assert_eq!(config.wait_policy, WaitPolicy::Fixed);
        assert_eq!(config.wake_retry_delay, MillisDurationU32::millis(20));
    }
}
