// Licensed under the Apache-2.0 license

//! Power state of the device as last observed by the engine.

/// What the host knows about the device's power state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum DeviceState {
    /// Nothing is known, the next transaction must wake the device
    #[default]
    Unknown,
    /// Idle or asleep, a wake is needed
    Idle,
    /// Awake and ready for a command
    Active,
}

/// Holder of the device state. Only the execution engine owns one, so the
/// transitions below are the only writes the state ever sees.
#[derive(Debug, Default)]
pub(crate) struct StateTracker {
    state: DeviceState,
}

impl StateTracker {
    pub(crate) const fn new() -> Self {
        Self {
            state: DeviceState::Unknown,
        }
    }

    pub(crate) const fn get(&self) -> DeviceState {
        self.state
    }

    pub(crate) fn needs_wake(&self) -> bool {
        self.state != DeviceState::Active
    }

    pub(crate) fn awake(&mut self) {
        self.state = DeviceState::Active;
    }

    pub(crate) fn idle(&mut self) {
        self.state = DeviceState::Idle;
    }

    pub(crate) fn lost(&mut self) {
        self.state = DeviceState::Unknown;
    }
}
