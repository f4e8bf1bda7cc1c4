// Licensed under the Apache-2.0 license

use embedded_hal::delay::DelayNs;
use fugit::{MicrosDurationU32, MillisDurationU32};

/// Time budget consumed by sleeping on a delay provider.
///
/// There is no free running clock to read, so elapsed time is the sum of the
/// sleeps taken through [`Deadline::sleep`]. Each sleep is clamped to what is
/// left of the budget, which bounds the total time spent to the budget.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    budget_us: u32,
    elapsed_us: u32,
}

impl Deadline {
    #[must_use]
    pub fn new(budget: MillisDurationU32) -> Self {
        Self {
            budget_us: budget.ticks().saturating_mul(1000),
            elapsed_us: 0,
        }
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        self.elapsed_us >= self.budget_us
    }

    #[must_use]
    pub fn elapsed(&self) -> MicrosDurationU32 {
        MicrosDurationU32::from_ticks(self.elapsed_us)
    }

    #[must_use]
    pub fn remaining(&self) -> MicrosDurationU32 {
        MicrosDurationU32::from_ticks(self.budget_us.saturating_sub(self.elapsed_us))
    }

    /// Sleep for `step`, or for what is left of the budget if that is
    /// shorter. Returns `false` without sleeping once the budget is spent.
    pub fn sleep<D: DelayNs>(&mut self, delay: &mut D, step: MicrosDurationU32) -> bool {
        if self.expired() {
            return false;
        }
        // a zero step would never make progress
        let step = step.ticks().max(1).min(self.remaining().ticks());
        delay.delay_us(step);
        self.elapsed_us = self.elapsed_us.saturating_add(step);
        true
    }
}
