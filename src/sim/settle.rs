//! Settlement detection
//!
//! Turns the noisy per-tick activity check into a debounced `settled` flag
//! and a one-tick `just_settled` edge.

use crate::consts::SETTLE_DEBOUNCE_TICKS;

/// Settlement state for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettleSignal {
    pub settled: bool,
    /// Unsettled on the previous tick, settled on this one
    pub just_settled: bool,
}

/// Debounced settled/unsettled tracker
#[derive(Debug, Clone)]
pub struct SettlementDetector {
    debounce_ticks: u32,
    quiet_ticks: u32,
    settled: bool,
    previous: bool,
}

impl SettlementDetector {
    /// Start from the world's state at load time.
    ///
    /// `previous` starts equal to `settled`, so an at-rest level never produces
    /// a `just_settled` edge on its first tick.
    pub fn new(initially_active: bool, debounce_ticks: u32) -> Self {
        let settled = !initially_active;
        Self {
            debounce_ticks,
            quiet_ticks: if settled { debounce_ticks } else { 0 },
            settled,
            previous: settled,
        }
    }

    pub fn with_default_debounce(initially_active: bool) -> Self {
        Self::new(initially_active, SETTLE_DEBOUNCE_TICKS)
    }

    /// Feed one tick of activity; call exactly once per tick
    pub fn update(&mut self, active: bool) -> SettleSignal {
        self.previous = self.settled;
        if active {
            self.quiet_ticks = 0;
            self.settled = false;
        } else {
            self.quiet_ticks = self.quiet_ticks.saturating_add(1);
            if self.quiet_ticks >= self.debounce_ticks {
                self.settled = true;
            }
        }
        self.signal()
    }

    /// Force the unsettled state, e.g. right after a launch, so the next
    /// quiet stretch produces a fresh `just_settled` edge
    pub fn disturb(&mut self) {
        self.settled = false;
        self.quiet_ticks = 0;
    }

    /// Current state without advancing
    pub fn signal(&self) -> SettleSignal {
        SettleSignal {
            settled: self.settled,
            just_settled: self.settled && !self.previous,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }
}
