//! Fixed-timestep accumulator

use crate::consts::{MAX_SUBSTEPS, SIM_DT};

/// Longest frame fed into the accumulator (seconds)
const MAX_FRAME_DT: f32 = 0.25;

/// Turns variable frame times into a bounded number of `SIM_DT` ticks
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    accumulator: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame's elapsed time; returns how many fixed ticks to run
    pub fn advance(&mut self, frame_dt: f32) -> u32 {
        let frame_dt = if frame_dt.is_finite() {
            frame_dt.clamp(0.0, MAX_FRAME_DT)
        } else {
            0.0
        };
        self.accumulator += frame_dt;

        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        // Drop backlog we could not catch up on
        if substeps == MAX_SUBSTEPS {
            self.accumulator = self.accumulator.rem_euclid(SIM_DT);
        }
        substeps
    }

    /// Forget pending time, e.g. after a pause or level switch
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    /// Fraction of a tick left over, for render interpolation
    pub fn alpha(&self) -> f32 {
        self.accumulator / SIM_DT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_partial_frames() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(SIM_DT * 0.6), 0);
        assert_eq!(clock.advance(SIM_DT * 0.6), 1);
        assert!((clock.alpha() - 0.2).abs() < 1e-3);
    }

    #[test]
    fn test_substeps_bounded() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(10.0), MAX_SUBSTEPS);
        assert!(clock.alpha() < 1.0);
        assert_eq!(clock.advance(f32::NAN), 0);
        assert_eq!(clock.advance(-1.0), 0);
    }
}
