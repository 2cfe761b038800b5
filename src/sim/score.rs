//! Score accumulation and star rating

use serde::{Deserialize, Serialize};

/// Three ascending score cutoffs for one, two and three stars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarThresholds(pub [u64; 3]);

impl StarThresholds {
    /// Validate ordering (equal cutoffs allowed)
    pub fn new(thresholds: [u64; 3]) -> Option<Self> {
        if thresholds.windows(2).all(|w| w[0] <= w[1]) {
            Some(Self(thresholds))
        } else {
            None
        }
    }

    /// Stars earned: number of cutoffs met, reaching a cutoff exactly counts
    pub fn select_stars(&self, score: u64) -> u8 {
        self.0.iter().filter(|&&cutoff| score >= cutoff).count() as u8
    }
}

impl Default for StarThresholds {
    fn default() -> Self {
        Self([1000, 3000, 5000])
    }
}

/// Running level score; only ever grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score(u64);

impl Score {
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn award(&mut self, points: u64) -> u64 {
        self.0 = self.0.saturating_add(points);
        self.0
    }
}
