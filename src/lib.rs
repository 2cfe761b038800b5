//! Birdfling - slingshot physics puzzle core
//!
//! Core modules:
//! - `physics`: Physics world contract and the bundled deterministic world
//! - `sim`: Entities, throws, settlement, scoring and the per-tick session
//! - `level_file`: Line-oriented level file codec
//! - `highscores`: Per-level high score table
//! - `persistence`: Keyed record store with atomic rewrites
//! - `settings`: Player/engine configuration

pub mod error;
pub mod highscores;
pub mod level_file;
pub mod persistence;
pub mod physics;
pub mod settings;
pub mod sim;

pub use error::{LoadError, PersistenceError};
pub use highscores::{HighScoreEntry, HighScoreTable};
pub use settings::Settings;

/// Engine configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Solver iterations per step
    pub const VELOCITY_ITERATIONS: u32 = 6;
    pub const POSITION_ITERATIONS: u32 = 2;

    /// Default gravity (world units/s², y up)
    pub const GRAVITY: f32 = -9.8;

    /// Launch impulse = power / divisor along the aim direction
    pub const LAUNCH_POWER_DIVISOR: f32 = 20.0;
    /// Aim power range (percent)
    pub const MAX_POWER: f32 = 100.0;

    /// Secondary power meter fill rate (full meter per second)
    pub const POWER_CHARGE_RATE: f32 = 1.0;
    /// Blast radius of the bomb bird
    pub const BOMB_RADIUS: f32 = 3.0;
    /// Peak blast impulse of the bomb bird at full charge
    pub const BOMB_IMPULSE: f32 = 6.0;

    /// Contacts deal damage only above both of these (resting contacts never do)
    pub const DAMAGE_IMPULSE_THRESHOLD: f32 = 0.5;
    pub const DAMAGE_SPEED_THRESHOLD: f32 = 1.0;
    /// Bodies falling below this height are destroyed
    pub const KILL_PLANE_Y: f32 = -50.0;

    /// Speeds below this count as "not moving" for settlement
    pub const SETTLE_EPSILON: f32 = 0.05;
    /// Consecutive quiet ticks before the world counts as settled
    pub const SETTLE_DEBOUNCE_TICKS: u32 = 10;

    /// Bird body radius
    pub const BIRD_RADIUS: f32 = 0.5;
    /// Default pig reward
    pub const PIG_POINTS: u64 = 5000;
    /// Default pig health (damage impulse units)
    pub const PIG_HEALTH: f32 = 1.5;
}

/// Convert degrees to radians
#[inline]
pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees * std::f32::consts::PI / 180.0
}

/// Convert radians to degrees
#[inline]
pub fn radians_to_degrees(radians: f32) -> f32 {
    radians * 180.0 / std::f32::consts::PI
}

/// Wrap an angle in degrees into [0, 360)
#[inline]
pub fn wrap_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(0.0), 0.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(370.0), 10.0);
        assert_eq!(wrap_degrees(-90.0), 270.0);
    }

    #[test]
    fn test_degree_conversion() {
        assert!((degrees_to_radians(180.0) - std::f32::consts::PI).abs() < 1e-6);
        assert!((radians_to_degrees(std::f32::consts::FRAC_PI_2) - 90.0).abs() < 1e-4);
    }
}
