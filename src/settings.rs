//! Player and engine settings
//!
//! Persisted as JSON next to the levels. Missing fields take their defaults so
//! older settings files keep loading.

use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{GRAVITY, SETTLE_DEBOUNCE_TICKS, SETTLE_EPSILON};
use crate::error::PersistenceError;
use crate::persistence::atomic_write;
use crate::physics::WorldConfig;

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name recorded in high score tables
    pub player_name: String,

    // === Levels ===
    /// Directory holding `level<N>.ab` files
    pub levels_dir: PathBuf,
    /// Highest level number
    pub level_count: u32,
    /// Where `Session::quick_save` writes
    pub snapshot_path: PathBuf,

    // === Simulation ===
    /// Speed below which a body counts as at rest
    pub settle_epsilon: f32,
    /// Quiet ticks before the world counts as settled
    pub settle_debounce_ticks: u32,
    /// Vertical gravity (negative is down)
    pub gravity: f32,

    // === High scores ===
    /// Keep only the best N entries per level (unbounded if unset)
    pub high_score_limit: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            player_name: "player".to_string(),

            levels_dir: PathBuf::from("resources/levels"),
            level_count: 3,
            snapshot_path: PathBuf::from("snapshot.ab"),

            settle_epsilon: SETTLE_EPSILON,
            settle_debounce_ticks: SETTLE_DEBOUNCE_TICKS,
            gravity: GRAVITY,

            high_score_limit: None,
        }
    }
}

impl Settings {
    /// Path of level `number` (1-based)
    pub fn level_path(&self, number: u32) -> PathBuf {
        self.levels_dir.join(format!("level{}.ab", number))
    }

    /// Physics configuration for new worlds
    pub fn world_config(&self) -> WorldConfig {
        WorldConfig {
            gravity: Vec2::new(0.0, self.gravity),
            ..WorldConfig::default()
        }
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load(path: &Path) -> Self {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                log::info!("Using default settings ({}: {})", path.display(), e);
                return Self::default();
            }
        };
        match serde_json::from_str(&json) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Ignoring corrupt settings file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }
}
