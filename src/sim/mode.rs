//! Application mode used to gate simulation and input

use serde::{Deserialize, Serialize};

/// Current screen / gameplay mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AppMode {
    #[default]
    MainMenu,
    LevelSelect,
    HighScores,
    Playing,
    Paused,
    /// Level cleared or failed, waiting for the player
    LevelEnd,
}

impl AppMode {
    /// Physics steps only while playing
    pub fn simulates(&self) -> bool {
        matches!(self, AppMode::Playing)
    }

    pub fn accepts_throw_input(&self) -> bool {
        matches!(self, AppMode::Playing)
    }

    /// Playing <-> Paused; other modes unchanged
    pub fn toggle_pause(self) -> Self {
        match self {
            AppMode::Playing => AppMode::Paused,
            AppMode::Paused => AppMode::Playing,
            other => other,
        }
    }
}
