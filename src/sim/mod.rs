//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity index / body handle)
//! - No rendering or platform dependencies

pub mod autoplay;
pub mod clock;
pub mod entity;
pub mod level;
pub mod mode;
pub mod score;
pub mod settle;
pub mod throw;
pub mod tick;

pub use autoplay::AutoPlayer;
pub use clock::FrameClock;
pub use entity::{Bird, BirdKind, BirdPhase, EntityRef, Material, Obstacle, Pig};
pub use level::{BodyView, GameEvent, Hud, Level, LevelResult};
pub use mode::AppMode;
pub use score::{Score, StarThresholds};
pub use settle::{SettleSignal, SettlementDetector};
pub use throw::{Aim, ThrowController, ThrowGate, launch_impulse};
pub use tick::{Session, TickInput, TickReport};
