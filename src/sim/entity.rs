//! Birds, pigs and obstacles
//!
//! Each entity owns exactly one physics body. The owning [`Level`] removes the
//! body when the entity dies; entities never come back.
//!
//! [`Level`]: super::level::Level

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::physics::{BodyDesc, BodyHandle, BodyKind, Shape};

/// Bird types, each with its own secondary power
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BirdKind {
    /// No secondary power
    Basic,
    /// Mid-flight speed boost
    Speed,
    /// Mid-flight blast pushing and damaging everything nearby
    Bomb,
}

impl BirdKind {
    pub const ALL: [BirdKind; 3] = [BirdKind::Basic, BirdKind::Speed, BirdKind::Bomb];

    pub fn as_str(&self) -> &'static str {
        match self {
            BirdKind::Basic => "basic",
            BirdKind::Speed => "speed",
            BirdKind::Bomb => "bomb",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "basic" | "red" => Some(BirdKind::Basic),
            "speed" => Some(BirdKind::Speed),
            "bomb" => Some(BirdKind::Bomb),
            _ => None,
        }
    }

    /// Whether this kind has a secondary power at all
    pub fn has_power(&self) -> bool {
        !matches!(self, BirdKind::Basic)
    }

    pub fn density(&self) -> f32 {
        match self {
            BirdKind::Basic => 1.0,
            BirdKind::Speed => 0.8,
            BirdKind::Bomb => 1.6,
        }
    }
}

/// Lifecycle of a single bird
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BirdPhase {
    /// Waiting in the queue or on the slingshot
    Idle,
    /// On the slingshot, player is aiming
    Charging,
    /// Launched
    Thrown,
    /// Launched and secondary power spent
    UsedPower,
    /// Gone from the world
    Removed,
}

/// A bird entity
#[derive(Debug, Clone)]
pub struct Bird {
    pub kind: BirdKind,
    pub body: BodyHandle,
    pub phase: BirdPhase,
    /// Secondary power meter (0-1), filled while airborne
    pub power_meter: f32,
    /// Placement from the level file
    pub spawn: Vec2,
}

impl Bird {
    pub fn body_desc(kind: BirdKind, position: Vec2) -> BodyDesc {
        BodyDesc::dynamic(Shape::Circle {
            radius: BIRD_RADIUS,
        })
        .with_position(position)
        .with_density(kind.density())
        .with_restitution(0.4)
        .with_friction(0.6)
    }

    pub fn is_alive(&self) -> bool {
        self.phase != BirdPhase::Removed
    }

    /// Launched and still in play
    pub fn is_thrown(&self) -> bool {
        matches!(self.phase, BirdPhase::Thrown | BirdPhase::UsedPower)
    }

    pub fn has_used_power(&self) -> bool {
        self.phase == BirdPhase::UsedPower
    }
}

/// A pig (target) entity
#[derive(Debug, Clone)]
pub struct Pig {
    pub body: BodyHandle,
    pub radius: f32,
    pub health: f32,
    pub points: u64,
    pub alive: bool,
}

impl Pig {
    pub fn body_desc(position: Vec2, radius: f32) -> BodyDesc {
        BodyDesc::dynamic(Shape::Circle { radius })
            .with_position(position)
            .with_density(1.0)
            .with_restitution(0.2)
            .with_friction(0.6)
    }
}

/// Obstacle materials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    Wood,
    Stone,
    Ice,
    /// Static terrain, indestructible
    Ground,
}

impl Material {
    pub fn as_str(&self) -> &'static str {
        match self {
            Material::Wood => "wood",
            Material::Stone => "stone",
            Material::Ice => "ice",
            Material::Ground => "ground",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "wood" => Some(Material::Wood),
            "stone" => Some(Material::Stone),
            "ice" | "glass" => Some(Material::Ice),
            "ground" => Some(Material::Ground),
            _ => None,
        }
    }

    pub fn density(&self) -> f32 {
        match self {
            Material::Wood => 0.6,
            Material::Stone => 2.0,
            Material::Ice => 0.9,
            Material::Ground => 1.0,
        }
    }

    /// Damage (impulse) the material absorbs before breaking
    pub fn health(&self) -> f32 {
        match self {
            Material::Wood => 2.0,
            Material::Stone => 6.0,
            Material::Ice => 1.0,
            Material::Ground => f32::INFINITY,
        }
    }

    pub fn points(&self) -> u64 {
        match self {
            Material::Wood => 500,
            Material::Stone => 1000,
            Material::Ice => 300,
            Material::Ground => 0,
        }
    }

    pub fn friction(&self) -> f32 {
        match self {
            Material::Ice => 0.1,
            Material::Stone => 0.7,
            _ => 0.6,
        }
    }

    pub fn is_destructible(&self) -> bool {
        !matches!(self, Material::Ground)
    }
}

/// A block or piece of terrain
#[derive(Debug, Clone)]
pub struct Obstacle {
    pub material: Material,
    pub body: BodyHandle,
    /// Full width/height
    pub size: Vec2,
    pub health: f32,
    pub points: u64,
    pub alive: bool,
}

impl Obstacle {
    pub fn body_desc(material: Material, position: Vec2, size: Vec2, angle: f32) -> BodyDesc {
        let kind = if material.is_destructible() {
            BodyKind::Dynamic
        } else {
            BodyKind::Static
        };
        BodyDesc::dynamic(Shape::Box {
            half_extents: size * 0.5,
        })
        .with_kind(kind)
        .with_position(position)
        .with_angle(angle)
        .with_density(material.density())
        .with_restitution(0.1)
        .with_friction(material.friction())
    }
}

/// Which collection an entity lives in, plus its index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Bird(usize),
    Pig(usize),
    Obstacle(usize),
}
