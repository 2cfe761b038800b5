//! Physics world contract
//!
//! The game core talks to rigid-body physics only through [`PhysicsWorld`].
//! [`RapierWorld`] is the bundled implementation on top of rapier2d; any
//! engine exposing the same operations can stand in for it.

pub mod world;

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use world::{RapierWorld, WorldConfig};

/// Opaque body identifier, unique for the lifetime of a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

/// How a body participates in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    /// Never moves
    Static,
    /// Moves only when told to; unaffected by forces and contacts
    Kinematic,
    /// Fully simulated
    Dynamic,
}

/// Collision shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    /// Box, rotated by the body's angle
    Box { half_extents: Vec2 },
}

/// Description of a body before creation
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub shape: Shape,
    pub position: Vec2,
    pub angle: f32,
    pub density: f32,
    pub restitution: f32,
    pub friction: f32,
    /// Disabled bodies neither move nor collide
    pub enabled: bool,
}

impl BodyDesc {
    /// Dynamic body with default material
    pub fn dynamic(shape: Shape) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            shape,
            position: Vec2::ZERO,
            angle: 0.0,
            density: 1.0,
            restitution: 0.3,
            friction: 0.5,
            enabled: true,
        }
    }

    /// Static body with default material
    pub fn fixed(shape: Shape) -> Self {
        Self {
            kind: BodyKind::Static,
            ..Self::dynamic(shape)
        }
    }

    pub fn with_kind(mut self, kind: BodyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// A contact resolved during the last step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    pub a: BodyHandle,
    pub b: BodyHandle,
    /// Total normal impulse applied this step
    pub impulse: f32,
    /// Closing speed along the normal before the solve
    pub approach_speed: f32,
    pub point: Vec2,
}

/// Black-box 2D rigid-body world.
///
/// Queries on an unknown handle return `None`; mutations on one are no-ops.
pub trait PhysicsWorld {
    fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle;

    /// Remove a body. Returns false if the handle was not present.
    fn remove_body(&mut self, handle: BodyHandle) -> bool;

    fn contains(&self, handle: BodyHandle) -> bool;

    /// Advance by one fixed step
    fn step(&mut self, dt: f32, velocity_iterations: u32, position_iterations: u32);

    fn position(&self, handle: BodyHandle) -> Option<Vec2>;
    fn angle(&self, handle: BodyHandle) -> Option<f32>;
    fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec2>;
    fn angular_velocity(&self, handle: BodyHandle) -> Option<f32>;
    fn mass(&self, handle: BodyHandle) -> Option<f32>;

    fn set_transform(&mut self, handle: BodyHandle, position: Vec2, angle: f32);
    fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec2);
    fn set_body_kind(&mut self, handle: BodyHandle, kind: BodyKind);
    fn set_enabled(&mut self, handle: BodyHandle, enabled: bool);

    /// Apply an instantaneous impulse at the center of mass
    fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec2);

    /// Take the contacts reported since the last drain
    fn drain_contacts(&mut self) -> Vec<ContactEvent>;

    /// True if any enabled dynamic body moves faster than `epsilon`
    /// (linear or angular)
    fn is_active(&self, epsilon: f32) -> bool;
}
