//! Throw controller
//!
//! Aiming, launch impulses, the mid-flight power meter and swapping in the
//! next bird once the world has settled.

use glam::Vec2;

use super::entity::{BirdKind, BirdPhase, EntityRef};
use super::level::{GameEvent, Level};
use crate::consts::*;
use crate::physics::{BodyKind, PhysicsWorld};
use crate::{degrees_to_radians, wrap_degrees};

/// Launch arrow state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aim {
    /// Degrees in [0, 360)
    pub direction: f32,
    /// Percent in [0, 100]
    pub power: f32,
    /// Player is dragging the slingshot
    pub charging: bool,
}

impl Aim {
    pub fn new(direction: f32, power: f32) -> Self {
        Self {
            direction: wrap_degrees(direction),
            power: power.clamp(0.0, MAX_POWER),
            charging: true,
        }
    }

    pub fn impulse(&self) -> Vec2 {
        launch_impulse(self.direction, self.power)
    }
}

/// Impulse for a throw at `direction_degrees` with `power` percent
pub fn launch_impulse(direction_degrees: f32, power: f32) -> Vec2 {
    let radians = degrees_to_radians(direction_degrees);
    let magnitude = power / LAUNCH_POWER_DIVISOR;
    Vec2::new(magnitude * radians.cos(), magnitude * radians.sin())
}

/// Conditions outside the level that a launch depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrowGate {
    pub settled: bool,
    /// App mode lets gameplay input through
    pub accepts_input: bool,
}

/// Drives the current bird through aim, launch, power and reset
#[derive(Debug, Clone, Default)]
pub struct ThrowController {
    aim: Aim,
}

impl ThrowController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aim(&self) -> Aim {
        self.aim
    }

    /// Update the arrow; marks the bird on the slingshot as charging
    pub fn set_aim<W: PhysicsWorld>(&mut self, level: &mut Level<W>, direction: f32, power: f32) {
        self.aim = Aim::new(direction, power);
        if let Some(index) = level.current_bird_index() {
            let bird = &mut level.birds[index];
            if bird.phase == BirdPhase::Idle {
                bird.phase = BirdPhase::Charging;
            }
        }
    }

    /// Launch the current bird along the current aim
    pub fn launch<W: PhysicsWorld>(&mut self, level: &mut Level<W>, gate: ThrowGate) -> Option<GameEvent> {
        let index = level.current_bird_index()?;
        let Aim {
            direction, power, ..
        } = self.aim;
        let impulse = self.launch_bird(level, index, direction, power, gate)?;
        self.aim = Aim::default();
        Some(GameEvent::BirdLaunched { index, impulse })
    }

    /// Throw bird `index`. Returns the applied impulse, or `None` if the
    /// throw was rejected.
    pub fn launch_bird<W: PhysicsWorld>(
        &mut self,
        level: &mut Level<W>,
        index: usize,
        direction: f32,
        power: f32,
        gate: ThrowGate,
    ) -> Option<Vec2> {
        if !gate.accepts_input {
            log::debug!("Launch rejected: input not accepted in this mode");
            return None;
        }
        if !gate.settled {
            log::debug!("Launch rejected: world not settled");
            return None;
        }
        let power = power.clamp(0.0, MAX_POWER);
        if power <= 0.0 {
            log::debug!("Launch rejected: zero power");
            return None;
        }
        if level.current_bird_index() != Some(index) {
            log::debug!("Launch rejected: bird {} is not on the slingshot", index);
            return None;
        }
        let bird = level.birds.get_mut(index)?;
        if !matches!(bird.phase, BirdPhase::Idle | BirdPhase::Charging) {
            log::debug!("Launch rejected: bird {} already thrown", index);
            return None;
        }

        let impulse = launch_impulse(direction, power);
        bird.phase = BirdPhase::Thrown;
        bird.power_meter = 0.0;
        let body = bird.body;
        level.world.set_body_kind(body, BodyKind::Dynamic);
        level.world.apply_impulse(body, impulse);
        log::info!(
            "Bird {} launched at {:.1} deg, power {:.0}",
            index,
            wrap_degrees(direction),
            power
        );
        Some(impulse)
    }

    /// Fill the power meter of the bird in flight
    pub fn charge_power<W: PhysicsWorld>(&mut self, level: &mut Level<W>, dt: f32) {
        let Some(index) = level.current_bird_index() else {
            return;
        };
        let bird = &mut level.birds[index];
        if bird.phase == BirdPhase::Thrown {
            bird.power_meter = (bird.power_meter + POWER_CHARGE_RATE * dt).min(1.0);
        }
    }

    /// Trigger the flying bird's secondary power, once per throw
    pub fn use_power<W: PhysicsWorld>(&mut self, level: &mut Level<W>) -> Vec<GameEvent> {
        let Some(index) = level.current_bird_index() else {
            return Vec::new();
        };
        let bird = &mut level.birds[index];
        if bird.phase != BirdPhase::Thrown {
            log::debug!("Power rejected: bird {} not in flight", index);
            return Vec::new();
        }
        if !bird.kind.has_power() {
            log::debug!("Power rejected: {:?} bird has none", bird.kind);
            return Vec::new();
        }
        bird.phase = BirdPhase::UsedPower;
        let (kind, body, charge) = (bird.kind, bird.body, bird.power_meter);

        let mut events = vec![GameEvent::PowerUsed { index, kind }];
        match kind {
            BirdKind::Basic => {}
            BirdKind::Speed => {
                if let Some(velocity) = level.world.linear_velocity(body) {
                    level.world.set_linear_velocity(body, velocity * (1.0 + charge));
                }
            }
            BirdKind::Bomb => {
                if let Some(center) = level.world.position(body) {
                    events.extend(blast(level, center, 0.5 + charge));
                }
            }
        }
        log::debug!("Bird {} used {:?} power at charge {:.2}", index, kind, charge);
        events
    }

    /// Clear the thrown bird and put the next one on the slingshot.
    ///
    /// Returns the index of the new current bird.
    pub fn reset_bird<W: PhysicsWorld>(&mut self, level: &mut Level<W>) -> Option<usize> {
        self.aim = Aim::default();
        let index = level.current_bird_index()?;
        level.destroy(EntityRef::Bird(index));

        let next = index + 1;
        if next < level.birds.len() {
            level.ready_bird(next);
            log::debug!("Bird {} on the slingshot", next);
            Some(next)
        } else {
            level.out_of_birds = true;
            log::info!("Level {} out of birds", level.number());
            None
        }
    }
}

/// Radial blast from `center`: outward impulse plus equal damage, falling off
/// linearly to zero at the edge
fn blast<W: PhysicsWorld>(level: &mut Level<W>, center: Vec2, scale: f32) -> Vec<GameEvent> {
    let targets: Vec<EntityRef> = (0..level.pigs.len())
        .map(EntityRef::Pig)
        .chain((0..level.obstacles.len()).map(EntityRef::Obstacle))
        .collect();

    let mut events = Vec::new();
    for entity in targets {
        let Some(position) = level.entity_position(entity) else {
            continue;
        };
        let offset = position - center;
        let distance = offset.length();
        if distance > BOMB_RADIUS {
            continue;
        }
        let strength = BOMB_IMPULSE * scale * (1.0 - distance / BOMB_RADIUS);
        let body = match entity {
            EntityRef::Pig(i) => level.pigs[i].body,
            EntityRef::Obstacle(i) => level.obstacles[i].body,
            EntityRef::Bird(_) => continue,
        };
        level
            .world
            .apply_impulse(body, offset.normalize_or(Vec2::Y) * strength);
        events.extend(level.damage(entity, strength));
    }
    events
}
