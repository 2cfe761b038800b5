//! Rapier-backed physics world
//!
//! Wraps the rapier2d pipeline behind [`PhysicsWorld`]:
//! - Every body gets exactly one collider; the body's `user_data` carries our
//!   [`BodyHandle`] so contact reports can be mapped back
//! - Contact impulses come from rapier's contact force events
//! - Approach speeds are measured against the velocities from before the step
//!
//! Bodies are visited in handle order wherever order matters, so runs are
//! reproducible.

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use glam::Vec2;
use rapier2d::prelude::*;

use super::{BodyDesc, BodyHandle, BodyKind, ContactEvent, PhysicsWorld, Shape};
use crate::consts::GRAVITY;

fn to_na(v: Vec2) -> Vector<Real> {
    vector![v.x, v.y]
}

fn from_na(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

fn rapier_kind(kind: BodyKind) -> RigidBodyType {
    match kind {
        BodyKind::Static => RigidBodyType::Fixed,
        BodyKind::Kinematic => RigidBodyType::KinematicVelocityBased,
        BodyKind::Dynamic => RigidBodyType::Dynamic,
    }
}

/// Tuning for [`RapierWorld`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    pub gravity: Vec2,
    pub linear_damping: f32,
    /// Also stands in for rolling resistance
    pub angular_damping: f32,
    /// Seconds a body must stay slow before it sleeps (0 disables sleeping)
    pub sleep_time: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, GRAVITY),
            linear_damping: 0.1,
            angular_damping: 1.0,
            sleep_time: 0.5,
        }
    }
}

/// One solved contact pair, as seen from inside the pipeline
#[derive(Debug, Clone, Copy)]
struct RawContact {
    a: BodyHandle,
    b: BodyHandle,
    impulse: f32,
    /// World-space, from `a` toward `b`
    normal: Vec2,
    point: Vec2,
}

/// Collects contact force events during a step
#[derive(Default)]
struct ContactCollector {
    contacts: Mutex<Vec<RawContact>>,
}

impl ContactCollector {
    fn drain(&mut self) -> Vec<RawContact> {
        self.contacts.get_mut().map(std::mem::take).unwrap_or_default()
    }
}

fn owner(bodies: &RigidBodySet, colliders: &ColliderSet, collider: ColliderHandle) -> Option<BodyHandle> {
    let parent = colliders.get(collider)?.parent()?;
    Some(BodyHandle(bodies.get(parent)?.user_data as u32))
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
    }

    fn handle_contact_force_event(
        &self,
        dt: Real,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        contact_pair: &ContactPair,
        total_force_magnitude: Real,
    ) {
        let (Some(a), Some(b)) = (
            owner(bodies, colliders, contact_pair.collider1),
            owner(bodies, colliders, contact_pair.collider2),
        ) else {
            return;
        };
        let Some(manifold) = contact_pair
            .manifolds
            .iter()
            .find(|m| !m.data.solver_contacts.is_empty())
        else {
            return;
        };
        let point = manifold.data.solver_contacts[0].point;
        let contact = RawContact {
            a,
            b,
            impulse: total_force_magnitude * dt,
            normal: from_na(&manifold.data.normal),
            point: Vec2::new(point.x, point.y),
        };
        if let Ok(mut contacts) = self.contacts.lock() {
            contacts.push(contact);
        }
    }
}

/// Velocity state of a dynamic body before a step
#[derive(Debug, Clone, Copy)]
struct Motion {
    linear: Vec2,
    angular: f32,
    center: Vec2,
}

impl Motion {
    fn velocity_at(&self, point: Vec2) -> Vec2 {
        self.linear + (point - self.center).perp() * self.angular
    }
}

/// Bundled physics world
pub struct RapierWorld {
    config: WorldConfig,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    collector: ContactCollector,
    /// Our handles to rapier's; the collider goes with its body
    entries: BTreeMap<BodyHandle, RigidBodyHandle>,
    next_id: u32,
    contacts: Vec<ContactEvent>,
}

impl Default for RapierWorld {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl fmt::Debug for RapierWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RapierWorld")
            .field("config", &self.config)
            .field("bodies", &self.entries.len())
            .field("pending_contacts", &self.contacts.len())
            .finish_non_exhaustive()
    }
}

impl RapierWorld {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            gravity: to_na(config.gravity),
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            collector: ContactCollector::default(),
            entries: BTreeMap::new(),
            next_id: 1,
            contacts: Vec::new(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Number of bodies currently in the world
    pub fn body_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_sleeping(&self, handle: BodyHandle) -> Option<bool> {
        self.body(handle).map(|rb| rb.is_sleeping())
    }

    fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(*self.entries.get(&handle)?)
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        let body = *self.entries.get(&handle)?;
        self.bodies.get_mut(body)
    }

    fn build_body(&self, handle: BodyHandle, desc: &BodyDesc) -> RigidBody {
        let mut body = RigidBodyBuilder::new(rapier_kind(desc.kind))
            .translation(to_na(desc.position))
            .rotation(desc.angle)
            .linear_damping(self.config.linear_damping)
            .angular_damping(self.config.angular_damping)
            .can_sleep(self.config.sleep_time > 0.0)
            .ccd_enabled(desc.kind == BodyKind::Dynamic)
            .enabled(desc.enabled)
            .user_data(u128::from(handle.0))
            .build();
        if self.config.sleep_time > 0.0 {
            body.activation_mut().time_until_sleep = self.config.sleep_time;
        }
        body
    }

    fn build_collider(desc: &BodyDesc) -> Collider {
        let builder = match desc.shape {
            Shape::Circle { radius } => ColliderBuilder::ball(radius),
            Shape::Box { half_extents } => ColliderBuilder::cuboid(half_extents.x, half_extents.y),
        };
        builder
            .density(desc.density)
            .restitution(desc.restitution)
            .friction(desc.friction)
            .active_events(ActiveEvents::CONTACT_FORCE_EVENTS)
            .contact_force_event_threshold(0.0)
            .build()
    }

    /// Velocities of every moving body, keyed by handle
    fn motions(&self) -> BTreeMap<BodyHandle, Motion> {
        self.entries
            .iter()
            .filter_map(|(handle, body)| {
                let rb = self.bodies.get(*body)?;
                if rb.is_fixed() || !rb.is_enabled() {
                    return None;
                }
                let center = rb.center_of_mass();
                Some((
                    *handle,
                    Motion {
                        linear: from_na(rb.linvel()),
                        angular: rb.angvel(),
                        center: Vec2::new(center.x, center.y),
                    },
                ))
            })
            .collect()
    }
}

impl PhysicsWorld for RapierWorld {
    fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        let handle = BodyHandle(self.next_id);
        self.next_id += 1;

        let body = self.bodies.insert(self.build_body(handle, desc));
        self.colliders
            .insert_with_parent(Self::build_collider(desc), body, &mut self.bodies);
        self.entries.insert(handle, body);
        handle
    }

    fn remove_body(&mut self, handle: BodyHandle) -> bool {
        let Some(body) = self.entries.remove(&handle) else {
            return false;
        };
        // Rapier wakes whatever was touching it
        self.bodies.remove(
            body,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        log::trace!("Removed body {:?}", handle);
        true
    }

    fn contains(&self, handle: BodyHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    fn step(&mut self, dt: f32, velocity_iterations: u32, position_iterations: u32) {
        self.integration_parameters.dt = dt;
        self.integration_parameters.num_solver_iterations =
            NonZeroUsize::new(velocity_iterations as usize).unwrap_or(NonZeroUsize::MIN);
        self.integration_parameters.num_internal_stabilization_iterations = position_iterations as usize;

        let before = self.motions();
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &self.collector,
        );

        let mut contacts: Vec<ContactEvent> = self
            .collector
            .drain()
            .into_iter()
            .filter(|c| c.impulse > 0.0)
            .map(|c| {
                let velocity = |handle: BodyHandle| {
                    before
                        .get(&handle)
                        .map(|m| m.velocity_at(c.point))
                        .unwrap_or(Vec2::ZERO)
                };
                let closing = (velocity(c.a) - velocity(c.b)).dot(c.normal);
                let (a, b) = if c.a <= c.b { (c.a, c.b) } else { (c.b, c.a) };
                ContactEvent {
                    a,
                    b,
                    impulse: c.impulse,
                    approach_speed: closing.max(0.0),
                    point: c.point,
                }
            })
            .collect();
        contacts.sort_by_key(|c| (c.a, c.b));
        self.contacts.extend(contacts);
    }

    fn position(&self, handle: BodyHandle) -> Option<Vec2> {
        self.body(handle).map(|rb| from_na(rb.translation()))
    }

    fn angle(&self, handle: BodyHandle) -> Option<f32> {
        self.body(handle).map(|rb| rb.rotation().angle())
    }

    fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec2> {
        self.body(handle).map(|rb| from_na(rb.linvel()))
    }

    fn angular_velocity(&self, handle: BodyHandle) -> Option<f32> {
        self.body(handle).map(|rb| rb.angvel())
    }

    fn mass(&self, handle: BodyHandle) -> Option<f32> {
        self.body(handle).map(|rb| rb.mass())
    }

    fn set_transform(&mut self, handle: BodyHandle, position: Vec2, angle: f32) {
        if let Some(rb) = self.body_mut(handle) {
            rb.set_position(Isometry::new(to_na(position), angle), true);
        }
    }

    fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec2) {
        if let Some(rb) = self.body_mut(handle) {
            rb.set_linvel(to_na(velocity), true);
        }
    }

    fn set_body_kind(&mut self, handle: BodyHandle, kind: BodyKind) {
        if let Some(rb) = self.body_mut(handle) {
            rb.set_body_type(rapier_kind(kind), true);
            if kind != BodyKind::Dynamic {
                rb.set_linvel(vector![0.0, 0.0], true);
                rb.set_angvel(0.0, true);
            }
        }
    }

    fn set_enabled(&mut self, handle: BodyHandle, enabled: bool) {
        if let Some(rb) = self.body_mut(handle) {
            rb.set_enabled(enabled);
            rb.wake_up(true);
        }
    }

    fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec2) {
        let Some(rb) = self.body_mut(handle) else {
            return;
        };
        // Rapier refreshes the effective mass only during a step; a body
        // switched to dynamic this tick would otherwise ignore the impulse
        let mass = rb.mass();
        if rb.is_dynamic() && mass > 0.0 {
            let velocity = from_na(rb.linvel()) + impulse / mass;
            rb.set_linvel(to_na(velocity), true);
        }
    }

    fn drain_contacts(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.contacts)
    }

    fn is_active(&self, epsilon: f32) -> bool {
        self.entries.values().any(|body| {
            self.bodies.get(*body).is_some_and(|rb| {
                rb.is_enabled()
                    && rb.is_dynamic()
                    && !rb.is_sleeping()
                    && (rb.linvel().norm() > epsilon || rb.angvel().abs() > epsilon)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{POSITION_ITERATIONS, SIM_DT, VELOCITY_ITERATIONS};
    use std::f32::consts::FRAC_PI_2;

    fn ground(world: &mut RapierWorld) -> BodyHandle {
        world.create_body(
            &BodyDesc::fixed(Shape::Box {
                half_extents: Vec2::new(50.0, 0.5),
            })
            .with_position(Vec2::new(0.0, -0.5)),
        )
    }

    fn run(world: &mut RapierWorld, steps: usize) {
        for _ in 0..steps {
            world.step(SIM_DT, VELOCITY_ITERATIONS, POSITION_ITERATIONS);
        }
    }

    #[test]
    fn test_body_falls_and_rests_on_ground() {
        let mut world = RapierWorld::default();
        ground(&mut world);
        let ball = world.create_body(
            &BodyDesc::dynamic(Shape::Circle { radius: 0.5 }).with_position(Vec2::new(0.0, 3.0)),
        );

        run(&mut world, 10);
        assert!(world.position(ball).unwrap().y < 3.0);
        assert!(world.is_active(0.05));

        run(&mut world, 300);
        let pos = world.position(ball).unwrap();
        assert!((pos.y - 0.5).abs() < 0.05, "resting height {}", pos.y);
        assert!(!world.is_active(0.05));
    }

    #[test]
    fn test_resting_body_reports_gentle_contacts() {
        let mut world = RapierWorld::default();
        let floor = ground(&mut world);
        let block = world.create_body(
            &BodyDesc::dynamic(Shape::Box {
                half_extents: Vec2::splat(0.5),
            })
            .with_position(Vec2::new(0.0, 0.5)),
        );

        run(&mut world, 5);
        let contacts = world.drain_contacts();
        assert!(!contacts.is_empty());
        assert!(contacts.iter().all(|c| (c.a, c.b) == (floor, block)));
        // Holding up its own weight: small impulses, nothing closing in
        let weight_impulse = world.mass(block).unwrap() * 9.8 * SIM_DT;
        for contact in &contacts {
            assert!(contact.impulse < weight_impulse * 3.0, "impulse {}", contact.impulse);
            assert!(contact.approach_speed < 0.2, "approach {}", contact.approach_speed);
        }
        assert!(world.drain_contacts().is_empty());
    }

    #[test]
    fn test_impulse_changes_velocity_by_inverse_mass() {
        let mut world = RapierWorld::new(WorldConfig {
            gravity: Vec2::ZERO,
            ..Default::default()
        });
        let body = world.create_body(&BodyDesc::dynamic(Shape::Circle { radius: 0.5 }));
        let mass = world.mass(body).unwrap();
        assert!((mass - std::f32::consts::PI * 0.25).abs() < 1e-4);
        world.apply_impulse(body, Vec2::new(2.0, 1.0));
        let v = world.linear_velocity(body).unwrap();
        assert!((v - Vec2::new(2.0, 1.0) / mass).length() < 1e-5);
    }

    #[test]
    fn test_impulse_right_after_kind_switch() {
        let mut world = RapierWorld::new(WorldConfig {
            gravity: Vec2::ZERO,
            ..Default::default()
        });
        let body = world.create_body(
            &BodyDesc::dynamic(Shape::Circle { radius: 0.5 }).with_kind(BodyKind::Kinematic),
        );
        world.set_body_kind(body, BodyKind::Dynamic);
        world.apply_impulse(body, Vec2::X);
        assert!(world.linear_velocity(body).unwrap().x > 0.0);
    }

    #[test]
    fn test_static_and_kinematic_ignore_impulses() {
        let mut world = RapierWorld::default();
        let wall = world.create_body(&BodyDesc::fixed(Shape::Circle { radius: 1.0 }));
        let held = world.create_body(
            &BodyDesc::dynamic(Shape::Circle { radius: 1.0 })
                .with_kind(BodyKind::Kinematic)
                .with_position(Vec2::new(5.0, 0.0)),
        );
        world.apply_impulse(wall, Vec2::X);
        world.apply_impulse(held, Vec2::X);
        run(&mut world, 5);
        assert_eq!(world.position(wall), Some(Vec2::ZERO));
        assert_eq!(world.position(held), Some(Vec2::new(5.0, 0.0)));
        assert!(!world.is_active(0.0));
    }

    #[test]
    fn test_head_on_collision_reports_impact() {
        let mut world = RapierWorld::new(WorldConfig {
            gravity: Vec2::ZERO,
            linear_damping: 0.0,
            sleep_time: 0.0,
            ..Default::default()
        });
        let a = world.create_body(
            &BodyDesc::dynamic(Shape::Circle { radius: 0.5 }).with_position(Vec2::new(0.0, 0.0)),
        );
        let b = world.create_body(
            &BodyDesc::dynamic(Shape::Circle { radius: 0.5 }).with_position(Vec2::new(2.0, 0.0)),
        );
        world.set_linear_velocity(a, Vec2::new(5.0, 0.0));

        let mut hit = None;
        for _ in 0..60 {
            world.step(SIM_DT, VELOCITY_ITERATIONS, POSITION_ITERATIONS);
            if let Some(contact) = world.drain_contacts().into_iter().find(|c| c.impulse > 1.0) {
                hit = Some(contact);
                break;
            }
        }
        let contact = hit.expect("balls collide");
        assert_eq!((contact.a, contact.b), (a, b));
        assert!((contact.approach_speed - 5.0).abs() < 0.1, "approach {}", contact.approach_speed);

        run(&mut world, 5);
        let va = world.linear_velocity(a).unwrap();
        let vb = world.linear_velocity(b).unwrap();
        assert!(vb.x > va.x);
        // Momentum is conserved (equal masses)
        assert!((va.x + vb.x - 5.0).abs() < 0.05);
    }

    #[test]
    fn test_rotated_box_collides_with_its_rotated_shape() {
        let mut world = RapierWorld::default();
        ground(&mut world);
        // 4 wide, 0.4 tall, stood on end
        let column = world.create_body(
            &BodyDesc::fixed(Shape::Box {
                half_extents: Vec2::new(2.0, 0.2),
            })
            .with_position(Vec2::new(0.0, 2.0))
            .with_angle(FRAC_PI_2),
        );
        let beside = world.create_body(
            &BodyDesc::dynamic(Shape::Circle { radius: 0.5 }).with_position(Vec2::new(1.5, 2.75)),
        );
        let above = world.create_body(
            &BodyDesc::dynamic(Shape::Circle { radius: 0.15 }).with_position(Vec2::new(0.0, 4.5)),
        );

        run(&mut world, 600);
        // Nothing under it but the floor
        assert!((world.position(beside).unwrap().y - 0.5).abs() < 0.05);
        // Caught by the column's top at y = 4
        assert!((world.position(above).unwrap().y - 4.15).abs() < 0.05);
        assert!((world.angle(column).unwrap() - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_tilted_box_topples_flat() {
        let mut world = RapierWorld::default();
        ground(&mut world);
        let block = world.create_body(
            &BodyDesc::dynamic(Shape::Box {
                half_extents: Vec2::splat(0.5),
            })
            .with_position(Vec2::new(0.0, 0.75))
            .with_angle(30f32.to_radians()),
        );

        run(&mut world, 600);
        let angle = world.angle(block).unwrap().to_degrees().rem_euclid(90.0);
        assert!(angle < 2.0 || angle > 88.0, "resting angle {}", angle);
        assert!((world.position(block).unwrap().y - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_removing_support_drops_what_it_held() {
        let mut world = RapierWorld::default();
        ground(&mut world);
        let lower = world.create_body(
            &BodyDesc::dynamic(Shape::Box {
                half_extents: Vec2::splat(0.5),
            })
            .with_position(Vec2::new(0.0, 0.5)),
        );
        let upper = world.create_body(
            &BodyDesc::dynamic(Shape::Box {
                half_extents: Vec2::splat(0.5),
            })
            .with_position(Vec2::new(0.0, 1.5)),
        );
        run(&mut world, 120);
        assert!(!world.is_active(0.05));

        assert!(world.remove_body(lower));
        assert!(!world.remove_body(lower));
        assert!(!world.contains(lower));
        run(&mut world, 5);
        assert!(world.is_active(0.05));
        assert!(world.position(upper).unwrap().y < 1.5);
    }

    #[test]
    fn test_disabled_bodies_do_not_simulate() {
        let mut world = RapierWorld::default();
        let parked = world.create_body(
            &BodyDesc::dynamic(Shape::Circle { radius: 0.5 })
                .with_position(Vec2::new(3.0, 3.0))
                .with_enabled(false),
        );
        run(&mut world, 30);
        assert_eq!(world.position(parked), Some(Vec2::new(3.0, 3.0)));
        assert!(!world.is_active(0.0));

        world.set_enabled(parked, true);
        run(&mut world, 5);
        assert!(world.position(parked).unwrap().y < 3.0);
    }

    #[test]
    fn test_unknown_handles() {
        let mut world = RapierWorld::default();
        let ghost = BodyHandle(99);
        assert_eq!(world.position(ghost), None);
        assert_eq!(world.mass(ghost), None);
        world.apply_impulse(ghost, Vec2::X);
        world.set_transform(ghost, Vec2::ONE, 0.0);
        assert!(!world.remove_body(ghost));
    }
}
