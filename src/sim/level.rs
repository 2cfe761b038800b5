//! A loaded level: entities, their physics world, score and high scores
//!
//! The level exclusively owns its world. Every entity body is registered in
//! `owners` so contact reports can be mapped back to entities; a body leaves
//! the map and the world in the same call that kills its entity.

use std::collections::HashMap;

use glam::Vec2;

use super::entity::{Bird, BirdKind, BirdPhase, EntityRef, Obstacle, Pig};
use super::score::Score;
use crate::consts::*;
use crate::highscores::{HighScoreTable, MergeOutcome};
use crate::level_file::{EntityRecord, LevelDescription, LevelHeader};
use crate::physics::{BodyHandle, BodyKind, ContactEvent, PhysicsWorld, RapierWorld};
use crate::{degrees_to_radians, radians_to_degrees};

/// Things that happened during a tick, for audio/UI collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// A pig or obstacle was destroyed and its points awarded
    Destroyed { entity: EntityRef, points: u64 },
    BirdLaunched { index: usize, impulse: Vec2 },
    PowerUsed { index: usize, kind: BirdKind },
    /// Thrown bird cleared; `next` is the new bird on the slingshot
    BirdReset { next: Option<usize> },
    /// World came to rest
    Settled,
    /// All pigs dead and world at rest
    LevelCleared { score: u64, stars: u8 },
    /// The level's top score rose
    NewHighScore { score: u64 },
    /// Out of birds with pigs left
    LevelFailed { score: u64 },
}

/// Final bookkeeping for a cleared level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelResult {
    pub score: u64,
    pub stars: u8,
    pub merge: MergeOutcome,
}

/// HUD counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hud {
    pub score: u64,
    pub best: u64,
    /// Birds not yet thrown, per kind (order of [`BirdKind::ALL`])
    pub birds_left: [usize; 3],
    pub pigs_left: usize,
}

/// Drawing info for one live body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyView {
    pub entity: EntityRef,
    pub position: Vec2,
    pub angle: f32,
}

/// A playable level
#[derive(Debug)]
pub struct Level<W: PhysicsWorld = RapierWorld> {
    header: LevelHeader,
    pub(crate) birds: Vec<Bird>,
    pub(crate) pigs: Vec<Pig>,
    pub(crate) obstacles: Vec<Obstacle>,
    high_scores: HighScoreTable,
    score: Score,
    /// Index of the bird on the slingshot (or last thrown)
    pub(crate) current_bird: usize,
    pub(crate) out_of_birds: bool,
    finished: bool,
    stars: u8,
    pub(crate) world: W,
    owners: HashMap<BodyHandle, EntityRef>,
}

impl<W: PhysicsWorld> Level<W> {
    /// Register every entity of `desc` in `world`
    pub fn build(desc: &LevelDescription, mut world: W) -> Self {
        let mut birds = Vec::new();
        let mut pigs = Vec::new();
        let mut obstacles = Vec::new();
        let mut owners = HashMap::new();

        for record in &desc.entities {
            match *record {
                EntityRecord::Bird { kind, position } => {
                    // Queued birds sit out of the simulation until their turn
                    let body = world.create_body(&Bird::body_desc(kind, position).with_enabled(false));
                    owners.insert(body, EntityRef::Bird(birds.len()));
                    birds.push(Bird {
                        kind,
                        body,
                        phase: BirdPhase::Idle,
                        power_meter: 0.0,
                        spawn: position,
                    });
                }
                EntityRecord::Pig {
                    position,
                    radius,
                    points,
                } => {
                    let body = world.create_body(&Pig::body_desc(position, radius));
                    owners.insert(body, EntityRef::Pig(pigs.len()));
                    pigs.push(Pig {
                        body,
                        radius,
                        health: PIG_HEALTH,
                        points,
                        alive: true,
                    });
                }
                EntityRecord::Obstacle {
                    material,
                    position,
                    size,
                    angle_degrees,
                } => {
                    let body = world.create_body(&Obstacle::body_desc(
                        material,
                        position,
                        size,
                        degrees_to_radians(angle_degrees),
                    ));
                    owners.insert(body, EntityRef::Obstacle(obstacles.len()));
                    obstacles.push(Obstacle {
                        material,
                        body,
                        size,
                        health: material.health(),
                        points: material.points(),
                        alive: true,
                    });
                }
            }
        }

        let mut level = Self {
            header: desc.header.clone(),
            birds,
            pigs,
            obstacles,
            high_scores: desc.high_scores.clone(),
            score: Score::default(),
            current_bird: 0,
            out_of_birds: false,
            finished: false,
            stars: 0,
            world,
            owners,
        };

        if level.birds.is_empty() {
            level.out_of_birds = true;
        } else {
            level.ready_bird(0);
        }

        log::info!(
            "Level {} built: {} birds, {} pigs, {} obstacles",
            level.header.number,
            level.birds.len(),
            level.pigs.len(),
            level.obstacles.len()
        );
        level
    }

    /// Put a queued bird on the slingshot: enabled, held in place at the anchor
    pub(crate) fn ready_bird(&mut self, index: usize) {
        self.current_bird = index;
        let bird = &mut self.birds[index];
        bird.phase = BirdPhase::Idle;
        bird.power_meter = 0.0;
        let body = bird.body;
        self.world.set_enabled(body, true);
        self.world.set_body_kind(body, BodyKind::Kinematic);
        self.world.set_transform(body, self.header.anchor, 0.0);
        self.world.set_linear_velocity(body, Vec2::ZERO);
    }

    pub fn header(&self) -> &LevelHeader {
        &self.header
    }

    pub fn number(&self) -> u32 {
        self.header.number
    }

    pub fn score(&self) -> u64 {
        self.score.value()
    }

    /// Stars earned (set when the level is cleared)
    pub fn stars(&self) -> u8 {
        self.stars
    }

    pub fn high_scores(&self) -> &HighScoreTable {
        &self.high_scores
    }

    /// Apply a top-N cap to the in-memory table
    pub fn limit_high_scores(&mut self, limit: Option<usize>) {
        self.high_scores = std::mem::take(&mut self.high_scores).with_limit(limit);
    }

    pub fn birds(&self) -> &[Bird] {
        &self.birds
    }

    pub fn pigs(&self) -> &[Pig] {
        &self.pigs
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn current_bird_index(&self) -> Option<usize> {
        if self.out_of_birds {
            None
        } else {
            Some(self.current_bird)
        }
    }

    /// The bird on the slingshot or in flight
    pub fn current_bird(&self) -> Option<&Bird> {
        self.current_bird_index().and_then(|i| self.birds.get(i))
    }

    pub fn is_out_of_birds(&self) -> bool {
        self.out_of_birds
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    /// Activity check for settlement
    pub fn world_is_active(&self, epsilon: f32) -> bool {
        self.world.is_active(epsilon)
    }

    /// Advance physics by one fixed step
    pub fn step(&mut self, dt: f32) {
        self.world.step(dt, VELOCITY_ITERATIONS, POSITION_ITERATIONS);
    }

    /// All pigs dead; standing obstacles don't matter
    pub fn is_level_ended(&self) -> bool {
        self.pigs.iter().all(|p| !p.alive)
    }

    /// No birds left to throw, pigs remain and nothing is moving
    pub fn is_level_failed(&self, settled: bool) -> bool {
        settled && self.out_of_birds && !self.is_level_ended()
    }

    /// End-of-level bookkeeping already done
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Current bird has been thrown (or lost) and should be replaced once the
    /// world settles
    pub fn needs_bird_reset(&self) -> bool {
        self.current_bird()
            .map(|b| b.is_thrown() || !b.is_alive())
            .unwrap_or(false)
    }

    pub fn count_pigs(&self) -> usize {
        self.pigs.iter().filter(|p| p.alive).count()
    }

    /// Birds still waiting to be thrown, per kind
    pub fn count_bird_kinds(&self) -> [usize; 3] {
        let mut counts = [0; 3];
        for bird in self.birds.iter().filter(|b| matches!(b.phase, BirdPhase::Idle | BirdPhase::Charging)) {
            if let Some(slot) = BirdKind::ALL.iter().position(|k| *k == bird.kind) {
                counts[slot] += 1;
            }
        }
        counts
    }

    pub fn hud(&self) -> Hud {
        Hud {
            score: self.score(),
            best: self.high_scores.top_score(),
            birds_left: self.count_bird_kinds(),
            pigs_left: self.count_pigs(),
        }
    }

    /// Positions of everything still in the world, in stable order
    pub fn bodies(&self) -> Vec<BodyView> {
        let birds = self
            .birds
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_alive())
            .map(|(i, b)| (EntityRef::Bird(i), b.body));
        let pigs = self
            .pigs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.alive)
            .map(|(i, p)| (EntityRef::Pig(i), p.body));
        let obstacles = self
            .obstacles
            .iter()
            .enumerate()
            .filter(|(_, o)| o.alive)
            .map(|(i, o)| (EntityRef::Obstacle(i), o.body));

        birds
            .chain(pigs)
            .chain(obstacles)
            .filter_map(|(entity, body)| {
                Some(BodyView {
                    entity,
                    position: self.world.position(body)?,
                    angle: self.world.angle(body)?,
                })
            })
            .collect()
    }

    pub fn entity_position(&self, entity: EntityRef) -> Option<Vec2> {
        let body = match entity {
            EntityRef::Bird(i) => self.birds.get(i).filter(|b| b.is_alive())?.body,
            EntityRef::Pig(i) => self.pigs.get(i).filter(|p| p.alive)?.body,
            EntityRef::Obstacle(i) => self.obstacles.get(i).filter(|o| o.alive)?.body,
        };
        self.world.position(body)
    }

    /// Kill an entity and drop its body. Pigs and obstacles award their points.
    ///
    /// Returns `None` if it was already dead.
    pub(crate) fn destroy(&mut self, entity: EntityRef) -> Option<GameEvent> {
        let (body, points) = match entity {
            EntityRef::Bird(i) => {
                let bird = self.birds.get_mut(i).filter(|b| b.is_alive())?;
                bird.phase = BirdPhase::Removed;
                (bird.body, 0)
            }
            EntityRef::Pig(i) => {
                let pig = self.pigs.get_mut(i).filter(|p| p.alive)?;
                pig.alive = false;
                (pig.body, pig.points)
            }
            EntityRef::Obstacle(i) => {
                let obstacle = self.obstacles.get_mut(i).filter(|o| o.alive)?;
                obstacle.alive = false;
                (obstacle.body, obstacle.points)
            }
        };

        self.owners.remove(&body);
        self.world.remove_body(body);

        match entity {
            EntityRef::Bird(i) => {
                log::debug!("Bird {} removed", i);
                None
            }
            _ => {
                let total = self.score.award(points);
                log::debug!("{:?} destroyed: +{} (score {})", entity, points, total);
                Some(GameEvent::Destroyed { entity, points })
            }
        }
    }

    /// Subtract health; destroys the entity when it runs out. Birds are immune.
    pub(crate) fn damage(&mut self, entity: EntityRef, amount: f32) -> Option<GameEvent> {
        let health = match entity {
            EntityRef::Bird(_) => return None,
            EntityRef::Pig(i) => &mut self.pigs.get_mut(i).filter(|p| p.alive)?.health,
            EntityRef::Obstacle(i) => &mut self.obstacles.get_mut(i).filter(|o| o.alive)?.health,
        };
        *health -= amount;
        if *health <= 0.0 {
            self.destroy(entity)
        } else {
            None
        }
    }

    /// Turn the world's contact reports into damage
    pub fn resolve_contacts(&mut self) -> Vec<GameEvent> {
        let contacts: Vec<ContactEvent> = self.world.drain_contacts();
        let mut events = Vec::new();
        for contact in contacts {
            if contact.impulse < DAMAGE_IMPULSE_THRESHOLD
                || contact.approach_speed < DAMAGE_SPEED_THRESHOLD
            {
                continue;
            }
            for body in [contact.a, contact.b] {
                if let Some(&entity) = self.owners.get(&body) {
                    events.extend(self.damage(entity, contact.impulse));
                }
            }
        }
        events
    }

    /// Destroy everything that fell off the world
    pub fn cull_out_of_bounds(&mut self) -> Vec<GameEvent> {
        let mut fallen: Vec<(BodyHandle, EntityRef)> = self
            .owners
            .iter()
            .filter(|(body, _)| {
                self.world
                    .position(**body)
                    .map(|p| p.y < KILL_PLANE_Y)
                    .unwrap_or(false)
            })
            .map(|(body, entity)| (*body, *entity))
            .collect();
        // HashMap order is arbitrary; keep scoring order reproducible
        fallen.sort_by_key(|(body, _)| *body);

        let mut events = Vec::new();
        for (_, entity) in fallen {
            let indestructible = matches!(
                entity,
                EntityRef::Obstacle(i) if !self.obstacles[i].material.is_destructible()
            );
            if !indestructible {
                events.extend(self.destroy(entity));
            }
        }
        events
    }

    /// Record a cleared level: stars, then merge the score into the table.
    ///
    /// Returns `None` if the level is not cleared or was already finished.
    pub fn finish(&mut self, player: &str) -> Option<LevelResult> {
        if self.finished || !self.is_level_ended() {
            return None;
        }
        self.finished = true;
        self.stars = self.header.thresholds.select_stars(self.score());
        let merge = self.high_scores.merge(player, self.score());
        log::info!(
            "Level {} cleared by {}: score {} stars {} (rank {:?})",
            self.header.number,
            player,
            self.score(),
            self.stars,
            merge.rank
        );
        Some(LevelResult {
            score: self.score(),
            stars: self.stars,
            merge,
        })
    }

    /// Record a failed level. Returns false if already finished.
    pub fn finish_failed(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;
        self.stars = 0;
        log::info!("Level {} failed with score {}", self.header.number, self.score());
        true
    }

    /// Current layout as a level description (live bodies at their current pose)
    pub fn snapshot(&self) -> LevelDescription {
        let mut entities = Vec::new();

        // Thrown birds are spent; the rest go back to their queue slots
        for bird in self
            .birds
            .iter()
            .filter(|b| matches!(b.phase, BirdPhase::Idle | BirdPhase::Charging))
        {
            entities.push(EntityRecord::Bird {
                kind: bird.kind,
                position: bird.spawn,
            });
        }
        for pig in self.pigs.iter().filter(|p| p.alive) {
            if let Some(position) = self.world.position(pig.body) {
                entities.push(EntityRecord::Pig {
                    position,
                    radius: pig.radius,
                    points: pig.points,
                });
            }
        }
        for obstacle in self.obstacles.iter().filter(|o| o.alive) {
            if let (Some(position), Some(angle)) = (
                self.world.position(obstacle.body),
                self.world.angle(obstacle.body),
            ) {
                entities.push(EntityRecord::Obstacle {
                    material: obstacle.material,
                    position,
                    size: obstacle.size,
                    angle_degrees: radians_to_degrees(angle),
                });
            }
        }

        LevelDescription {
            header: self.header.clone(),
            high_scores: self.high_scores.clone(),
            entities,
        }
    }

    /// Number of bodies the level currently owns
    pub fn owned_bodies(&self) -> usize {
        self.owners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::Material;

    const LEVEL: &str = "\
1 1000 3000 4500 -6 0.5
alice:100;bob:80;
ground 0 -0.5 40 1
bird basic -8 0.5
bird speed -9 0.5
pig 4 0.5 0.5 5000
wood 6 1 0.4 2
";

    fn level() -> Level {
        Level::build(&LevelDescription::parse(LEVEL).unwrap(), RapierWorld::default())
    }

    #[test]
    fn test_build_registers_every_body() {
        let level = level();
        assert_eq!(level.owned_bodies(), 5);
        assert_eq!(level.world().body_count(), 5);
        assert_eq!(level.current_bird_index(), Some(0));
        // First bird held at the anchor, the rest parked
        assert_eq!(level.entity_position(EntityRef::Bird(0)), Some(Vec2::new(-6.0, 0.5)));
        assert_eq!(level.entity_position(EntityRef::Bird(1)), Some(Vec2::new(-9.0, 0.5)));
        assert!(!level.world_is_active(SETTLE_EPSILON));
        assert_eq!(level.hud().birds_left, [1, 1, 0]);
        assert_eq!(level.hud().best, 100);
    }

    #[test]
    fn test_destroy_awards_points_once_and_removes_body() {
        let mut level = level();
        let event = level.destroy(EntityRef::Pig(0));
        assert_eq!(
            event,
            Some(GameEvent::Destroyed {
                entity: EntityRef::Pig(0),
                points: 5000
            })
        );
        assert_eq!(level.score(), 5000);
        assert_eq!(level.world().body_count(), 4);

        assert_eq!(level.destroy(EntityRef::Pig(0)), None);
        assert_eq!(level.score(), 5000);
        assert_eq!(level.world().body_count(), 4);
        assert!(level.is_level_ended());
    }

    #[test]
    fn test_damage_accumulates_until_destroyed() {
        let mut level = level();
        assert_eq!(level.damage(EntityRef::Obstacle(1), 1.5), None);
        assert_eq!(level.score(), 0);
        assert!(level.damage(EntityRef::Obstacle(1), 1.0).is_some());
        assert_eq!(level.score(), Material::Wood.points());
        // Birds and ground never take damage
        assert_eq!(level.damage(EntityRef::Bird(0), 100.0), None);
        assert_eq!(level.damage(EntityRef::Obstacle(0), 1e9), None);
    }

    #[test]
    fn test_resting_contacts_deal_no_damage() {
        let mut level = level();
        for _ in 0..120 {
            level.step(SIM_DT);
            assert!(level.resolve_contacts().is_empty());
        }
        assert_eq!(level.score(), 0);
        assert_eq!(level.count_pigs(), 1);
    }

    #[test]
    fn test_finish_merges_high_score_once() {
        let mut level = level();
        assert!(level.finish("carol").is_none(), "pig still alive");
        level.destroy(EntityRef::Pig(0));

        let result = level.finish("carol").unwrap();
        assert_eq!(result.score, 5000);
        assert_eq!(result.stars, 3);
        assert!(result.merge.updated && result.merge.new_best);
        assert_eq!(level.high_scores().to_record(), "carol:5000;alice:100;bob:80;");
        assert!(level.finish("carol").is_none());
    }

    #[test]
    fn test_failed_level() {
        let mut level = level();
        assert!(!level.is_level_failed(true));
        level.out_of_birds = true;
        assert!(!level.is_level_failed(false));
        assert!(level.is_level_failed(true));
        assert!(level.finish_failed());
        assert!(!level.finish_failed());
    }

    #[test]
    fn test_rotated_obstacles_collide_as_placed() {
        // A 4x0.4 plank stood on end, a pig beside it, a block dropped on a corner
        let text = "1 1 2 3 0 0.5\n\nground 0 -0.5 40 1\nground 0 2 4 0.4 90\npig 1.5 2.75 0.5\nwood 5 0.75 1 1 30\n";
        let mut level = Level::build(&LevelDescription::parse(text).unwrap(), RapierWorld::default());
        for _ in 0..600 {
            level.step(SIM_DT);
        }

        // Nothing under the pig but the floor
        let pig = level.entity_position(EntityRef::Pig(0)).unwrap();
        assert!((pig.y - 0.5).abs() < 0.05, "pig at {:?}", pig);
        let plank = level.obstacles[1].body;
        assert_eq!(level.world.position(plank), Some(Vec2::new(0.0, 2.0)));
        assert!((level.world.angle(plank).unwrap() - std::f32::consts::FRAC_PI_2).abs() < 1e-5);

        // The block tipped over onto a face
        let block = level.obstacles[2].body;
        let angle = radians_to_degrees(level.world.angle(block).unwrap()).rem_euclid(90.0);
        assert!(angle < 2.0 || angle > 88.0, "block angle {}", angle);
    }

    #[test]
    fn test_cull_out_of_bounds() {
        let mut level = level();
        let body = level.pigs[0].body;
        level.world.set_transform(body, Vec2::new(4.0, KILL_PLANE_Y - 1.0), 0.0);
        let events = level.cull_out_of_bounds();
        assert_eq!(events.len(), 1);
        assert_eq!(level.score(), 5000);
        assert!(level.cull_out_of_bounds().is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut level = level();
        for _ in 0..30 {
            level.step(SIM_DT);
        }
        let snapshot = level.snapshot();
        let text = snapshot.to_text();
        let reloaded = Level::build(&LevelDescription::parse(&text).unwrap(), RapierWorld::default());

        assert_eq!(reloaded.high_scores(), level.high_scores());
        let before = level.bodies();
        let after = reloaded.bodies();
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.entity, b.entity);
            assert!((a.position - b.position).length() < 1e-5);
            assert!((a.angle - b.angle).abs() < 1e-5);
        }
    }
}
