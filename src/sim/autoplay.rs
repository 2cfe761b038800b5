//! Demo player
//!
//! Aims at the nearest live pig with a little seeded jitter, throws once the
//! world is at rest and fires the bird's power partway through the flight.
//! Same seed, same level, same game.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::entity::{BirdPhase, EntityRef};
use super::level::Level;
use super::tick::TickInput;
use crate::physics::PhysicsWorld;
use crate::{radians_to_degrees, wrap_degrees};

/// Seeded aimer that produces one [`TickInput`] per tick
#[derive(Debug, Clone)]
pub struct AutoPlayer {
    rng: Pcg32,
    /// Ticks left before the bird in flight uses its power
    power_countdown: Option<u32>,
}

impl AutoPlayer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            power_countdown: None,
        }
    }

    /// Input for the coming tick
    pub fn next_input<W: PhysicsWorld>(&mut self, level: &Level<W>, settled: bool) -> TickInput {
        let mut input = TickInput::default();
        let Some(bird) = level.current_bird() else {
            return input;
        };

        match bird.phase {
            BirdPhase::Idle | BirdPhase::Charging if settled => {
                let Some(target) = self.pick_target(level) else {
                    return input;
                };
                let anchor = level.header().anchor;
                let offset = target - anchor;
                let direct = radians_to_degrees(offset.y.atan2(offset.x));
                // Lob a little above the straight line
                let direction = wrap_degrees(direct + self.rng.random_range(5.0f32..30.0));
                let power = self.rng.random_range(60.0f32..=100.0);
                input.aim = Some((direction, power));
                input.launch = true;
                self.power_countdown = bird
                    .kind
                    .has_power()
                    .then(|| self.rng.random_range(15u32..60));
                log::debug!("Autoplay aiming {:.1} deg at power {:.0}", direction, power);
            }
            BirdPhase::Thrown => {
                if let Some(ticks) = self.power_countdown.as_mut() {
                    if *ticks == 0 {
                        input.activate_power = true;
                        self.power_countdown = None;
                    } else {
                        *ticks -= 1;
                    }
                }
            }
            _ => {}
        }
        input
    }

    fn pick_target<W: PhysicsWorld>(&self, level: &Level<W>) -> Option<Vec2> {
        let anchor = level.header().anchor;
        level
            .pigs()
            .iter()
            .enumerate()
            .filter(|(_, p)| p.alive)
            .filter_map(|(i, _)| level.entity_position(EntityRef::Pig(i)))
            .min_by(|a, b| {
                a.distance_squared(anchor)
                    .partial_cmp(&b.distance_squared(anchor))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level_file::LevelDescription;
    use crate::physics::RapierWorld;

    const LEVEL: &str = "1 1 2 3 0 0.5\n\nground 0 -0.5 60 1\nbird bomb 0 0.5\npig 8 0.5 0.5\npig 20 0.5 0.5\n";

    fn level() -> Level {
        Level::build(&LevelDescription::parse(LEVEL).unwrap(), RapierWorld::default())
    }

    #[test]
    fn test_same_seed_same_inputs() {
        let level = level();
        let mut a = AutoPlayer::new(7);
        let mut b = AutoPlayer::new(7);
        assert_eq!(a.next_input(&level, true), b.next_input(&level, true));
    }

    #[test]
    fn test_waits_for_settle_and_aims_forward() {
        let level = level();
        let mut player = AutoPlayer::new(1);
        assert_eq!(player.next_input(&level, false), TickInput::default());

        let input = player.next_input(&level, true);
        assert!(input.launch);
        let (direction, power) = input.aim.unwrap();
        // Nearest pig is straight to the right; lob between 5 and 30 degrees up
        assert!((5.0..30.0).contains(&direction), "direction {}", direction);
        assert!((60.0..=100.0).contains(&power));
    }
}
