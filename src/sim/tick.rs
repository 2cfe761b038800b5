//! Fixed timestep session tick
//!
//! One [`Session`] owns the active level and runs it one fixed step at a time:
//! physics, then damage and scoring, then settlement, then throw input, then
//! the level-end check. Everything is driven by [`TickInput`], so the same
//! inputs always replay the same game.

use std::path::{Path, PathBuf};

use super::clock::FrameClock;
use super::level::{GameEvent, Hud, Level};
use super::mode::AppMode;
use super::settle::{SettleSignal, SettlementDetector};
use super::throw::{Aim, ThrowController, ThrowGate};
use crate::consts::SIM_DT;
use crate::error::{LoadError, PersistenceError};
use crate::level_file::LevelDescription;
use crate::persistence::{FileRecordStore, HIGH_SCORE_RECORD, MemoryRecordStore, RecordStore};
use crate::physics::RapierWorld;
use crate::settings::Settings;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickInput {
    /// Aim direction (degrees) and power (percent)
    pub aim: Option<(f32, f32)>,
    /// Release the slingshot
    pub launch: bool,
    /// Trigger the flying bird's power
    pub activate_power: bool,
    /// Pause toggle
    pub pause: bool,
}

impl TickInput {
    /// Fold a newer frame's input into one still waiting for a tick
    fn merge(&mut self, newer: &TickInput) {
        if newer.aim.is_some() {
            self.aim = newer.aim;
        }
        self.launch |= newer.launch;
        self.activate_power |= newer.activate_power;
        self.pause ^= newer.pause;
    }

    /// Drop commands once a tick has seen them
    fn clear_consumed(&mut self) {
        self.aim = None;
        self.launch = false;
        self.activate_power = false;
        self.pause = false;
    }
}

/// What a tick produced, for the presentation layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub settled: bool,
    pub just_settled: bool,
    pub events: Vec<GameEvent>,
}

impl TickReport {
    fn absorb(&mut self, other: TickReport) {
        self.settled = other.settled;
        self.just_settled |= other.just_settled;
        self.events.extend(other.events);
    }
}

/// Active level plus everything needed to play, persist and progress it
pub struct Session {
    settings: Settings,
    mode: AppMode,
    level: Option<Level>,
    /// File the level came from, for restarts and progression
    level_path: Option<PathBuf>,
    /// Parsed source of the level, for restarts without a file
    source: Option<LevelDescription>,
    store: Box<dyn RecordStore>,
    settle: SettlementDetector,
    throw: ThrowController,
    clock: FrameClock,
    pending: TickInput,
    ticks: u64,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        let settle = SettlementDetector::new(false, settings.settle_debounce_ticks);
        Self {
            settings,
            mode: AppMode::MainMenu,
            level: None,
            level_path: None,
            source: None,
            store: Box::new(MemoryRecordStore::default()),
            settle,
            throw: ThrowController::new(),
            clock: FrameClock::new(),
            pending: TickInput::default(),
            ticks: 0,
        }
    }

    /// Load a level file and start playing it.
    ///
    /// On failure the current level (if any) keeps running untouched.
    pub fn load_level(&mut self, path: &Path) -> Result<(), LoadError> {
        let desc = LevelDescription::load(path).map_err(|e| {
            log::warn!("Failed to load level {}: {}", path.display(), e);
            e
        })?;
        self.start_level(desc, Box::new(FileRecordStore::new(path)));
        self.level_path = Some(path.to_path_buf());
        log::info!("Loaded level from {}", path.display());
        Ok(())
    }

    /// Start a parsed level; high score rewrites go to `store`
    pub fn start_level(&mut self, desc: LevelDescription, store: Box<dyn RecordStore>) {
        // Drop the previous world before building the next one
        self.level = None;

        let mut level = Level::build(&desc, RapierWorld::new(self.settings.world_config()));
        level.limit_high_scores(self.settings.high_score_limit);

        self.settle = SettlementDetector::new(
            level.world_is_active(self.settings.settle_epsilon),
            self.settings.settle_debounce_ticks,
        );
        self.throw = ThrowController::new();
        self.clock.reset();
        self.pending = TickInput::default();
        self.ticks = 0;
        self.store = store;
        self.level_path = None;
        self.source = Some(desc);
        self.level = Some(level);
        self.mode = AppMode::Playing;
    }

    /// Load the level after the current one; past the last level the last
    /// level is replayed
    pub fn next_level(&mut self) -> Result<(), LoadError> {
        let current = self.level.as_ref().map(|l| l.number()).unwrap_or(0);
        let next = current.saturating_add(1).min(self.settings.level_count.max(1));
        let path = self.settings.level_path(next);
        self.load_level(&path)
    }

    /// Replay the current level from its source
    pub fn restart_level(&mut self) -> Result<(), LoadError> {
        if let Some(path) = self.level_path.clone() {
            return self.load_level(&path);
        }
        if let Some(desc) = self.source.clone() {
            let store = std::mem::replace(&mut self.store, Box::new(MemoryRecordStore::default()));
            self.start_level(desc, store);
        }
        Ok(())
    }

    pub fn set_player_name(&mut self, name: impl Into<String>) {
        self.settings.player_name = name.into();
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    /// Menu navigation is driven from outside the core
    pub fn set_mode(&mut self, mode: AppMode) {
        if mode != self.mode {
            log::debug!("Mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }

    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    pub fn level_path(&self) -> Option<&Path> {
        self.level_path.as_deref()
    }

    /// Fixed ticks simulated on the current level
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn settle_signal(&self) -> SettleSignal {
        self.settle.signal()
    }

    /// Launch arrow for drawing
    pub fn aim(&self) -> Aim {
        self.throw.aim()
    }

    pub fn hud(&self) -> Option<Hud> {
        self.level.as_ref().map(|l| l.hud())
    }

    /// Advance the session by one fixed timestep
    pub fn tick(&mut self, input: &TickInput) -> TickReport {
        let mut report = TickReport {
            settled: self.settle.is_settled(),
            ..TickReport::default()
        };

        if input.pause {
            let mode = self.mode.toggle_pause();
            if mode != self.mode {
                log::info!("{:?}", mode);
                self.mode = mode;
            }
        }

        let Some(level) = self.level.as_mut() else {
            return report;
        };
        // Nothing moves and no input counts outside of play
        if !self.mode.simulates() {
            return report;
        }
        self.ticks += 1;

        // Physics, then what it broke
        level.step(SIM_DT);
        report.events.extend(level.resolve_contacts());
        report.events.extend(level.cull_out_of_bounds());

        // Settlement; a thrown bird is cleared the moment things come to rest
        let signal = self
            .settle
            .update(level.world_is_active(self.settings.settle_epsilon));
        report.just_settled = signal.just_settled;
        if signal.just_settled {
            report.events.push(GameEvent::Settled);
            if level.needs_bird_reset() {
                let next = self.throw.reset_bird(level);
                report.events.push(GameEvent::BirdReset { next });
            }
        }

        // Throw input; aiming and launching only while everything is at rest
        let gate = ThrowGate {
            settled: signal.settled,
            accepts_input: self.mode.accepts_throw_input(),
        };
        if let Some((direction, power)) = input.aim {
            if gate.settled && gate.accepts_input {
                self.throw.set_aim(level, direction, power);
            }
        }
        if input.launch {
            if let Some(event) = self.throw.launch(level, gate) {
                // A launch always starts a new throw cycle, even a feeble one
                self.settle.disturb();
                report.events.push(event);
            }
        }
        if input.activate_power {
            report.events.extend(self.throw.use_power(level));
        }
        self.throw.charge_power(level, SIM_DT);

        // Level end, once, with the world at rest
        let settled = self.settle.is_settled();
        if settled && !level.is_finished() {
            if let Some(result) = level.finish(&self.settings.player_name) {
                if result.merge.updated {
                    let record = level.high_scores().to_record();
                    if let Err(e) = self.store.rewrite_record(HIGH_SCORE_RECORD, &record) {
                        log::warn!("Failed to save high scores: {}", e);
                    }
                    if let Some(source) = self.source.as_mut() {
                        source.high_scores = level.high_scores().clone();
                    }
                }
                report.events.push(GameEvent::LevelCleared {
                    score: result.score,
                    stars: result.stars,
                });
                if result.merge.new_best {
                    report.events.push(GameEvent::NewHighScore {
                        score: result.score,
                    });
                }
                self.mode = AppMode::LevelEnd;
            } else if level.is_level_failed(settled) && level.finish_failed() {
                report.events.push(GameEvent::LevelFailed {
                    score: level.score(),
                });
                self.mode = AppMode::LevelEnd;
            }
        }

        report.settled = settled;
        report
    }

    /// Feed one rendered frame: runs as many fixed ticks as the elapsed time
    /// allows. One-shot input waits for the next tick if none is due.
    pub fn run_frame(&mut self, frame_dt: f32, input: &TickInput) -> TickReport {
        self.pending.merge(input);
        // Pausing must work while nothing simulates
        if !self.mode.simulates() && self.pending.pause {
            let pending = std::mem::take(&mut self.pending);
            self.clock.reset();
            return self.tick(&pending);
        }

        let steps = self.clock.advance(frame_dt);
        let mut report = TickReport {
            settled: self.settle.is_settled(),
            ..TickReport::default()
        };
        for _ in 0..steps {
            let input = self.pending.clone();
            report.absorb(self.tick(&input));
            self.pending.clear_consumed();
        }
        report
    }

    /// Write the current layout (live bodies where they are now) as a level file
    pub fn save_snapshot(&self, path: &Path) -> Result<(), PersistenceError> {
        let Some(level) = self.level.as_ref() else {
            log::debug!("No level to snapshot");
            return Ok(());
        };
        level.snapshot().save(path)?;
        log::info!("Saved level {} snapshot to {}", level.number(), path.display());
        Ok(())
    }

    /// Snapshot to the configured snapshot file
    pub fn quick_save(&self) -> Result<(), PersistenceError> {
        self.save_snapshot(&self.settings.snapshot_path)
    }
}
