//! Birdfling demo runner
//!
//! Plays levels headless with the seeded autoplayer and records high scores.
//!
//! ```text
//! birdfling [level_file] [seed]
//! ```
//!
//! Without a level file every level from the settings' levels directory is
//! played in order.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use birdfling::Settings;
use birdfling::sim::{AppMode, AutoPlayer, GameEvent, Session};

const SETTINGS_PATH: &str = "settings.json";
/// Two simulated minutes per level
const MAX_TICKS: u64 = 60 * 120;

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let level_arg = args.next().map(PathBuf::from);
    let seed = match args.next().map(|s| s.parse::<u64>()) {
        None => 0,
        Some(Ok(seed)) => seed,
        Some(Err(e)) => {
            eprintln!("Invalid seed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings = Settings::load(Path::new(SETTINGS_PATH));
    let levels: Vec<PathBuf> = match level_arg {
        Some(path) => vec![path],
        None => (1..=settings.level_count)
            .map(|n| settings.level_path(n))
            .collect(),
    };
    log::info!("Birdfling starting: {} level(s), seed {}", levels.len(), seed);

    let mut session = Session::new(settings);
    let mut failures = 0;
    for (i, path) in levels.iter().enumerate() {
        if let Err(e) = session.load_level(path) {
            eprintln!("{}: {}", path.display(), e);
            failures += 1;
            continue;
        }
        let mut player = AutoPlayer::new(seed.wrapping_add(i as u64));
        play(&mut session, &mut player);
        // Out of time: keep the layout so the run can be resumed from it
        if session.mode() != AppMode::LevelEnd {
            let path = &session.settings().snapshot_path;
            match session.quick_save() {
                Ok(()) => println!("  unfinished, saved to {}", path.display()),
                Err(e) => eprintln!("Failed to save snapshot {}: {}", path.display(), e),
            }
        }
    }

    if failures == levels.len() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn play(session: &mut Session, player: &mut AutoPlayer) {
    let mut new_best = false;
    let mut outcome = "unfinished";

    while session.mode() != AppMode::LevelEnd && session.ticks() < MAX_TICKS {
        let Some(level) = session.level() else {
            return;
        };
        let input = player.next_input(level, session.settle_signal().settled);
        for event in session.tick(&input).events {
            match event {
                GameEvent::Destroyed { entity, points } => {
                    log::debug!("{:?} destroyed (+{})", entity, points)
                }
                GameEvent::NewHighScore { .. } => new_best = true,
                GameEvent::LevelCleared { .. } => outcome = "cleared",
                GameEvent::LevelFailed { .. } => outcome = "failed",
                _ => {}
            }
        }
    }

    let Some(level) = session.level() else {
        return;
    };
    println!(
        "Level {}: {} after {} ticks, score {}, {} star(s){}",
        level.number(),
        outcome,
        session.ticks(),
        level.score(),
        level.stars(),
        if new_best { ", new high score!" } else { "" }
    );
    for (rank, entry) in level.high_scores().entries().iter().enumerate() {
        println!("  {}. {} {}", rank + 1, entry.name, entry.score);
    }
}
