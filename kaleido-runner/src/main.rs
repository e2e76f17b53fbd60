mod render;

use clap::Parser;
use crossbeam_channel::{bounded, Receiver};
use kaleido_config::{load_config, Config, ConfigError};
use kaleido_core::{EntityId, MotionEntity, MotionError, MotionSettings, Velocity, World};
use log::{error, info, warn};
use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::render::FramePresenter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the kaleidoscope configuration file
    #[arg(short, long, default_value = "kaleidoscope.json")]
    config: PathBuf,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(short, long)]
    seconds: Option<f64>,

    /// Seed for entity sizes and speeds, overriding the config file
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Error, Debug)]
enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Motion setup failed: {0}")]
    Motion(#[from] MotionError),

    #[error("Failed to write frame: {0}")]
    Output(#[from] io::Error),

    #[error("Failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Invalid duration for {name}: {secs} seconds")]
    InvalidDuration { name: &'static str, secs: f64 },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), RunnerError> {
    let mut config = load_config(&args.config)?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    info!("Using configuration from {}", args.config.display());

    let run_limit = args.seconds.map(|secs| seconds_to_duration("--seconds", secs)).transpose()?;
    let speed_interval = config
        .speed_change_secs
        .map(|secs| seconds_to_duration("speed_change_secs", secs))
        .transpose()?;

    let mut world = World::with_entities(motion_settings(&config), config.entity_count, config.seed)?;
    world.resize(config.viewport.width, config.viewport.height)?;
    info!(
        "Created {} entities in a {}x{} viewport",
        world.len(),
        config.viewport.width,
        config.viewport.height
    );

    let redraws = connect_redraw_channel(&world);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))?;

    world.start_all()?;

    let stdout = io::stdout();
    let mut presenter = FramePresenter::new(stdout.lock());
    let frame_duration = Duration::from_secs_f64(1.0 / config.frame_rate as f64);
    let started = Instant::now();
    let deadline = deadline_after(started, run_limit);
    let mut next_speed_change = deadline_after(started, speed_interval);

    info!("Presenting at {} FPS", config.frame_rate);

    // Presentation loop: this thread owns the output, ticker threads only
    // hand it redraw requests.
    while running.load(Ordering::SeqCst) {
        let frame_start = Instant::now();
        if deadline.is_some_and(|limit| frame_start >= limit) {
            break;
        }

        if let (Some(due), Some(interval)) = (next_speed_change, speed_interval) {
            if frame_start >= due {
                world.randomize_velocities()?;
                info!("Speeds changed: {:?}", speeds(world.entities()));
                next_speed_change = deadline_after(due, Some(interval));
            }
        }

        let pending = redraws.try_iter().count();
        presenter.present(pending, &world.snapshots())?;

        let elapsed = frame_start.elapsed();
        if elapsed < frame_duration {
            spin_sleep::sleep(frame_duration - elapsed);
        } else if config.frame_rate > 10 {
            warn!("Frame time exceeded budget: {:?} > {:?}", elapsed, frame_duration);
        }
    }

    world.pause_all();
    let stats = presenter.stats();
    info!(
        "Stopped after {} frames ({} idle), {} redraw requests",
        stats.frames_presented, stats.frames_skipped, stats.redraw_requests
    );
    Ok(())
}

fn seconds_to_duration(name: &'static str, secs: f64) -> Result<Duration, RunnerError> {
    Duration::try_from_secs_f64(secs).map_err(|_| RunnerError::InvalidDuration { name, secs })
}

/// An instant too far away to represent is treated as never.
fn deadline_after(start: Instant, wait: Option<Duration>) -> Option<Instant> {
    wait.and_then(|wait| start.checked_add(wait))
}

fn motion_settings(config: &Config) -> MotionSettings {
    let (dx, dy) = config.initial_velocity;
    MotionSettings {
        size_range: config.size_range,
        initial_velocity: Velocity { dx, dy },
        velocity_range: config.velocity_range,
        tick_interval: Duration::from_millis(config.tick_interval_ms),
    }
}

/// Observers run on ticker threads, so they only queue the entity id for the
/// presentation thread. A full queue already guarantees a redraw and the
/// request is dropped.
fn connect_redraw_channel(world: &World) -> Receiver<EntityId> {
    let (tx, rx) = bounded(world.len().max(1) * 4);
    world.subscribe_all(Arc::new(move |entity: &MotionEntity| {
        let _ = tx.try_send(entity.id());
    }));
    rx
}

fn speeds(entities: &[MotionEntity]) -> Vec<(i32, i32)> {
    entities
        .iter()
        .map(|entity| {
            let Velocity { dx, dy } = entity.velocity();
            (dx, dy)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let config = Config {
            size_range: (10, 20),
            initial_velocity: (-3, 7),
            velocity_range: (1, 5),
            tick_interval_ms: 15,
            ..Config::default()
        };
        let settings = motion_settings(&config);
        assert_eq!(settings.size_range, (10, 20));
        assert_eq!(settings.initial_velocity, Velocity { dx: -3, dy: 7 });
        assert_eq!(settings.velocity_range, (1, 5));
        assert_eq!(settings.tick_interval, Duration::from_millis(15));
    }

    #[test]
    fn unrepresentable_seconds_are_errors() {
        for secs in [f64::INFINITY, f64::NAN, 1e20, -1.0] {
            assert!(matches!(
                seconds_to_duration("--seconds", secs),
                Err(RunnerError::InvalidDuration { name: "--seconds", .. })
            ));
        }
        assert_eq!(
            seconds_to_duration("--seconds", 2.5).unwrap(),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn unreachable_deadline_means_never() {
        let started = Instant::now();
        assert_eq!(deadline_after(started, Some(Duration::MAX)), None);
        assert_eq!(deadline_after(started, None), None);
        assert_eq!(
            deadline_after(started, Some(Duration::from_secs(3))),
            Some(started + Duration::from_secs(3))
        );
    }

    #[test]
    fn redraw_requests_reach_the_channel() {
        let mut world = World::with_entities(MotionSettings::default(), 2, Some(1)).unwrap();
        world.resize(600, 600).unwrap();
        let rx = connect_redraw_channel(&world);

        world.step_all();

        let mut ids: Vec<EntityId> = rx.try_iter().collect();
        ids.sort();
        let mut expected: Vec<EntityId> = world.entities().iter().map(MotionEntity::id).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn full_channel_drops_requests_without_blocking() {
        let mut world = World::with_entities(MotionSettings::default(), 1, Some(2)).unwrap();
        world.resize(2000, 2000).unwrap();
        let rx = connect_redraw_channel(&world);

        for _ in 0..20 {
            world.step_all();
        }
        assert_eq!(rx.try_iter().count(), 4);
    }
}
