use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use actor_runtime::WorldConfig;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::content::{parse_armory, Armory, ContentError, DEFAULT_ARMORY_XML};

use super::bootstrap::AppWiring;
use super::save::{read_save, write_save, SaveError};
use super::scenario::{SimStats, Simulation};

const BUILTIN_ARMORY_PATH: &str = "<builtin armory>";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Simulated seconds to run before shutting down.
    pub run_seconds: f32,
    pub armory_path: Option<PathBuf>,
    pub save_path: Option<PathBuf>,
    pub load_path: Option<PathBuf>,
    pub world: WorldConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            run_seconds: 10.0,
            armory_path: None,
            save_path: None,
            load_path: None,
            world: WorldConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load armory content: {0}")]
    Content(#[from] ContentError),
    #[error(transparent)]
    Save(#[from] SaveError),
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_simulation(&app.config) {
        Ok(stats) => {
            info!(
                ticks = stats.ticks,
                projectiles = stats.projectiles_fired,
                impacts = stats.impacts,
                melee = stats.melee_exchanges,
                cancelled = stats.cancelled_rounds,
                deaths = stats.deaths,
                sounds = stats.sounds,
                "shutdown"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}

pub fn run_simulation(config: &LoopConfig) -> Result<SimStats, AppError> {
    let armory = load_armory(config.armory_path.as_deref())?;
    info!(weapons = armory.weapon_count(), "content_ready");
    let mut sim = match config.load_path.as_deref() {
        Some(path) => {
            let save = read_save(path)?;
            Simulation::from_save(armory, config.world, save)?
        }
        None => Simulation::demo(armory, config.world),
    };

    let pacing = Pacing::from_config(config);
    let dt_seconds = pacing.fixed_dt.as_secs_f32();
    info!(
        fixed_dt_ms = pacing.fixed_dt.as_secs_f64() * 1000.0,
        max_ticks_per_frame = pacing.max_ticks_per_frame,
        tick_budget = pacing.tick_budget,
        frame_cap_ms = pacing.frame_cap.as_millis() as u64,
        "loop_started"
    );

    let mut ticks_run = 0u64;
    let mut backlog = Duration::ZERO;
    let mut last_frame = Instant::now();
    let mut window = MetricsWindow::starting_at(last_frame);
    while ticks_run < pacing.tick_budget {
        let now = Instant::now();
        backlog += now
            .saturating_duration_since(last_frame)
            .min(pacing.frame_cap);
        last_frame = now;

        let plan = pacing.plan_frame(backlog);
        backlog = plan.carry;
        let ticks = u64::from(plan.ticks).min(pacing.tick_budget - ticks_run);
        for _ in 0..ticks {
            sim.tick(dt_seconds);
        }
        ticks_run += ticks;
        window.ticks += ticks;
        if !plan.dropped.is_zero() {
            window.dropped += plan.dropped;
            warn!(dropped_ms = plan.dropped.as_millis() as u64, "sim_backlog_dropped");
        }

        let span = now.saturating_duration_since(window.started);
        if span >= pacing.metrics_interval {
            let world = sim.world();
            info!(
                tps = window.ticks as f64 / span.as_secs_f64(),
                actors = world.len(),
                live_rounds = world.coordinator().len(),
                dropped_ms = window.dropped.as_millis() as u64,
                "loop_metrics"
            );
            window = MetricsWindow::starting_at(now);
        }

        let pending = backlog + last_frame.elapsed();
        if pending < pacing.fixed_dt {
            thread::sleep(pacing.fixed_dt - pending);
        }
    }

    if sim.is_settled() {
        info!(ticks = ticks_run, "simulation_settled");
    }
    if let Some(path) = config.save_path.as_deref() {
        write_save(path, &sim.to_save())?;
    }
    Ok(sim.stats())
}

fn load_armory(path: Option<&Path>) -> Result<Armory, ContentError> {
    match path {
        Some(path) => Armory::load(path),
        None => parse_armory(Path::new(BUILTIN_ARMORY_PATH), DEFAULT_ARMORY_XML),
    }
}

/// Loop timing resolved from `LoopConfig`, with zero values replaced.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Pacing {
    fixed_dt: Duration,
    frame_cap: Duration,
    max_ticks_per_frame: u32,
    metrics_interval: Duration,
    tick_budget: u64,
}

impl Pacing {
    fn from_config(config: &LoopConfig) -> Self {
        let defaults = LoopConfig::default();
        let target_tps = match config.target_tps {
            0 => defaults.target_tps,
            tps => tps,
        };
        let fixed_dt = Duration::from_secs_f64(1.0 / f64::from(target_tps));
        let tick_budget = if config.run_seconds.is_finite() && config.run_seconds > 0.0 {
            (f64::from(config.run_seconds) * f64::from(target_tps)).round() as u64
        } else {
            0
        };
        Self {
            fixed_dt,
            frame_cap: Some(config.max_frame_delta)
                .filter(|cap| !cap.is_zero())
                .unwrap_or(fixed_dt),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            metrics_interval: Some(config.metrics_log_interval)
                .filter(|interval| !interval.is_zero())
                .unwrap_or(defaults.metrics_log_interval),
            tick_budget,
        }
    }

    /// Splits the accumulated backlog into whole ticks. Whatever is still a
    /// full tick or more past the per-frame cap is dropped.
    fn plan_frame(&self, backlog: Duration) -> FramePlan {
        let step_nanos = self.fixed_dt.as_nanos().max(1);
        let due = backlog.as_nanos() / step_nanos;
        let ticks = due.min(u128::from(self.max_ticks_per_frame)) as u32;
        let carry = backlog.saturating_sub(self.fixed_dt * ticks);
        if due > u128::from(ticks) {
            FramePlan {
                ticks,
                carry: Duration::ZERO,
                dropped: carry,
            }
        } else {
            FramePlan {
                ticks,
                carry,
                dropped: Duration::ZERO,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FramePlan {
    ticks: u32,
    carry: Duration,
    dropped: Duration,
}

struct MetricsWindow {
    started: Instant,
    ticks: u64,
    dropped: Duration,
}

impl MetricsWindow {
    fn starting_at(started: Instant) -> Self {
        Self {
            started,
            ticks: 0,
            dropped: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pacing(target_tps: u32, max_ticks_per_frame: u32) -> Pacing {
        Pacing::from_config(&LoopConfig {
            target_tps,
            max_ticks_per_frame,
            ..LoopConfig::default()
        })
    }

    #[test]
    fn whole_ticks_consume_backlog_and_keep_the_remainder() {
        let pacing = pacing(50, 5);

        let exact = pacing.plan_frame(Duration::from_millis(60));
        assert_eq!(
            exact,
            FramePlan {
                ticks: 3,
                carry: Duration::ZERO,
                dropped: Duration::ZERO,
            }
        );

        let partial = pacing.plan_frame(Duration::from_millis(50));
        assert_eq!(partial.ticks, 2);
        assert_eq!(partial.carry, Duration::from_millis(10));
        assert!(partial.dropped.is_zero());
    }

    #[test]
    fn backlog_past_the_tick_cap_is_dropped() {
        let pacing = pacing(50, 3);

        let plan = pacing.plan_frame(Duration::from_millis(130));

        assert_eq!(plan.ticks, 3);
        assert!(plan.carry.is_zero());
        assert_eq!(plan.dropped, Duration::from_millis(70));
    }

    #[test]
    fn less_than_a_tick_past_the_cap_is_carried() {
        let pacing = pacing(50, 3);

        let plan = pacing.plan_frame(Duration::from_millis(75));

        assert_eq!(plan.ticks, 3);
        assert_eq!(plan.carry, Duration::from_millis(15));
        assert!(plan.dropped.is_zero());
    }

    #[test]
    fn zero_config_values_fall_back() {
        let pacing = Pacing::from_config(&LoopConfig {
            target_tps: 0,
            max_frame_delta: Duration::ZERO,
            max_ticks_per_frame: 0,
            metrics_log_interval: Duration::ZERO,
            ..LoopConfig::default()
        });

        assert_eq!(pacing.fixed_dt, Duration::from_secs_f64(1.0 / 60.0));
        assert_eq!(pacing.frame_cap, pacing.fixed_dt);
        assert_eq!(pacing.max_ticks_per_frame, 1);
        assert_eq!(pacing.metrics_interval, Duration::from_secs(1));
    }

    #[test]
    fn tick_budget_covers_only_positive_run_lengths() {
        let budget = |run_seconds: f32| {
            Pacing::from_config(&LoopConfig {
                run_seconds,
                ..LoopConfig::default()
            })
            .tick_budget
        };
        assert_eq!(budget(0.5), 30);
        assert_eq!(budget(0.0), 0);
        assert_eq!(budget(-1.0), 0);
        assert_eq!(budget(f32::NAN), 0);
    }

    #[test]
    fn short_run_writes_a_loadable_save() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let save_path = dir.path().join("actor_sim.json");
        let config = LoopConfig {
            target_tps: 120,
            run_seconds: 0.1,
            save_path: Some(save_path.clone()),
            ..LoopConfig::default()
        };

        let stats = run_simulation(&config).expect("run");
        assert_eq!(stats.ticks, 12);

        let resumed = LoopConfig {
            load_path: Some(save_path),
            save_path: None,
            ..config
        };
        let stats = run_simulation(&resumed).expect("resume");
        assert_eq!(stats.ticks, 24);
    }

    #[test]
    fn missing_armory_file_is_reported() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let config = LoopConfig {
            run_seconds: 0.0,
            armory_path: Some(dir.path().join("missing.xml")),
            ..LoopConfig::default()
        };

        let err = run_simulation(&config).expect_err("missing armory");
        assert!(matches!(err, AppError::Content(_)));
    }
}
