//! Scenario runner - executes lifecycle test scenarios.

use crate::error::SimError;
use crate::exporter::{HealthFrame, SeriesFrame, SimEvent, SimExport, SimFrame};
use crate::lock;
use crate::oracle::InvariantOracle;
use crate::scenarios::ScenarioId;
use crate::seeds::Stream;
use crate::visualizer::RerunLogger;
use crate::world::{SimConfig, SimWorld};

use opsviz_core::pulse::time_label;
use opsviz_core::telemetry::{label, PRESETS};
use opsviz_core::{SceneConfig, SceneKind, SceneSnapshot, TelemetryFeed};
use opsviz_env::HostContext;
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Longest refresh stall injected by `frame_stall`, in seconds.
const MAX_STALL_SECS: f64 = 2.0;

/// Recorded frames compared by `rewind`.
const REWIND_SAMPLES: u64 = 16;

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Scene the scenario drove
    pub scene: SceneKind,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Refreshes driven
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Entities in the last mounted scene
    pub entity_count: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Frame callbacks delivered by the host
    pub frames_delivered: u64,

    /// Refreshes skipped by stalls
    pub frames_stalled: u64,

    /// Refreshes that did not advance scene time
    pub stale_frames: u64,

    /// Frames checked by the oracle
    pub frames_checked: u64,

    /// Entity states checked by the oracle
    pub entity_checks: u64,

    /// Recorded frames re-evaluated
    pub rewinds_checked: u64,

    /// Invariant violations found
    pub violations: u64,

    /// Scene mounts
    pub mounts: u32,

    /// Calls to released callbacks by a lingering host
    pub lingering_calls: u64,

    /// Timer task executions
    pub timer_fires: u64,

    /// Health pulses started
    pub pulses: u64,

    /// Wall clock refreshes
    pub clock_refreshes: u64,

    /// Telemetry series generated across all feeds
    pub series_generations: u64,
}

/// Collects assertion failures for one run.
#[derive(Default)]
struct Checks {
    failures: Vec<String>,
}

impl Checks {
    fn require(&mut self, ok: bool, failure: impl FnOnce() -> String) {
        if !ok {
            let failure = failure();
            warn!("  ✗ {}", failure);
            self.failures.push(failure);
        }
    }

    fn reason(&self) -> Option<String> {
        if self.failures.is_empty() {
            None
        } else {
            Some(self.failures.join("; "))
        }
    }
}

/// Frame capture for exports and the Rerun viewer.
struct Recorder<'a> {
    export: Option<&'a mut SimExport>,
    every: u64,
    logger: Option<&'a RerunLogger>,
}

impl<'a> Recorder<'a> {
    fn logging(&self) -> Option<&'a RerunLogger> {
        self.logger.filter(|logger| logger.is_enabled())
    }

    fn capture(&mut self, world: &SimWorld) {
        let due = self.export.is_some() && world.tick_count() % self.every == 0;
        let logger = self.logging();
        if !due && logger.is_none() {
            return;
        }

        let snapshot = world.snapshot();
        if let Some(logger) = logger {
            logger.set_time(world.time());
            if let Some(snapshot) = &snapshot {
                logger.log_snapshot(snapshot);
            }
            if let Some(glow) = world.glow() {
                logger.log_scalar("health/opacity", glow.opacity);
            }
        }

        if due {
            let frame = frame_of(world, snapshot.as_ref());
            if let Some(export) = self.export.as_deref_mut() {
                export.add_frame(frame);
            }
        }
    }

    fn event(&mut self, world: &SimWorld, event: SimEvent) {
        if let Some(logger) = self.logging() {
            logger.log_event("events", &event.message);
        }
        if let Some(export) = self.export.as_deref_mut() {
            let mut frame = SimFrame::at(world.time());
            frame.events.push(event);
            export.add_frame(frame);
        }
    }
}

fn frame_of(world: &SimWorld, snapshot: Option<&SceneSnapshot>) -> SimFrame {
    let mut frame = SimFrame::at(world.time());
    if let Some(snapshot) = snapshot {
        frame = frame.with_snapshot(snapshot);
    }
    if let Some(pulse) = world.pulse() {
        let pulse = lock(pulse);
        frame.health = Some(HealthFrame::new(&pulse.glow(), pulse.pulses()));
    }
    frame.clock = world.clock_labels().map(|(time, _)| time);
    frame.series = world
        .feeds()
        .iter()
        .map(|handle| {
            let feed = lock(&handle.feed);
            SeriesFrame::new(&handle.key, feed.generation(), feed.latest())
        })
        .collect();
    frame
}

/// Runs lifecycle scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Scene descriptor
    scene: SceneConfig,

    /// Refresh rate in Hz
    frame_rate_hz: u32,

    /// Simulated duration in seconds
    duration_secs: f64,

    /// Telemetry presets; `None` means the scenario's default
    series: Option<Vec<String>>,

    /// Optional live viewer
    logger: Option<RerunLogger>,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            scene: SceneConfig::default(),
            frame_rate_hz: 60,
            duration_secs: 10.0,
            series: None,
            logger: None,
        }
    }

    /// Uses the stock config of `kind`.
    pub fn with_scene(mut self, kind: SceneKind) -> Self {
        self.scene = SceneConfig::for_kind(kind);
        self
    }

    pub fn with_scene_config(mut self, config: SceneConfig) -> Self {
        self.scene = config;
        self
    }

    /// Sets the refresh rate.
    pub fn with_frame_rate(mut self, hz: u32) -> Self {
        self.frame_rate_hz = hz;
        self
    }

    /// Sets the simulated duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    /// Restricts telemetry to the given `screen.metric` presets.
    pub fn with_series(mut self, keys: Vec<String>) -> Self {
        self.series = Some(keys);
        self
    }

    pub fn with_logger(mut self, logger: RerunLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.execute(scenario, None, 1)
    }

    /// Runs a scenario, exporting every `every`-th frame.
    pub fn run_with_export(&self, scenario: ScenarioId, every: u64) -> (ScenarioResult, SimExport) {
        let mut export = SimExport::new(scenario.name(), self.scene.kind.name(), self.seed);
        let result = self.execute(scenario, Some(&mut export), every.max(1));
        export.finalize(result.passed, result.failure_reason.clone());
        (result, export)
    }

    /// Runs every scenario.
    pub fn run_all(&self) -> Vec<ScenarioResult> {
        ScenarioId::all().into_iter().map(|s| self.run(s)).collect()
    }

    fn execute(&self, scenario: ScenarioId, export: Option<&mut SimExport>, every: u64) -> ScenarioResult {
        info!(
            "Starting scenario: {} (seed={}, scene={})",
            scenario.name(),
            self.seed,
            self.scene.kind
        );

        let mut recorder = Recorder {
            export,
            every,
            logger: self.logger.as_ref(),
        };

        let outcome = self.validate().and_then(|_| match scenario {
            ScenarioId::SteadyState => self.run_steady_state(&mut recorder),
            ScenarioId::FrameStall => self.run_frame_stall(&mut recorder),
            ScenarioId::RemountChurn => self.run_remount_churn(&mut recorder),
            ScenarioId::Rewind => self.run_rewind(&mut recorder),
            ScenarioId::PulseSoak => self.run_pulse_soak(&mut recorder),
            ScenarioId::TelemetrySweep => self.run_telemetry_sweep(&mut recorder),
        });

        outcome.unwrap_or_else(|e| {
            warn!("Scenario {} could not start: {}", scenario.name(), e);
            ScenarioResult {
                scenario,
                seed: self.seed,
                scene: self.scene.kind,
                passed: false,
                total_ticks: 0,
                final_time_secs: 0.0,
                entity_count: 0,
                failure_reason: Some(e.to_string()),
                metrics: ScenarioMetrics::default(),
            }
        })
    }

    fn validate(&self) -> Result<(), SimError> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(SimError::config(format!(
                "duration must be positive, got {}",
                self.duration_secs
            )));
        }
        Ok(())
    }

    fn sim_config(&self, default_series: Vec<String>) -> SimConfig {
        SimConfig {
            seed: self.seed,
            scene: self.scene.clone(),
            frame_rate_hz: self.frame_rate_hz,
            series: self.series.clone().unwrap_or(default_series),
            ..Default::default()
        }
    }

    fn world(&self) -> Result<SimWorld, SimError> {
        SimWorld::new(self.sim_config(Vec::new()))
    }

    fn frame_count(&self) -> u64 {
        ((self.duration_secs * self.frame_rate_hz as f64).round() as u64).max(1)
    }

    /// Assembles the result; oracle violations fail the run.
    fn finish(
        &self,
        scenario: ScenarioId,
        world: &SimWorld,
        mut checks: Checks,
        mut metrics: ScenarioMetrics,
    ) -> ScenarioResult {
        let counters = world.host().counters();
        let oracle = world.oracle();

        metrics.frames_delivered = counters.frames_delivered;
        metrics.frames_stalled = counters.frames_stalled;
        metrics.lingering_calls = counters.lingering_calls;
        metrics.timer_fires = counters.timer_fires;
        metrics.frames_checked += oracle.frames_checked();
        metrics.entity_checks += oracle.entity_checks();
        metrics.violations += oracle.total_violations();
        metrics.mounts = world.mounts();
        if let Some(mounted) = world.mounted() {
            metrics.stale_frames = mounted.stale_frames();
        }

        checks.require(oracle.is_clean(), || {
            format!(
                "{} invariant violations, first: {}",
                oracle.total_violations(),
                oracle
                    .first_violation()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            )
        });

        let failure_reason = checks.reason();
        ScenarioResult {
            scenario,
            seed: self.seed,
            scene: self.scene.kind,
            passed: failure_reason.is_none(),
            total_ticks: world.tick_count(),
            final_time_secs: world.time(),
            entity_count: world
                .mounted()
                .map(|m| m.with_scene(|scene| scene.entities().len()))
                .unwrap_or(0),
            failure_reason,
            metrics,
        }
    }

    /// DST-001: SteadyState - fixed frame rate.
    ///
    /// **Assertion**: every refresh ticks the scene exactly once, the
    /// scene's elapsed time matches the host clock, no invariant breaks.
    fn run_steady_state(&self, recorder: &mut Recorder<'_>) -> Result<ScenarioResult, SimError> {
        info!("DST-001: SteadyState - {} frames", self.frame_count());

        let mut world = self.world()?;
        world.mount_scene()?;
        let frames = self.frame_count();

        for _ in 0..frames {
            world.tick();
            recorder.capture(&world);
        }

        let mut checks = Checks::default();
        if let Some(mounted) = world.mounted() {
            let period = world.host().frame_period().as_secs_f64();
            let expected = (frames - 1) as f64 * period;
            let elapsed = mounted.elapsed().unwrap_or(f64::NAN);

            checks.require(mounted.tick_count() == frames, || {
                format!("{} ticks for {} frames", mounted.tick_count(), frames)
            });
            checks.require(mounted.stale_frames() == 0, || {
                format!("{} stale frames at a fixed rate", mounted.stale_frames())
            });
            checks.require((elapsed - expected).abs() < 1e-6, || {
                format!("scene time {:.6}s, host elapsed {:.6}s", elapsed, expected)
            });
        }

        Ok(self.finish(ScenarioId::SteadyState, &world, checks, ScenarioMetrics::default()))
    }

    /// DST-002: FrameStall - refreshes missed for up to 2s at random.
    ///
    /// **Assertion**: a stall is followed by exactly one frame (no
    /// catch-up), a repeated refresh at the same instant is stale, scene
    /// time stays strictly increasing.
    fn run_frame_stall(&self, recorder: &mut Recorder<'_>) -> Result<ScenarioResult, SimError> {
        info!("DST-002: FrameStall - stalls up to {:.1}s", MAX_STALL_SECS);

        let mut world = self.world()?;
        world.mount_scene()?;
        let mut rng = world.seeds().rng(Stream::FrameJitter, 0);
        let stall = Uniform::new_inclusive(world.host().frame_period().as_secs_f64(), MAX_STALL_SECS);

        let mut ticks = 0u64;
        let mut repeats = 0u64;
        let mut stalls = 0u64;
        let mut refreshed_last = false;
        let mut checks = Checks::default();

        for _ in 0..self.frame_count() {
            let roll: f64 = rng.gen();
            if roll < 0.1 {
                let dt = Duration::from_secs_f64(stall.sample(&mut rng));
                world.stall(dt);
                stalls += 1;

                let delivered = world.host().counters().frames_delivered;
                world.tick();
                ticks += 1;
                refreshed_last = true;
                let after = world.host().counters().frames_delivered;
                checks.require(after == delivered + 1, || {
                    format!("{} frames delivered after a {:?} stall", after - delivered, dt)
                });
                recorder.event(&world, SimEvent::warn(format!("refresh stalled for {:?}", dt)));
            } else if roll < 0.15 && refreshed_last {
                world.advance(Duration::ZERO);
                repeats += 1;
            } else {
                world.tick();
                ticks += 1;
                refreshed_last = true;
            }
            recorder.capture(&world);
        }

        debug!("  stalls={} repeats={} ticks={}", stalls, repeats, ticks);

        if let Some(mounted) = world.mounted() {
            checks.require(mounted.tick_count() == ticks, || {
                format!("{} ticks, expected {}", mounted.tick_count(), ticks)
            });
            checks.require(mounted.stale_frames() == repeats, || {
                format!("{} stale frames, expected {}", mounted.stale_frames(), repeats)
            });
        }
        let counters = world.host().counters();
        checks.require(counters.frames_stalled == stalls, || {
            format!("{} stalls recorded, {} injected", counters.frames_stalled, stalls)
        });

        Ok(self.finish(ScenarioId::FrameStall, &world, checks, ScenarioMetrics::default()))
    }

    /// DST-003: RemountChurn - mount/unmount cycles on a lingering host.
    ///
    /// **Assertion**: every mount starts at t = 0 with a fresh id, an
    /// unmounted scene receives no live frames, callbacks a host keeps
    /// calling after release are harmless.
    fn run_remount_churn(&self, recorder: &mut Recorder<'_>) -> Result<ScenarioResult, SimError> {
        let cycles = (self.duration_secs.ceil() as u32).clamp(3, 50);
        let frames_per_cycle = (self.frame_count() / u64::from(cycles)).max(2);
        info!("DST-003: RemountChurn - {} cycles x {} frames", cycles, frames_per_cycle);

        let mut config = self.sim_config(Vec::new());
        config.lingering_frames = true;
        let mut world = SimWorld::new(config)?;

        let mut checks = Checks::default();
        let mut ids = HashSet::new();

        for cycle in 0..cycles {
            let id = world.mount_scene()?;
            ids.insert(id);
            recorder.event(&world, SimEvent::info(format!("mounted {}", id)));

            for frame in 0..frames_per_cycle {
                world.tick();
                recorder.capture(&world);
                if frame == 0 {
                    let elapsed = world.mounted().and_then(|m| m.elapsed());
                    checks.require(elapsed == Some(0.0), || {
                        format!("cycle {} started at t={:?}", cycle, elapsed)
                    });
                }
            }

            let stats = world.unmount_scene().unwrap_or_default();
            checks.require(stats.ticks == frames_per_cycle, || {
                format!("cycle {}: {} ticks for {} frames", cycle, stats.ticks, frames_per_cycle)
            });

            let delivered = world.host().counters().frames_delivered;
            world.tick();
            world.tick();
            let after = world.host().counters().frames_delivered;
            checks.require(after == delivered, || {
                format!("cycle {}: {} frames delivered after unmount", cycle, after - delivered)
            });
            recorder.event(&world, SimEvent::info(format!("unmounted {} after {} ticks", id, stats.ticks)));
        }

        checks.require(ids.len() == cycles as usize, || {
            format!("{} distinct scene ids over {} mounts", ids.len(), cycles)
        });
        checks.require(world.host().active_frames() == 0, || {
            format!("{} frame callbacks still registered", world.host().active_frames())
        });
        checks.require(world.host().counters().lingering_calls > 0, || {
            "lingering host never called a released callback".to_string()
        });

        Ok(self.finish(ScenarioId::RemountChurn, &world, checks, ScenarioMetrics::default()))
    }

    /// DST-004: Rewind - recorded frames reproduced after the fact.
    ///
    /// **Assertion**: re-evaluating the live scene, and a scene rebuilt from
    /// the same seed, at any recorded t gives the recorded frame, in any
    /// order.
    fn run_rewind(&self, recorder: &mut Recorder<'_>) -> Result<ScenarioResult, SimError> {
        info!("DST-004: Rewind - {} recorded frames", REWIND_SAMPLES);

        let mut world = self.world()?;
        world.mount_scene()?;
        let frames = self.frame_count();
        let every = (frames / REWIND_SAMPLES).max(1);

        let mut recorded: Vec<SceneSnapshot> = Vec::new();
        for frame in 0..frames {
            world.tick();
            recorder.capture(&world);
            if frame % every == 0 {
                recorded.extend(world.snapshot());
            }
        }

        let mut rewind = InvariantOracle::new();
        if let Some(mounted) = world.mounted() {
            mounted.with_scene(|scene| {
                for snapshot in &recorded {
                    rewind.check_rewind(scene, snapshot);
                }
            });
        }

        // Rebuilt scene, replayed newest first through the arena
        let mut rebuilt = world.build_scene(0)?;
        let mut mismatched = 0;
        for snapshot in recorded.iter().rev() {
            rewind.check_rewind(&rebuilt, snapshot);
            if let Some(t) = snapshot.t {
                rebuilt.evaluate(t);
                if rebuilt.snapshot().entities != snapshot.entities {
                    mismatched += 1;
                }
            }
        }

        let mut checks = Checks::default();
        checks.require(!recorded.is_empty(), || "no frames recorded".to_string());
        checks.require(rewind.is_clean(), || {
            format!(
                "{} rewind mismatches, first: {}",
                rewind.total_violations(),
                rewind
                    .first_violation()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            )
        });
        checks.require(mismatched == 0, || {
            format!("{} rebuilt frames differ from the recording", mismatched)
        });

        let metrics = ScenarioMetrics {
            rewinds_checked: rewind.rewinds_checked(),
            violations: rewind.total_violations(),
            ..Default::default()
        };
        Ok(self.finish(ScenarioId::Rewind, &world, checks, metrics))
    }

    /// DST-005: PulseSoak - pulse, clock and scene sharing one host.
    ///
    /// **Assertion**: pulse count stays within what the interval bounds
    /// allow, the orb glow follows the pulse phase, the clock refreshes
    /// once per second and shows virtual wall time, stopped timers stay
    /// stopped.
    fn run_pulse_soak(&self, recorder: &mut Recorder<'_>) -> Result<ScenarioResult, SimError> {
        info!("DST-005: PulseSoak");

        let mut world = self.world()?;
        world.start_pulse()?;
        world.start_clock();
        world.mount_scene()?;

        let mut checks = Checks::default();
        let mut pulsing_frames = 0u64;
        let frames = self.frame_count();

        for _ in 0..frames {
            world.tick();
            recorder.capture(&world);

            if let (Some(pulse), Some(glow)) = (world.pulse(), world.glow()) {
                let pulsing = lock(pulse).is_pulsing();
                if pulsing {
                    pulsing_frames += 1;
                }
                let expected = if pulsing { (0.3, 1.1) } else { (0.2, 1.0) };
                checks.require((glow.opacity, glow.scale) == expected, || {
                    format!(
                        "glow {:?} while {}",
                        (glow.opacity, glow.scale),
                        if pulsing { "pulsing" } else { "idle" }
                    )
                });
            }
        }

        let elapsed = world.time();
        let pulse_config = world.config().pulse;
        let shortest = pulse_config.base_interval_ms as f64 / 1000.0;
        let longest = (pulse_config.base_interval_ms + pulse_config.jitter_ms) as f64 / 1000.0;
        let pulses = world.pulse().map(|p| lock(p).pulses()).unwrap_or(0);

        let fewest = (elapsed / longest).floor() as u64;
        let most = (elapsed / shortest).floor() as u64;
        checks.require((fewest..=most).contains(&pulses), || {
            format!("{} pulses in {:.2}s, expected {}..={}", pulses, elapsed, fewest, most)
        });

        if pulses >= 3 {
            let duty = pulsing_frames as f64 / frames as f64;
            let pulse_secs = pulse_config.pulse_ms as f64 / 1000.0;
            let ceiling = pulse_secs / shortest + pulse_secs / elapsed + 1.0 / frames as f64;
            checks.require(duty <= ceiling, || {
                format!("pulsing {:.1}% of frames, ceiling {:.1}%", duty * 100.0, ceiling * 100.0)
            });
        }

        let refreshes = world.clock_refreshes();
        let expected_refreshes = 1 + elapsed.floor() as u64;
        checks.require(refreshes == expected_refreshes, || {
            format!("clock refreshed {} times, expected {}", refreshes, expected_refreshes)
        });

        let wall = world
            .host()
            .context()
            .system_time()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let shown = world.clock_labels().map(|(time, _)| time);
        checks.require(shown.as_deref() == Some(time_label(wall).as_str()), || {
            format!("clock shows {:?}, wall time is {}", shown, time_label(wall))
        });

        // Timers released with their owners
        world.stop_timers();
        let fires = world.host().counters().timer_fires;
        for _ in 0..self.frame_rate_hz.max(1) * 4 {
            world.tick();
        }
        checks.require(world.host().counters().timer_fires == fires, || {
            "timers fired after being stopped".to_string()
        });
        checks.require(world.host().active_timers() == 0, || {
            format!("{} timers still armed", world.host().active_timers())
        });

        let metrics = ScenarioMetrics {
            pulses,
            clock_refreshes: refreshes,
            ..Default::default()
        };
        debug!("  pulses={} clock_refreshes={}", pulses, refreshes);
        Ok(self.finish(ScenarioId::PulseSoak, &world, checks, metrics))
    }

    /// DST-006: TelemetrySweep - every preset on a regeneration timer.
    ///
    /// **Assertion**: each feed regenerated once per period, every series
    /// has 24 labelled non-negative finite samples, replaying a feed's
    /// stream reproduces its latest series.
    fn run_telemetry_sweep(&self, recorder: &mut Recorder<'_>) -> Result<ScenarioResult, SimError> {
        let all: Vec<String> = PRESETS.iter().map(|p| p.key()).collect();
        let mut world = SimWorld::new(self.sim_config(all))?;
        world.start_feeds()?;
        info!("DST-006: TelemetrySweep - {} feeds", world.feeds().len());

        for _ in 0..self.frame_count() {
            world.tick();
            recorder.capture(&world);
        }

        let period = world.config().feed_period.as_secs_f64();
        let expected_generation = 1 + (world.time() / period).floor() as u64;
        let mut checks = Checks::default();
        let mut generations = 0;

        for (i, handle) in world.feeds().iter().enumerate() {
            let feed = lock(&handle.feed);
            let samples = feed.latest();
            generations += feed.generation();

            checks.require(feed.generation() == expected_generation, || {
                format!("{}: generation {}, expected {}", handle.key, feed.generation(), expected_generation)
            });
            checks.require(samples.len() == feed.shape().count, || {
                format!("{}: {} samples", handle.key, samples.len())
            });
            checks.require(
                samples.iter().all(|s| s.value.is_finite() && s.value >= 0.0),
                || format!("{}: negative or non-finite sample", handle.key),
            );
            checks.require(
                samples.iter().enumerate().all(|(j, s)| s.label == label(j)),
                || format!("{}: unexpected labels", handle.key),
            );

            let mut replay = TelemetryFeed::new(*feed.shape(), world.seeds().rng(Stream::Telemetry, i as u32));
            for _ in 1..feed.generation() {
                replay.regenerate();
            }
            checks.require(replay.latest() == samples, || {
                format!("{}: replay diverged", handle.key)
            });
        }

        let metrics = ScenarioMetrics {
            series_generations: generations,
            ..Default::default()
        };
        Ok(self.finish(ScenarioId::TelemetrySweep, &world, checks, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(kind: SceneKind) -> ScenarioRunner {
        ScenarioRunner::new(42).with_scene(kind).with_duration(5.0)
    }

    #[test]
    fn test_every_scenario_passes_on_default_scene() {
        for scenario in ScenarioId::all() {
            let result = ScenarioRunner::new(7).with_duration(6.0).run(scenario);
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
        }
    }

    #[test]
    fn test_steady_state_on_every_scene() {
        for kind in SceneKind::all() {
            let result = runner(kind).run(ScenarioId::SteadyState);
            assert!(result.passed, "{}: {:?}", kind, result.failure_reason);
            assert_eq!(result.total_ticks, 300);
            assert!(result.entity_count > 0);
        }
    }

    #[test]
    fn test_frame_stall_across_seeds() {
        for seed in 0..8 {
            let result = ScenarioRunner::new(seed)
                .with_scene(SceneKind::Warehouse)
                .with_duration(4.0)
                .run(ScenarioId::FrameStall);
            assert!(result.passed, "seed {}: {:?}", seed, result.failure_reason);
        }
    }

    #[test]
    fn test_remount_churn_reports_lingering_calls() {
        let result = runner(SceneKind::ServerRoom).run(ScenarioId::RemountChurn);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.mounts, 5);
        assert!(result.metrics.lingering_calls > 0);
    }

    #[test]
    fn test_rewind_checks_recorded_frames() {
        let result = runner(SceneKind::NeuralNetwork).run(ScenarioId::Rewind);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.rewinds_checked >= REWIND_SAMPLES);
    }

    #[test]
    fn test_pulse_soak_counts_pulses() {
        let result = ScenarioRunner::new(3).with_duration(20.0).run(ScenarioId::PulseSoak);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!((6..=10).contains(&result.metrics.pulses));
        assert!(result.metrics.clock_refreshes >= 20);
    }

    #[test]
    fn test_telemetry_sweep_covers_presets() {
        let result = ScenarioRunner::new(11).with_duration(12.0).run(ScenarioId::TelemetrySweep);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.series_generations, PRESETS.len() as u64 * 3);
    }

    #[test]
    fn test_unknown_series_fails_cleanly() {
        let result = ScenarioRunner::new(1)
            .with_series(vec!["engine.warp".to_string()])
            .run(ScenarioId::TelemetrySweep);
        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().contains("engine.warp"));
    }

    #[test]
    fn test_non_positive_duration_fails_cleanly() {
        let result = ScenarioRunner::new(1).with_duration(0.0).run(ScenarioId::SteadyState);
        assert!(!result.passed);
        assert_eq!(result.total_ticks, 0);
    }

    #[test]
    fn test_same_seed_same_result() {
        let a = runner(SceneKind::AlertNetwork).run(ScenarioId::FrameStall);
        let b = runner(SceneKind::AlertNetwork).run(ScenarioId::FrameStall);
        assert_eq!(a.final_time_secs, b.final_time_secs);
        assert_eq!(a.metrics.frames_delivered, b.metrics.frames_delivered);
        assert_eq!(a.metrics.stale_frames, b.metrics.stale_frames);
    }

    #[test]
    fn test_export_collects_frames() {
        let (result, export) = runner(SceneKind::EngineAssembly).run_with_export(ScenarioId::SteadyState, 30);
        assert!(result.passed);
        assert!(export.passed);
        assert_eq!(export.frames.len(), 10);
        assert!(export.frames.iter().all(|f| !f.entities.is_empty()));
    }
}
