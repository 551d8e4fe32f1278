//! Simulation world - the top-level container for a DST run.

use crate::context::SimContext;
use crate::error::SimError;
use crate::host::SimHost;
use crate::lock;
use crate::oracle::InvariantOracle;
use crate::seeds::{SeedProvider, Stream};

use opsviz_core::pulse::OrbGlow;
use opsviz_core::telemetry::find_preset;
use opsviz_core::{
    mount_clock_display, mount_feed, mount_pulse, ClockDisplay, HealthPulse, HealthStatus, MountStats,
    MountedScene, PulseConfig, Scene, SceneConfig, SceneKind, SceneSnapshot, TelemetryFeed,
};
use opsviz_env::{HostContext, Registration, SceneId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for all randomness
    pub seed: u64,

    /// Scene descriptor (kind, counts, layout)
    pub scene: SceneConfig,

    /// Display refresh rate in Hz
    pub frame_rate_hz: u32,

    /// Health indicator timing
    pub pulse: PulseConfig,

    /// Status shown by the health indicator
    pub status: HealthStatus,

    /// Telemetry presets fed on a timer (`screen.metric` keys)
    pub series: Vec<String>,

    /// Interval between telemetry regenerations
    pub feed_period: Duration,

    /// Keep calling frame callbacks after they are released
    pub lingering_frames: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            scene: SceneConfig::default(),
            frame_rate_hz: 60,
            pulse: PulseConfig::default(),
            status: HealthStatus::default(),
            series: vec!["dashboard.power".to_string()],
            feed_period: Duration::from_secs(5),
            lingering_frames: false,
        }
    }
}

impl SimConfig {
    /// Default config for `kind`.
    pub fn for_scene(seed: u64, kind: SceneKind) -> Self {
        Self {
            seed,
            scene: SceneConfig::for_kind(kind),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.feed_period.is_zero() {
            return Err(SimError::config("feed_period must be positive"));
        }
        self.scene.validate()?;
        self.pulse.validate()?;
        for key in &self.series {
            find_preset(key)?;
        }
        Ok(())
    }
}

/// A telemetry feed running on the host's timers.
pub struct FeedHandle {
    pub key: String,
    pub feed: Arc<Mutex<TelemetryFeed>>,
    _timer: Registration,
}

/// The simulation world.
///
/// Owns the virtual clock, the simulated host and whatever is mounted on
/// it. Everything random is drawn from streams of one [`SeedProvider`].
pub struct SimWorld {
    config: SimConfig,

    context: SimContext,

    host: SimHost,

    seeds: SeedProvider,

    /// Scene currently mounted, if any
    mounted: Option<MountedScene>,

    /// Number of mounts so far (also the topology stream instance)
    mounts: u32,

    oracle: InvariantOracle,

    pulse: Option<(Arc<Mutex<HealthPulse>>, Registration)>,

    clock: Option<(Arc<Mutex<ClockDisplay>>, Registration)>,

    feeds: Vec<FeedHandle>,

    tick_count: u64,
}

impl SimWorld {
    /// Creates a new simulation world with the given config.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let context = SimContext::new(config.seed);
        let mut host = SimHost::with_frame_rate(context.clone(), config.frame_rate_hz)?;
        if config.lingering_frames {
            host = host.with_lingering_frames();
        }

        info!(
            "SimWorld: seed={}, scene={}, {} Hz",
            config.seed, config.scene.kind, config.frame_rate_hz
        );

        Ok(Self {
            seeds: SeedProvider::new(config.seed),
            config,
            context,
            host,
            mounted: None,
            mounts: 0,
            oracle: InvariantOracle::new(),
            pulse: None,
            clock: None,
            feeds: Vec::new(),
            tick_count: 0,
        })
    }

    /// Builds the `instance`-th copy of the configured scene.
    ///
    /// The same instance always gets the same topology.
    pub fn build_scene(&self, instance: u32) -> Result<Scene, SimError> {
        let mut rng = self.seeds.rng(Stream::Topology, instance);
        Ok(Scene::build(self.config.scene.clone(), &mut rng)?)
    }

    /// Builds and mounts a fresh scene, replacing any mounted one.
    pub fn mount_scene(&mut self) -> Result<SceneId, SimError> {
        self.unmount_scene();

        let scene = self.build_scene(self.mounts)?;
        let id = self.seeds.scene_id(self.mounts);
        self.mounted = Some(opsviz_core::scheduler::mount_with_id(&self.host, scene, id));
        self.mounts += 1;
        self.oracle.reset_clock();
        Ok(id)
    }

    /// Unmounts the current scene, returning its counters.
    pub fn unmount_scene(&mut self) -> Option<MountStats> {
        self.mounted.take().map(MountedScene::unmount)
    }

    /// Starts the health pulse on the host's timers.
    pub fn start_pulse(&mut self) -> Result<(), SimError> {
        let rng = self.seeds.rng(Stream::Pulse, 0);
        let pulse = Arc::new(Mutex::new(HealthPulse::new(self.config.pulse, self.config.status, rng)?));
        let timer = mount_pulse(&self.host, &pulse);
        self.pulse = Some((pulse, timer));
        Ok(())
    }

    /// Starts the wall clock, reading the virtual clock's epoch time.
    pub fn start_clock(&mut self) {
        let display = Arc::new(Mutex::new(ClockDisplay::new()));
        let context = self.context.clone();
        let timer = mount_clock_display(&self.host, &display, move || context.system_time());
        self.clock = Some((display, timer));
    }

    /// Starts one timed feed per configured preset.
    pub fn start_feeds(&mut self) -> Result<(), SimError> {
        self.feeds.clear();
        for (i, key) in self.config.series.iter().enumerate() {
            let preset = find_preset(key)?;
            let rng = self.seeds.rng(Stream::Telemetry, i as u32);
            let feed = Arc::new(Mutex::new(TelemetryFeed::new(preset.shape, rng)));
            let timer = mount_feed(&self.host, &feed, self.config.feed_period);
            self.feeds.push(FeedHandle {
                key: key.clone(),
                feed,
                _timer: timer,
            });
        }
        debug!("Started {} telemetry feeds", self.feeds.len());
        Ok(())
    }

    /// Stops the pulse, the clock and all feeds.
    pub fn stop_timers(&mut self) {
        self.pulse = None;
        self.clock = None;
        self.feeds.clear();
    }

    /// Advances one frame period and checks the resulting frame.
    pub fn tick(&mut self) -> usize {
        self.advance(self.host.frame_period())
    }

    /// Advances by `dt`, refreshes once and checks the resulting frame.
    pub fn advance(&mut self, dt: Duration) -> usize {
        self.host.step(dt);
        self.tick_count += 1;
        self.observe()
    }

    /// Advances by `dt` with the refresh missed.
    pub fn stall(&mut self, dt: Duration) {
        self.host.stall(dt);
    }

    /// Runs the oracle over the mounted scene's latest frame.
    pub fn observe(&mut self) -> usize {
        let oracle = &mut self.oracle;
        self.mounted
            .as_ref()
            .map(|mounted| mounted.with_scene(|scene| oracle.observe(scene)))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> Option<SceneSnapshot> {
        self.mounted.as_ref().map(MountedScene::snapshot)
    }

    pub fn mounted(&self) -> Option<&MountedScene> {
        self.mounted.as_ref()
    }

    pub fn mounts(&self) -> u32 {
        self.mounts
    }

    pub fn oracle(&self) -> &InvariantOracle {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut InvariantOracle {
        &mut self.oracle
    }

    pub fn host(&self) -> &SimHost {
        &self.host
    }

    pub fn seeds(&self) -> SeedProvider {
        self.seeds
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn pulse(&self) -> Option<&Arc<Mutex<HealthPulse>>> {
        self.pulse.as_ref().map(|(pulse, _)| pulse)
    }

    /// Glow of the health orb, if the pulse is running.
    pub fn glow(&self) -> Option<OrbGlow> {
        self.pulse().map(|pulse| lock(pulse).glow())
    }

    /// `(time, date)` of the wall clock, if running.
    pub fn clock_labels(&self) -> Option<(String, String)> {
        self.clock.as_ref().map(|(display, _)| {
            let display = lock(display);
            (display.time().to_string(), display.date().to_string())
        })
    }

    pub fn clock_refreshes(&self) -> u64 {
        self.clock
            .as_ref()
            .map(|(display, _)| lock(display).refreshes())
            .unwrap_or(0)
    }

    pub fn feeds(&self) -> &[FeedHandle] {
        &self.feeds
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    /// Returns the number of refreshes driven through [`SimWorld::tick`]
    /// and [`SimWorld::advance`].
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
