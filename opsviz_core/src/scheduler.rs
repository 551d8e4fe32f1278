//! The Animation Scheduler
//!
//! Mounting a scene registers one frame callback with the host. On every
//! refresh the callback converts the host's monotonic time into scene
//! time and re-evaluates every entity into the arena.
//!
//! # Lifetime
//!
//! ```text
//! mount()                    host refresh                 unmount / drop
//!   |-- on_frame(cb) ----------->|                              |
//!   |<-- Registration -----------|                              |
//!   |                            |-- cb(now) -> evaluate(t)     |
//!   |                            |-- cb(now) -> evaluate(t')    |
//!   |-- Registration dropped ---------------------------------->|
//!   |                            (no further cb)                |
//! ```
//!
//! The callback only holds a weak reference to the scene. If a host keeps
//! calling after teardown, the upgrade fails and the frame is skipped.

use crate::scene::{Scene, SceneKind, SceneSnapshot};
use crate::telemetry::TelemetryFeed;
use opsviz_env::{RefreshSource, Registration, SceneId, TimerSource};
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, info};

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-scene elapsed time.
///
/// The origin is the host time of the first refresh after mount, so a
/// freshly mounted scene always starts at `t = 0`. Only strictly
/// increasing times are handed out.
#[derive(Debug, Clone, Default)]
pub struct SceneClock {
    origin: Option<Duration>,
    last: Option<f64>,
}

impl SceneClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock whose zero is `origin` rather than the first refresh.
    pub fn starting_at(origin: Duration) -> Self {
        Self {
            origin: Some(origin),
            last: None,
        }
    }

    /// Scene time for host time `now`, or `None` if it would not advance.
    pub fn advance(&mut self, now: Duration) -> Option<f64> {
        let origin = *self.origin.get_or_insert(now);
        let t = now.saturating_sub(origin).as_secs_f64();
        match self.last {
            Some(last) if t <= last => None,
            _ => {
                self.last = Some(t);
                Some(t)
            }
        }
    }

    /// Last time handed out.
    pub fn last(&self) -> Option<f64> {
        self.last
    }
}

struct SceneRuntime {
    scene: Scene,
    clock: SceneClock,
    ticks: u64,
    stale_frames: u64,
}

impl SceneRuntime {
    fn tick(&mut self, now: Duration) {
        match self.clock.advance(now) {
            Some(t) => {
                self.scene.evaluate(t);
                self.ticks += 1;
            }
            None => self.stale_frames += 1,
        }
    }
}

/// Counters reported when a scene is unmounted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MountStats {
    /// Frames that advanced the scene
    pub ticks: u64,
    /// Frames dropped because time did not advance
    pub stale_frames: u64,
    /// Scene time of the last tick
    pub elapsed: Option<f64>,
}

/// A scene registered with a refresh source.
///
/// Owns the frame registration. Dropping the handle (or calling
/// [`MountedScene::unmount`]) deregisters the callback and retires the
/// scene's arena records.
pub struct MountedScene {
    id: SceneId,
    kind: SceneKind,
    runtime: Arc<Mutex<SceneRuntime>>,
    frames: Option<Registration>,
}

/// Mounts `scene` on `refresh`.
pub fn mount(refresh: &dyn RefreshSource, scene: Scene) -> MountedScene {
    mount_with_id(refresh, scene, SceneId::new())
}

/// Mounts `scene` under a caller-chosen id (deterministic in simulation).
pub fn mount_with_id(refresh: &dyn RefreshSource, scene: Scene, id: SceneId) -> MountedScene {
    let kind = scene.kind();
    let runtime = Arc::new(Mutex::new(SceneRuntime {
        scene,
        clock: SceneClock::new(),
        ticks: 0,
        stale_frames: 0,
    }));

    let weak: Weak<Mutex<SceneRuntime>> = Arc::downgrade(&runtime);
    let frames = refresh.on_frame(Box::new(move |now| {
        let Some(runtime) = weak.upgrade() else {
            return;
        };
        lock(&runtime).tick(now);
    }));

    info!("Mounted scene {} ({})", kind, id);

    MountedScene {
        id,
        kind,
        runtime,
        frames: Some(frames),
    }
}

impl MountedScene {
    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn kind(&self) -> SceneKind {
        self.kind
    }

    /// Frames that advanced the scene so far.
    pub fn tick_count(&self) -> u64 {
        lock(&self.runtime).ticks
    }

    /// Frames dropped because host time did not advance.
    pub fn stale_frames(&self) -> u64 {
        lock(&self.runtime).stale_frames
    }

    /// Scene time of the last tick.
    pub fn elapsed(&self) -> Option<f64> {
        lock(&self.runtime).clock.last()
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        lock(&self.runtime).scene.snapshot()
    }

    /// Runs `f` against the scene under the scene lock.
    pub fn with_scene<T>(&self, f: impl FnOnce(&Scene) -> T) -> T {
        f(&lock(&self.runtime).scene)
    }

    pub fn is_mounted(&self) -> bool {
        self.frames.as_ref().map_or(false, Registration::is_active)
    }

    fn stats(&self) -> MountStats {
        let runtime = lock(&self.runtime);
        MountStats {
            ticks: runtime.ticks,
            stale_frames: runtime.stale_frames,
            elapsed: runtime.clock.last(),
        }
    }

    /// Deregisters the frame callback and tears the scene down.
    pub fn unmount(self) -> MountStats {
        let stats = self.stats();
        drop(self);
        stats
    }
}

impl Drop for MountedScene {
    fn drop(&mut self) {
        if let Some(frames) = self.frames.take() {
            frames.cancel();
        }
        lock(&self.runtime).scene.teardown();
        debug!("Unmounted scene {} ({})", self.kind, self.id);
    }
}

impl std::fmt::Debug for MountedScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedScene")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("mounted", &self.is_mounted())
            .finish()
    }
}

/// Regenerates `feed` every `period` until the registration is released.
///
/// The timer holds a weak reference; once the last strong handle to the
/// feed is gone the timer retires itself.
pub fn mount_feed<R>(timers: &dyn TimerSource, feed: &Arc<Mutex<TelemetryFeed<R>>>, period: Duration) -> Registration
where
    R: Rng + Send + 'static,
{
    let weak = Arc::downgrade(feed);
    timers.schedule(
        period,
        Box::new(move || {
            let feed = weak.upgrade()?;
            lock(&feed).regenerate();
            Some(period)
        }),
    )
}
