//! Virtual-clock host for frames and timers.
//!
//! `SimHost` stands in for the display refresh and the timer facility.
//! Nothing runs on its own: the harness calls [`SimHost::step`] and the
//! host delivers exactly what a real display would have delivered in
//! that slice of time.
//!
//! ```text
//! step(dt)
//!   |-- timers due in (now, now+dt], earliest deadline first
//!   |     clock set to each deadline while its task runs
//!   |-- clock set to now+dt
//!   |-- every live frame callback, once, in registration order
//!
//! stall(dt)
//!   |-- timers as above
//!   |-- no frame (the refresh was missed and is not replayed)
//! ```

use crate::context::SimContext;
use crate::error::SimError;
use crate::lock;
use opsviz_env::{EnvError, FrameCallback, HostContext, RefreshSource, Registration, TimerSource, TimerTask};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::debug;

/// Smallest re-arm delay; keeps a zero-delay timer from spinning forever.
const MIN_REARM: Duration = Duration::from_nanos(1);

type SharedFrame = Arc<Mutex<FrameCallback>>;

struct TimerEntry {
    deadline: Duration,
    /// Taken out while the task runs
    task: Option<TimerTask>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    frames: BTreeMap<u64, SharedFrame>,
    timers: BTreeMap<u64, TimerEntry>,
    /// Released callbacks a misbehaving host keeps calling
    lingering: Vec<SharedFrame>,
    linger: bool,
    counters: HostCounters,
}

impl Registry {
    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCounters {
    /// Refreshes delivered (one per `step`)
    pub refreshes: u64,

    /// Individual frame callback invocations
    pub frames_delivered: u64,

    /// Refreshes skipped by `stall`
    pub frames_stalled: u64,

    /// Timer task executions
    pub timer_fires: u64,

    /// Calls made to callbacks after their registration was released
    pub lingering_calls: u64,
}

/// Deterministic `RefreshSource` + `TimerSource` on a [`SimContext`].
pub struct SimHost {
    context: SimContext,
    frame_period: Duration,
    registry: Arc<Mutex<Registry>>,
}

impl SimHost {
    /// Creates a host refreshing at 60 Hz.
    pub fn new(context: SimContext) -> Self {
        Self {
            context,
            frame_period: Duration::from_secs_f64(1.0 / 60.0),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Creates a host with a custom refresh rate.
    pub fn with_frame_rate(context: SimContext, hz: u32) -> Result<Self, SimError> {
        if hz == 0 {
            return Err(EnvError::InvalidFrameRate(hz).into());
        }
        let mut host = Self::new(context);
        host.frame_period = Duration::from_secs_f64(1.0 / hz as f64);
        Ok(host)
    }

    /// Keeps calling frame callbacks after release, like a host that
    /// fails to honour deregistration.
    pub fn with_lingering_frames(self) -> Self {
        lock(&self.registry).linger = true;
        self
    }

    pub fn context(&self) -> &SimContext {
        &self.context
    }

    pub fn frame_period(&self) -> Duration {
        self.frame_period
    }

    pub fn now(&self) -> Duration {
        self.context.now()
    }

    /// Advances the clock by `dt`, fires due timers, then refreshes once.
    ///
    /// Returns the number of frame callbacks invoked.
    pub fn step(&self, dt: Duration) -> usize {
        let target = self.context.now() + dt;
        self.fire_timers_until(target);
        self.context.set_time(target.as_nanos() as u64);
        self.refresh(target)
    }

    /// Advances by one frame period.
    pub fn step_frame(&self) -> usize {
        self.step(self.frame_period)
    }

    /// Advances the clock by `dt` without a refresh.
    pub fn stall(&self, dt: Duration) {
        let target = self.context.now() + dt;
        self.fire_timers_until(target);
        self.context.set_time(target.as_nanos() as u64);
        lock(&self.registry).counters.frames_stalled += 1;
        debug!("Stalled refresh for {:?}", dt);
    }

    /// Steps frame by frame until `duration` of virtual time has passed.
    ///
    /// Returns the number of refreshes.
    pub fn run_for(&self, duration: Duration) -> u64 {
        let end = self.context.now() + duration;
        let mut refreshes = 0;
        while self.context.now() + self.frame_period <= end {
            self.step_frame();
            refreshes += 1;
        }
        refreshes
    }

    pub fn counters(&self) -> HostCounters {
        lock(&self.registry).counters
    }

    /// Frame callbacks currently registered.
    pub fn active_frames(&self) -> usize {
        lock(&self.registry).frames.len()
    }

    /// Timers currently armed.
    pub fn active_timers(&self) -> usize {
        lock(&self.registry).timers.len()
    }

    fn refresh(&self, now: Duration) -> usize {
        let (live, lingering) = {
            let mut registry = lock(&self.registry);
            registry.counters.refreshes += 1;
            let live: Vec<(u64, SharedFrame)> =
                registry.frames.iter().map(|(id, cb)| (*id, Arc::clone(cb))).collect();
            (live, registry.lingering.clone())
        };

        let mut delivered = 0;
        for (id, callback) in live {
            // An earlier callback in this refresh may have released this one
            if !lock(&self.registry).frames.contains_key(&id) {
                continue;
            }
            let mut frame = lock(&callback);
            (*frame)(now);
            delivered += 1;
        }

        for callback in &lingering {
            let mut frame = lock(callback);
            (*frame)(now);
        }

        let mut registry = lock(&self.registry);
        registry.counters.frames_delivered += delivered as u64;
        registry.counters.lingering_calls += lingering.len() as u64;
        delivered
    }

    fn fire_timers_until(&self, target: Duration) {
        loop {
            let due = {
                let mut registry = lock(&self.registry);
                let next = registry
                    .timers
                    .iter()
                    .filter(|(_, entry)| entry.task.is_some() && entry.deadline <= target)
                    .min_by_key(|(id, entry)| (entry.deadline, **id))
                    .map(|(id, _)| *id);
                next.and_then(|id| {
                    registry
                        .timers
                        .get_mut(&id)
                        .and_then(|entry| entry.task.take().map(|task| (id, entry.deadline, task)))
                })
            };
            let Some((id, deadline, mut task)) = due else {
                break;
            };

            if deadline > self.context.now() {
                self.context.set_time(deadline.as_nanos() as u64);
            }
            let next = task();

            // Dropping a retired task may release other registrations, so
            // it happens after the registry lock is gone
            let retired = {
                let mut registry = lock(&self.registry);
                registry.counters.timer_fires += 1;
                match next {
                    Some(delay) => match registry.timers.get_mut(&id) {
                        Some(entry) => {
                            entry.deadline = deadline + delay.max(MIN_REARM);
                            entry.task = Some(task);
                            None
                        }
                        None => Some(task),
                    },
                    None => {
                        registry.timers.remove(&id);
                        Some(task)
                    }
                }
            };
            drop(retired);
        }
    }
}

fn release_frame(registry: &Weak<Mutex<Registry>>, id: u64) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let removed = {
        let mut registry = lock(&registry);
        let removed = registry.frames.remove(&id);
        match removed {
            Some(callback) if registry.linger => {
                registry.lingering.push(callback);
                None
            }
            other => other,
        }
    };
    drop(removed);
}

fn release_timer(registry: &Weak<Mutex<Registry>>, id: u64) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let removed = lock(&registry).timers.remove(&id);
    drop(removed);
}

impl RefreshSource for SimHost {
    fn on_frame(&self, callback: FrameCallback) -> Registration {
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.allocate();
            registry.frames.insert(id, Arc::new(Mutex::new(callback)));
            id
        };
        let weak = Arc::downgrade(&self.registry);
        Registration::new(move || release_frame(&weak, id))
    }
}

impl TimerSource for SimHost {
    fn schedule(&self, delay: Duration, task: TimerTask) -> Registration {
        let deadline = self.context.now() + delay;
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.allocate();
            registry.timers.insert(
                id,
                TimerEntry {
                    deadline,
                    task: Some(task),
                },
            );
            id
        };
        let weak = Arc::downgrade(&self.registry);
        Registration::new(move || release_timer(&weak, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn host() -> SimHost {
        SimHost::with_frame_rate(SimContext::new(7), 10).unwrap()
    }

    fn counting_frame(host: &SimHost) -> (Registration, Arc<AtomicU64>) {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);
        let registration = host.on_frame(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        (registration, calls)
    }

    #[test]
    fn test_zero_frame_rate_rejected() {
        assert!(SimHost::with_frame_rate(SimContext::new(1), 0).is_err());
    }

    #[test]
    fn test_step_delivers_one_frame_per_callback() {
        let host = host();
        let (_a, calls_a) = counting_frame(&host);
        let (_b, calls_b) = counting_frame(&host);

        assert_eq!(host.step_frame(), 2);
        assert_eq!(host.step_frame(), 2);

        assert_eq!(calls_a.load(Ordering::SeqCst), 2);
        assert_eq!(calls_b.load(Ordering::SeqCst), 2);
        assert_eq!(host.counters().frames_delivered, 4);
        assert_eq!(host.counters().refreshes, 2);
    }

    #[test]
    fn test_frame_sees_advanced_clock() {
        let host = host();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _frames = host.on_frame(Box::new(move |now| sink.lock().unwrap().push(now)));

        host.step(Duration::from_millis(100));
        host.step(Duration::from_millis(50));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Duration::from_millis(100), Duration::from_millis(150)]
        );
    }

    #[test]
    fn test_release_stops_delivery() {
        let host = host();
        let (registration, calls) = counting_frame(&host);

        host.step_frame();
        drop(registration);
        host.step_frame();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(host.active_frames(), 0);
    }

    #[test]
    fn test_stall_skips_refresh_without_catch_up() {
        let host = host();
        let (_frames, calls) = counting_frame(&host);

        host.stall(Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        host.step_frame();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(host.counters().frames_stalled, 1);
        assert_eq!(host.now(), Duration::from_millis(1100));
    }

    #[test]
    fn test_timers_fire_in_deadline_order_at_their_deadline() {
        let host = host();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut registrations = Vec::new();
        for (tag, ms) in [("late", 300u64), ("early", 100), ("mid", 200)] {
            let sink = Arc::clone(&order);
            let clock = host.context().clone();
            registrations.push(host.schedule(
                Duration::from_millis(ms),
                Box::new(move || {
                    sink.lock().unwrap().push((tag, clock.now()));
                    None
                }),
            ));
        }

        host.step(Duration::from_secs(1));

        assert_eq!(
            *order.lock().unwrap(),
            vec![
                ("early", Duration::from_millis(100)),
                ("mid", Duration::from_millis(200)),
                ("late", Duration::from_millis(300)),
            ]
        );
        assert_eq!(host.active_timers(), 0);
        assert_eq!(host.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_repeating_timer_rearms_from_deadline() {
        let host = host();
        let fires = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&fires);
        let _timer = host.schedule(
            Duration::from_millis(250),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(Duration::from_millis(250))
            }),
        );

        host.step(Duration::from_secs(1));
        assert_eq!(fires.load(Ordering::SeqCst), 4);

        host.stall(Duration::from_millis(500));
        assert_eq!(fires.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_released_timer_never_fires() {
        let host = host();
        let fires = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&fires);
        let timer = host.schedule(
            Duration::from_millis(100),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(Duration::from_millis(100))
            }),
        );

        host.step(Duration::from_millis(150));
        timer.cancel();
        host.step(Duration::from_secs(5));

        assert_eq!(fires.load(Ordering::SeqCst), 1);
        assert_eq!(host.active_timers(), 0);
    }

    #[test]
    fn test_lingering_host_keeps_calling_released_frames() {
        let host = host().with_lingering_frames();
        let (registration, calls) = counting_frame(&host);

        drop(registration);
        host.step_frame();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(host.active_frames(), 0);
        assert_eq!(host.counters().lingering_calls, 1);
        assert_eq!(host.counters().frames_delivered, 0);
    }

    #[test]
    fn test_run_for_counts_refreshes() {
        let host = host();
        assert_eq!(host.run_for(Duration::from_secs(2)), 20);
    }

    proptest! {
        #[test]
        fn prop_step_pattern_does_not_change_timer_count(steps in prop::collection::vec(0u64..500, 1..60)) {
            let host = host();
            let (_frames, calls) = counting_frame(&host);
            let fires = Arc::new(AtomicU64::new(0));
            let counter = Arc::clone(&fires);
            let _timer = host.schedule(
                Duration::from_millis(100),
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Some(Duration::from_millis(100))
                }),
            );

            for ms in &steps {
                host.step(Duration::from_millis(*ms));
            }

            let total: u64 = steps.iter().sum();
            prop_assert_eq!(fires.load(Ordering::SeqCst), total / 100);
            prop_assert_eq!(calls.load(Ordering::SeqCst), steps.len() as u64);
        }
    }
}
