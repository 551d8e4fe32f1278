//! Timer-driven indicators: the system-health orb and the wall clock.
//!
//! Both run on a [`TimerSource`], independent of the frame scheduler, and
//! each hands back its own [`Registration`].
//!
//! # Health Pulse
//!
//! ```text
//!          interval - pulse                 pulse
//!   Idle ───────────────────► Pulsing ─────────────► Idle ...
//!        interval = base + U(0, jitter), redrawn every cycle
//! ```

use crate::error::CoreError;
use crate::palette;
use crate::scheduler::lock;
use chrono::{DateTime, Utc};
use opsviz_env::{Registration, TimerSource};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Overall console health shown by the orb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Optimal,
    Good,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn color(&self) -> &'static str {
        match self {
            HealthStatus::Optimal => palette::GREEN,
            HealthStatus::Good => palette::BLUE,
            HealthStatus::Warning => palette::AMBER,
            HealthStatus::Critical => palette::RED,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthStatus::Optimal => "System Optimal",
            HealthStatus::Good => "System Good",
            HealthStatus::Warning => "System Warning",
            HealthStatus::Critical => "System Critical",
        }
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        HealthStatus::Good
    }
}

/// Timing of the health pulse
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Minimum time between pulse starts (ms)
    pub base_interval_ms: u64,
    /// Random extra time per cycle, `U(0, jitter_ms)`
    pub jitter_ms: u64,
    /// How long a pulse stays on (ms)
    pub pulse_ms: u64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 2000,
            jitter_ms: 1000,
            pulse_ms: 500,
        }
    }
}

impl PulseConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.pulse_ms == 0 {
            return Err(CoreError::invalid("pulse_ms", "must be positive"));
        }
        if self.pulse_ms >= self.base_interval_ms {
            return Err(CoreError::invalid(
                "pulse_ms",
                format!(
                    "pulse ({} ms) must be shorter than the base interval ({} ms)",
                    self.pulse_ms, self.base_interval_ms
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulsePhase {
    Idle,
    Pulsing,
}

/// Outer-glow parameters of the orb.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrbGlow {
    pub color: &'static str,
    pub opacity: f64,
    pub scale: f64,
}

/// The two-state pulse machine.
///
/// Owns its random source; every call to [`HealthPulse::fire`] performs
/// one transition and returns how long to wait before the next.
#[derive(Debug, Clone)]
pub struct HealthPulse<R: Rng = ChaCha8Rng> {
    config: PulseConfig,
    status: HealthStatus,
    phase: PulsePhase,
    jitter: Uniform<f64>,
    rng: R,
    pulses: u64,
}

impl<R: Rng> HealthPulse<R> {
    pub fn new(config: PulseConfig, status: HealthStatus, rng: R) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            config,
            status,
            phase: PulsePhase::Idle,
            jitter: Uniform::new_inclusive(0.0, config.jitter_ms as f64),
            rng,
            pulses: 0,
        })
    }

    /// Draws the time from one pulse start to the next.
    pub fn next_interval(&mut self) -> Duration {
        let ms = self.config.base_interval_ms as f64 + self.jitter.sample(&mut self.rng);
        Duration::from_secs_f64(ms / 1000.0)
    }

    /// Performs one transition and returns the delay until the next one.
    pub fn fire(&mut self) -> Duration {
        let pulse = Duration::from_millis(self.config.pulse_ms);
        match self.phase {
            PulsePhase::Idle => {
                self.phase = PulsePhase::Pulsing;
                self.pulses += 1;
                pulse
            }
            PulsePhase::Pulsing => {
                self.phase = PulsePhase::Idle;
                self.next_interval().saturating_sub(pulse)
            }
        }
    }

    pub fn phase(&self) -> PulsePhase {
        self.phase
    }

    pub fn is_pulsing(&self) -> bool {
        self.phase == PulsePhase::Pulsing
    }

    /// Pulses started so far.
    pub fn pulses(&self) -> u64 {
        self.pulses
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn set_status(&mut self, status: HealthStatus) {
        self.status = status;
    }

    /// Glow the orb shows right now: brighter and larger while pulsing.
    pub fn glow(&self) -> OrbGlow {
        let (opacity, scale) = match self.phase {
            PulsePhase::Idle => (0.2, 1.0),
            PulsePhase::Pulsing => (0.3, 1.1),
        };
        OrbGlow {
            color: self.status.color(),
            opacity,
            scale,
        }
    }
}

/// Starts the pulse on `timers`. The first pulse starts one interval in.
///
/// The timer holds a weak reference and retires once the pulse is dropped.
pub fn mount_pulse<R>(timers: &dyn TimerSource, pulse: &Arc<Mutex<HealthPulse<R>>>) -> Registration
where
    R: Rng + Send + 'static,
{
    let first = lock(pulse).next_interval();
    let weak = Arc::downgrade(pulse);
    timers.schedule(
        first,
        Box::new(move || {
            let pulse = weak.upgrade()?;
            let next = lock(&pulse).fire();
            Some(next)
        }),
    )
}

/// Refresh period of the wall clock.
pub const CLOCK_REFRESH: Duration = Duration::from_secs(1);

const TIME_FORMAT: &str = "%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wall-clock label in the top bar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClockDisplay {
    time: String,
    date: String,
    refreshes: u64,
}

impl ClockDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-renders the labels for `now` (UTC).
    pub fn refresh(&mut self, now: SystemTime) {
        let now = DateTime::<Utc>::from(now);
        self.time = now.format(TIME_FORMAT).to_string();
        self.date = now.format(DATE_FORMAT).to_string();
        self.refreshes += 1;
    }

    /// `HH:MM:SS`, empty before the first refresh.
    pub fn time(&self) -> &str {
        &self.time
    }

    /// `YYYY-MM-DD`, empty before the first refresh.
    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }
}

fn utc(unix_secs: u64) -> DateTime<Utc> {
    let at = UNIX_EPOCH
        .checked_add(Duration::from_secs(unix_secs))
        .unwrap_or(UNIX_EPOCH);
    DateTime::<Utc>::from(at)
}

/// `HH:MM:SS` for seconds since the UNIX epoch.
pub fn time_label(unix_secs: u64) -> String {
    utc(unix_secs).format(TIME_FORMAT).to_string()
}

/// `YYYY-MM-DD` for seconds since the UNIX epoch.
pub fn date_label(unix_secs: u64) -> String {
    utc(unix_secs).format(DATE_FORMAT).to_string()
}

/// Refreshes `display` immediately and then every [`CLOCK_REFRESH`].
pub fn mount_clock_display<F>(
    timers: &dyn TimerSource,
    display: &Arc<Mutex<ClockDisplay>>,
    wall_clock: F,
) -> Registration
where
    F: Fn() -> SystemTime + Send + 'static,
{
    lock(display).refresh(wall_clock());
    let weak = Arc::downgrade(display);
    timers.schedule(
        CLOCK_REFRESH,
        Box::new(move || {
            let display = weak.upgrade()?;
            lock(&display).refresh(wall_clock());
            Some(CLOCK_REFRESH)
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsviz_env::TimerTask;
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;

    fn pulse(rng: StepRng) -> HealthPulse<StepRng> {
        HealthPulse::new(PulseConfig::default(), HealthStatus::Good, rng).unwrap()
    }

    /// Keeps the single scheduled task so the test can fire it by hand.
    #[derive(Default)]
    struct OneShotTimers {
        armed: Mutex<Option<(Duration, TimerTask)>>,
    }

    impl TimerSource for OneShotTimers {
        fn schedule(&self, delay: Duration, task: TimerTask) -> Registration {
            *lock(&self.armed) = Some((delay, task));
            Registration::detached()
        }
    }

    impl OneShotTimers {
        fn first_delay(&self) -> Option<Duration> {
            lock(&self.armed).as_ref().map(|(d, _)| *d)
        }

        fn fire(&self) -> Option<Duration> {
            let mut armed = lock(&self.armed);
            let (_, task) = armed.as_mut()?;
            task()
        }
    }

    #[test]
    fn test_status_colours_and_labels() {
        assert_eq!(HealthStatus::Optimal.color(), "#00E676");
        assert_eq!(HealthStatus::Critical.label(), "System Critical");
        assert_eq!(HealthStatus::default(), HealthStatus::Good);
    }

    #[test]
    fn test_pulse_cycle_without_jitter() {
        let mut p = pulse(StepRng::new(0, 0));
        assert_eq!(p.phase(), PulsePhase::Idle);

        assert_eq!(p.fire(), Duration::from_millis(500));
        assert!(p.is_pulsing());
        assert_eq!(p.glow().scale, 1.1);

        assert_eq!(p.fire(), Duration::from_millis(1500));
        assert!(!p.is_pulsing());
        assert_eq!(p.glow().opacity, 0.2);
        assert_eq!(p.pulses(), 1);
    }

    #[test]
    fn test_interval_stays_within_jitter() {
        let mut p = HealthPulse::new(PulseConfig::default(), HealthStatus::Optimal, ChaCha8Rng::seed_from_u64(9)).unwrap();
        for _ in 0..1_000 {
            let interval = p.next_interval();
            assert!(interval >= Duration::from_millis(2000));
            assert!(interval <= Duration::from_millis(3000));
        }
    }

    #[test]
    fn test_interval_redrawn_every_cycle() {
        let mut p = HealthPulse::new(PulseConfig::default(), HealthStatus::Good, ChaCha8Rng::seed_from_u64(4)).unwrap();
        let idles: Vec<Duration> = (0..10)
            .map(|_| {
                p.fire();
                p.fire()
            })
            .collect();
        assert!(idles.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn test_config_validation() {
        assert!(PulseConfig::default().validate().is_ok());
        let bad = PulseConfig {
            pulse_ms: 2500,
            ..Default::default()
        };
        assert!(HealthPulse::new(bad, HealthStatus::Good, StepRng::new(0, 0)).is_err());
    }

    #[test]
    fn test_mount_pulse_alternates() {
        let timers = OneShotTimers::default();
        let p = Arc::new(Mutex::new(pulse(StepRng::new(0, 0))));
        let _registration = mount_pulse(&timers, &p);

        assert_eq!(timers.first_delay(), Some(Duration::from_millis(2000)));
        assert_eq!(timers.fire(), Some(Duration::from_millis(500)));
        assert!(lock(&p).is_pulsing());
        assert_eq!(timers.fire(), Some(Duration::from_millis(1500)));
        assert!(!lock(&p).is_pulsing());

        // Dropping the pulse retires the timer
        drop(p);
        assert_eq!(timers.fire(), None);
    }

    #[test]
    fn test_time_and_date_labels() {
        assert_eq!(time_label(0), "00:00:00");
        assert_eq!(time_label(86_399), "23:59:59");
        assert_eq!(time_label(86_400 + 3_723), "01:02:03");

        assert_eq!(date_label(0), "1970-01-01");
        assert_eq!(date_label(951_782_400), "2000-02-29");
        assert_eq!(date_label(1_700_000_000), "2023-11-14");
    }

    #[test]
    fn test_clock_display_matches_labels() {
        let mut display = ClockDisplay::new();
        let secs = 951_868_799; // 2000-02-29 23:59:59 UTC
        display.refresh(UNIX_EPOCH + Duration::from_millis(secs * 1000 + 999));

        assert_eq!(display.time(), time_label(secs));
        assert_eq!(display.date(), date_label(secs));
        assert_eq!(display.date(), "2000-02-29");
        assert_eq!(display.refreshes(), 1);
    }

    #[test]
    fn test_clock_display_refreshes_on_mount() {
        let timers = OneShotTimers::default();
        let display = Arc::new(Mutex::new(ClockDisplay::new()));
        let wall = UNIX_EPOCH + Duration::from_secs(45_296);
        let _registration = mount_clock_display(&timers, &display, move || wall);

        assert_eq!(lock(&display).time(), "12:34:56");
        assert_eq!(timers.first_delay(), Some(CLOCK_REFRESH));
        assert_eq!(timers.fire(), Some(CLOCK_REFRESH));
        assert_eq!(lock(&display).refreshes(), 2);
    }
}
