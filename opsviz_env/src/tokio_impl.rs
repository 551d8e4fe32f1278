//! Production implementation of the host traits using Tokio.

use crate::timer::{FrameCallback, RefreshSource, Registration, TimerSource, TimerTask};
use crate::{EnvError, HostContext};
use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Default display refresh rate in Hz.
pub const DEFAULT_FRAME_RATE_HZ: u32 = 60;

/// Production context backed by Tokio and OS entropy.
///
/// Time comes from the system clock, randomness from the OS. Frames are
/// driven by a Tokio interval that skips missed ticks, so a slow frame
/// only delays the next one.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,

    /// Interval between display refreshes
    frame_period: Duration,
}

impl TokioContext {
    /// Creates a new TokioContext refreshing at 60 Hz.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frame_period: Duration::from_secs_f64(1.0 / DEFAULT_FRAME_RATE_HZ as f64),
        }
    }

    /// Creates a context with a custom refresh rate.
    pub fn with_frame_rate(hz: u32) -> Result<Self, EnvError> {
        if hz == 0 {
            return Err(EnvError::InvalidFrameRate(hz));
        }
        Ok(Self {
            start: Instant::now(),
            frame_period: Duration::from_secs_f64(1.0 / hz as f64),
        })
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the interval between refreshes.
    pub fn frame_period(&self) -> Duration {
        self.frame_period
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F) -> Registration
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(task = name, "{}", EnvError::RuntimeUnavailable(e.to_string()));
                return Registration::detached();
            }
        };

        let task = runtime.spawn(future);
        let name = name.to_string();
        Registration::new(move || {
            debug!(task = %name, "Aborting host task");
            task.abort();
        })
    }

    fn derive_rng(&self, _stream: u64) -> ChaCha8Rng {
        // In production, every stream is freshly seeded from the OS
        ChaCha8Rng::from_entropy()
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}

impl RefreshSource for TokioContext {
    fn on_frame(&self, mut callback: FrameCallback) -> Registration {
        let start = self.start;
        let period = self.frame_period;

        self.spawn("frame", async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                callback(start.elapsed());
            }
        })
    }
}

impl TimerSource for TokioContext {
    fn schedule(&self, delay: Duration, mut task: TimerTask) -> Registration {
        self.spawn("timer", async move {
            let mut deadline = tokio::time::Instant::now() + delay;
            loop {
                tokio::time::sleep_until(deadline).await;
                match task() {
                    Some(next) => deadline += next,
                    None => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new();
        let t1 = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[test]
    fn test_tokio_context_seed() {
        let ctx = TokioContext::new();
        assert_eq!(ctx.seed(), 0);
    }

    #[test]
    fn test_zero_frame_rate_rejected() {
        assert!(matches!(
            TokioContext::with_frame_rate(0),
            Err(EnvError::InvalidFrameRate(0))
        ));
    }

    #[tokio::test]
    async fn test_frames_stop_after_release() {
        let ctx = TokioContext::with_frame_rate(200).unwrap();
        let frames = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&frames);

        let registration = ctx.on_frame(Box::new(move |_now| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        ctx.sleep(Duration::from_millis(50)).await;
        drop(registration);

        // Let the abort land before sampling
        tokio::task::yield_now().await;
        let after_release = frames.load(Ordering::SeqCst);
        assert!(after_release > 0);

        ctx.sleep(Duration::from_millis(50)).await;
        assert_eq!(frames.load(Ordering::SeqCst), after_release);
    }

    #[tokio::test]
    async fn test_timer_rearms_until_none() {
        let ctx = TokioContext::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let _registration = ctx.schedule(
            Duration::from_millis(5),
            Box::new(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Some(Duration::from_millis(5))
                } else {
                    None
                }
            }),
        );

        ctx.sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_spawn_without_runtime_is_detached() {
        let ctx = TokioContext::new();
        let registration = ctx.spawn("orphan", async {});
        assert!(!registration.is_active());
    }
}
