//! Simulation context implementing HostContext for deterministic testing.

use async_trait::async_trait;
use opsviz_env::{EnvError, HostContext, Registration};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Seed salt shared with [`crate::SeedProvider`].
pub(crate) const STREAM_SALT: u64 = 0x517cc1b727220a95;

/// Simulation context backed by deterministic time and RNG.
///
/// This implements `HostContext` using:
/// - A virtual clock that can be advanced manually
/// - Seeded ChaCha8 streams derived from one master seed
/// - Simulated sleep that advances virtual time
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            epoch: UNIX_EPOCH + Duration::from_secs(1704067200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = crate::lock(&self.virtual_time_ns);
        *time = time.saturating_add(duration.as_nanos() as u64);
    }

    /// Sets the virtual time to a specific value.
    ///
    /// Moving the clock backwards is allowed; scene clocks ignore the
    /// frames until time passes their last value again.
    pub fn set_time(&self, time_ns: u64) {
        *crate::lock(&self.virtual_time_ns) = time_ns;
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *crate::lock(&self.virtual_time_ns)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            epoch: self.epoch,
        }
    }
}

#[async_trait]
impl HostContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // In simulation, sleep advances virtual time
        self.advance_time(duration);
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
            debug!(task = %name, "Aborting simulated task");
            task.abort();
        })
    }

    fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
        // Combine master seed with the stream id for an independent sequence
        ChaCha8Rng::seed_from_u64(self.seed.wrapping_mul(STREAM_SALT) ^ stream)
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));
    }

    #[test]
    fn test_sim_context_set_time() {
        let ctx = SimContext::new(42);
        ctx.set_time(2_000_000_000);
        assert_eq!(ctx.now(), Duration::from_secs(2));

        ctx.set_time(0);
        assert_eq!(ctx.time_ns(), 0);
    }

    #[test]
    fn test_sim_context_deterministic_streams() {
        let ctx1 = SimContext::new(42);
        let ctx2 = SimContext::new(42);

        let a: u64 = ctx1.derive_rng(1).gen();
        let b: u64 = ctx2.derive_rng(1).gen();

        // Same seed + stream = same sequence
        assert_eq!(a, b);

        // Different stream = different sequence
        let c: u64 = ctx1.derive_rng(2).gen();
        assert_ne!(a, c);
    }

    #[test]
    fn test_sim_context_seed() {
        let ctx = SimContext::new(12345);
        assert_eq!(ctx.seed(), 12345);
    }

    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();

        ctx1.advance_time(Duration::from_secs(5));

        // Both should see the same time
        assert_eq!(ctx1.now(), ctx2.now());
    }

    #[test]
    fn test_system_time_follows_virtual_clock() {
        let ctx = SimContext::new(1);
        let start = ctx.system_time();
        ctx.advance_time(Duration::from_secs(90));
        assert_eq!(ctx.system_time().duration_since(start).ok(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_spawn_without_runtime_is_detached() {
        let ctx = SimContext::new(1);
        let registration = ctx.spawn("orphan", async {});
        assert!(!registration.is_active());
    }

    #[tokio::test]
    async fn test_sleep_advances_virtual_time() {
        let ctx = SimContext::new(1);
        ctx.sleep(Duration::from_millis(250)).await;
        assert_eq!(ctx.now(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_spawn_aborts_on_release() {
        let ctx = SimContext::new(1);
        let registration = ctx.spawn("forever", std::future::pending());
        assert!(registration.is_active());
        registration.cancel();
    }
}
