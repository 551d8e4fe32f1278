//! Core environment context trait for OpsViz hosts.

use crate::timer::Registration;
use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that scenes can run both
/// against a live display and inside the simulation harness.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, `OsRng`
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// All methods that would normally introduce non-determinism
/// (time, randomness) are controlled by the implementation.
#[async_trait]
pub trait HostContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Scene clocks are derived from this value. In simulation, this is
    /// the virtual clock time.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time, used by the clock display.
    ///
    /// In simulation, this is derived from virtual clock + epoch offset.
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual time
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    ///
    /// The task is aborted when the returned registration is dropped.
    fn spawn<F>(&self, name: &str, future: F) -> Registration
    where
        F: Future<Output = ()> + Send + 'static;

    /// Derives an independent random stream.
    ///
    /// Topology construction, telemetry noise and pulse jitter each take
    /// their own stream so that changing one subsystem does not shift the
    /// draws seen by another.
    ///
    /// # Arguments
    /// * `stream` - A value to combine with the global seed
    fn derive_rng(&self, stream: u64) -> ChaCha8Rng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    /// In simulation, returns the master seed.
    fn seed(&self) -> u64;
}
