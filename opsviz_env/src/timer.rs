//! Frame refresh and timer facilities consumed by the animation engine.

use std::fmt;
use std::time::Duration;

/// Callback invoked once per display refresh.
///
/// The argument is the host's monotonic `now()` at the time of the
/// refresh. Scenes convert it into their own elapsed time.
pub type FrameCallback = Box<dyn FnMut(Duration) + Send + 'static>;

/// Task run by a [`TimerSource`] when its deadline passes.
///
/// Returning `Some(delay)` re-arms the timer `delay` after the firing
/// deadline; returning `None` retires it.
pub type TimerTask = Box<dyn FnMut() -> Option<Duration> + Send + 'static>;

/// Abstraction for the host's display refresh signal.
///
/// # Implementations
///
/// - **Production**: a Tokio interval at the target frame rate
/// - **Simulation**: driven explicitly by the harness, one call per step
///
/// # Frame Delivery
///
/// ```text
/// Host                       Callback
///   |-- refresh(now) ---------->|  (runs to completion)
///   |   [slow frame]            |
///   |-- refresh(now') --------->|  (next refresh only, no catch-up)
/// ```
pub trait RefreshSource: Send + Sync {
    /// Registers a callback to run on every refresh until the returned
    /// registration is released.
    fn on_frame(&self, callback: FrameCallback) -> Registration;
}

/// Abstraction for "repeat after duration" timers.
pub trait TimerSource: Send + Sync {
    /// Arms `task` to run after `delay`.
    ///
    /// The task may re-arm itself by returning the next delay. Releasing
    /// the registration cancels any pending firing.
    fn schedule(&self, delay: Duration, task: TimerTask) -> Registration;
}

/// Owned handle to a host registration.
///
/// Release happens exactly once: either through [`Registration::cancel`]
/// or when the handle is dropped. There is no way to clone a
/// registration, so the owner of the handle owns the callback lifetime.
#[must_use = "dropping a Registration immediately deregisters its callback"]
pub struct Registration {
    release: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Registration {
    /// Creates a registration that runs `release` when it is dropped.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Creates a registration with nothing to release.
    pub fn detached() -> Self {
        Self { release: None }
    }

    /// Releases the registration now.
    pub fn cancel(mut self) {
        self.release_now();
    }

    /// Returns true while the registration still holds a release action.
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("active", &self.is_active())
            .finish()
    }
}
