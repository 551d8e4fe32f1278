//! OpsViz Core - Synthetic Telemetry & Animation Engine
//!
//! This library drives every moving part of the operations console:
//! 1. **Telemetry**: hourly series with a daily rhythm, a trend and injected noise
//! 2. **Animation**: per-scene entities whose visual state is a pure function of time
//! 3. **Scheduling**: frame and timer registrations that end when their owner drops
//!
//! Randomness is always passed in. Given the same seed and the same elapsed
//! time, a scene renders the same frame.

pub mod arena;
pub mod curve;
pub mod entity;
pub mod error;
pub mod metrics;
pub mod palette;
pub mod pulse;
pub mod rules;
pub mod scene;
pub mod scheduler;
pub mod telemetry;
pub mod topology;

#[cfg(feature = "dashboard")]
pub mod dashboard;

// Re-export key types for convenience
pub use arena::VisualArena;
pub use curve::{Curve, Phase};
pub use entity::{AnimatedEntity, DerivedState, EntityId, EntityKind, Property};
pub use error::CoreError;
pub use metrics::{summarize, SeriesSummary, Trend};
pub use pulse::{mount_clock_display, mount_pulse, ClockDisplay, HealthPulse, HealthStatus, PulseConfig};
pub use scene::{Scene, SceneConfig, SceneKind, SceneSnapshot};
pub use scheduler::{mount, mount_feed, MountStats, MountedScene, SceneClock};
pub use telemetry::{generate, SeriesShape, TelemetryFeed, TimeSeriesSample};
pub use topology::Topology;
