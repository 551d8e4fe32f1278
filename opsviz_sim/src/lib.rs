//! OpsViz Deterministic Simulation Testing (DST) Harness
//!
//! This crate runs the OpsViz animation engine on a virtual clock, where
//! every frame and every timer firing is reproducible from one seed.
//!
//! # Core Principle: The Host Decides When
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advances only when the harness steps it
//! - **Refresh**: One frame per step; stalls skip frames, never replay them
//! - **Randomness**: All entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimHost (Virtual Clock + Frame/Timer Registry)       │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │ on_frame                 │ schedule                 │
//! │  ┌────▼─────────┐         ┌──────▼───────────────────┐      │
//! │  │ MountedScene │         │ HealthPulse, ClockDisplay│      │
//! │  │  (arena)     │         │ TelemetryFeed            │      │
//! │  └────┬─────────┘         └──────────────────────────┘      │
//! │       │ every frame                                         │
//! │  ┌────▼──────────────────────────────┐                      │
//! │  │          InvariantOracle          │                      │
//! │  │  (monotonic t, ranges, rewind)    │                      │
//! │  └───────────────────────────────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use opsviz_sim::{ScenarioRunner, scenarios::ScenarioId};
//! use opsviz_core::SceneKind;
//!
//! let result = ScenarioRunner::new(42)
//!     .with_scene(SceneKind::NeuralNetwork)
//!     .run(ScenarioId::Rewind);
//! assert!(result.passed);
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

mod context;
mod error;
mod exporter;
mod host;
mod oracle;
mod runner;
pub mod scenarios;
mod seeds;
mod visualizer;
mod world;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{EntityFrame, HealthFrame, SeriesFrame, SimEvent, SimExport, SimFrame};
pub use host::{HostCounters, SimHost};
pub use oracle::{InvariantOracle, Violation};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use seeds::{SeedProvider, Stream};
pub use visualizer::{parse_hex_color, RerunLogger};
pub use world::{FeedHandle, SimConfig, SimWorld};

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
