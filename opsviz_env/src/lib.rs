//! OpsViz Host Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seam that lets the OpsViz animation
//! engine run against a real display refresh (tokio) or a virtual clock
//! in the deterministic simulation harness.
//!
//! # What The Host Supplies
//!
//! The engine never reads a clock or a timer directly. Everything that
//! would make a frame non-reproducible goes through the host:
//! - Time (`now()`, `sleep()`)
//! - Frame refresh (`on_frame()`)
//! - Deferred and repeating work (`schedule()`)
//! - Randomness (`derive_rng()`)
//!
//! Every registration hands back a [`Registration`]. Dropping it is the
//! only way to stop a callback, so a torn-down scene cannot keep running.
//!
//! # Example
//!
//! ```ignore
//! use opsviz_env::{RefreshSource, TokioContext};
//!
//! let host = TokioContext::new();
//! let frames = host.on_frame(Box::new(|now| render(now)));
//! // ... later, on unmount:
//! drop(frames);
//! ```

mod context;
mod timer;
mod types;
mod error;
mod tokio_impl;

pub use context::HostContext;
pub use timer::{FrameCallback, RefreshSource, Registration, TimerSource, TimerTask};
pub use types::SceneId;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
