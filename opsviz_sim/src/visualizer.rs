//! Rerun visualization for DST simulations.
//!
//! This module provides visualization of simulation runs using the Rerun SDK.
//! Visualization is optional and only available with the `visualization` feature.
//!
//! # What Gets Logged
//!
//! - Entity positions as points in their own colours, sized by scale
//! - Per-entity intensity as a scalar timeline
//! - Health orb opacity and telemetry values as scalars
//! - Scene time as the `sim_time` timeline

use opsviz_core::SceneSnapshot;
#[cfg(feature = "visualization")]
use rerun::{Color, Points3D, Position3D, Radius, RecordingStream};

/// Rerun logger for simulation visualization.
pub struct RerunLogger {
    #[cfg(feature = "visualization")]
    rec: Option<RecordingStream>,

    /// Whether visualization is enabled
    enabled: bool,
}

impl RerunLogger {
    /// Creates a new logger with visualization disabled.
    pub fn disabled() -> Self {
        Self {
            #[cfg(feature = "visualization")]
            rec: None,
            enabled: false,
        }
    }

    /// Creates a new logger with visualization enabled.
    #[cfg(feature = "visualization")]
    pub fn new(name: &str) -> Self {
        match rerun::RecordingStreamBuilder::new(name).spawn() {
            Ok(rec) => {
                tracing::info!("Rerun visualization enabled - open Rerun Viewer to see simulation");
                Self {
                    rec: Some(rec),
                    enabled: true,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to initialize Rerun: {:?}", e);
                Self {
                    rec: None,
                    enabled: false,
                }
            }
        }
    }

    /// Creates a logger - returns disabled if visualization feature not enabled.
    #[cfg(not(feature = "visualization"))]
    pub fn new(_name: &str) -> Self {
        tracing::info!("Rerun visualization not available (compile with --features visualization)");
        Self::disabled()
    }

    /// Returns whether visualization is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the simulation time for subsequent logs.
    #[cfg(feature = "visualization")]
    pub fn set_time(&self, seconds: f64) {
        if let Some(ref rec) = self.rec {
            rec.set_time_seconds("sim_time", seconds);
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn set_time(&self, _seconds: f64) {}

    /// Logs every entity of a scene frame.
    #[cfg(feature = "visualization")]
    pub fn log_snapshot(&self, snapshot: &SceneSnapshot) {
        if let Some(ref rec) = self.rec {
            let entities = &snapshot.entities;
            let points: Vec<Position3D> = entities
                .iter()
                .map(|e| {
                    let p = e.state.position;
                    Position3D::new(p.x as f32, p.y as f32, p.z as f32)
                })
                .collect();
            let colors: Vec<Color> = entities
                .iter()
                .map(|e| {
                    let [r, g, b] = parse_hex_color(&e.color).unwrap_or([255, 255, 255]);
                    Color::from_rgb(r, g, b)
                })
                .collect();
            let radii: Vec<Radius> = entities
                .iter()
                .map(|e| Radius::new_scene_units((0.1 * e.state.scale) as f32))
                .collect();

            let _ = rec.log(
                format!("world/{}/entities", snapshot.kind.name()),
                &Points3D::new(points).with_colors(colors).with_radii(radii),
            );

            for entity in entities {
                let _ = rec.log(
                    format!("metrics/{}/{}/intensity", snapshot.kind.name(), entity.label),
                    &rerun::Scalar::new(entity.state.intensity),
                );
            }
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_snapshot(&self, _snapshot: &SceneSnapshot) {}

    /// Logs a text annotation (e.g., remount, stall).
    #[cfg(feature = "visualization")]
    pub fn log_event(&self, path: &str, message: &str) {
        if let Some(ref rec) = self.rec {
            let _ = rec.log(path, &rerun::TextLog::new(message));
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_event(&self, _path: &str, _message: &str) {}

    /// Logs a scalar metric (orb opacity, latest telemetry value).
    #[cfg(feature = "visualization")]
    pub fn log_scalar(&self, path: &str, value: f64) {
        if let Some(ref rec) = self.rec {
            let _ = rec.log(format!("metrics/{}", path), &rerun::Scalar::new(value));
        }
    }

    #[cfg(not(feature = "visualization"))]
    pub fn log_scalar(&self, _path: &str, _value: f64) {}
}

/// `#RRGGBB` to bytes.
pub fn parse_hex_color(hex: &str) -> Option<[u8; 3]> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsviz_core::{Scene, SceneKind};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_disabled_logger() {
        let logger = RerunLogger::disabled();
        assert!(!logger.is_enabled());

        // These should be no-ops
        let mut scene = Scene::stock(SceneKind::Factory, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        scene.evaluate(1.0);
        logger.set_time(1.0);
        logger.log_snapshot(&scene.snapshot());
        logger.log_scalar("health/opacity", 0.3);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#00A3FF"), Some([0x00, 0xA3, 0xFF]));
        assert_eq!(parse_hex_color("00A3FF"), None);
        assert_eq!(parse_hex_color("#00A3F"), None);
        assert_eq!(parse_hex_color("#GG0000"), None);
    }
}
