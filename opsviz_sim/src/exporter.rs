//! JSON exporter for offline replay.
//!
//! Exports simulation frames as JSON: every entity's derived state, the
//! health orb and the latest telemetry per feed.

use opsviz_core::pulse::OrbGlow;
use opsviz_core::scene::EntitySnapshot;
use opsviz_core::{summarize, SceneSnapshot, SeriesSummary};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::SimError;

/// A single frame of simulation data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Host time in seconds
    pub time_sec: f64,

    /// Scene time of the frame, if a scene is mounted and has ticked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_t: Option<f64>,

    /// Entity states
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub entities: Vec<EntityFrame>,

    /// Health orb
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthFrame>,

    /// Wall clock label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock: Option<String>,

    /// Telemetry summaries
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub series: Vec<SeriesFrame>,

    /// Events (mounts, stalls, etc.)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<SimEvent>,
}

impl SimFrame {
    /// Empty frame at host time `time_sec`.
    pub fn at(time_sec: f64) -> Self {
        Self {
            time_sec,
            scene_t: None,
            entities: Vec::new(),
            health: None,
            clock: None,
            series: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_snapshot(mut self, snapshot: &SceneSnapshot) -> Self {
        self.scene_t = snapshot.t;
        self.entities = snapshot.entities.iter().map(EntityFrame::from).collect();
        self
    }
}

/// One entity's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFrame {
    pub id: u32,
    pub label: String,
    pub color: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
    pub scale: f64,
    pub intensity: f64,
    pub opacity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<u32>,
}

impl From<&EntitySnapshot> for EntityFrame {
    fn from(entity: &EntitySnapshot) -> Self {
        let state = &entity.state;
        Self {
            id: entity.id.0,
            label: entity.label.clone(),
            color: entity.color.clone(),
            x: state.position.x,
            y: state.position.y,
            z: state.position.z,
            rx: state.rotation.x,
            ry: state.rotation.y,
            rz: state.rotation.z,
            scale: state.scale,
            intensity: state.intensity,
            opacity: state.opacity,
            parent: entity.parent.map(|p| p.0),
        }
    }
}

/// Health orb state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthFrame {
    pub color: String,
    pub opacity: f64,
    pub scale: f64,
    pub pulses: u64,
}

impl HealthFrame {
    pub fn new(glow: &OrbGlow, pulses: u64) -> Self {
        Self {
            color: glow.color.to_string(),
            opacity: glow.opacity,
            scale: glow.scale,
            pulses,
        }
    }
}

/// Latest series of one feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesFrame {
    pub key: String,
    pub generation: u64,
    pub values: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SeriesSummary>,
}

impl SeriesFrame {
    pub fn new(key: &str, generation: u64, samples: &[opsviz_core::TimeSeriesSample]) -> Self {
        Self {
            key: key.to_string(),
            generation,
            values: samples.iter().map(|s| s.value).collect(),
            summary: summarize(samples),
        }
    }
}

/// Simulation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Some("warn".to_string()),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Scene name
    pub scene: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    /// Failure message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, scene: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            scene: scene.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsviz_core::{Scene, SceneKind};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_frame_from_snapshot() {
        let mut scene = Scene::stock(SceneKind::EngineAssembly, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        scene.evaluate(0.25);

        let frame = SimFrame::at(1.0).with_snapshot(&scene.snapshot());
        assert_eq!(frame.scene_t, Some(0.25));
        assert_eq!(frame.entities.len(), scene.entities().len());
    }

    #[test]
    fn test_export_serializes() {
        let mut export = SimExport::new("steady_state", "engine", 7);
        let mut frame = SimFrame::at(2.5);
        frame.events.push(SimEvent::warn("stall"));
        export.add_frame(frame);
        export.finalize(true, None);

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["duration_sec"], 2.5);
        assert_eq!(json["frames"][0]["events"][0]["level"], "warn");
        assert!(json.get("failure_reason").is_none());
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let export = SimExport::new("rewind", "factory", 1);
        let result = export.write_to_file("/nonexistent-dir/opsviz/export.json");
        assert!(matches!(result, Err(SimError::Io(_))));
    }
}
