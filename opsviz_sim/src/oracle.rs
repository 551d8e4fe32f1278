//! Invariant oracle for simulation.
//!
//! The oracle watches every frame a scene produces and checks the
//! properties that must hold no matter how the host behaves:
//! - Scene time only moves forward
//! - Bounded curves stay inside their range
//! - Intensity and opacity are finite and never negative
//! - Re-evaluating a recorded frame reproduces it exactly (rewind)

use opsviz_core::entity::{Channel, Property};
use opsviz_core::{AnimatedEntity, DerivedState, EntityId, Scene, SceneSnapshot};
use serde::Serialize;
use std::fmt;

/// Violations kept in detail; later ones are only counted.
const MAX_RECORDED: usize = 64;

/// A broken invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A frame's t did not exceed the previous frame's t
    TimeNotIncreasing { previous: f64, current: f64 },

    /// A channel with a known range produced a value outside it
    OutOfRange {
        entity: EntityId,
        label: String,
        property: Property,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A derived state contains NaN or infinity
    NonFinite { entity: EntityId, label: String, t: f64 },

    /// Intensity or opacity fell below zero
    Negative {
        entity: EntityId,
        label: String,
        property: Property,
        value: f64,
    },

    /// Re-evaluating at a recorded t disagreed with the recording
    RewindMismatch { entity: EntityId, label: String, t: f64 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::TimeNotIncreasing { previous, current } => {
                write!(f, "scene time went from {:.6}s to {:.6}s", previous, current)
            }
            Violation::OutOfRange { entity, label, property, value, min, max } => write!(
                f,
                "{} ({}) {:?} = {:.6} outside [{:.6}, {:.6}]",
                label, entity, property, value, min, max
            ),
            Violation::NonFinite { entity, label, t } => {
                write!(f, "{} ({}) has a non-finite state at t={:.6}s", label, entity, t)
            }
            Violation::Negative { entity, label, property, value } => {
                write!(f, "{} ({}) {:?} = {:.6} is negative", label, entity, property, value)
            }
            Violation::RewindMismatch { entity, label, t } => {
                write!(f, "{} ({}) does not reproduce its frame at t={:.6}s", label, entity, t)
            }
        }
    }
}

/// Frame-by-frame invariant checker for one scene lifetime.
#[derive(Debug, Clone)]
pub struct InvariantOracle {
    /// Slack allowed on range and rewind comparisons
    tolerance: f64,

    /// t of the last frame checked
    last_t: Option<f64>,

    frames_checked: u64,

    entity_checks: u64,

    rewinds_checked: u64,

    violations: Vec<Violation>,

    total_violations: u64,
}

impl Default for InvariantOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantOracle {
    pub fn new() -> Self {
        Self {
            tolerance: 1e-9,
            last_t: None,
            frames_checked: 0,
            entity_checks: 0,
            rewinds_checked: 0,
            violations: Vec::new(),
            total_violations: 0,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Checks the scene's current arena if it holds a frame not seen yet.
    ///
    /// Returns the number of new violations.
    pub fn observe(&mut self, scene: &Scene) -> usize {
        let Some(t) = scene.last_t() else {
            return 0;
        };
        let before = self.total_violations;

        match self.last_t {
            // Same frame observed again (stale refresh)
            Some(previous) if t == previous => return 0,
            Some(previous) if t < previous => {
                self.record(Violation::TimeNotIncreasing { previous, current: t });
            }
            _ => {}
        }
        self.last_t = Some(t);
        self.frames_checked += 1;

        for (id, state) in scene.arena().iter() {
            if let Some(entity) = scene.entity(id) {
                self.check_entity(entity, state, t);
            }
        }

        (self.total_violations - before) as usize
    }

    /// Re-evaluates every entity of `recorded` at its t and compares.
    pub fn check_rewind(&mut self, scene: &Scene, recorded: &SceneSnapshot) -> usize {
        let Some(t) = recorded.t else {
            return 0;
        };
        let before = self.total_violations;
        self.rewinds_checked += 1;

        for entry in &recorded.entities {
            let reproduced = scene.state_at(entry.id, t);
            let matches = reproduced
                .as_ref()
                .map(|state| states_match(state, &entry.state, self.tolerance))
                .unwrap_or(false);
            if !matches {
                self.record(Violation::RewindMismatch {
                    entity: entry.id,
                    label: entry.label.clone(),
                    t,
                });
            }
        }

        (self.total_violations - before) as usize
    }

    fn check_entity(&mut self, entity: &AnimatedEntity, state: &DerivedState, t: f64) {
        self.entity_checks += 1;

        if !state.is_finite() {
            self.record(Violation::NonFinite {
                entity: entity.id,
                label: entity.label.clone(),
                t,
            });
            return;
        }

        for property in [Property::Intensity, Property::Opacity] {
            let value = state.get(property);
            if value < -self.tolerance {
                self.record(Violation::Negative {
                    entity: entity.id,
                    label: entity.label.clone(),
                    property,
                    value,
                });
            }
        }

        for channel in &entity.channels {
            let Channel::Scalar { property, curve } = channel else {
                continue;
            };
            let Some((min, max)) = curve.range() else {
                continue;
            };
            let Some(value) = channel_value(entity, state, *property) else {
                continue;
            };
            if value < min - self.tolerance || value > max + self.tolerance {
                self.record(Violation::OutOfRange {
                    entity: entity.id,
                    label: entity.label.clone(),
                    property: *property,
                    value,
                    min,
                    max,
                });
            }
        }
    }

    fn record(&mut self, violation: Violation) {
        self.total_violations += 1;
        if self.violations.len() < MAX_RECORDED {
            self.violations.push(violation);
        }
    }

    pub fn is_clean(&self) -> bool {
        self.total_violations == 0
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn first_violation(&self) -> Option<&Violation> {
        self.violations.first()
    }

    pub fn total_violations(&self) -> u64 {
        self.total_violations
    }

    pub fn frames_checked(&self) -> u64 {
        self.frames_checked
    }

    pub fn entity_checks(&self) -> u64 {
        self.entity_checks
    }

    pub fn rewinds_checked(&self) -> u64 {
        self.rewinds_checked
    }

    /// Forgets the last t, e.g. when a new scene lifetime begins.
    pub fn reset_clock(&mut self) {
        self.last_t = None;
    }
}

/// Value the channel driving `property` contributed to `state`.
///
/// `None` when the value cannot be isolated: several channels drive the
/// same property, or a drift moves the entity as well.
fn channel_value(entity: &AnimatedEntity, state: &DerivedState, property: Property) -> Option<f64> {
    let drivers = entity
        .channels
        .iter()
        .filter(|c| matches!(c, Channel::Scalar { property: p, .. } if *p == property))
        .count();
    if drivers != 1 {
        return None;
    }

    match property {
        Property::Offset(axis) => {
            if entity.channels.iter().any(|c| matches!(c, Channel::Drift(_))) {
                return None;
            }
            Some(state.position[axis.index()] - entity.rest.position[axis.index()])
        }
        Property::Rotation(axis) => {
            let drift_faces = entity
                .channels
                .iter()
                .any(|c| matches!(c, Channel::Drift(d) if d.face_travel));
            if drift_faces && axis.index() == 1 {
                return None;
            }
            Some(state.get(property))
        }
        _ => Some(state.get(property)),
    }
}

fn states_match(a: &DerivedState, b: &DerivedState, tolerance: f64) -> bool {
    let close = |x: f64, y: f64| (x - y).abs() <= tolerance;
    (0..3).all(|i| close(a.position[i], b.position[i]) && close(a.rotation[i], b.rotation[i]))
        && close(a.scale, b.scale)
        && close(a.intensity, b.intensity)
        && close(a.opacity, b.opacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsviz_core::SceneKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn scene(kind: SceneKind) -> Scene {
        Scene::stock(kind, &mut ChaCha8Rng::seed_from_u64(5)).unwrap()
    }

    #[test]
    fn test_unevaluated_scene_is_not_a_frame() {
        let mut oracle = InvariantOracle::new();
        assert_eq!(oracle.observe(&scene(SceneKind::Factory)), 0);
        assert_eq!(oracle.frames_checked(), 0);
    }

    #[test]
    fn test_every_stock_scene_is_clean() {
        for kind in SceneKind::all() {
            let mut scene = scene(kind);
            let mut oracle = InvariantOracle::new();
            for frame in 1..=240 {
                scene.evaluate(frame as f64 / 60.0);
                oracle.observe(&scene);
            }
            assert!(oracle.is_clean(), "{}: {:?}", kind, oracle.first_violation());
            assert_eq!(oracle.frames_checked(), 240);
        }
    }

    #[test]
    fn test_backwards_time_is_flagged() {
        let mut scene = scene(SceneKind::AlertNetwork);
        let mut oracle = InvariantOracle::new();

        scene.evaluate(2.0);
        oracle.observe(&scene);
        scene.evaluate(1.0);

        assert_eq!(oracle.observe(&scene), 1);
        assert!(matches!(
            oracle.first_violation(),
            Some(Violation::TimeNotIncreasing { .. })
        ));
    }

    #[test]
    fn test_repeated_observation_is_ignored() {
        let mut scene = scene(SceneKind::EngineAssembly);
        let mut oracle = InvariantOracle::new();

        scene.evaluate(0.5);
        oracle.observe(&scene);
        oracle.observe(&scene);

        assert_eq!(oracle.frames_checked(), 1);
        assert!(oracle.is_clean());
    }

    #[test]
    fn test_rewind_reproduces_snapshot() {
        let mut scene = scene(SceneKind::NeuralNetwork);
        let mut oracle = InvariantOracle::new();

        scene.evaluate(3.25);
        let recorded = scene.snapshot();
        scene.evaluate(9.0);

        assert_eq!(oracle.check_rewind(&scene, &recorded), 0);
        assert_eq!(oracle.rewinds_checked(), 1);
    }

    #[test]
    fn test_tampered_snapshot_fails_rewind() {
        let mut scene = scene(SceneKind::ServerRoom);
        let mut oracle = InvariantOracle::new();

        scene.evaluate(1.0);
        let mut recorded = scene.snapshot();
        recorded.entities[0].state.scale += 0.5;

        assert_eq!(oracle.check_rewind(&scene, &recorded), 1);
        assert!(matches!(
            oracle.first_violation(),
            Some(Violation::RewindMismatch { .. })
        ));
    }

    #[test]
    fn test_violation_display() {
        let v = Violation::TimeNotIncreasing {
            previous: 2.0,
            current: 1.0,
        };
        assert_eq!(v.to_string(), "scene time went from 2.000000s to 1.000000s");
    }
}
