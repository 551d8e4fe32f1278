//! Animated entities and their derived visual state.
//!
//! An entity is static description plus a list of channels. Its derived
//! state at time `t` is rebuilt from the rest pose on every call, so two
//! calls with the same `t` are bit-identical.

use crate::curve::{Curve, Phase};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Index of an entity inside its scene (and of its record in the arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an entity represents to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Orb,
    Joint,
    IndicatorLight,
    ConnectionLine,
    ExhaustGlow,
    OrbitingNode,
    ShelfRobot,
    /// Group that carries its children (factory, engine casing, airframe)
    Assembly,
    /// Scene furniture with no channels
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Visual parameter a scalar channel drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    /// Absolute Euler angle around an axis (radians)
    Rotation(Axis),
    /// Displacement added to the rest position
    Offset(Axis),
    /// Uniform scale
    Scale,
    /// Emissive intensity
    Intensity,
    Opacity,
}

/// Sinusoidal travel around a centre point, optionally facing the
/// direction of travel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drift {
    pub center: Vector3<f64>,
    pub amplitude: Vector3<f64>,
    pub phase: Phase,
    pub face_travel: bool,
}

impl Drift {
    /// Displacement at time `t`.
    pub fn offset(&self, t: f64) -> Vector3<f64> {
        self.center + self.amplitude * self.phase.sin(t)
    }

    /// Time derivative of [`Drift::offset`].
    pub fn velocity(&self, t: f64) -> Vector3<f64> {
        self.amplitude * (self.phase.freq * self.phase.at(t).cos())
    }

    /// Yaw (rotation about Y) that points +Z along the velocity.
    pub fn heading(&self, t: f64) -> f64 {
        let v = self.velocity(t);
        v.x.atan2(v.z)
    }
}

/// One animation rule attached to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Scalar { property: Property, curve: Curve },
    Drift(Drift),
}

/// Rest pose: the state an entity shows with no channels applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub rotation: Vector3<f64>,
    pub scale: f64,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Vector3::zeros(),
            scale: 1.0,
        }
    }
}

/// Material parameters at rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Hex colour, e.g. `#00A3FF`
    pub color: String,
    pub intensity: f64,
    pub opacity: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: crate::palette::PANEL.to_string(),
            intensity: 0.1,
            opacity: 1.0,
        }
    }
}

/// Two entities joined by a connection line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub from: EntityId,
    pub to: EntityId,
}

/// Instantaneous visual parameters for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedState {
    pub position: Vector3<f64>,
    pub rotation: Vector3<f64>,
    pub scale: f64,
    pub intensity: f64,
    pub opacity: f64,
}

impl DerivedState {
    /// Value of a scalar property in this state.
    pub fn get(&self, property: Property) -> f64 {
        match property {
            Property::Rotation(axis) => self.rotation[axis.index()],
            Property::Offset(axis) => self.position[axis.index()],
            Property::Scale => self.scale,
            Property::Intensity => self.intensity,
            Property::Opacity => self.opacity,
        }
    }

    /// Returns true if every component is a finite number.
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.rotation.iter().all(|v| v.is_finite())
            && self.scale.is_finite()
            && self.intensity.is_finite()
            && self.opacity.is_finite()
    }
}

/// A visually animated object owned by exactly one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimatedEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub label: String,
    /// Transform parent; the renderer composes child transforms onto it
    pub parent: Option<EntityId>,
    pub rest: Pose,
    pub material: Material,
    /// Endpoints for connection lines
    pub link: Option<Link>,
    pub channels: Vec<Channel>,
}

impl AnimatedEntity {
    /// Creates an entity at the origin with default material.
    pub fn new(id: EntityId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            label: format!("{:?}_{}", kind, id.0).to_lowercase(),
            parent: None,
            rest: Pose::default(),
            material: Material::default(),
            link: None,
            channels: Vec::new(),
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn child_of(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn at(mut self, x: f64, y: f64, z: f64) -> Self {
        self.rest.position = Vector3::new(x, y, z);
        self
    }

    pub fn at_vec(mut self, position: Vector3<f64>) -> Self {
        self.rest.position = position;
        self
    }

    pub fn rotated(mut self, x: f64, y: f64, z: f64) -> Self {
        self.rest.rotation = Vector3::new(x, y, z);
        self
    }

    pub fn scaled(mut self, scale: f64) -> Self {
        self.rest.scale = scale;
        self
    }

    /// Sets colour and emissive intensity.
    pub fn glowing(mut self, color: &str, intensity: f64) -> Self {
        self.material.color = color.to_string();
        self.material.intensity = intensity;
        self
    }

    pub fn translucent(mut self, opacity: f64) -> Self {
        self.material.opacity = opacity;
        self
    }

    pub fn linking(mut self, from: EntityId, to: EntityId) -> Self {
        self.link = Some(Link { from, to });
        self
    }

    /// Attaches a scalar curve to a property.
    pub fn animate(mut self, property: Property, curve: Curve) -> Self {
        self.channels.push(Channel::Scalar { property, curve });
        self
    }

    pub fn drifting(mut self, drift: Drift) -> Self {
        self.channels.push(Channel::Drift(drift));
        self
    }

    /// Returns true if any channel varies with time.
    pub fn is_animated(&self) -> bool {
        self.channels.iter().any(|c| match c {
            Channel::Scalar { curve, .. } => curve.is_animated(),
            Channel::Drift(_) => true,
        })
    }

    /// Curve driving `property`, if any.
    pub fn curve_for(&self, property: Property) -> Option<&Curve> {
        self.channels.iter().find_map(|c| match c {
            Channel::Scalar { property: p, curve } if *p == property => Some(curve),
            _ => None,
        })
    }

    /// Derived state at elapsed time `t`.
    pub fn state(&self, t: f64) -> DerivedState {
        let mut state = DerivedState {
            position: self.rest.position,
            rotation: self.rest.rotation,
            scale: self.rest.scale,
            intensity: self.material.intensity,
            opacity: self.material.opacity,
        };

        for channel in &self.channels {
            match channel {
                Channel::Scalar { property, curve } => {
                    let value = curve.sample(t);
                    match property {
                        Property::Rotation(axis) => state.rotation[axis.index()] = value,
                        Property::Offset(axis) => state.position[axis.index()] += value,
                        Property::Scale => state.scale = value,
                        Property::Intensity => state.intensity = value,
                        Property::Opacity => state.opacity = value,
                    }
                }
                Channel::Drift(drift) => {
                    state.position += drift.offset(t);
                    if drift.face_travel {
                        state.rotation.y = drift.heading(t);
                    }
                }
            }
        }

        state
    }
}
