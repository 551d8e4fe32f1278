//! Scenes: one animated 3D view with its own entities and topology.
//!
//! A scene is built once from a [`SceneConfig`] and an injected random
//! source. Building draws every random quantity the scene will ever need
//! (graph edges, indicator colours, stocked shelves), so per-frame
//! evaluation is a pure function of elapsed time.

use crate::arena::VisualArena;
use crate::entity::{AnimatedEntity, DerivedState, EntityId, EntityKind, Link};
use crate::error::CoreError;
use crate::rules;
use crate::topology::Topology;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scene identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneKind {
    /// Plant overview with a slowly turning factory model
    Factory,

    /// Three-joint arm sweeping through bounded angles
    RoboticArm,

    /// Rotating chamber with scanner rings and sensor posts
    TestingChamber,

    /// Engine casing with fan blades and status lights
    EngineAssembly,

    /// Hovering fighter with pulsing exhaust
    Aircraft,

    /// Shelf rows with a patrolling robot
    Warehouse,

    /// Layered network with firing nodes and flickering synapses
    NeuralNetwork,

    /// Ring of alert sources wired to a hub
    AlertNetwork,

    /// Server racks with blinking indicators and network links
    ServerRoom,
}

impl SceneKind {
    /// Returns a list of all scenes.
    pub fn all() -> Vec<SceneKind> {
        vec![
            SceneKind::Factory,
            SceneKind::RoboticArm,
            SceneKind::TestingChamber,
            SceneKind::EngineAssembly,
            SceneKind::Aircraft,
            SceneKind::Warehouse,
            SceneKind::NeuralNetwork,
            SceneKind::AlertNetwork,
            SceneKind::ServerRoom,
        ]
    }

    /// Returns the scene name.
    pub fn name(&self) -> &'static str {
        match self {
            SceneKind::Factory => "factory",
            SceneKind::RoboticArm => "robotic_arm",
            SceneKind::TestingChamber => "testing_chamber",
            SceneKind::EngineAssembly => "engine_assembly",
            SceneKind::Aircraft => "aircraft",
            SceneKind::Warehouse => "warehouse",
            SceneKind::NeuralNetwork => "neural_network",
            SceneKind::AlertNetwork => "alert_network",
            SceneKind::ServerRoom => "server_room",
        }
    }

    /// Returns a description of the scene.
    pub fn description(&self) -> &'static str {
        match self {
            SceneKind::Factory => "Factory model turning at a constant rate",
            SceneKind::RoboticArm => "Shoulder, elbow and wrist in bounded oscillation",
            SceneKind::TestingChamber => "Rotating test chamber with scanner and sensor lights",
            SceneKind::EngineAssembly => "Rotating engine casing, fan blades and status lights",
            SceneKind::Aircraft => "Fighter hovering and banking with pulsing exhaust",
            SceneKind::Warehouse => "Shelf rows with a robot patrolling and lifting",
            SceneKind::NeuralNetwork => "Layered network with bistable node firing",
            SceneKind::AlertNetwork => "Bobbing alert nodes joined by flickering links",
            SceneKind::ServerRoom => "Server racks with blinking indicators around a hub",
        }
    }

    /// Angular velocity (rad/s) of the scene's rotating assembly.
    ///
    /// The factory used to advance 0.002 rad per frame; at 60 Hz that is
    /// 0.12 rad/s, now independent of frame rate.
    pub fn default_spin_rate(&self) -> f64 {
        match self {
            SceneKind::Factory => 0.12,
            _ => 0.1,
        }
    }
}

impl std::fmt::Display for SceneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for SceneKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "factory" => Ok(SceneKind::Factory),
            "robotic_arm" | "arm" => Ok(SceneKind::RoboticArm),
            "testing_chamber" | "testing" => Ok(SceneKind::TestingChamber),
            "engine_assembly" | "engine" => Ok(SceneKind::EngineAssembly),
            "aircraft" | "fighter" => Ok(SceneKind::Aircraft),
            "warehouse" | "inventory" => Ok(SceneKind::Warehouse),
            "neural_network" | "neural" => Ok(SceneKind::NeuralNetwork),
            "alert_network" | "alerts" => Ok(SceneKind::AlertNetwork),
            "server_room" | "servers" => Ok(SceneKind::ServerRoom),
            _ => Err(CoreError::UnknownScene(s.to_string())),
        }
    }
}

impl Default for SceneKind {
    fn default() -> Self {
        SceneKind::Factory
    }
}

/// Static scene descriptor, consumed once at construction.
///
/// Every field has a default matching the stock console screens, so a
/// JSON descriptor only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub kind: SceneKind,

    /// Nodes on the alert network ring
    pub node_count: usize,

    /// Base radius of the alert ring
    pub ring_radius: f64,

    /// Random extra radius per alert node, `U(0, ring_jitter)`
    pub ring_jitter: f64,

    /// Alert pair is linked when a draw exceeds this
    pub link_threshold: f64,

    /// Alert pairs whose indices are both multiples of this are always linked
    pub backbone_stride: usize,

    /// Nodes per neural network layer
    pub layers: Vec<usize>,

    /// Distance between neural network layers
    pub layer_spacing: f64,

    /// Neural link is kept when a draw exceeds this
    pub layer_link_threshold: f64,

    /// Servers stacked in each rack
    pub servers_per_rack: usize,

    /// Probability a server indicator starts green rather than amber
    pub healthy_probability: f64,

    /// Shelves in each warehouse row
    pub shelves_per_row: usize,

    /// Probability a shelf is stocked
    pub stocked_probability: f64,

    /// Fan blades on the engine
    pub blade_count: usize,

    /// Override for the rotating assembly (rad/s); per-kind default when unset
    pub spin_rate: Option<f64>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            kind: SceneKind::Factory,
            node_count: 12,
            ring_radius: 3.0,
            ring_jitter: 1.0,
            link_threshold: 0.7,
            backbone_stride: 4,
            layers: vec![4, 6, 8, 6, 3],
            layer_spacing: 1.5,
            layer_link_threshold: 0.3,
            servers_per_rack: 5,
            healthy_probability: 0.8,
            shelves_per_row: 6,
            stocked_probability: 0.7,
            blade_count: 8,
            spin_rate: None,
        }
    }
}

impl SceneConfig {
    /// Stock descriptor for `kind`.
    pub fn for_kind(kind: SceneKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Parses and validates a JSON descriptor.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let config: SceneConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Angular velocity of the rotating assembly (rad/s).
    pub fn spin_rate(&self) -> f64 {
        self.spin_rate.unwrap_or_else(|| self.kind.default_spin_rate())
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let unit = |field: &'static str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(CoreError::invalid(field, format!("must be within [0, 1], got {}", value)))
            }
        };
        let positive = |field: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(CoreError::invalid(field, format!("must be finite and positive, got {}", value)))
            }
        };

        unit("link_threshold", self.link_threshold)?;
        unit("layer_link_threshold", self.layer_link_threshold)?;
        unit("healthy_probability", self.healthy_probability)?;
        unit("stocked_probability", self.stocked_probability)?;
        positive("ring_radius", self.ring_radius)?;
        positive("layer_spacing", self.layer_spacing)?;

        if !self.ring_jitter.is_finite() || self.ring_jitter < 0.0 {
            return Err(CoreError::invalid("ring_jitter", "must be finite and non-negative"));
        }
        if self.backbone_stride == 0 {
            return Err(CoreError::invalid("backbone_stride", "must be at least 1"));
        }
        if self.blade_count == 0 {
            return Err(CoreError::invalid("blade_count", "must be at least 1"));
        }
        if self.layers.is_empty() || self.layers.contains(&0) {
            return Err(CoreError::invalid("layers", "need at least one layer, none empty"));
        }
        if let Some(rate) = self.spin_rate {
            if !rate.is_finite() {
                return Err(CoreError::invalid("spin_rate", "must be finite"));
            }
        }
        Ok(())
    }
}

/// One entity as the renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub label: String,
    pub parent: Option<EntityId>,
    pub color: String,
    pub link: Option<Link>,
    pub state: DerivedState,
}

/// The renderer-facing tree of a scene at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub kind: SceneKind,
    /// Time of the last evaluation; `None` before the first frame
    pub t: Option<f64>,
    pub entities: Vec<EntitySnapshot>,
}

/// A constructed scene.
#[derive(Debug, Clone)]
pub struct Scene {
    config: SceneConfig,
    entities: Vec<AnimatedEntity>,
    topology: Topology,
    arena: VisualArena,
    last_t: Option<f64>,
    evaluations: u64,
}

impl Scene {
    /// Builds a scene, drawing all of its randomness from `rng`.
    pub fn build<R: Rng + ?Sized>(config: SceneConfig, rng: &mut R) -> Result<Self, CoreError> {
        config.validate()?;

        let (entities, topology) = rules::assemble(&config, rng).finish();

        let mut arena = VisualArena::with_capacity(entities.len());
        for entity in &entities {
            arena.insert(entity.state(0.0));
        }

        debug!(
            "Built scene {}: {} entities, {} nodes, {} edges",
            config.kind,
            entities.len(),
            topology.nodes.len(),
            topology.edges.len()
        );

        Ok(Self {
            config,
            entities,
            topology,
            arena,
            last_t: None,
            evaluations: 0,
        })
    }

    /// Stock scene of `kind`.
    pub fn stock<R: Rng + ?Sized>(kind: SceneKind, rng: &mut R) -> Result<Self, CoreError> {
        Self::build(SceneConfig::for_kind(kind), rng)
    }

    pub fn kind(&self) -> SceneKind {
        self.config.kind
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn entities(&self) -> &[AnimatedEntity] {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&AnimatedEntity> {
        self.entities.get(id.index())
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn arena(&self) -> &VisualArena {
        &self.arena
    }

    /// Entities with at least one time-varying channel.
    pub fn animated_count(&self) -> usize {
        self.entities.iter().filter(|e| e.is_animated()).count()
    }

    /// Recomputes every entity at `t` and writes the arena by index.
    ///
    /// Returns the number of records written; records retired by a
    /// teardown are skipped.
    pub fn evaluate(&mut self, t: f64) -> usize {
        let mut written = 0;
        for entity in &self.entities {
            if self.arena.write(entity.id, entity.state(t)) {
                written += 1;
            }
        }
        self.last_t = Some(t);
        self.evaluations += 1;
        written
    }

    /// State of one entity at an arbitrary `t`, without touching the arena.
    pub fn state_at(&self, id: EntityId, t: f64) -> Option<DerivedState> {
        self.entity(id).map(|e| e.state(t))
    }

    /// Time of the last evaluation.
    pub fn last_t(&self) -> Option<f64> {
        self.last_t
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Retires every arena record; later evaluations write nothing.
    pub fn teardown(&mut self) {
        self.arena.clear();
    }

    /// Current arena contents joined with the static entity description.
    pub fn snapshot(&self) -> SceneSnapshot {
        let entities = self
            .arena
            .iter()
            .filter_map(|(id, state)| {
                self.entity(id).map(|e| EntitySnapshot {
                    id,
                    kind: e.kind,
                    label: e.label.clone(),
                    parent: e.parent,
                    color: e.material.color.clone(),
                    link: e.link,
                    state: state.clone(),
                })
            })
            .collect();

        SceneSnapshot {
            kind: self.kind(),
            t: self.last_t,
            entities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    #[test]
    fn test_scene_kind_roundtrip() {
        for kind in SceneKind::all() {
            assert_eq!(kind.name().parse::<SceneKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.name());
        }
        assert_eq!("Robotic-Arm".parse::<SceneKind>().unwrap(), SceneKind::RoboticArm);
        assert!(matches!(
            "submarine".parse::<SceneKind>(),
            Err(CoreError::UnknownScene(_))
        ));
    }

    #[test]
    fn test_every_stock_scene_builds() {
        for kind in SceneKind::all() {
            let scene = Scene::stock(kind, &mut rng(1)).unwrap();
            assert!(!scene.entities().is_empty(), "{}", kind);
            assert!(scene.animated_count() > 0, "{}", kind);
            assert_eq!(scene.arena().len(), scene.entities().len());
        }
    }

    #[test]
    fn test_entity_ids_index_the_arena() {
        let scene = Scene::stock(SceneKind::ServerRoom, &mut rng(2)).unwrap();
        for (i, entity) in scene.entities().iter().enumerate() {
            assert_eq!(entity.id.index(), i);
            if let Some(parent) = entity.parent {
                assert!(parent < entity.id, "parent must be built first");
            }
        }
    }

    #[test]
    fn test_evaluate_writes_every_record() {
        let mut scene = Scene::stock(SceneKind::NeuralNetwork, &mut rng(3)).unwrap();
        let n = scene.entities().len();

        assert_eq!(scene.evaluate(0.5), n);
        assert_eq!(scene.evaluate(1.0), n);
        assert_eq!(scene.evaluations(), 2);
        assert_eq!(scene.last_t(), Some(1.0));
    }

    #[test]
    fn test_arena_matches_pure_state() {
        let mut scene = Scene::stock(SceneKind::Aircraft, &mut rng(4)).unwrap();
        scene.evaluate(3.7);
        for entity in scene.entities() {
            assert_eq!(scene.arena().get(entity.id), Some(&entity.state(3.7)));
        }
    }

    #[test]
    fn test_teardown_stops_writes() {
        let mut scene = Scene::stock(SceneKind::Warehouse, &mut rng(5)).unwrap();
        scene.teardown();
        assert_eq!(scene.evaluate(1.0), 0);
        assert!(scene.snapshot().entities.is_empty());
    }

    #[test]
    fn test_same_seed_same_scene() {
        for kind in SceneKind::all() {
            let mut a = Scene::stock(kind, &mut rng(11)).unwrap();
            let mut b = Scene::stock(kind, &mut rng(11)).unwrap();
            a.evaluate(2.5);
            b.evaluate(2.5);
            assert_eq!(a.snapshot(), b.snapshot(), "{}", kind);
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(SceneConfig::default().validate().is_ok());

        let bad = SceneConfig {
            link_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(CoreError::InvalidConfig { field: "link_threshold", .. })
        ));

        let bad = SceneConfig {
            layers: vec![4, 0, 3],
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = SceneConfig {
            backbone_stride: 0,
            ..Default::default()
        };
        assert!(Scene::build(bad, &mut rng(0)).is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config = SceneConfig::from_json(r#"{ "kind": "alert_network", "node_count": 20 }"#).unwrap();
        assert_eq!(config.kind, SceneKind::AlertNetwork);
        assert_eq!(config.node_count, 20);
        assert_eq!(config.layers, vec![4, 6, 8, 6, 3]);

        assert!(matches!(
            SceneConfig::from_json("{ not json"),
            Err(CoreError::Parse(_))
        ));
        assert!(SceneConfig::from_json(r#"{ "stocked_probability": -0.1 }"#).is_err());
    }

    #[test]
    fn test_spin_rate_defaults() {
        assert_eq!(SceneConfig::for_kind(SceneKind::Factory).spin_rate(), 0.12);
        assert_eq!(SceneConfig::for_kind(SceneKind::ServerRoom).spin_rate(), 0.1);

        let custom = SceneConfig {
            spin_rate: Some(0.5),
            ..SceneConfig::for_kind(SceneKind::EngineAssembly)
        };
        assert_eq!(custom.spin_rate(), 0.5);
    }
}
