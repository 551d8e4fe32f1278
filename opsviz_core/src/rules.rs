//! Per-scene animation rule sets.
//!
//! Each function lays out one scene: static furniture, the animated
//! entities and the curve attached to each of their properties. Groups of
//! identical entities are phase-staggered by their index so they never
//! animate in lockstep.
//!
//! Parents are always spawned before their children, so a parent id is
//! lower than any of its children's.

use crate::curve::{Curve, Phase};
use crate::entity::{AnimatedEntity, Axis, Drift, EntityId, EntityKind, Property};
use crate::palette;
use crate::scene::{SceneConfig, SceneKind};
use crate::topology::{Topology, TopologyNode};
use nalgebra::Vector3;
use rand::Rng;
use std::f64::consts::PI;

/// Collects entities in id order while a scene is laid out.
#[derive(Debug, Default)]
pub struct SceneBuilder {
    entities: Vec<AnimatedEntity>,
    topology: Topology,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity and returns its id.
    pub fn spawn(
        &mut self,
        kind: EntityKind,
        configure: impl FnOnce(AnimatedEntity) -> AnimatedEntity,
    ) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(configure(AnimatedEntity::new(id, kind)));
        id
    }

    pub fn set_topology(&mut self, topology: Topology) {
        self.topology = topology;
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn finish(self) -> (Vec<AnimatedEntity>, Topology) {
        (self.entities, self.topology)
    }
}

/// Lays out the scene described by `config`.
pub fn assemble<R: Rng + ?Sized>(config: &SceneConfig, rng: &mut R) -> SceneBuilder {
    let mut b = SceneBuilder::new();
    match config.kind {
        SceneKind::Factory => factory(&mut b, config),
        SceneKind::RoboticArm => robotic_arm(&mut b),
        SceneKind::TestingChamber => testing_chamber(&mut b, config),
        SceneKind::EngineAssembly => engine_assembly(&mut b, config),
        SceneKind::Aircraft => aircraft(&mut b),
        SceneKind::Warehouse => warehouse(&mut b, config, rng),
        SceneKind::NeuralNetwork => neural_network(&mut b, config, rng),
        SceneKind::AlertNetwork => alert_network(&mut b, config, rng),
        SceneKind::ServerRoom => server_room(&mut b, config, rng),
    }
    b
}

fn spin(config: &SceneConfig) -> Curve {
    Curve::linear(0.0, config.spin_rate())
}

fn factory(b: &mut SceneBuilder, config: &SceneConfig) {
    let root = b.spawn(EntityKind::Assembly, |e| {
        e.labeled("factory")
            .animate(Property::Rotation(Axis::Y), spin(config))
    });

    b.spawn(EntityKind::Static, |e| {
        e.labeled("foundation").child_of(root).at(0.0, -1.0, 0.0).glowing(palette::PANEL, 0.05)
    });
    b.spawn(EntityKind::Static, |e| {
        e.labeled("building").child_of(root).at(0.0, 1.0, 0.0).glowing(palette::STEEL, 0.08)
    });
    b.spawn(EntityKind::Static, |e| {
        e.labeled("roof").child_of(root).at(0.0, 2.5, 0.0).glowing(palette::SHADOW, 0.1)
    });
    b.spawn(EntityKind::Static, |e| {
        e.labeled("control_tower").child_of(root).at(0.0, 4.0, 0.0).glowing(palette::STEEL, 0.1)
    });
    b.spawn(EntityKind::IndicatorLight, |e| {
        e.labeled("tower_ring").child_of(root).at(0.0, 6.0, 0.0).glowing(palette::BLUE, 0.8)
    });

    for x in [-2.0, 2.0] {
        for z in [-2.0, 2.0] {
            b.spawn(EntityKind::Static, |e| {
                e.labeled("pillar").child_of(root).at(x, 0.0, z).glowing(palette::SHADOW, 0.1)
            });
        }
    }

    for (i, x) in [-1.5, 1.5].into_iter().enumerate() {
        let color = if i % 2 == 0 { palette::BLUE } else { palette::AMBER };
        b.spawn(EntityKind::IndicatorLight, |e| {
            e.labeled(format!("panel_{}", i)).child_of(root).at(x, 1.2, 3.0).glowing(color, 1.2)
        });
    }
}

/// Joint limits and oscillators, shoulder to wrist.
pub const ARM_JOINTS: [(&str, f64, f64, Phase); 3] = [
    ("shoulder", -PI / 4.0, PI / 4.0, Phase::new(0.5, 0.0)),
    ("elbow", -PI / 6.0, PI / 3.0, Phase::new(0.7, 0.5)),
    ("wrist", -PI / 8.0, PI / 8.0, Phase::new(1.0, 1.0)),
];

fn robotic_arm(b: &mut SceneBuilder) {
    let base = b.spawn(EntityKind::Assembly, |e| {
        e.labeled("arm_base").at(0.0, -2.0, 0.0).glowing(palette::STEEL, 0.1)
    });
    b.spawn(EntityKind::Static, |e| {
        e.labeled("pedestal").child_of(base).at(0.0, 0.6, 0.0).glowing(palette::SHADOW, 0.1)
    });

    // Each joint hangs off the previous one; offsets are from the parent
    let mounts = [0.7, 3.0, 2.5];
    let mut parent = base;
    for (&(name, min, max, phase), mount) in ARM_JOINTS.iter().zip(mounts) {
        let joint = b.spawn(EntityKind::Joint, |e| {
            e.labeled(name)
                .child_of(parent)
                .at(0.0, mount, 0.0)
                .glowing(palette::PANEL, 0.1)
                .animate(Property::Rotation(Axis::Z), Curve::bounded(min, max, phase))
        });
        parent = joint;

        if name == "wrist" {
            for (side, x) in [("left", -0.25), ("right", 0.25)] {
                b.spawn(EntityKind::Static, |e| {
                    e.labeled(format!("gripper_{}", side))
                        .child_of(joint)
                        .at(x, 0.5, 0.0)
                        .glowing(palette::AMBER, 0.8)
                });
            }
        } else {
            let hub_height = if name == "shoulder" { 1.7 } else { 1.4 };
            b.spawn(EntityKind::Static, |e| {
                e.labeled(format!("{}_hub", name))
                    .child_of(joint)
                    .at(0.0, hub_height, 0.0)
                    .glowing(palette::BLUE, 0.8)
            });
        }
    }

    b.spawn(EntityKind::Static, |e| {
        e.labeled("floor")
            .child_of(base)
            .at(0.0, -0.5, 0.0)
            .rotated(-PI / 2.0, 0.0, 0.0)
            .glowing(palette::SHADOW, 0.05)
    });

    for (i, x) in [-3.0, 3.0].into_iter().enumerate() {
        let post = b.spawn(EntityKind::Static, |e| {
            e.labeled(format!("post_{}", i)).child_of(base).at(x, 0.0, -2.0).glowing(palette::STEEL, 0.1)
        });
        let color = if i % 2 == 0 { palette::GREEN } else { palette::RED };
        b.spawn(EntityKind::IndicatorLight, |e| {
            e.labeled(format!("post_light_{}", i)).child_of(post).at(0.0, 0.9, 0.0).glowing(color, 1.0)
        });
    }
}

fn testing_chamber(b: &mut SceneBuilder, config: &SceneConfig) {
    let root = b.spawn(EntityKind::Assembly, |e| {
        e.labeled("testing_chamber")
            .animate(Property::Rotation(Axis::Y), spin(config))
    });

    b.spawn(EntityKind::Static, |e| {
        e.labeled("platform").child_of(root).at(0.0, -1.5, 0.0).glowing(palette::STEEL, 0.1)
    });
    b.spawn(EntityKind::Static, |e| {
        e.labeled("chamber").child_of(root).glowing(palette::PANEL, 0.1).translucent(0.7)
    });
    b.spawn(EntityKind::IndicatorLight, |e| {
        e.labeled("scanning_beam").child_of(root).glowing(palette::BLUE, 1.5)
    });
    b.spawn(EntityKind::Static, |e| {
        e.labeled("component").child_of(root).at(0.0, -0.5, 0.0).glowing(palette::WHITE, 0.2)
    });

    for (i, x) in [-2.0, 0.0, 2.0].into_iter().enumerate() {
        let post = b.spawn(EntityKind::Static, |e| {
            e.labeled(format!("sensor_{}", i)).child_of(root).at(x, 0.0, 0.0).glowing(palette::SHADOW, 0.1)
        });
        let color = if i == 1 { palette::GREEN } else { palette::AMBER };
        b.spawn(EntityKind::IndicatorLight, |e| {
            e.labeled(format!("sensor_light_{}", i)).child_of(post).at(0.0, 1.0, 0.0).glowing(color, 1.0)
        });
    }

    b.spawn(EntityKind::IndicatorLight, |e| {
        e.labeled("scanner_ring").child_of(root).at(0.0, 1.5, 0.0).glowing(palette::RED, 1.0)
    });
}

fn engine_assembly(b: &mut SceneBuilder, config: &SceneConfig) {
    let casing = b.spawn(EntityKind::Assembly, |e| {
        e.labeled("casing")
            .glowing(palette::STEEL, 0.05)
            .animate(Property::Rotation(Axis::Y), spin(config))
    });

    b.spawn(EntityKind::Static, |e| {
        e.labeled("fan_hub").child_of(casing).at(0.0, 0.0, -3.0).glowing(palette::WHITE, 0.1)
    });

    let blades = config.blade_count;
    for i in 0..blades {
        let angle = (i as f64 / blades as f64) * PI * 2.0;
        b.spawn(EntityKind::Static, |e| {
            e.labeled(format!("fan_blade_{}", i))
                .child_of(casing)
                .at(angle.cos() * 0.8, angle.sin() * 0.8, -3.0)
                .rotated(0.0, 0.0, angle)
                .glowing(palette::WHITE, 0.2)
        });
    }

    b.spawn(EntityKind::Static, |e| {
        e.labeled("core").child_of(casing).glowing(palette::PANEL, 0.1)
    });
    b.spawn(EntityKind::Static, |e| {
        e.labeled("intake").child_of(casing).at(0.0, 0.0, 3.0).glowing(palette::SHADOW, 0.3)
    });
    b.spawn(EntityKind::Static, |e| {
        e.labeled("nozzle").child_of(casing).at(0.0, 0.0, 4.0).glowing(palette::RED, 0.5)
    });
    for (i, y) in [-1.8, 1.8].into_iter().enumerate() {
        b.spawn(EntityKind::Static, |e| {
            e.labeled(format!("support_{}", i)).child_of(casing).at(0.0, y, 0.0).glowing(palette::SHADOW, 0.1)
        });
    }
    b.spawn(EntityKind::IndicatorLight, |e| {
        e.labeled("control_unit").child_of(casing).at(0.0, 2.0, 0.0).glowing(palette::BLUE, 1.0)
    });
    for (i, z) in [-2.0, 0.0, 2.0].into_iter().enumerate() {
        let color = if i == 1 { palette::GREEN } else { palette::AMBER };
        b.spawn(EntityKind::IndicatorLight, |e| {
            e.labeled(format!("status_light_{}", i)).child_of(casing).at(0.0, 2.3, z).glowing(color, 1.0)
        });
    }
}

fn aircraft(b: &mut SceneBuilder) {
    let jet = b.spawn(EntityKind::Assembly, |e| {
        e.labeled("fighter")
            .glowing(palette::STEEL, 0.1)
            // hover
            .animate(Property::Offset(Axis::Y), Curve::wave(0.0, 0.2, Phase::new(0.5, 0.0)))
            // bank
            .animate(Property::Rotation(Axis::Z), Curve::wave(0.0, 0.05, Phase::new(0.3, 0.0)))
            // yaw
            .animate(Property::Rotation(Axis::Y), Curve::wave(PI / 4.0, 0.1, Phase::new(0.2, 0.0)))
    });

    b.spawn(EntityKind::Static, |e| {
        e.labeled("cockpit").child_of(jet).at(0.0, 0.25, -1.0).glowing(palette::BLUE, 0.3).translucent(0.8)
    });

    for (i, x) in [-0.6, 0.6].into_iter().enumerate() {
        b.spawn(EntityKind::ExhaustGlow, |e| {
            e.labeled(format!("exhaust_{}", i))
                .child_of(jet)
                .at(x, -0.1, 2.0)
                .glowing(palette::RED, 0.8)
                .animate(Property::Intensity, Curve::wave(0.8, 0.2, Phase::staggered(10.0, i, 0.5)))
        });
    }
}

fn warehouse<R: Rng + ?Sized>(b: &mut SceneBuilder, config: &SceneConfig, rng: &mut R) {
    let floor = b.spawn(EntityKind::Static, |e| {
        e.labeled("floor").at(0.0, -0.5, 0.0).rotated(-PI / 2.0, 0.0, 0.0).glowing(palette::SHADOW, 0.05)
    });

    // (row, position of shelf i, yaw)
    let rows: [(&str, fn(f64) -> (f64, f64), f64); 4] = [
        ("left", |d| (-5.0, d), PI / 2.0),
        ("right", |d| (5.0, d), -PI / 2.0),
        ("front", |d| (d, -5.0), 0.0),
        ("back", |d| (d, 5.0), PI),
    ];

    for (row, place, yaw) in rows {
        for i in 0..config.shelves_per_row {
            let (x, z) = place(-4.0 + i as f64 * 1.8);
            let stocked = rng.gen::<f64>() > 1.0 - config.stocked_probability;
            let color = if stocked { palette::AMBER } else { palette::STEEL };
            b.spawn(EntityKind::Static, |e| {
                e.labeled(format!("shelf_{}_{}", row, i))
                    .child_of(floor)
                    .at(x, 0.0, z)
                    .rotated(0.0, yaw, 0.0)
                    .glowing(color, 0.3)
            });
        }
    }

    // Patrols along X facing its travel, lifting while sin(0.2t) > 0.8
    b.spawn(EntityKind::ShelfRobot, |e| {
        e.labeled("robot")
            .at(0.0, 0.5, 0.0)
            .glowing(palette::BLUE, 0.5)
            .drifting(Drift {
                center: Vector3::zeros(),
                amplitude: Vector3::new(4.0, 0.0, 0.0),
                phase: Phase::new(0.5, 0.0),
                face_travel: true,
            })
            .animate(
                Property::Offset(Axis::Y),
                Curve::gated(
                    Phase::new(0.2, 0.0),
                    0.8,
                    Curve::wave(0.0, 0.3, Phase::new(2.0, 0.0)),
                    0.0,
                ),
            )
    });
}

fn neural_network<R: Rng + ?Sized>(b: &mut SceneBuilder, config: &SceneConfig, rng: &mut R) {
    let topology = Topology::layered(&config.layers, config.layer_spacing, config.layer_link_threshold, rng);

    let nodes: Vec<EntityId> = topology
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            b.spawn(EntityKind::Orb, |e| {
                e.labeled(format!("neuron_{}_{}", node.layer, i))
                    .at_vec(node.position)
                    .glowing(&node.color, 0.5)
                    .translucent(0.9)
                    .animate(Property::Scale, Curve::wave(1.0, 0.1, Phase::staggered(2.0, i, 0.2)))
                    .animate(
                        Property::Intensity,
                        Curve::bistable(Phase::staggered(1.0, i, 1.0), 0.7, 2.0, 0.5),
                    )
            })
        })
        .collect();

    for (i, (edge, color)) in topology.edges.iter().zip(&topology.edge_colors).enumerate() {
        b.spawn(EntityKind::ConnectionLine, |e| {
            e.labeled(format!("synapse_{}", i))
                .linking(nodes[edge.from], nodes[edge.to])
                .glowing(color, 0.0)
                .animate(Property::Opacity, Curve::rectified(0.2, 1.0, Phase::staggered(3.0, i, 0.5)))
        });
    }

    b.set_topology(topology);
}

fn alert_network<R: Rng + ?Sized>(b: &mut SceneBuilder, config: &SceneConfig, rng: &mut R) {
    let topology = Topology::ring(config.node_count, config.ring_radius, config.ring_jitter, 1.0, rng)
        .connect_pairs(config.link_threshold, config.backbone_stride, rng);

    b.spawn(EntityKind::Orb, |e| {
        e.labeled("alert_hub").scaled(0.5).glowing(palette::GREEN, 1.0)
    });

    let nodes: Vec<EntityId> = topology
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            b.spawn(EntityKind::OrbitingNode, |e| {
                e.labeled(format!("alert_node_{}", i))
                    .at_vec(node.position)
                    .scaled(node.size)
                    .glowing(&node.color, 1.0)
                    .animate(Property::Offset(Axis::Y), Curve::wave(0.0, 0.1, Phase::staggered(0.5, i, 1.0)))
            })
        })
        .collect();

    for (i, edge) in topology.edges.iter().enumerate() {
        b.spawn(EntityKind::ConnectionLine, |e| {
            e.labeled(format!("alert_link_{}", i))
                .linking(nodes[edge.from], nodes[edge.to])
                .glowing(palette::BLUE, 0.0)
                .translucent(0.5)
                .animate(Property::Opacity, Curve::wave(0.5, 0.3, Phase::staggered(2.0, i, 1.0)))
        });
    }

    b.set_topology(topology);
}

fn server_room<R: Rng + ?Sized>(b: &mut SceneBuilder, config: &SceneConfig, rng: &mut R) {
    let room = b.spawn(EntityKind::Assembly, |e| {
        e.labeled("server_room")
            .animate(Property::Rotation(Axis::Y), spin(config))
    });

    let racks = [
        (Vector3::new(2.5, 0.0, 0.0), -PI / 2.0),
        (Vector3::new(-2.5, 0.0, 0.0), PI / 2.0),
        (Vector3::new(0.0, 0.0, 2.5), PI),
        (Vector3::new(0.0, 0.0, -2.5), 0.0),
    ];

    // Indicators are staggered by their index across the whole room
    let mut indicator = 0;
    for (r, (position, yaw)) in racks.into_iter().enumerate() {
        let rack = b.spawn(EntityKind::Static, |e| {
            e.labeled(format!("rack_{}", r))
                .child_of(room)
                .at_vec(position)
                .rotated(0.0, yaw, 0.0)
                .glowing(palette::SHADOW, 0.1)
        });

        for s in 0..config.servers_per_rack {
            let server = b.spawn(EntityKind::Static, |e| {
                e.labeled(format!("server_{}_{}", r, s))
                    .child_of(rack)
                    .at(0.0, -0.8 + s as f64 * 0.35, 0.0)
                    .glowing(palette::PANEL, 0.1)
            });

            let healthy = rng.gen::<f64>() > 1.0 - config.healthy_probability;
            let color = if healthy { palette::GREEN } else { palette::AMBER };
            let k = indicator;
            b.spawn(EntityKind::IndicatorLight, |e| {
                e.labeled(format!("indicator_{}_{}", r, s))
                    .child_of(server)
                    .at(0.4, 0.0, 0.39)
                    .glowing(color, 1.0)
                    .animate(Property::Intensity, Curve::wave(0.5, 0.5, Phase::staggered(2.0, k, 1.0)))
            });
            indicator += 1;
        }
    }

    let node = |x: f64, z: f64, color: &str| TopologyNode {
        position: Vector3::new(x, 0.0, z),
        size: 0.25,
        color: color.to_string(),
        layer: 0,
    };
    let topology = Topology::hub(
        node(0.0, 0.0, palette::GREEN),
        vec![
            node(2.5, 2.5, palette::BLUE),
            node(-2.5, 2.5, palette::BLUE),
            node(2.5, -2.5, palette::AMBER),
            node(-2.5, -2.5, palette::BLUE),
        ],
    );

    let switches: Vec<EntityId> = topology
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| {
            let switch = b.spawn(EntityKind::Static, |e| {
                e.labeled(format!("switch_{}", i)).child_of(room).at_vec(n.position).glowing(palette::STEEL, 0.1)
            });
            b.spawn(EntityKind::IndicatorLight, |e| {
                e.labeled(format!("switch_light_{}", i)).child_of(switch).at(0.15, 0.12, 0.0).glowing(&n.color, 1.0)
            });
            switch
        })
        .collect();

    for (i, edge) in topology.edges.iter().enumerate() {
        b.spawn(EntityKind::ConnectionLine, |e| {
            e.labeled(format!("uplink_{}", i))
                .child_of(room)
                .linking(switches[edge.from], switches[edge.to])
                .glowing(palette::BLUE, 0.0)
                .animate(Property::Opacity, Curve::rectified(0.3, 1.0, Phase::staggered(3.0, i, 0.5)))
        });
    }

    b.set_topology(topology);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Channel;
    use approx::assert_relative_eq;
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn build(kind: SceneKind, seed: u64) -> Vec<AnimatedEntity> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        assemble(&SceneConfig::for_kind(kind), &mut rng).finish().0
    }

    fn find<'a>(entities: &'a [AnimatedEntity], label: &str) -> &'a AnimatedEntity {
        entities
            .iter()
            .find(|e| e.label == label)
            .unwrap_or_else(|| panic!("no entity {}", label))
    }

    #[test]
    fn test_factory_spin_is_frame_rate_independent() {
        let entities = build(SceneKind::Factory, 0);
        let root = find(&entities, "factory");
        // 0.002 rad per frame at 60 fps
        assert_relative_eq!(root.state(1.0).rotation.y, 0.12, epsilon = 1e-12);
        assert_relative_eq!(root.state(10.0).rotation.y, 1.2, epsilon = 1e-12);
    }

    #[test]
    fn test_arm_joints_stay_within_limits() {
        let entities = build(SceneKind::RoboticArm, 0);
        for (name, min, max, _) in ARM_JOINTS {
            let joint = find(&entities, name);
            for step in 0..5_000 {
                let z = joint.state(step as f64 * 0.037).rotation.z;
                assert!(min <= z && z <= max, "{} at step {}: {}", name, step, z);
            }
        }
    }

    #[test]
    fn test_arm_is_a_chain() {
        let entities = build(SceneKind::RoboticArm, 0);
        let shoulder = find(&entities, "shoulder");
        let elbow = find(&entities, "elbow");
        let wrist = find(&entities, "wrist");
        assert_eq!(elbow.parent, Some(shoulder.id));
        assert_eq!(wrist.parent, Some(elbow.id));
        assert_eq!(find(&entities, "gripper_left").parent, Some(wrist.id));
    }

    #[test]
    fn test_fighter_motion() {
        let entities = build(SceneKind::Aircraft, 0);
        let jet = find(&entities, "fighter");
        let s = jet.state(0.0);
        assert_relative_eq!(s.position.y, 0.0);
        assert_relative_eq!(s.rotation.y, PI / 4.0);

        let t = PI; // sin(0.5π) = 1
        assert_relative_eq!(jet.state(t).position.y, 0.2, epsilon = 1e-12);

        let e1 = find(&entities, "exhaust_1");
        assert_relative_eq!(e1.state(0.0).intensity, 0.8 + 0.2 * 0.5_f64.sin(), epsilon = 1e-12);
    }

    #[test]
    fn test_exhausts_out_of_lockstep() {
        let entities = build(SceneKind::Aircraft, 0);
        let a = find(&entities, "exhaust_0");
        let b = find(&entities, "exhaust_1");
        assert_ne!(a.state(0.3).intensity, b.state(0.3).intensity);
    }

    #[test]
    fn test_neural_node_firing() {
        let entities = build(SceneKind::NeuralNetwork, 0);
        let node = entities.iter().find(|e| e.kind == EntityKind::Orb).unwrap();
        // node 0: intensity hot when sin(t) > 0.7
        assert_eq!(node.state(PI / 2.0).intensity, 2.0);
        assert_eq!(node.state(0.0).intensity, 0.5);
        assert_relative_eq!(node.state(0.0).scale, 1.0);
        assert_eq!(node.state(0.0).opacity, 0.9);
    }

    #[test]
    fn test_edges_link_existing_nodes() {
        for kind in [SceneKind::NeuralNetwork, SceneKind::AlertNetwork, SceneKind::ServerRoom] {
            let entities = build(kind, 7);
            let lines: Vec<_> = entities.iter().filter(|e| e.kind == EntityKind::ConnectionLine).collect();
            assert!(!lines.is_empty(), "{}", kind);
            for line in lines {
                let link = line.link.expect("connection line without endpoints");
                assert!(link.from.index() < entities.len());
                assert!(link.to.index() < entities.len());
                assert_ne!(entities[link.from.index()].kind, EntityKind::ConnectionLine);
            }
        }
    }

    #[test]
    fn test_alert_backbone_on_zero_draws() {
        let mut rng = StepRng::new(0, 0);
        let (entities, topology) = assemble(&SceneConfig::for_kind(SceneKind::AlertNetwork), &mut rng).finish();

        // 12 nodes, stride 4: only (0,4), (0,8), (4,8)
        assert_eq!(topology.edges.len(), 3);
        let lines = entities.iter().filter(|e| e.kind == EntityKind::ConnectionLine).count();
        assert_eq!(lines, 3);
    }

    #[test]
    fn test_alert_nodes_bob_around_rest() {
        let entities = build(SceneKind::AlertNetwork, 3);
        let node = find(&entities, "alert_node_2");
        let rest = node.rest.position.y;
        for step in 0..500 {
            let y = node.state(step as f64 * 0.1).position.y;
            assert!((y - rest).abs() <= 0.1 + 1e-12);
        }
    }

    #[test]
    fn test_server_indicators_and_links() {
        let entities = build(SceneKind::ServerRoom, 1);
        let indicators: Vec<_> = entities
            .iter()
            .filter(|e| e.label.starts_with("indicator_"))
            .collect();
        assert_eq!(indicators.len(), 20);
        for light in &indicators {
            let range = light.curve_for(Property::Intensity).and_then(|c| c.range());
            assert_eq!(range, Some((0.0, 1.0)));
        }

        let uplinks = entities.iter().filter(|e| e.label.starts_with("uplink_")).count();
        assert_eq!(uplinks, 4);
    }

    #[test]
    fn test_server_health_draws() {
        // Zero draws never beat the threshold: every light is amber
        let mut rng = StepRng::new(0, 0);
        let (entities, _) = assemble(&SceneConfig::for_kind(SceneKind::ServerRoom), &mut rng).finish();
        assert!(entities
            .iter()
            .filter(|e| e.label.starts_with("indicator_"))
            .all(|e| e.material.color == palette::AMBER));
    }

    #[test]
    fn test_warehouse_robot_patrol() {
        let entities = build(SceneKind::Warehouse, 0);
        assert_eq!(entities.iter().filter(|e| e.label.starts_with("shelf_")).count(), 24);

        let robot = find(&entities, "robot");
        assert!(robot.channels.iter().any(|c| matches!(c, Channel::Drift(_))));

        // Gate closed at t = 0, rests at y = 0.5
        assert_relative_eq!(robot.state(0.0).position.y, 0.5);
        for step in 0..2_000 {
            let s = robot.state(step as f64 * 0.05);
            assert!(s.position.x.abs() <= 4.0 + 1e-12);
            assert!((0.2 - 1e-12..=0.8 + 1e-12).contains(&s.position.y));
        }
    }

    #[test]
    fn test_engine_blades() {
        let config = SceneConfig {
            blade_count: 6,
            ..SceneConfig::for_kind(SceneKind::EngineAssembly)
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let (entities, _) = assemble(&config, &mut rng).finish();
        let blades: Vec<_> = entities.iter().filter(|e| e.label.starts_with("fan_blade_")).collect();
        assert_eq!(blades.len(), 6);
        for blade in blades {
            let p = blade.rest.position;
            assert_relative_eq!((p.x * p.x + p.y * p.y).sqrt(), 0.8, epsilon = 1e-12);
            assert_eq!(p.z, -3.0);
        }
    }
}
