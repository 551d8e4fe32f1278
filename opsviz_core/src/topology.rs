//! Node/edge topology for network scenes.
//!
//! Topology is built once, at scene construction, from an injected random
//! source. It is immutable afterwards; only the opacity of the edges is
//! animated per frame.

use crate::palette;
use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyNode {
    pub position: Vector3<f64>,
    /// Render radius
    pub size: f64,
    pub color: String,
    /// Layer index for layered graphs, 0 otherwise
    pub layer: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<Edge>,
    /// Per-edge colour, parallel to `edges`
    pub edge_colors: Vec<String>,
}

/// Selects which of the `n * (n - 1) / 2` node pairs to connect.
///
/// Pair `(i, j)` is kept when a uniform draw exceeds `threshold`, or when
/// both indices are multiples of `stride`. The stride rule guarantees a
/// sparse backbone whatever the draws are. One draw is consumed per pair,
/// including backbone pairs, so the draw sequence does not depend on the
/// outcome.
pub fn select_pairs<R: Rng + ?Sized>(n: usize, threshold: f64, stride: usize, rng: &mut R) -> Vec<Edge> {
    let stride = stride.max(1);
    let mut edges = Vec::new();

    for i in 0..n {
        for j in (i + 1)..n {
            let draw: f64 = rng.gen();
            if draw > threshold || (i % stride == 0 && j % stride == 0) {
                edges.push(Edge { from: i, to: j });
            }
        }
    }

    edges
}

impl Topology {
    /// Nodes on a jittered ring around the origin.
    ///
    /// Node `i` sits at angle `2πi/count`, radius
    /// `base_radius + U(0, radius_jitter)`, height `U(-height, height)`,
    /// size `base_size + U(0, size_jitter)`. Colours cycle through
    /// red, blue, amber.
    pub fn ring<R: Rng + ?Sized>(
        count: usize,
        base_radius: f64,
        radius_jitter: f64,
        height: f64,
        rng: &mut R,
    ) -> Self {
        const CYCLE: [&str; 3] = [palette::RED, palette::BLUE, palette::AMBER];
        let mut nodes = Vec::with_capacity(count);

        for i in 0..count {
            let angle = (i as f64 / count as f64) * PI * 2.0;
            let radius = base_radius + rng.gen::<f64>() * radius_jitter;
            let x = angle.cos() * radius;
            let z = angle.sin() * radius;
            let y = rng.gen::<f64>() * 2.0 * height - height;
            let size = 0.2 + rng.gen::<f64>() * 0.2;

            nodes.push(TopologyNode {
                position: Vector3::new(x, y, z),
                size,
                color: CYCLE[i % CYCLE.len()].to_string(),
                layer: 0,
            });
        }

        Self {
            nodes,
            edges: Vec::new(),
            edge_colors: Vec::new(),
        }
    }

    /// Connects node pairs with [`select_pairs`].
    pub fn connect_pairs<R: Rng + ?Sized>(mut self, threshold: f64, stride: usize, rng: &mut R) -> Self {
        self.edges = select_pairs(self.nodes.len(), threshold, stride, rng);
        self.edge_colors = vec![palette::BLUE.to_string(); self.edges.len()];
        self
    }

    /// Feed-forward layers spread along X, each layer a ring in the YZ plane.
    ///
    /// Each node is linked to each node of the previous layer when a
    /// uniform draw exceeds `link_threshold`. Input layer is blue, output
    /// layer green, hidden layers white.
    pub fn layered<R: Rng + ?Sized>(
        layers: &[usize],
        spacing: f64,
        link_threshold: f64,
        rng: &mut R,
    ) -> Self {
        let mut topology = Topology::default();
        let last = layers.len().saturating_sub(1);
        let mut previous: Option<(usize, usize)> = None; // (first index, count)

        for (layer, &count) in layers.iter().enumerate() {
            let layer_x = (layer as f64 - last as f64 / 2.0) * spacing;
            let first = topology.nodes.len();
            let color = if layer == 0 {
                palette::BLUE
            } else if layer == last {
                palette::GREEN
            } else {
                palette::WHITE
            };

            for i in 0..count {
                let node = topology.nodes.len();
                let angle = (i as f64 / count as f64) * PI * 2.0;
                let radius = count as f64 * 0.15;

                topology.nodes.push(TopologyNode {
                    position: Vector3::new(layer_x, angle.sin() * radius, angle.cos() * radius),
                    size: 0.1,
                    color: color.to_string(),
                    layer,
                });

                if let Some((prev_first, prev_count)) = previous {
                    for j in 0..prev_count {
                        if rng.gen::<f64>() > link_threshold {
                            topology.edges.push(Edge { from: prev_first + j, to: node });
                            let edge_color = if layer == last { palette::GREEN } else { palette::BLUE };
                            topology.edge_colors.push(edge_color.to_string());
                        }
                    }
                }
            }

            previous = Some((first, count));
        }

        topology
    }

    /// A centre node wired to each spoke.
    pub fn hub(center: TopologyNode, spokes: Vec<TopologyNode>) -> Self {
        let mut nodes = Vec::with_capacity(spokes.len() + 1);
        nodes.push(center);
        nodes.extend(spokes);

        let edges: Vec<Edge> = (1..nodes.len()).map(|to| Edge { from: 0, to }).collect();
        let edge_colors = vec![palette::BLUE.to_string(); edges.len()];

        Self { nodes, edges, edge_colors }
    }

    /// Number of edges touching node `i`.
    pub fn degree(&self, i: usize) -> usize {
        self.edges.iter().filter(|e| e.from == i || e.to == i).count()
    }

    /// Returns true if an edge joins `a` and `b` in either direction.
    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.edges
            .iter()
            .any(|e| (e.from == a && e.to == b) || (e.from == b && e.to == a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_backbone_survives_zero_draws() {
        // StepRng(0, 0) always draws 0.0, so only the backbone is kept
        let mut rng = StepRng::new(0, 0);
        let edges = select_pairs(12, 0.7, 4, &mut rng);

        let expected = vec![
            Edge { from: 0, to: 4 },
            Edge { from: 0, to: 8 },
            Edge { from: 4, to: 8 },
        ];
        assert_eq!(edges, expected);
    }

    #[test]
    fn test_every_pair_kept_on_high_draws() {
        // u64::MAX maps to the largest f64 below 1.0
        let mut rng = StepRng::new(u64::MAX, 0);
        let edges = select_pairs(5, 0.7, 4, &mut rng);
        assert_eq!(edges.len(), 10);
    }

    #[test]
    fn test_pairs_are_ordered_and_unique() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let edges = select_pairs(12, 0.7, 4, &mut rng);
        for e in &edges {
            assert!(e.from < e.to);
        }
        let mut sorted = edges.clone();
        sorted.dedup();
        assert_eq!(sorted.len(), edges.len());
    }

    #[test]
    fn test_same_seed_same_topology() {
        let build = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            Topology::ring(12, 3.0, 1.0, 1.0, &mut rng).connect_pairs(0.7, 4, &mut rng)
        };
        assert_eq!(build(7), build(7));
    }

    #[test]
    fn test_ring_layout_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let ring = Topology::ring(12, 3.0, 1.0, 1.0, &mut rng);

        assert_eq!(ring.nodes.len(), 12);
        for node in &ring.nodes {
            let r = (node.position.x.powi(2) + node.position.z.powi(2)).sqrt();
            assert!((3.0 - 1e-9..=4.0 + 1e-9).contains(&r));
            assert!((-1.0..=1.0).contains(&node.position.y));
            assert!((0.2..=0.4).contains(&node.size));
        }
        assert_eq!(ring.nodes[0].color, palette::RED);
        assert_eq!(ring.nodes[1].color, palette::BLUE);
        assert_eq!(ring.nodes[2].color, palette::AMBER);
    }

    #[test]
    fn test_layered_links_only_adjacent_layers() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let net = Topology::layered(&[4, 6, 8, 6, 3], 1.5, 0.3, &mut rng);

        assert_eq!(net.nodes.len(), 27);
        assert_eq!(net.edges.len(), net.edge_colors.len());
        for e in &net.edges {
            assert_eq!(net.nodes[e.from].layer + 1, net.nodes[e.to].layer);
        }
        assert_eq!(net.nodes[0].position.x, -3.0);
        assert_eq!(net.nodes[26].color, palette::GREEN);
    }

    #[test]
    fn test_hub_wires_every_spoke() {
        let node = |x: f64| TopologyNode {
            position: Vector3::new(x, 0.0, 0.0),
            size: 0.25,
            color: palette::BLUE.to_string(),
            layer: 0,
        };
        let hub = Topology::hub(node(0.0), vec![node(1.0), node(2.0), node(3.0)]);

        assert_eq!(hub.degree(0), 3);
        assert!(hub.has_edge(2, 0));
        assert!(!hub.has_edge(1, 2));
    }
}
