use fastrand::Rng;
use ordered_float::OrderedFloat;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::color::Graph;

/** parameters of the force-directed layout (Fruchterman-Reingold) */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// maximum displacement at the first iteration
    pub initial_temperature: f64,
    /// temperature(i) = initial_temperature × cooling_rate^i
    pub cooling_rate: f64,
    /// positions are kept inside [margin, 1-margin]
    pub margin: f64,
    /// pairs closer than this distance are perturbed
    pub min_distance: f64,
    /// amplitude of the perturbation
    pub jitter: f64,
    /// iterations = base_iterations + iterations_per_node × n (capped by max_iterations)
    pub base_iterations: usize,
    pub iterations_per_node: usize,
    pub max_iterations: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 0.1,
            cooling_rate: 0.95,
            margin: 0.05,
            min_distance: 1e-6,
            jitter: 1e-3,
            base_iterations: 50,
            iterations_per_node: 2,
            max_iterations: 500,
        }
    }
}

impl LayoutConfig {
    /// number of iterations for a graph of n nodes
    pub fn iterations(&self, n:usize) -> usize {
        (self.base_iterations + self.iterations_per_node * n).min(self.max_iterations)
    }
}

/** result of a layout: one position per vertex */
#[derive(Debug, Clone)]
pub struct Layout {
    pub positions: Vec<(f64,f64)>,
    pub iterations: usize,
    /// largest displacement of the last iteration
    pub max_displacement: f64,
}

/**
Fruchterman-Reingold layout over the unit square.
Each iteration:
 - repulsion k²/d between every pair of nodes
 - attraction d²/k along every edge
 - each node moves along its net force, by at most the current temperature,
   then is clamped inside the margin
*/
pub fn force_directed_layout(graph:&Graph, config:&LayoutConfig, rng:&Rng) -> Layout {
    let n = graph.nb_vertices();
    let mut positions:Vec<(f64,f64)> = graph.nodes().iter().map(|node| (node.x, node.y)).collect();
    let iterations = config.iterations(n);
    if n == 0 {
        return Layout { positions, iterations: 0, max_displacement: 0. };
    }
    let k = (1. / n as f64).sqrt();
    let mut displacements = vec![(0.,0.) ; n];
    let mut max_displacement = 0.;
    for iteration in 0..iterations {
        for d in displacements.iter_mut() { *d = (0.,0.); }
        // repulsive forces
        for u in 0..n {
            for v in (u+1)..n {
                let (mut dx, mut dy) = delta(&positions, u, v);
                let mut dist = (dx*dx + dy*dy).sqrt();
                if dist < config.min_distance {
                    positions[u].0 += (rng.f64() - 0.5) * config.jitter;
                    positions[u].1 += (rng.f64() - 0.5) * config.jitter;
                    let d = delta(&positions, u, v);
                    dx = d.0;
                    dy = d.1;
                    dist = (dx*dx + dy*dy).sqrt().max(config.min_distance);
                }
                let force = k*k / dist;
                let (fx, fy) = (dx / dist * force, dy / dist * force);
                displacements[u].0 += fx;
                displacements[u].1 += fy;
                displacements[v].0 -= fx;
                displacements[v].1 -= fy;
            }
        }
        // attractive forces
        for (u,v) in graph.edges() {
            let (dx, dy) = delta(&positions, *u, *v);
            let dist = (dx*dx + dy*dy).sqrt();
            if dist < config.min_distance { continue; }
            let force = dist*dist / k;
            let (fx, fy) = (dx / dist * force, dy / dist * force);
            displacements[*u].0 -= fx;
            displacements[*u].1 -= fy;
            displacements[*v].0 += fx;
            displacements[*v].1 += fy;
        }
        // move the nodes, limited by the temperature
        let temperature = config.initial_temperature * config.cooling_rate.powi(iteration as i32);
        let moves:Vec<f64> = positions.iter_mut().zip(&displacements).map(|(p,(dx,dy))| {
            let length = (dx*dx + dy*dy).sqrt();
            if length <= 0. { return 0.; }
            let step = length.min(temperature);
            let before = *p;
            p.0 = clamp(p.0 + dx / length * step, config.margin);
            p.1 = clamp(p.1 + dy / length * step, config.margin);
            ((p.0-before.0).powi(2) + (p.1-before.1).powi(2)).sqrt()
        }).collect();
        max_displacement = moves.into_iter().map(OrderedFloat).max().map_or(0., |m| m.0);
    }
    debug!(nodes = n, iterations, max_displacement, "force-directed layout done");
    Layout { positions, iterations, max_displacement }
}

/// vector from v to u
fn delta(positions:&[(f64,f64)], u:usize, v:usize) -> (f64,f64) {
    (positions[u].0 - positions[v].0, positions[u].1 - positions[v].1)
}

fn clamp(x:f64, margin:f64) -> f64 { x.max(margin).min(1. - margin) }


#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{Graph, GraphSnapshot, Node, Edge};

    fn graph_at(positions:&[(f64,f64)], edges:&[(u32,u32)]) -> Graph {
        Graph::from_snapshot(GraphSnapshot {
            nodes: positions.iter().enumerate()
                .map(|(i,(x,y))| Node { id: i as u32 + 1, x:*x, y:*y, color: None })
                .collect(),
            edges: edges.iter().map(|(source,target)| Edge { source:*source, target:*target }).collect(),
        }).unwrap()
    }

    fn distance(a:(f64,f64), b:(f64,f64)) -> f64 {
        ((a.0-b.0).powi(2) + (a.1-b.1).powi(2)).sqrt()
    }

    #[test]
    fn test_positions_stay_inside_margin() {
        let g = graph_at(&[(0.,0.), (1.,1.), (0.5,0.5), (0.99,0.01)], &[(1,2),(3,4)]);
        let config = LayoutConfig::default();
        let layout = force_directed_layout(&g, &config, &Rng::with_seed(1));
        for (x,y) in &layout.positions {
            assert!(*x >= config.margin && *x <= 1. - config.margin);
            assert!(*y >= config.margin && *y <= 1. - config.margin);
        }
    }

    #[test]
    fn test_coincident_nodes_are_separated() {
        let g = graph_at(&[(0.5,0.5), (0.5,0.5), (0.5,0.5)], &[]);
        let layout = force_directed_layout(&g, &LayoutConfig::default(), &Rng::with_seed(2));
        let p = &layout.positions;
        assert!(distance(p[0], p[1]) > 0.05);
        assert!(distance(p[1], p[2]) > 0.05);
        assert!(p.iter().all(|(x,y)| x.is_finite() && y.is_finite()));
    }

    #[test]
    fn test_connected_nodes_end_closer() {
        // 1-2 connected, 3 and 4 not
        let g = graph_at(&[(0.2,0.2), (0.8,0.8), (0.2,0.8), (0.8,0.2)], &[(1,2)]);
        let layout = force_directed_layout(&g, &LayoutConfig::default(), &Rng::with_seed(3));
        let p = &layout.positions;
        assert!(distance(p[0], p[1]) < distance(p[2], p[3]));
    }

    #[test]
    fn test_iterations_scale_with_nodes() {
        let config = LayoutConfig::default();
        assert!(config.iterations(10) < config.iterations(100));
        assert_eq!(config.iterations(10_000), config.max_iterations);
    }

    #[test]
    fn test_cooling_reduces_displacement() {
        let g = graph_at(&[(0.1,0.1), (0.9,0.9), (0.1,0.9), (0.9,0.1), (0.5,0.5)], &[(1,2),(2,3),(4,5)]);
        let config = LayoutConfig::default();
        let layout = force_directed_layout(&g, &config, &Rng::with_seed(4));
        let last_temperature = config.initial_temperature
            * config.cooling_rate.powi(layout.iterations as i32 - 1);
        assert!(layout.max_displacement <= last_temperature + 1e-12);
    }
}
