use std::cmp::Reverse;
use std::sync::Arc;

use bit_set::BitSet;
use priority_queue::PriorityQueue;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::color::{Color, Graph, NodeId, VertexId};
use crate::conflict::{evaluate, ConflictReport};
use crate::search::{AlgorithmState, ColoringStrategy, StepView};


/** recolor performed by the local search */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecolorRecord {
    pub node_id: NodeId,
    pub old_color: Color,
    pub new_color: Color,
}

/** statistics of the local search */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSearchStats {
    /// current number of conflicts
    pub conflicts: usize,
    pub initial_conflicts: usize,
    pub conflicts_reduced: usize,
    /// conflicts_reduced / initial_conflicts (in %)
    pub improvement: f64,
    /// 1-based pass number
    pub pass_number: usize,
    /// recolors performed so far, in order
    pub recolors: Vec<RecolorRecord>,
}

impl LocalSearchStats {
    pub fn recolored_count(&self) -> usize { self.recolors.len() }
}

/** local search statistics as reported to the host. Only carries the recolors
performed since the previous report. */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSearchProgress {
    pub conflicts: usize,
    pub initial_conflicts: usize,
    pub conflicts_reduced: usize,
    pub improvement: f64,
    pub pass_number: usize,
    /// recolors performed so far
    pub recolored_count: usize,
    pub new_recolors: Vec<RecolorRecord>,
}

/**
Greedy pass-based local search. Improves an existing (possibly conflicting) coloring.

main procedure:
 1. mark the endpoints of conflicting edges as the work queue of the pass
    (the most conflicting vertices first)
 2. each step pops a vertex and gives it the color shared by the fewest neighbors,
    keeping its current color on ties. Conflicts are recomputed right away, so
    the next vertices of the pass see the change.
 3. when the queue is empty: stop if the pass changed nothing (or if there is no
    conflict left), otherwise start a new pass.
*/
#[derive(Debug)]
pub struct LocalSearchOptimizer {
    /// reference graph
    graph: Arc<Graph>,
    /// palette size
    nb_colors: usize,
    /// colors[v]: current color of v
    colors: Vec<Option<Color>>,
    /// current conflicts
    conflicts: ConflictReport,
    /// vertices still to visit in the current pass
    queue: PriorityQueue<VertexId, (usize, Reverse<VertexId>)>,
    /// number of recolors done during the current pass
    pass_recolors: usize,
    stats: LocalSearchStats,
    /// stats.recolors[..reported_recolors]: already sent by a progress report
    reported_recolors: usize,
    state: AlgorithmState,
}

impl LocalSearchOptimizer {
    /** creates the optimizer from the current colors of the graph (copied) */
    pub fn new(graph:Arc<Graph>, nb_colors:usize, colors:Vec<Option<Color>>) -> Self {
        debug_assert_eq!(colors.len(), graph.nb_vertices());
        let conflicts = evaluate(graph.edges(), &colors);
        let initial_conflicts = conflicts.count;
        let mut res = Self {
            graph,
            nb_colors,
            state: AlgorithmState::new(colors.clone()),
            colors,
            conflicts,
            queue: PriorityQueue::new(),
            pass_recolors: 0,
            reported_recolors: 0,
            stats: LocalSearchStats {
                conflicts: initial_conflicts,
                initial_conflicts,
                pass_number: 1,
                ..LocalSearchStats::default()
            },
        };
        res.fill_queue();
        res
    }

    /// current colors
    pub fn colors(&self) -> &[Option<Color>] { &self.colors }

    pub fn local_stats(&self) -> &LocalSearchStats { &self.stats }

    /// queues every endpoint of a conflicting edge, by decreasing number of conflicts
    fn fill_queue(&mut self) {
        let mut nb_conflicts = vec![0usize ; self.graph.nb_vertices()];
        let mut vertices_to_change:BitSet = BitSet::default();
        for (u,v) in &self.conflicts.edges {
            nb_conflicts[*u] += 1;
            nb_conflicts[*v] += 1;
            vertices_to_change.insert(*u);
            vertices_to_change.insert(*v);
        }
        self.queue.clear();
        for v in vertices_to_change.iter() {
            self.queue.push(v, (nb_conflicts[v], Reverse(v)));
        }
    }

    /** best color for v given the colors of its neighbors (None if v is uncolored).
    A color replaces the current one only if strictly fewer neighbors use it. */
    fn best_color(&self, v:VertexId) -> Option<Color> {
        let current = self.colors[v]?;
        let mut nb_neigh_colors = vec![0usize ; self.nb_colors.max(current+1)];
        for u in self.graph.neighbors(v) {
            if let Some(c) = self.colors[*u] {
                if c < nb_neigh_colors.len() { nb_neigh_colors[c] += 1; }
            }
        }
        let mut best = current;
        for c in 0..self.nb_colors {
            if nb_neigh_colors[c] < nb_neigh_colors[best] {
                best = c;
            }
        }
        Some(best)
    }

    /// processes one vertex of the queue, then handles the end of the pass
    fn advance(&mut self) {
        if self.conflicts.count == 0 {
            self.state.finish();
            return;
        }
        if let Some((v,_)) = self.queue.pop() {
            if let (Some(old_color), Some(new_color)) = (self.colors[v], self.best_color(v)) {
                if new_color != old_color {
                    self.colors[v] = Some(new_color);
                    self.conflicts = evaluate(self.graph.edges(), &self.colors);
                    self.pass_recolors += 1;
                    self.stats.recolors.push(RecolorRecord {
                        node_id: self.graph.node_id(v), old_color, new_color,
                    });
                    debug!(
                        node = self.graph.node_id(v), old_color, new_color,
                        conflicts = self.conflicts.count, "local search: recolor"
                    );
                }
            }
            self.state.record_attempt(self.conflicts.count);
            self.update_stats();
        }
        if self.conflicts.count == 0 {
            self.state.finish();
        } else if self.queue.is_empty() {
            if self.pass_recolors == 0 {
                self.state.finish();
            } else {
                self.fill_queue();
                self.pass_recolors = 0;
                self.stats.pass_number += 1;
                debug!(
                    pass = self.stats.pass_number, conflicts = self.conflicts.count,
                    "local search: new pass"
                );
            }
        }
    }

    fn update_stats(&mut self) {
        let conflicts = self.conflicts.count;
        self.stats.conflicts = conflicts;
        self.stats.conflicts_reduced = self.stats.initial_conflicts.saturating_sub(conflicts);
        self.stats.improvement = if self.stats.initial_conflicts == 0 {
            0.
        } else {
            100. * self.stats.conflicts_reduced as f64 / self.stats.initial_conflicts as f64
        };
        if self.state.improves(conflicts) {
            self.state.set_best(&self.colors, self.conflicts.clone());
        }
    }
}

impl ColoringStrategy for LocalSearchOptimizer {
    fn step(&mut self) -> StepView<'_> {
        if !self.state.is_finished() {
            self.advance();
        }
        self.view()
    }

    fn view(&self) -> StepView<'_> {
        let mut stats = self.state.stats(self.calculate_progress());
        stats.conflicts = self.conflicts.count;
        StepView {
            done: self.state.is_finished(),
            assignment: &self.colors,
            conflict_edges: &self.conflicts.edges,
            stats,
            local: Some(&self.stats),
        }
    }

    fn calculate_progress(&self) -> f64 {
        if self.state.is_finished() || self.stats.initial_conflicts == 0 {
            return 1.;
        }
        self.stats.conflicts_reduced as f64 / self.stats.initial_conflicts as f64
    }

    fn max_attempts(&self) -> Option<u64> { None }

    fn state(&self) -> &AlgorithmState { &self.state }

    fn state_mut(&mut self) -> &mut AlgorithmState { &mut self.state }

    fn take_local(&mut self) -> Option<LocalSearchProgress> {
        let new_recolors = self.stats.recolors[self.reported_recolors..].to_vec();
        self.reported_recolors = self.stats.recolors.len();
        Some(LocalSearchProgress {
            conflicts: self.stats.conflicts,
            initial_conflicts: self.stats.initial_conflicts,
            conflicts_reduced: self.stats.conflicts_reduced,
            improvement: self.stats.improvement,
            pass_number: self.stats.pass_number,
            recolored_count: self.stats.recolored_count(),
            new_recolors,
        })
    }
}
