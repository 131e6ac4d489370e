use std::cmp::Ordering;

use priority_queue::PriorityQueue;
use bit_set::BitSet;

use crate::color::{Color, Graph, VertexId};

#[derive(PartialEq, Eq)]
struct DSatInfo {
    dsat: usize,
    degree: usize
}

impl Ord for DSatInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dsat.cmp(&other.dsat)
            .then_with(|| self.degree.cmp(&other.degree))
    }
}

impl PartialOrd for DSatInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/** implements a greedy DSATUR algorithm restricted to a palette of nb_colors colors.
    1. choose an uncolored vertex that sees the most colors (break ties by the largest degree)
    2. give it the first color none of its neighbors uses.
       If all the palette is used, give it the color used by the fewest neighbors
    3. mark all its neighbors seeing this color
    4. repeat until every vertex is colored

The result is used as a starting point for the local search when the graph carries no coloring.
*/
pub fn greedy_dsatur(graph:&Graph, nb_colors:usize) -> Vec<Option<Color>> {
    let n:usize = graph.nb_vertices();
    let mut remaining_vertices:PriorityQueue<VertexId, DSatInfo> = PriorityQueue::new();
    for i in graph.vertices() {
        remaining_vertices.push(i, DSatInfo { dsat:0, degree:graph.degree(i)});
    }
    let mut colors:Vec<Option<Color>> = vec![None ; n]; // colors[v] -> color assigned to vertex v
    let mut adj_colors:Vec<BitSet> = vec![BitSet::default() ; n]; // adj_colors[n] -> colors n sees
    while let Some((current_vertex,_)) = remaining_vertices.pop() {
        // assign it a color
        let color = match (0..nb_colors).find(|c| !adj_colors[current_vertex].contains(*c)) {
            Some(c) => c,
            None => least_used_color(graph, &colors, current_vertex, nb_colors),
        };
        colors[current_vertex] = Some(color);
        // update saturation degree information
        for conflict_vertex in graph.neighbors(current_vertex).iter()
        .filter(|conflict_vertex| colors[**conflict_vertex].is_none()) {
            if !adj_colors[*conflict_vertex].contains(color) {
                adj_colors[*conflict_vertex].insert(color);
                remaining_vertices.change_priority_by(conflict_vertex, |p| { p.dsat += 1; });
            }
        }
    }
    colors
}

/// color of the palette used by the fewest (colored) neighbors of v
fn least_used_color(graph:&Graph, colors:&[Option<Color>], v:VertexId, nb_colors:usize) -> Color {
    let mut nb_neigh_colors = vec![0usize ; nb_colors];
    for u in graph.neighbors(v) {
        if let Some(c) = colors[*u] { nb_neigh_colors[c] += 1; }
    }
    let mut best = 0;
    for (c,nb) in nb_neigh_colors.iter().enumerate() {
        if *nb < nb_neigh_colors[best] { best = c; }
    }
    best
}
