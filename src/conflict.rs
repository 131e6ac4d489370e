use crate::color::{Assignment, Color, Edge, Graph, VertexId};

/** conflicts of a coloring: number of conflicting edges and the edges themselves */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    pub count: usize,
    pub edges: Vec<(VertexId,VertexId)>,
}

/// returns true if (u,v) is conflicting: both colored with the same color
#[inline]
fn is_conflicting(colors:&[Option<Color>], u:VertexId, v:VertexId) -> bool {
    match (colors[u], colors[v]) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/**
computes the conflicting edges of a coloring.
An uncolored endpoint never creates a conflict.
*/
pub fn evaluate(edges:&[(VertexId,VertexId)], colors:&[Option<Color>]) -> ConflictReport {
    let conflicting:Vec<(VertexId,VertexId)> = edges.iter()
        .filter(|(u,v)| is_conflicting(colors, *u, *v))
        .copied()
        .collect();
    ConflictReport { count: conflicting.len(), edges: conflicting }
}

/// number of conflicting edges (does not build the edge list)
pub fn count_conflicts(edges:&[(VertexId,VertexId)], colors:&[Option<Color>]) -> usize {
    edges.iter().filter(|(u,v)| is_conflicting(colors, *u, *v)).count()
}

/// evaluates an assignment given by node ids
pub fn evaluate_assignment(graph:&Graph, assignment:&Assignment) -> (usize, Vec<Edge>) {
    let report = evaluate(graph.edges(), &graph.to_colors(assignment));
    (report.count, graph.edge_ids(&report.edges))
}
