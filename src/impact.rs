//! What-if analysis of a manual recoloring.

use serde::{Serialize, Deserialize};

use crate::color::{Color, Graph, NodeId};
use crate::error::ColoringError;

/** alternative colors of a conflicting neighbor */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecolorSuggestion {
    pub node_id: NodeId,
    /// palette colors none of its neighbors would use
    pub alternatives: Vec<Color>,
}

/** impact of giving `new_color` to `node_id` */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecolorImpact {
    pub node_id: NodeId,
    pub new_color: Color,
    pub neighbors: Vec<NodeId>,
    /// neighbors already using new_color
    pub conflicting_neighbors: Vec<NodeId>,
    /// conflicting neighbors having at least one alternative color
    pub recolorable_neighbors: Vec<NodeId>,
    /// estimated probability that the conflicts created can be fixed
    pub success_probability: f64,
    pub suggestions: Vec<RecolorSuggestion>,
}

/// success heuristic: min(1, recolorable/max(1,conflicting) × (0.7 + 0.3·k/10))
fn success_probability(recolorable:usize, conflicting:usize, nb_colors:usize) -> f64 {
    if conflicting == 0 {
        return 1.;
    }
    let ratio = recolorable as f64 / conflicting.max(1) as f64;
    (ratio * (0.7 + 0.3 * nb_colors as f64 / 10.)).min(1.)
}

/**
analyses the recoloring of one node, given the current colors (one entry per vertex).
For each neighbor that would conflict, lists the colors it could take instead
(colors not used by its own neighbors, once the node is recolored).
*/
pub fn analyze_recolor(
    graph:&Graph,
    colors:&[Option<Color>],
    node_id:NodeId,
    new_color:Color,
    nb_colors:usize,
) -> Result<RecolorImpact, ColoringError> {
    if new_color >= nb_colors {
        return Err(ColoringError::InvalidConfiguration(
            format!("color {} outside a palette of {} colors", new_color, nb_colors)
        ));
    }
    if colors.len() != graph.nb_vertices() {
        return Err(ColoringError::InvalidConfiguration(
            format!("{} colors given for {} nodes", colors.len(), graph.nb_vertices())
        ));
    }
    let v = graph.vertex(node_id)?;
    // colors as they would be after the recoloring
    let mut proposed = colors.to_vec();
    proposed[v] = Some(new_color);
    let neighbors = graph.neighbors(v);
    let mut conflicting_neighbors = Vec::new();
    let mut recolorable_neighbors = Vec::new();
    let mut suggestions = Vec::new();
    for u in neighbors.iter().filter(|u| proposed[**u] == Some(new_color)) {
        let used = graph.neighbor_colors(*u, &proposed);
        let alternatives:Vec<Color> = (0..nb_colors).filter(|c| !used.contains(*c)).collect();
        let id = graph.node_id(*u);
        conflicting_neighbors.push(id);
        if !alternatives.is_empty() {
            recolorable_neighbors.push(id);
        }
        suggestions.push(RecolorSuggestion { node_id: id, alternatives });
    }
    Ok(RecolorImpact {
        node_id,
        new_color,
        neighbors: neighbors.iter().map(|u| graph.node_id(*u)).collect(),
        success_probability: success_probability(
            recolorable_neighbors.len(), conflicting_neighbors.len(), nb_colors
        ),
        conflicting_neighbors,
        recolorable_neighbors,
        suggestions,
    })
}
