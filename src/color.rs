use std::collections::{BTreeMap, HashMap};

use bit_set::BitSet;
use serde::{Serialize, Deserialize};

use crate::error::ColoringError;

/** Node identifier (unique positive integer, chosen by the graph owner) */
pub type NodeId = u32;

/** Vertex index (dense, position of the node inside the graph) */
pub type VertexId = usize;

/** Color: index inside the palette */
pub type Color = usize;

/** Coloring assignment: node id -> color. Uncolored nodes are absent. */
pub type Assignment = BTreeMap<NodeId, Color>;

/// display colors of the palette (a palette of size k uses the first k entries)
pub const PALETTE: [&str; 10] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4",
    "#42d4f4", "#f032e6", "#bfef45", "#fabed4", "#469990",
];

/// smallest palette accepted by a session
pub const MIN_COLORS: usize = 3;

/// largest palette accepted by a session
pub const MAX_COLORS: usize = 10;

/// display name of a color (None if outside the palette)
pub fn palette_name(c:Color) -> Option<&'static str> {
    PALETTE.get(c).copied()
}

/** graph node as exchanged with the external layer */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// position in [0,1] (opaque for the engine)
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub color: Option<Color>,
}

/** undirected edge between two node ids */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

/** wire shape of a graph: {nodes, edges} */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/** models a graph handed to the engine.
The engine only reads it. Committed colors change through `apply_coloring`
(called by the external consumer with a published assignment).
*/
#[derive(Debug, Clone)]
pub struct Graph {
    /// nodes, in snapshot order (the vertex id is the position)
    nodes: Vec<Node>,
    /// edges of the graph (id-level, as given)
    edges: Vec<Edge>,
    /// edge list over vertex ids
    vertex_edges: Vec<(VertexId,VertexId)>,
    /// adj_list[i]: list of vertices adjacent to i
    adj_list: Vec<Vec<VertexId>>,
    /// node id -> vertex id
    index: HashMap<NodeId, VertexId>,
}

impl Graph {

    /** builds a graph from its snapshot.
    Fails if a node id is duplicated, if an edge refers to an unknown node
    or if an edge is a self-loop.
    */
    pub fn from_snapshot(snapshot:GraphSnapshot) -> Result<Self, ColoringError> {
        let GraphSnapshot { nodes, edges } = snapshot;
        let mut index = HashMap::with_capacity(nodes.len());
        for (i,node) in nodes.iter().enumerate() {
            if index.insert(node.id, i).is_some() {
                return Err(ColoringError::InvalidGraph(format!("duplicated node id {}", node.id)));
            }
        }
        let mut adj_list = vec![Vec::new() ; nodes.len()];
        let mut vertex_edges = Vec::with_capacity(edges.len());
        for e in &edges {
            let u = *index.get(&e.source).ok_or(ColoringError::UnknownNode(e.source))?;
            let v = *index.get(&e.target).ok_or(ColoringError::UnknownNode(e.target))?;
            if u == v {
                return Err(ColoringError::InvalidGraph(format!("self-loop on node {}", e.source)));
            }
            adj_list[u].push(v);
            adj_list[v].push(u);
            vertex_edges.push((u,v));
        }
        Ok(Self { nodes, edges, vertex_edges, adj_list, index })
    }

    /// number of vertices
    pub fn nb_vertices(&self) -> usize { self.nodes.len() }

    /// number of edges
    pub fn nb_edges(&self) -> usize { self.edges.len() }

    /// list of vertices adjacent to vertex u
    pub fn neighbors(&self, u:VertexId) -> &[VertexId] { &self.adj_list[u] }

    pub fn degree(&self, u:VertexId) -> usize { self.adj_list[u].len() }

    /// edge list (over vertex ids)
    pub fn edges(&self) -> &[(VertexId,VertexId)] { &self.vertex_edges }

    pub fn nodes(&self) -> &[Node] { &self.nodes }

    /// iterates over the vertices
    pub fn vertices(&self) -> std::ops::Range<VertexId> { 0..self.nb_vertices() }

    /// node id of vertex u
    pub fn node_id(&self, u:VertexId) -> NodeId { self.nodes[u].id }

    /// vertex of a node id
    pub fn vertex(&self, id:NodeId) -> Result<VertexId, ColoringError> {
        self.index.get(&id).copied().ok_or(ColoringError::UnknownNode(id))
    }

    /// nodes without any incident edge
    pub fn isolated_nodes(&self) -> Vec<NodeId> {
        self.vertices()
            .filter(|u| self.adj_list[*u].is_empty())
            .map(|u| self.node_id(u))
            .collect()
    }

    /// committed colors, one entry per vertex
    pub fn current_colors(&self) -> Vec<Option<Color>> {
        self.nodes.iter().map(|n| n.color).collect()
    }

    /// converts dense colors to an assignment (uncolored vertices are skipped)
    pub fn to_assignment(&self, colors:&[Option<Color>]) -> Assignment {
        colors.iter().enumerate()
            .filter_map(|(u,c)| c.map(|c| (self.node_id(u), c)))
            .collect()
    }

    /// converts an assignment to dense colors (nodes absent from it are uncolored)
    pub fn to_colors(&self, assignment:&Assignment) -> Vec<Option<Color>> {
        self.nodes.iter().map(|n| assignment.get(&n.id).copied()).collect()
    }

    /// converts edges over vertex ids to edges over node ids
    pub fn edge_ids(&self, edges:&[(VertexId,VertexId)]) -> Vec<Edge> {
        edges.iter()
            .map(|(u,v)| Edge { source: self.node_id(*u), target: self.node_id(*v) })
            .collect()
    }

    /** commits a coloring: every node listed in the assignment takes its color,
    the others keep their current one. */
    pub fn apply_coloring(&mut self, assignment:&Assignment) -> Result<(), ColoringError> {
        for id in assignment.keys() {
            self.vertex(*id)?;
        }
        for node in self.nodes.iter_mut() {
            if let Some(c) = assignment.get(&node.id) {
                node.color = Some(*c);
            }
        }
        Ok(())
    }

    /// commits new positions (one per vertex)
    pub fn apply_positions(&mut self, positions:&[(f64,f64)]) {
        for (node,(x,y)) in self.nodes.iter_mut().zip(positions) {
            node.x = *x;
            node.y = *y;
        }
    }

    /// returns the snapshot of the graph (including committed colors)
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot { nodes: self.nodes.clone(), edges: self.edges.clone() }
    }

    /// colors used by the neighbors of u
    pub fn neighbor_colors(&self, u:VertexId, colors:&[Option<Color>]) -> BitSet {
        let mut res:BitSet = BitSet::default();
        for v in self.neighbors(u) {
            if let Some(c) = colors[*v] {
                res.insert(c);
            }
        }
        res
    }

    /// print statistics of the graph
    pub fn display_statistics(&self) {
        println!("\t{} \t vertices", self.nb_vertices());
        println!("\t{} \t edges", self.nb_edges());
        let degrees = self.vertices().map(|u| self.degree(u));
        if let (Some(mini), Some(maxi)) = (degrees.clone().min(), degrees.max()) {
            println!("\t{} \t min degree", mini);
            println!("\t{} \t max degree", maxi);
        }
    }
}
