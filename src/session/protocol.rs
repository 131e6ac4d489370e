//! Messages exchanged between an execution session and its host.

use std::sync::Arc;

use fastrand::Rng;
use serde::{Serialize, Deserialize};

use crate::color::{Assignment, Edge, Graph, GraphSnapshot, MAX_COLORS, MIN_COLORS};
use crate::error::ColoringError;
use crate::search::{HistoryRecord, ProgressReport, Strategy};
use crate::search::las_vegas::LasVegasSearch;
use crate::search::monte_carlo::MonteCarloSearch;
use crate::search::local_search::{LocalSearchOptimizer, LocalSearchProgress};
use crate::search::greedy_dsatur::greedy_dsatur;

/** algorithm requested by the host */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    LasVegas,
    MonteCarlo,
    LocalSearch,
}

impl Algorithm {
    /// true for the strategies drawing random colorings
    pub fn is_stochastic(&self) -> bool {
        matches!(self, Algorithm::LasVegas | Algorithm::MonteCarlo)
    }
}

/** run options */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// palette size (3 ≤ k ≤ 10)
    pub number_of_colors: usize,
    /// Las Vegas attempt cap (absent: unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u64>,
    /// Monte Carlo number of trials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u64>,
    /// seed of the random number generator (absent: random seed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/** start message: `{algorithm, graphSnapshot, options}` */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub algorithm: Algorithm,
    pub graph_snapshot: GraphSnapshot,
    pub options: RunOptions,
}

impl StartRequest {

    /// checks the options (before anything runs)
    pub fn validate_options(&self) -> Result<(), ColoringError> {
        let k = self.options.number_of_colors;
        if !(MIN_COLORS..=MAX_COLORS).contains(&k) {
            return Err(ColoringError::InvalidConfiguration(format!(
                "number of colors must be between {} and {} (got {})", MIN_COLORS, MAX_COLORS, k
            )));
        }
        match self.algorithm {
            Algorithm::MonteCarlo => match self.monte_carlo_iterations() {
                Some(n) if n >= 1 => {},
                _ => return Err(ColoringError::InvalidConfiguration(
                    "monte carlo needs at least one iteration".to_string()
                )),
            },
            Algorithm::LasVegas => if self.options.max_attempts == Some(0) {
                return Err(ColoringError::InvalidConfiguration(
                    "las vegas attempt cap must be positive".to_string()
                ));
            },
            Algorithm::LocalSearch => {},
        }
        Ok(())
    }

    fn monte_carlo_iterations(&self) -> Option<u64> {
        self.options.iterations.or(self.options.max_attempts)
    }

    /** validates the request and builds the graph and a fresh strategy.
    Stochastic strategies refuse graphs having isolated nodes. The local search
    starts from the committed colors, or from a greedy coloring if the graph has none.
    */
    pub fn prepare(self) -> Result<(Arc<Graph>, Strategy), ColoringError> {
        self.validate_options()?;
        let graph = Graph::from_snapshot(self.graph_snapshot)?;
        if graph.nb_vertices() == 0 {
            return Err(ColoringError::InvalidConfiguration("the graph has no node".to_string()));
        }
        if self.algorithm.is_stochastic() {
            let isolated = graph.isolated_nodes();
            if !isolated.is_empty() {
                return Err(ColoringError::IsolatedNodes { nodes: isolated });
            }
        }
        let k = self.options.number_of_colors;
        let graph = Arc::new(graph);
        let rng = match self.options.seed {
            Some(seed) => Rng::with_seed(seed),
            None => Rng::new(),
        };
        let strategy = match self.algorithm {
            Algorithm::LasVegas => Strategy::LasVegas(
                LasVegasSearch::new(graph.clone(), k, self.options.max_attempts, rng)
            ),
            Algorithm::MonteCarlo => Strategy::MonteCarlo(MonteCarloSearch::new(
                graph.clone(), k, self.options.iterations.or(self.options.max_attempts).unwrap_or(1), rng
            )),
            Algorithm::LocalSearch => {
                let colors = graph.current_colors();
                if let Some(c) = colors.iter().flatten().find(|c| **c >= k) {
                    return Err(ColoringError::InvalidConfiguration(
                        format!("committed color {} outside a palette of {} colors", c, k)
                    ));
                }
                let colors = if colors.iter().all(|c| c.is_none()) {
                    greedy_dsatur(&graph, k)
                } else {
                    colors
                };
                Strategy::LocalSearch(LocalSearchOptimizer::new(graph.clone(), k, colors))
            }
        };
        Ok((graph, strategy))
    }
}

/** progress message (only carries the attempts appended since the previous one) */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMessage {
    pub progress: f64,
    pub attempts: u64,
    pub conflicts: usize,
    pub colors: Assignment,
    pub conflict_edges: Vec<Edge>,
    pub mean_conflicts: f64,
    pub success_rate: f64,
    pub new_attempts: Vec<HistoryRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalSearchProgress>,
}

impl ProgressMessage {
    pub fn from_report(graph:&Graph, report:ProgressReport) -> Self {
        Self {
            progress: report.stats.progress,
            attempts: report.stats.attempts,
            conflicts: report.stats.conflicts,
            colors: graph.to_assignment(&report.assignment),
            conflict_edges: graph.edge_ids(&report.conflict_edges),
            mean_conflicts: report.stats.mean_conflicts,
            success_rate: report.stats.success_rate,
            new_attempts: report.new_history,
            local: report.local,
        }
    }
}

/** final statistics */
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteStats {
    pub attempts: u64,
    pub conflicts: usize,
    pub mean_conflicts: f64,
    pub success_rate: f64,
    pub time_ms: u64,
}

/** completion message */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMessage {
    pub colors: Assignment,
    pub conflict_edges: Vec<Edge>,
    pub stats: CompleteStats,
    /// history records not sent yet
    #[serde(default)]
    pub new_attempts: Vec<HistoryRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalSearchProgress>,
}

impl CompleteMessage {
    pub fn from_report(graph:&Graph, report:ProgressReport, time_ms:u64) -> Self {
        Self {
            colors: graph.to_assignment(&report.assignment),
            conflict_edges: graph.edge_ids(&report.conflict_edges),
            stats: CompleteStats {
                attempts: report.stats.attempts,
                conflicts: report.stats.conflicts,
                mean_conflicts: report.stats.mean_conflicts,
                success_rate: report.stats.success_rate,
                time_ms,
            },
            new_attempts: report.new_history,
            local: report.local,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

/** messages sent by a running session to its host */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionMessage {
    Progress(ProgressMessage),
    Complete(CompleteMessage),
    Error(ErrorMessage),
}
