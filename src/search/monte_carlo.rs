use std::sync::Arc;

use fastrand::Rng;
use tracing::debug;

use crate::color::{Color, Graph};
use crate::conflict::{count_conflicts, evaluate};
use crate::search::{random_assignment, AlgorithmState, ColoringStrategy, StepView};

/**
Monte Carlo search: performs exactly `iterations` uniformly random trials and
returns the best coloring seen. Unlike the Las Vegas search, finding a proper
coloring does not stop the run.
*/
#[derive(Debug)]
pub struct MonteCarloSearch {
    graph: Arc<Graph>,
    nb_colors: usize,
    iterations: u64,
    state: AlgorithmState,
    trial: Vec<Option<Color>>,
    rng: Rng,
}

impl MonteCarloSearch {
    /// nb_colors must be positive (checked by `StartRequest::prepare`)
    pub(crate) fn new(graph:Arc<Graph>, nb_colors:usize, iterations:u64, rng:Rng) -> Self {
        debug_assert!(nb_colors > 0);
        let n = graph.nb_vertices();
        let mut state = AlgorithmState::new(vec![None ; n]);
        if iterations == 0 { state.finish(); }
        Self {
            graph,
            nb_colors,
            iterations,
            state,
            trial: Vec::with_capacity(n),
            rng,
        }
    }

    pub fn iterations(&self) -> u64 { self.iterations }
}

impl ColoringStrategy for MonteCarloSearch {
    fn step(&mut self) -> StepView<'_> {
        if !self.state.is_finished() {
            random_assignment(&self.rng, self.graph.nb_vertices(), self.nb_colors, &mut self.trial);
            let conflicts = count_conflicts(self.graph.edges(), &self.trial);
            self.state.record_attempt(conflicts);
            if self.state.improves(conflicts) {
                debug!(attempt = self.state.attempts(), conflicts, "monte carlo: new best");
                let report = evaluate(self.graph.edges(), &self.trial);
                self.state.set_best(&self.trial, report);
            }
            if self.state.attempts() >= self.iterations {
                self.state.finish();
            }
        }
        self.view()
    }

    fn view(&self) -> StepView<'_> {
        StepView {
            done: self.state.is_finished(),
            assignment: self.state.best_assignment(),
            conflict_edges: self.state.best_conflict_edges(),
            stats: self.state.stats(self.calculate_progress()),
            local: None,
        }
    }

    fn calculate_progress(&self) -> f64 {
        if self.iterations == 0 {
            return 1.;
        }
        self.state.attempts() as f64 / self.iterations as f64
    }

    fn max_attempts(&self) -> Option<u64> { Some(self.iterations) }

    fn state(&self) -> &AlgorithmState { &self.state }

    fn state_mut(&mut self) -> &mut AlgorithmState { &mut self.state }
}
