use std::sync::Arc;

use fastrand::Rng;
use tracing::debug;

use crate::color::{Color, Graph};
use crate::conflict::{count_conflicts, evaluate};
use crate::search::{random_assignment, AlgorithmState, ColoringStrategy, StepView};

/** status of a Las Vegas search */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Running,
    /// a proper coloring was found
    Success,
    /// the attempt cap was reached without success
    Exhausted,
}

/**
Las Vegas search: draws uniformly random colorings until one has no conflict.
 - stops at the first success (no further trial)
 - if a cap is given, stops after `max_attempts` trials, keeping the best coloring seen
 - without a cap, the progress cannot be estimated (reported as 0 while running).
   The caller must provide a way to cancel.
*/
#[derive(Debug)]
pub struct LasVegasSearch {
    /// reference graph
    graph: Arc<Graph>,
    /// palette size
    nb_colors: usize,
    /// None: unbounded
    max_attempts: Option<u64>,
    state: AlgorithmState,
    status: SearchStatus,
    /// buffer for the current trial
    trial: Vec<Option<Color>>,
    rng: Rng,
}

impl LasVegasSearch {
    /// nb_colors must be positive (checked by `StartRequest::prepare`)
    pub(crate) fn new(graph:Arc<Graph>, nb_colors:usize, max_attempts:Option<u64>, rng:Rng) -> Self {
        debug_assert!(nb_colors > 0);
        let n = graph.nb_vertices();
        Self {
            graph,
            nb_colors,
            max_attempts,
            state: AlgorithmState::new(vec![None ; n]),
            status: SearchStatus::Running,
            trial: Vec::with_capacity(n),
            rng,
        }
    }

    pub fn status(&self) -> SearchStatus { self.status }

    /// performs one trial
    fn trial(&mut self) {
        random_assignment(&self.rng, self.graph.nb_vertices(), self.nb_colors, &mut self.trial);
        let conflicts = count_conflicts(self.graph.edges(), &self.trial);
        self.state.record_attempt(conflicts);
        if self.state.improves(conflicts) {
            debug!(attempt = self.state.attempts(), conflicts, "las vegas: new best");
            let report = evaluate(self.graph.edges(), &self.trial);
            self.state.set_best(&self.trial, report);
        }
        if conflicts == 0 {
            self.status = SearchStatus::Success;
            self.state.finish();
        } else if self.max_attempts.map_or(false, |cap| self.state.attempts() >= cap) {
            self.status = SearchStatus::Exhausted;
            self.state.finish();
        }
    }
}

impl ColoringStrategy for LasVegasSearch {
    fn step(&mut self) -> StepView<'_> {
        if !self.state.is_finished() {
            self.trial();
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
        if self.state.is_finished() {
            return 1.;
        }
        match self.max_attempts {
            None => 0.,
            Some(cap) => (self.state.attempts() as f64 / cap as f64).min(1.),
        }
    }

    fn max_attempts(&self) -> Option<u64> { self.max_attempts }

    fn state(&self) -> &AlgorithmState { &self.state }

    fn state_mut(&mut self) -> &mut AlgorithmState { &mut self.state }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::tests::graph;

    fn triangle() -> Arc<Graph> { Arc::new(graph(3, &[(1,2),(2,3),(3,1)])) }

    fn path4() -> Arc<Graph> { Arc::new(graph(4, &[(1,2),(2,3),(3,4)])) }

    #[test]
    fn test_triangle_two_colors_is_exhausted() {
        let mut s = LasVegasSearch::new(triangle(), 2, Some(1000), Rng::with_seed(42));
        let mut previous_best = usize::MAX;
        loop {
            let view = s.step();
            assert!(view.stats.conflicts <= previous_best);
            previous_best = view.stats.conflicts;
            if view.done { break; }
        }
        assert_eq!(s.status(), SearchStatus::Exhausted);
        assert_eq!(s.state().attempts(), 1000);
        assert!(s.state().best_conflicts().unwrap() >= 1);
        assert_eq!(s.state().success_count(), 0);
        assert_eq!(s.state().history().len(), 1000);
    }

    #[test]
    fn test_path_two_colors_succeeds() {
        // 2 proper colorings out of 16: expected number of trials is 8
        for seed in 0..20 {
            let mut s = LasVegasSearch::new(path4(), 2, Some(200), Rng::with_seed(seed));
            while !s.step().done {}
            assert_eq!(s.status(), SearchStatus::Success, "seed {}", seed);
            assert_eq!(s.state().best_conflicts(), Some(0));
            assert!(s.view().conflict_edges.is_empty());
            // first success wins
            assert_eq!(s.state().success_count(), 1);
            assert!(s.state().history().last().unwrap().success);
        }
    }

    #[test]
    fn test_no_step_after_done() {
        let mut s = LasVegasSearch::new(path4(), 3, Some(500), Rng::with_seed(5));
        while !s.step().done {}
        let attempts = s.state().attempts();
        let view = s.step();
        assert!(view.done);
        assert_eq!(view.stats.attempts, attempts);
        assert_eq!(view.stats.progress, 1.);
    }

    #[test]
    fn test_unbounded_progress_is_zero() {
        let mut s = LasVegasSearch::new(triangle(), 2, None, Rng::with_seed(1));
        for _ in 0..10 {
            let view = s.step();
            assert!(!view.done);
            assert_eq!(view.stats.progress, 0.);
        }
        assert_eq!(s.max_attempts(), None);
    }

    #[test]
    fn test_best_conflict_edges_match_best_assignment() {
        let mut s = LasVegasSearch::new(triangle(), 2, Some(50), Rng::with_seed(9));
        while !s.step().done {}
        let report = evaluate(triangle().edges(), s.state().best_assignment());
        assert_eq!(report.count, s.state().best_conflicts().unwrap());
        assert_eq!(report.edges, s.state().best_conflict_edges());
    }
}
