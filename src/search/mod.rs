//! Search strategies for the graph coloring problem.
//!
//! Every strategy advances one unit of work per `step` and exposes the best
//! result known so far. `run` drives a strategy to completion and reports
//! progress by batches.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use fastrand::Rng;
use serde::{Serialize, Deserialize};

use crate::color::{Color, VertexId};
use crate::conflict::ConflictReport;

/// Las Vegas search (random trials until a proper coloring is found)
pub mod las_vegas;

/// Monte Carlo search (fixed number of random trials)
pub mod monte_carlo;

/// greedy pass-based local search over an existing coloring
pub mod local_search;

/// palette-bounded greedy DSATUR (initial colorings)
pub mod greedy_dsatur;

use las_vegas::LasVegasSearch;
use monte_carlo::MonteCarloSearch;
use local_search::{LocalSearchOptimizer, LocalSearchProgress, LocalSearchStats};


/** one attempt as recorded in the history */
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// 1-based attempt number
    pub attempt_number: u64,
    /// number of conflicts of this attempt
    pub conflict_count: usize,
    pub success: bool,
    /// milliseconds since the strategy was created
    pub timestamp: u64,
}

/** statistics reported after each step */
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub attempts: u64,
    /// conflicts of the best assignment (0 before the first attempt)
    pub conflicts: usize,
    pub mean_conflicts: f64,
    pub success_rate: f64,
    pub progress: f64,
}

/** state of a running strategy. Owned by exactly one strategy instance. */
#[derive(Debug)]
pub struct AlgorithmState {
    attempts: u64,
    best_assignment: Vec<Option<Color>>,
    /// None stands for +∞ (no attempt yet)
    best_conflicts: Option<usize>,
    best_conflict_edges: Vec<(VertexId,VertexId)>,
    success_count: u64,
    total_conflicts: u64,
    history: Vec<HistoryRecord>,
    /// history[..reported]: already sent by a progress report
    reported: usize,
    finished: bool,
    created: Instant,
}

impl AlgorithmState {
    /// fresh state. The best assignment starts as `initial` (until an attempt is recorded)
    pub fn new(initial:Vec<Option<Color>>) -> Self {
        Self {
            attempts: 0,
            best_assignment: initial,
            best_conflicts: None,
            best_conflict_edges: Vec::new(),
            success_count: 0,
            total_conflicts: 0,
            history: Vec::new(),
            reported: 0,
            finished: false,
            created: Instant::now(),
        }
    }

    pub fn attempts(&self) -> u64 { self.attempts }

    pub fn best_assignment(&self) -> &[Option<Color>] { &self.best_assignment }

    pub fn best_conflicts(&self) -> Option<usize> { self.best_conflicts }

    pub fn best_conflict_edges(&self) -> &[(VertexId,VertexId)] { &self.best_conflict_edges }

    pub fn success_count(&self) -> u64 { self.success_count }

    pub fn history(&self) -> &[HistoryRecord] { &self.history }

    pub fn is_finished(&self) -> bool { self.finished }

    pub fn finish(&mut self) { self.finished = true; }

    /// records an attempt (statistics and history)
    pub fn record_attempt(&mut self, conflicts:usize) {
        self.attempts += 1;
        self.total_conflicts += conflicts as u64;
        let success = conflicts == 0;
        if success { self.success_count += 1; }
        self.history.push(HistoryRecord {
            attempt_number: self.attempts,
            conflict_count: conflicts,
            success,
            timestamp: self.created.elapsed().as_millis() as u64,
        });
    }

    /// true if a number of conflicts strictly improves the best one
    pub fn improves(&self, conflicts:usize) -> bool {
        match self.best_conflicts {
            None => true,
            Some(best) => conflicts < best,
        }
    }

    /** replaces the best assignment. Callers check `improves` first so that the
    best number of conflicts never increases. */
    pub fn set_best(&mut self, assignment:&[Option<Color>], report:ConflictReport) {
        debug_assert!(self.improves(report.count));
        self.best_assignment.clear();
        self.best_assignment.extend_from_slice(assignment);
        self.best_conflicts = Some(report.count);
        self.best_conflict_edges = report.edges;
    }

    /// builds the statistics for a given progress
    pub fn stats(&self, progress:f64) -> Stats {
        let (mean_conflicts, success_rate) = if self.attempts == 0 {
            (0., 0.)
        } else {
            (
                self.total_conflicts as f64 / self.attempts as f64,
                self.success_count as f64 / self.attempts as f64,
            )
        };
        Stats {
            attempts: self.attempts,
            conflicts: self.best_conflicts.unwrap_or(0),
            mean_conflicts,
            success_rate,
            progress,
        }
    }

    /// history records appended since the last call
    pub fn take_new_history(&mut self) -> Vec<HistoryRecord> {
        let res = self.history[self.reported..].to_vec();
        self.reported = self.history.len();
        res
    }
}


/** result of a step: done flag and the best result known so far */
#[derive(Debug, Clone)]
pub struct StepView<'a> {
    pub done: bool,
    pub assignment: &'a [Option<Color>],
    pub conflict_edges: &'a [(VertexId,VertexId)],
    pub stats: Stats,
    /// local search only
    pub local: Option<&'a LocalSearchStats>,
}

/** progress report sent to the `run` callback (owned copy, only carrying
the history appended since the previous report) */
#[derive(Debug, Clone)]
pub struct ProgressReport {
    pub done: bool,
    pub assignment: Vec<Option<Color>>,
    pub conflict_edges: Vec<(VertexId,VertexId)>,
    pub stats: Stats,
    pub new_history: Vec<HistoryRecord>,
    pub local: Option<LocalSearchProgress>,
}

/** shared stop signal, checked between steps */
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) { self.0.store(true, Ordering::SeqCst); }

    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

/** how `run` ended */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// the strategy is done (the last report was sent with done=true)
    Finished,
    /// cancelled, or the callback asked to stop
    Stopped,
}

/**
Common contract of the coloring strategies.
*/
pub trait ColoringStrategy {
    /// advances exactly one unit of work and returns the best result known so far
    fn step(&mut self) -> StepView<'_>;

    /// current result, without advancing
    fn view(&self) -> StepView<'_>;

    /// progress in [0,1]
    fn calculate_progress(&self) -> f64;

    /// maximum number of attempts (None: unbounded)
    fn max_attempts(&self) -> Option<u64>;

    fn state(&self) -> &AlgorithmState;

    fn state_mut(&mut self) -> &mut AlgorithmState;

    /// local search statistics since the previous report (None for the other strategies)
    fn take_local(&mut self) -> Option<LocalSearchProgress> { None }

    /// builds a progress report from the current view and the new history records
    fn take_progress(&mut self) -> ProgressReport {
        let new_history = self.state_mut().take_new_history();
        let local = self.take_local();
        let view = self.view();
        ProgressReport {
            done: view.done,
            assignment: view.assignment.to_vec(),
            conflict_edges: view.conflict_edges.to_vec(),
            stats: view.stats,
            new_history,
            local,
        }
    }

    /**
    calls `step` until done. The callback is invoked every `batch_size` attempts
    and on completion. It may stop the run by returning `ControlFlow::Break`.
    The cancellation flag is checked before every step.
    */
    fn run<F>(&mut self, batch_size:usize, cancel:&CancelFlag, mut on_progress:F) -> RunOutcome
    where F: FnMut(ProgressReport) -> ControlFlow<()> {
        let batch_size = batch_size.max(1) as u64;
        loop {
            if cancel.is_cancelled() {
                return RunOutcome::Stopped;
            }
            let (done, attempts) = {
                let view = self.step();
                (view.done, view.stats.attempts)
            };
            if done || attempts % batch_size == 0 {
                if on_progress(self.take_progress()).is_break() {
                    return RunOutcome::Stopped;
                }
                if done {
                    return RunOutcome::Finished;
                }
            }
        }
    }
}


/// uniformly random coloring using colors 0..nb_colors
pub fn random_assignment(rng:&Rng, n:usize, nb_colors:usize, res:&mut Vec<Option<Color>>) {
    res.clear();
    res.extend((0..n).map(|_| Some(rng.usize(0..nb_colors))));
}


/** strategy selected when a session starts */
#[derive(Debug)]
pub enum Strategy {
    LasVegas(LasVegasSearch),
    MonteCarlo(MonteCarloSearch),
    LocalSearch(LocalSearchOptimizer),
}

impl ColoringStrategy for Strategy {
    fn step(&mut self) -> StepView<'_> {
        match self {
            Strategy::LasVegas(s) => s.step(),
            Strategy::MonteCarlo(s) => s.step(),
            Strategy::LocalSearch(s) => s.step(),
        }
    }

    fn view(&self) -> StepView<'_> {
        match self {
            Strategy::LasVegas(s) => s.view(),
            Strategy::MonteCarlo(s) => s.view(),
            Strategy::LocalSearch(s) => s.view(),
        }
    }

    fn calculate_progress(&self) -> f64 {
        match self {
            Strategy::LasVegas(s) => s.calculate_progress(),
            Strategy::MonteCarlo(s) => s.calculate_progress(),
            Strategy::LocalSearch(s) => s.calculate_progress(),
        }
    }

    fn max_attempts(&self) -> Option<u64> {
        match self {
            Strategy::LasVegas(s) => s.max_attempts(),
            Strategy::MonteCarlo(s) => s.max_attempts(),
            Strategy::LocalSearch(s) => s.max_attempts(),
        }
    }

    fn state(&self) -> &AlgorithmState {
        match self {
            Strategy::LasVegas(s) => s.state(),
            Strategy::MonteCarlo(s) => s.state(),
            Strategy::LocalSearch(s) => s.state(),
        }
    }

    fn state_mut(&mut self) -> &mut AlgorithmState {
        match self {
            Strategy::LasVegas(s) => s.state_mut(),
            Strategy::MonteCarlo(s) => s.state_mut(),
            Strategy::LocalSearch(s) => s.state_mut(),
        }
    }

    fn take_local(&mut self) -> Option<LocalSearchProgress> {
        match self {
            Strategy::LasVegas(s) => s.take_local(),
            Strategy::MonteCarlo(s) => s.take_local(),
            Strategy::LocalSearch(s) => s.take_local(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::color::tests::graph;

    #[test]
    fn test_state_statistics() {
        let mut state = AlgorithmState::new(vec![]);
        assert_eq!(state.stats(0.).conflicts, 0);
        state.record_attempt(3);
        state.record_attempt(0);
        let stats = state.stats(0.5);
        assert_eq!(stats.attempts, 2);
        assert!((stats.mean_conflicts - 1.5).abs() < 1e-9);
        assert!((stats.success_rate - 0.5).abs() < 1e-9);
        assert_eq!(state.history().len(), 2);
        assert!(state.history()[1].success);
    }

    #[test]
    fn test_new_history_is_incremental() {
        let mut state = AlgorithmState::new(vec![]);
        state.record_attempt(1);
        state.record_attempt(2);
        assert_eq!(state.take_new_history().len(), 2);
        state.record_attempt(3);
        let new = state.take_new_history();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].attempt_number, 3);
        assert!(state.take_new_history().is_empty());
    }

    #[test]
    fn test_run_reports_by_batches() {
        let g = Arc::new(graph(4, &[(1,2),(2,3),(3,4),(4,1)]));
        let mut s = MonteCarloSearch::new(g, 3, 120, Rng::with_seed(1));
        let mut reports = Vec::new();
        let outcome = s.run(50, &CancelFlag::default(), |r| {
            reports.push((r.stats.attempts, r.new_history.len(), r.done));
            ControlFlow::Continue(())
        });
        assert_eq!(outcome, RunOutcome::Finished);
        assert_eq!(reports, vec![(50, 50, false), (100, 50, false), (120, 20, true)]);
    }

    #[test]
    fn test_run_stops_when_cancelled() {
        let g = Arc::new(graph(3, &[(1,2),(2,3),(3,1)]));
        let mut s = Strategy::LasVegas(LasVegasSearch::new(g, 2, None, Rng::with_seed(3)));
        let cancel = CancelFlag::default();
        let flag = cancel.clone();
        let outcome = s.run(10, &cancel, |r| {
            if r.stats.attempts >= 30 { flag.cancel(); }
            ControlFlow::Continue(())
        });
        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(s.state().attempts(), 30);
    }

    #[test]
    fn test_run_stops_on_break() {
        let g = Arc::new(graph(3, &[(1,2),(2,3),(3,1)]));
        let mut s = MonteCarloSearch::new(g, 2, 1000, Rng::with_seed(3));
        let outcome = s.run(10, &CancelFlag::default(), |_| ControlFlow::Break(()));
        assert_eq!(outcome, RunOutcome::Stopped);
        assert_eq!(s.state().attempts(), 10);
    }
}
