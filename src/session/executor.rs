//! Background execution of a strategy.
//!
//! The strategy runs on a blocking task and sends its messages through a bounded
//! channel. The run stops as soon as the cancellation flag is raised or the
//! receiving side is dropped.

use std::any::Any;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::color::Graph;
use crate::error::ColoringError;
use crate::search::{CancelFlag, ColoringStrategy, RunOutcome};
use crate::session::protocol::{CompleteMessage, ErrorMessage, ProgressMessage, SessionMessage};

/// text of a panic payload
pub(crate) fn panic_message(payload:&(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown fault".to_string()
    }
}

/** spawns the executor of a strategy on the blocking pool.
Returns the receiving side of the message channel and the executor handle. */
pub(crate) fn spawn_executor<S>(
    strategy:S,
    graph:Arc<Graph>,
    batch_size:usize,
    capacity:usize,
    cancel:CancelFlag,
) -> (mpsc::Receiver<SessionMessage>, JoinHandle<()>)
where S: ColoringStrategy + Send + 'static {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let worker = tokio::task::spawn_blocking(move || {
        execute(strategy, &graph, batch_size, &cancel, &tx)
    });
    (rx, worker)
}

/// runs the strategy until done, cancelled or disconnected
fn execute<S: ColoringStrategy>(
    mut strategy:S,
    graph:&Graph,
    batch_size:usize,
    cancel:&CancelFlag,
    tx:&mpsc::Sender<SessionMessage>,
) {
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        strategy.run(batch_size, cancel, |report| {
            let message = if report.done {
                let time_ms = started.elapsed().as_millis() as u64;
                SessionMessage::Complete(CompleteMessage::from_report(graph, report, time_ms))
            } else {
                SessionMessage::Progress(ProgressMessage::from_report(graph, report))
            };
            match tx.blocking_send(message) {
                Ok(()) => ControlFlow::Continue(()),
                Err(_) => ControlFlow::Break(()),
            }
        })
    }));
    match result {
        Ok(RunOutcome::Finished) => info!(
            attempts = strategy.state().attempts(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "executor: run finished"
        ),
        Ok(RunOutcome::Stopped) => info!(
            attempts = strategy.state().attempts(), "executor: run stopped"
        ),
        Err(payload) => {
            let message = ColoringError::ExecutionFault(panic_message(payload.as_ref())).to_string();
            error!(%message, "executor: fault during a step");
            let _ = tx.blocking_send(SessionMessage::Error(ErrorMessage { message }));
        }
    }
}


#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::color::tests::graph;
    use crate::search::{AlgorithmState, StepView};
    use crate::search::monte_carlo::MonteCarloSearch;

    /** strategy failing at its third step */
    #[derive(Debug)]
    pub(crate) struct FaultyStrategy {
        pub state: AlgorithmState,
    }

    impl ColoringStrategy for FaultyStrategy {
        fn step(&mut self) -> StepView<'_> {
            if self.state.attempts() == 2 {
                panic!("boom");
            }
            self.state.record_attempt(1);
            self.view()
        }

        fn view(&self) -> StepView<'_> {
            StepView {
                done: false,
                assignment: self.state.best_assignment(),
                conflict_edges: self.state.best_conflict_edges(),
                stats: self.state.stats(0.),
                local: None,
            }
        }

        fn calculate_progress(&self) -> f64 { 0. }

        fn max_attempts(&self) -> Option<u64> { None }

        fn state(&self) -> &AlgorithmState { &self.state }

        fn state_mut(&mut self) -> &mut AlgorithmState { &mut self.state }
    }

    #[tokio::test]
    async fn test_messages_end_with_complete() {
        let g = Arc::new(graph(3, &[(1,2),(2,3)]));
        let s = MonteCarloSearch::new(g.clone(), 3, 120, fastrand::Rng::with_seed(1));
        let (mut rx, worker) = spawn_executor(s, g, 50, 4, CancelFlag::default());
        let mut attempts = Vec::new();
        let mut complete = None;
        while let Some(m) = rx.recv().await {
            match m {
                SessionMessage::Progress(p) => attempts.push(p.attempts),
                SessionMessage::Complete(c) => complete = Some(c),
                SessionMessage::Error(e) => panic!("unexpected error {}", e.message),
            }
        }
        worker.await.unwrap();
        assert_eq!(attempts, vec![50, 100]);
        let complete = complete.unwrap();
        assert_eq!(complete.stats.attempts, 120);
        assert_eq!(complete.new_attempts.len(), 20);
    }

    #[tokio::test]
    async fn test_fault_is_reported() {
        let g = Arc::new(graph(2, &[(1,2)]));
        let s = FaultyStrategy { state: AlgorithmState::new(vec![None, None]) };
        let (mut rx, worker) = spawn_executor(s, g, 1, 4, CancelFlag::default());
        let mut messages = Vec::new();
        while let Some(m) = rx.recv().await {
            messages.push(m);
        }
        worker.await.unwrap();
        assert_eq!(messages.len(), 3);
        match messages.last() {
            Some(SessionMessage::Error(e)) => assert!(e.message.contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropping_the_receiver_stops_the_run() {
        let g = Arc::new(graph(3, &[(1,2),(2,3),(3,1)]));
        let s = MonteCarloSearch::new(g.clone(), 3, u64::MAX, fastrand::Rng::with_seed(1));
        let (rx, worker) = spawn_executor(s, g, 10, 1, CancelFlag::default());
        drop(rx);
        worker.await.unwrap();
    }

    #[test]
    fn test_panic_message() {
        let payload:Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload:Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}
