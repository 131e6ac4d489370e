//! Execution sessions: drive a strategy incrementally and publish throttled
//! snapshots to the observers.
//!
//! A session runs either on a background blocking task (stochastic searches,
//! possibly millions of trials) or through a `PacedDriver` stepped by the caller
//! once per tick (visualized runs). At most one run is active per session:
//! starting a run stops the previous one first.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::color::Graph;
use crate::config::SessionConfig;
use crate::error::ColoringError;
use crate::search::{CancelFlag, ColoringStrategy, HistoryRecord};
use crate::search::local_search::RecolorRecord;

/// messages between the session and its host
pub mod protocol;

/// debounced publish/subscribe
pub mod publisher;

/// published state
pub mod state;

/// background executor
pub(crate) mod executor;

/// paced driver
pub mod driver;

use driver::PacedDriver;
use executor::spawn_executor;
use protocol::{Algorithm, CompleteMessage, SessionMessage, StartRequest};
use publisher::{Publisher, SubscriptionToken};
use state::{HistoryLog, HostState, RecolorLog, SessionSnapshot};

/** how a run ended */
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(CompleteMessage),
    Failed(String),
    Cancelled,
}

#[derive(Debug)]
enum ActiveRun {
    Background {
        cancel: CancelFlag,
        host: JoinHandle<SessionOutcome>,
        worker: JoinHandle<()>,
    },
    Paced {
        cancel: CancelFlag,
    },
}

impl ActiveRun {
    fn cancel_flag(&self) -> &CancelFlag {
        match self {
            ActiveRun::Background { cancel, .. } => cancel,
            ActiveRun::Paced { cancel } => cancel,
        }
    }
}

/**
Execution session, owned by the caller.
Observers register with `subscribe` and receive `SessionSnapshot`s, at most one
per publish interval (the final state of a run is always delivered).
*/
#[derive(Debug)]
pub struct ExecutionSession {
    config: SessionConfig,
    publisher: Publisher<SessionSnapshot>,
    history: HistoryLog,
    recolors: RecolorLog,
    active: Option<ActiveRun>,
}

impl ExecutionSession {
    pub fn new(config:SessionConfig) -> Self {
        let publisher = Publisher::new(config.publish_interval(), SessionSnapshot::default());
        Self {
            config, publisher,
            history: HistoryLog::default(),
            recolors: RecolorLog::default(),
            active: None,
        }
    }

    pub fn config(&self) -> &SessionConfig { &self.config }

    /// registers an observer
    pub fn subscribe<F>(&self, observer:F) -> SubscriptionToken
    where F: Fn(&SessionSnapshot) + Send + Sync + 'static {
        self.publisher.subscribe(observer)
    }

    pub fn unsubscribe(&self, token:SubscriptionToken) -> bool {
        self.publisher.unsubscribe(token)
    }

    /// latest state of the session
    pub fn snapshot(&self) -> SessionSnapshot { self.publisher.latest() }

    /// attempt history of the current (or last) run
    pub fn history(&self) -> Vec<HistoryRecord> { self.history.read().clone() }

    /// recolors applied by the current (or last) local search run
    pub fn recolors(&self) -> Vec<RecolorRecord> { self.recolors.read().clone() }

    /// true if a run was started and neither waited for nor stopped
    pub fn is_active(&self) -> bool { self.active.is_some() }

    /// resets the state for a new run and delivers it
    fn begin(&mut self, algorithm:Algorithm) -> HostState {
        let state = HostState::start(algorithm, self.history.clone(), self.recolors.clone());
        self.publisher.publish_now(state.snapshot.clone());
        state
    }

    /** starts a run on a background task (stops the active run first).
    Fails without starting anything if the request is invalid. */
    pub async fn start_background(&mut self, request:StartRequest) -> Result<(), ColoringError> {
        self.stop().await;
        let algorithm = request.algorithm;
        let (graph, strategy) = request.prepare()?;
        info!(?algorithm, nodes = graph.nb_vertices(), edges = graph.nb_edges(), "session: background start");
        self.launch_background(algorithm, graph, strategy);
        Ok(())
    }

    pub(crate) fn launch_background<S>(&mut self, algorithm:Algorithm, graph:Arc<Graph>, strategy:S)
    where S: ColoringStrategy + Send + 'static {
        let state = self.begin(algorithm);
        let cancel = CancelFlag::default();
        let (rx, worker) = spawn_executor(
            strategy, graph, self.config.batch_size, self.config.channel_capacity, cancel.clone()
        );
        let host = tokio::spawn(host_loop(rx, cancel.clone(), self.publisher.clone(), state));
        self.active = Some(ActiveRun::Background { cancel, host, worker });
    }

    /** prepares a paced run (stops the active run first). The caller steps the
    returned driver, usually with `PacedDriver::run` and `IntervalTicks`. */
    pub async fn start_paced(&mut self, request:StartRequest) -> Result<PacedDriver, ColoringError> {
        self.stop().await;
        let algorithm = request.algorithm;
        let (graph, strategy) = request.prepare()?;
        info!(?algorithm, nodes = graph.nb_vertices(), edges = graph.nb_edges(), "session: paced start");
        let state = self.begin(algorithm);
        let cancel = CancelFlag::default();
        self.active = Some(ActiveRun::Paced { cancel: cancel.clone() });
        Ok(PacedDriver::new(strategy, graph, cancel, self.publisher.clone(), state))
    }

    /// stops the active run (if any) and waits for its tasks to end
    pub async fn stop(&mut self) {
        let Some(run) = self.active.take() else { return };
        run.cancel_flag().cancel();
        self.publisher.cancel_pending();
        if let ActiveRun::Background { host, worker, .. } = run {
            host.abort();
            let _ = host.await;
            if let Err(e) = worker.await {
                warn!(error = %e, "session: executor ended abnormally");
            }
        }
        info!("session: run stopped");
    }

    /** waits for the end of a background run. Returns None if there is no
    background run (a paced run ends when its driver does). */
    pub async fn wait(&mut self) -> Option<SessionOutcome> {
        match self.active.take()? {
            ActiveRun::Background { cancel, host, worker } => {
                let outcome = match host.await {
                    Ok(outcome) => outcome,
                    Err(_) if cancel.is_cancelled() => SessionOutcome::Cancelled,
                    Err(e) => SessionOutcome::Failed(ColoringError::ExecutionFault(e.to_string()).to_string()),
                };
                if let Err(e) = worker.await {
                    warn!(error = %e, "session: executor ended abnormally");
                }
                Some(outcome)
            }
            paced => {
                self.active = Some(paced);
                None
            }
        }
    }
}

impl Drop for ExecutionSession {
    fn drop(&mut self) {
        if let Some(run) = &self.active {
            run.cancel_flag().cancel();
        }
    }
}

/** host side of a background run: applies the messages and publishes the snapshots.
Publishing re-checks the cancellation flag under the publisher lock, so nothing
reaches the observers once `stop` has dropped the pending flush. */
async fn host_loop(
    mut rx:mpsc::Receiver<SessionMessage>,
    cancel:CancelFlag,
    publisher:Publisher<SessionSnapshot>,
    mut state:HostState,
) -> SessionOutcome {
    while let Some(message) = rx.recv().await {
        if cancel.is_cancelled() {
            return SessionOutcome::Cancelled; // results after cancellation are dropped
        }
        match message {
            SessionMessage::Progress(progress) => {
                if state.apply_progress(progress)
                    && !publisher.notify_unless(state.snapshot.clone(), || cancel.is_cancelled()) {
                    return SessionOutcome::Cancelled;
                }
            }
            SessionMessage::Complete(complete) => {
                state.apply_complete(&complete);
                if !publisher.publish_now_unless(state.snapshot.clone(), || cancel.is_cancelled()) {
                    return SessionOutcome::Cancelled;
                }
                info!(
                    attempts = complete.stats.attempts, conflicts = complete.stats.conflicts,
                    time_ms = complete.stats.time_ms, "session: run complete"
                );
                return SessionOutcome::Completed(complete);
            }
            SessionMessage::Error(error) => {
                state.apply_error(&error.message);
                if !publisher.publish_now_unless(state.snapshot.clone(), || cancel.is_cancelled()) {
                    return SessionOutcome::Cancelled;
                }
                return SessionOutcome::Failed(error.message);
            }
        }
    }
    if cancel.is_cancelled() {
        return SessionOutcome::Cancelled;
    }
    let message = ColoringError::ExecutionFault("executor ended without completing".to_string()).to_string();
    state.apply_error(&message);
    if !publisher.publish_now_unless(state.snapshot.clone(), || cancel.is_cancelled()) {
        return SessionOutcome::Cancelled;
    }
    SessionOutcome::Failed(message)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::color::Assignment;
    use crate::color::tests::snapshot;
    use crate::search::AlgorithmState;
    use crate::session::driver::ImmediateTicks;
    use crate::session::executor::tests::FaultyStrategy;
    use crate::session::protocol::RunOptions;
    use crate::session::state::SessionStatus;

    fn request(algorithm:Algorithm, n:u32, edges:&[(u32,u32)], options:RunOptions) -> StartRequest {
        StartRequest { algorithm, graph_snapshot: snapshot(n, edges), options }
    }

    fn options(k:usize) -> RunOptions {
        RunOptions { number_of_colors: k, seed: Some(17), ..RunOptions::default() }
    }

    const K4: [(u32,u32) ; 6] = [(1,2),(1,3),(1,4),(2,3),(2,4),(3,4)];

    fn recorder(session:&ExecutionSession) -> Arc<Mutex<Vec<SessionSnapshot>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        session.subscribe(move |s| sink.lock().push(s.clone()));
        seen
    }

    #[tokio::test]
    async fn test_las_vegas_background_run() {
        let mut session = ExecutionSession::new(SessionConfig::default());
        let seen = recorder(&session);
        let r = request(Algorithm::LasVegas, 4, &[(1,2),(2,3),(3,4)], RunOptions {
            max_attempts: Some(10_000), ..options(3)
        });
        session.start_background(r).await.unwrap();
        let outcome = session.wait().await.unwrap();
        let complete = match outcome {
            SessionOutcome::Completed(c) => c,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(complete.stats.conflicts, 0);
        assert!(complete.conflict_edges.is_empty());
        assert_eq!(complete.colors.len(), 4);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Completed);
        assert_eq!(session.history().len() as u64, complete.stats.attempts);
        assert_eq!(seen.lock().last().unwrap().status, SessionStatus::Completed);
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_monte_carlo_background_run() {
        let mut session = ExecutionSession::new(SessionConfig { publish_interval_ms: 5, ..SessionConfig::default() });
        let seen = recorder(&session);
        let r = request(Algorithm::MonteCarlo, 4, &K4, RunOptions {
            iterations: Some(5_000), ..options(3)
        });
        session.start_background(r).await.unwrap();
        match session.wait().await {
            Some(SessionOutcome::Completed(c)) => {
                assert_eq!(c.stats.attempts, 5_000);
                // K4 is not 3-colorable
                assert!(c.stats.conflicts >= 1);
                assert_eq!(c.stats.success_rate, 0.);
            }
            other => panic!("unexpected {:?}", other),
        }
        let seen = seen.lock();
        let attempts:Vec<u64> = seen.iter().map(|s| s.attempts).collect();
        assert!(attempts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().unwrap().attempts, 5_000);
        assert_eq!(session.history().len(), 5_000);
    }

    #[tokio::test]
    async fn test_invalid_requests_do_not_start() {
        let mut session = ExecutionSession::new(SessionConfig::default());
        let r = request(Algorithm::LasVegas, 3, &[(1,2),(2,3),(3,1)], options(2));
        assert!(matches!(
            session.start_background(r).await,
            Err(ColoringError::InvalidConfiguration(_))
        ));
        let r = request(Algorithm::MonteCarlo, 3, &[(1,2)], RunOptions { iterations: Some(10), ..options(3) });
        assert!(matches!(
            session.start_background(r).await,
            Err(ColoringError::IsolatedNodes { .. })
        ));
        assert!(!session.is_active());
        assert_eq!(session.snapshot().status, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn test_stop_discards_later_results() {
        let mut session = ExecutionSession::new(SessionConfig::default());
        let seen = recorder(&session);
        // K4 with 3 colors and no cap: never ends by itself
        let r = request(Algorithm::LasVegas, 4, &K4, options(3));
        session.start_background(r).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        session.stop().await;
        assert!(!session.is_active());
        let delivered = seen.lock().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(seen.lock().len(), delivered);
        assert!(session.wait().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_nothing_is_delivered_once_stop_returns() {
        for i in 0..20u64 {
            let mut session = ExecutionSession::new(SessionConfig {
                batch_size: 1, publish_interval_ms: 1, ..SessionConfig::default()
            });
            let stopped = Arc::new(std::sync::atomic::AtomicBool::new(false));
            let late = Arc::new(std::sync::atomic::AtomicUsize::new(0));
            let (flag, counter) = (stopped.clone(), late.clone());
            session.subscribe(move |_| {
                if flag.load(std::sync::atomic::Ordering::SeqCst) {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }
            });
            let r = request(Algorithm::LasVegas, 4, &K4, RunOptions { seed: Some(i), ..options(3) });
            session.start_background(r).await.unwrap();
            tokio::time::sleep(Duration::from_millis(i % 5)).await;
            session.stop().await;
            stopped.store(true, std::sync::atomic::Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(late.load(std::sync::atomic::Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_new_run_replaces_the_active_one() {
        let mut session = ExecutionSession::new(SessionConfig::default());
        let r = request(Algorithm::LasVegas, 4, &K4, options(3));
        session.start_background(r).await.unwrap();
        let r = request(Algorithm::MonteCarlo, 4, &K4, RunOptions { iterations: Some(200), ..options(4) });
        session.start_background(r).await.unwrap();
        match session.wait().await {
            Some(SessionOutcome::Completed(c)) => assert_eq!(c.stats.attempts, 200),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(session.snapshot().algorithm, Some(Algorithm::MonteCarlo));
        assert_eq!(session.history().len(), 200);
    }

    #[tokio::test]
    async fn test_fault_clears_statistics() {
        let mut session = ExecutionSession::new(SessionConfig { batch_size: 1, ..SessionConfig::default() });
        let seen = recorder(&session);
        let graph = Arc::new(Graph::from_snapshot(snapshot(2, &[(1,2)])).unwrap());
        let strategy = FaultyStrategy { state: AlgorithmState::new(vec![None, None]) };
        session.launch_background(Algorithm::LasVegas, graph, strategy);
        match session.wait().await {
            Some(SessionOutcome::Failed(message)) => assert!(message.contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Failed);
        assert_eq!(snapshot.attempts, 0);
        assert!(session.history().is_empty());
        assert_eq!(seen.lock().last().unwrap().status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_paced_local_search() {
        let mut session = ExecutionSession::new(SessionConfig::default());
        // path 1-2-3 colored 0,0,0: recoloring 2 removes both conflicts
        let mut s = snapshot(3, &[(1,2),(2,3)]);
        for node in s.nodes.iter_mut() { node.color = Some(0); }
        let r = StartRequest { algorithm: Algorithm::LocalSearch, graph_snapshot: s, options: options(3) };
        let mut driver = session.start_paced(r).await.unwrap();
        let outcome = driver.run(&mut ImmediateTicks).await;
        match outcome {
            SessionOutcome::Completed(c) => {
                assert_eq!(c.stats.conflicts, 0);
                let local = c.local.unwrap();
                assert_eq!(local.conflicts_reduced, 2);
                assert_eq!(local.recolored_count, 1);
                let mut expected = Assignment::new();
                expected.insert(1, 0);
                expected.insert(2, 1);
                expected.insert(3, 0);
                assert_eq!(c.colors, expected);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(session.snapshot().status, SessionStatus::Completed);
        let recolors = session.recolors();
        assert_eq!(recolors.len(), 1);
        assert_eq!(recolors[0].node_id, 2);
        assert!(session.snapshot().local.unwrap().new_recolors.is_empty());
        assert!(session.wait().await.is_none());
    }

    #[tokio::test]
    async fn test_paced_run_halts_on_stop() {
        let mut session = ExecutionSession::new(SessionConfig::default());
        let r = request(Algorithm::LasVegas, 4, &K4, options(3));
        let mut driver = session.start_paced(r).await.unwrap();
        assert!(driver.tick().is_none());
        assert!(driver.tick().is_none());
        session.stop().await;
        assert_eq!(driver.tick(), Some(SessionOutcome::Cancelled));
        assert_eq!(driver.strategy().state().attempts(), 2);
    }

    #[tokio::test]
    async fn test_paced_fault_is_reported() {
        let session = ExecutionSession::new(SessionConfig::default());
        let graph = Arc::new(Graph::from_snapshot(snapshot(2, &[(1,2)])).unwrap());
        let strategy = FaultyStrategy { state: AlgorithmState::new(vec![None, None]) };
        let state = HostState::start(Algorithm::LasVegas, session.history.clone(), session.recolors.clone());
        let mut driver = PacedDriver::new(
            strategy, graph, CancelFlag::default(), session.publisher.clone(), state
        );
        match driver.run(&mut ImmediateTicks).await {
            SessionOutcome::Failed(message) => assert!(message.contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(session.snapshot().status, SessionStatus::Failed);
    }
}
