//! Paced execution: one step per tick, on the caller's task.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{error, info};

use crate::color::Graph;
use crate::error::ColoringError;
use crate::search::{CancelFlag, ColoringStrategy, Strategy};
use crate::session::executor::panic_message;
use crate::session::protocol::{CompleteMessage, ProgressMessage};
use crate::session::publisher::Publisher;
use crate::session::state::{HostState, SessionSnapshot};
use crate::session::SessionOutcome;

/** source of pacing ticks */
#[async_trait]
pub trait TickSource: Send {
    /// waits for the next tick
    async fn tick(&mut self);
}

/** ticks at a fixed period */
#[derive(Debug)]
pub struct IntervalTicks(Interval);

impl IntervalTicks {
    pub fn new(period:Duration) -> Self {
        let mut ticks = interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self(ticks)
    }
}

#[async_trait]
impl TickSource for IntervalTicks {
    async fn tick(&mut self) { self.0.tick().await; }
}

/** ticks without delay (only yields to the runtime) */
#[derive(Debug, Default)]
pub struct ImmediateTicks;

#[async_trait]
impl TickSource for ImmediateTicks {
    async fn tick(&mut self) { tokio::task::yield_now().await; }
}

/**
Drives a strategy one step per tick and publishes the state after each step
(throttled by the publisher). The final state is always delivered.
*/
#[derive(Debug)]
pub struct PacedDriver<S = Strategy> {
    strategy: S,
    graph: Arc<Graph>,
    cancel: CancelFlag,
    publisher: Publisher<SessionSnapshot>,
    state: HostState,
    started: Instant,
    outcome: Option<SessionOutcome>,
}

impl<S: ColoringStrategy> PacedDriver<S> {
    pub(crate) fn new(
        strategy:S,
        graph:Arc<Graph>,
        cancel:CancelFlag,
        publisher:Publisher<SessionSnapshot>,
        state:HostState,
    ) -> Self {
        Self { strategy, graph, cancel, publisher, state, started: Instant::now(), outcome: None }
    }

    /// the strategy being driven
    pub fn strategy(&self) -> &S { &self.strategy }

    /// performs one step. Returns the outcome once the run is over
    pub fn tick(&mut self) -> Option<SessionOutcome> {
        if let Some(outcome) = &self.outcome {
            return Some(outcome.clone());
        }
        if self.cancel.is_cancelled() {
            info!("paced driver: cancelled");
            self.outcome = Some(SessionOutcome::Cancelled);
            return self.outcome.clone();
        }
        let strategy = &mut self.strategy;
        let stepped = panic::catch_unwind(AssertUnwindSafe(|| {
            let done = strategy.step().done;
            (done, strategy.take_progress())
        }));
        let cancel = &self.cancel;
        match stepped {
            Ok((true, report)) => {
                let time_ms = self.started.elapsed().as_millis() as u64;
                let message = CompleteMessage::from_report(&self.graph, report, time_ms);
                self.state.apply_complete(&message);
                if self.publisher.publish_now_unless(self.state.snapshot.clone(), || cancel.is_cancelled()) {
                    info!(attempts = message.stats.attempts, conflicts = message.stats.conflicts, "paced driver: done");
                    self.outcome = Some(SessionOutcome::Completed(message));
                } else {
                    self.outcome = Some(SessionOutcome::Cancelled);
                }
            }
            Ok((false, report)) => {
                if self.state.apply_progress(ProgressMessage::from_report(&self.graph, report))
                    && !self.publisher.notify_unless(self.state.snapshot.clone(), || cancel.is_cancelled()) {
                    self.outcome = Some(SessionOutcome::Cancelled);
                }
            }
            Err(payload) => {
                let message = ColoringError::ExecutionFault(panic_message(payload.as_ref())).to_string();
                error!(%message, "paced driver: fault during a step");
                self.state.apply_error(&message);
                self.outcome = Some(
                    if self.publisher.publish_now_unless(self.state.snapshot.clone(), || cancel.is_cancelled()) {
                        SessionOutcome::Failed(message)
                    } else {
                        SessionOutcome::Cancelled
                    }
                );
            }
        }
        self.outcome.clone()
    }

    /// steps once per tick until the run is over
    pub async fn run<T: TickSource + ?Sized>(&mut self, ticks:&mut T) -> SessionOutcome {
        loop {
            ticks.tick().await;
            if let Some(outcome) = self.tick() {
                return outcome;
            }
        }
    }
}
