use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Serialize, Deserialize};

use crate::color::{Assignment, Edge};
use crate::search::HistoryRecord;
use crate::search::local_search::{LocalSearchProgress, RecolorRecord};
use crate::session::protocol::{Algorithm, CompleteMessage, ProgressMessage};

/** status of the session as seen by the observers */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/** state published to the observers */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub algorithm: Option<Algorithm>,
    pub progress: f64,
    pub attempts: u64,
    pub conflicts: usize,
    pub colors: Assignment,
    pub conflict_edges: Vec<Edge>,
    pub mean_conflicts: f64,
    pub success_rate: f64,
    /// number of attempts recorded in the history log
    pub history_len: usize,
    pub time_ms: Option<u64>,
    /// local search only (the recolor records are moved to the recolor log)
    pub local: Option<LocalSearchProgress>,
    pub error: Option<String>,
}

/// attempt history of the current run, shared between the host and the session owner
pub type HistoryLog = Arc<RwLock<Vec<HistoryRecord>>>;

/// recolors of the current local search run, in order
pub type RecolorLog = Arc<RwLock<Vec<RecolorRecord>>>;

/** host-side state of a run: rebuilt from the progress messages */
#[derive(Debug)]
pub(crate) struct HostState {
    pub snapshot: SessionSnapshot,
    history: HistoryLog,
    recolors: RecolorLog,
}

impl HostState {
    /// fresh running state (clears the logs)
    pub fn start(algorithm:Algorithm, history:HistoryLog, recolors:RecolorLog) -> Self {
        history.write().clear();
        recolors.write().clear();
        Self {
            snapshot: SessionSnapshot {
                status: SessionStatus::Running,
                algorithm: Some(algorithm),
                ..SessionSnapshot::default()
            },
            history,
            recolors,
        }
    }

    /// moves the new recolor records to the log
    fn append_recolors(&self, local:Option<&LocalSearchProgress>) -> Option<LocalSearchProgress> {
        local.map(|l| {
            self.recolors.write().extend_from_slice(&l.new_recolors);
            LocalSearchProgress { new_recolors: Vec::new(), ..l.clone() }
        })
    }

    fn append_history(&mut self, records:&[HistoryRecord]) {
        let mut history = self.history.write();
        history.extend_from_slice(records);
        self.snapshot.history_len = history.len();
    }

    /// applies a progress message. Returns false if it is older than the current state
    pub fn apply_progress(&mut self, message:ProgressMessage) -> bool {
        if message.attempts < self.snapshot.attempts {
            return false;
        }
        self.append_history(&message.new_attempts);
        let local = self.append_recolors(message.local.as_ref());
        let s = &mut self.snapshot;
        s.progress = message.progress;
        s.attempts = message.attempts;
        s.conflicts = message.conflicts;
        s.colors = message.colors;
        s.conflict_edges = message.conflict_edges;
        s.mean_conflicts = message.mean_conflicts;
        s.success_rate = message.success_rate;
        s.local = local;
        true
    }

    pub fn apply_complete(&mut self, message:&CompleteMessage) {
        self.append_history(&message.new_attempts);
        let local = self.append_recolors(message.local.as_ref());
        let s = &mut self.snapshot;
        s.status = SessionStatus::Completed;
        s.progress = 1.;
        s.attempts = message.stats.attempts;
        s.conflicts = message.stats.conflicts;
        s.colors = message.colors.clone();
        s.conflict_edges = message.conflict_edges.clone();
        s.mean_conflicts = message.stats.mean_conflicts;
        s.success_rate = message.stats.success_rate;
        s.time_ms = Some(message.stats.time_ms);
        s.local = local;
    }

    /// failed run: partial statistics are cleared
    pub fn apply_error(&mut self, message:&str) {
        self.history.write().clear();
        self.recolors.write().clear();
        self.snapshot = SessionSnapshot {
            status: SessionStatus::Failed,
            algorithm: self.snapshot.algorithm,
            error: Some(message.to_string()),
            ..SessionSnapshot::default()
        };
    }
}
