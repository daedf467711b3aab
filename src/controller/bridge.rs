//! Thread boundary between the controller's worker and the UI thread.
//!
//! The worker never touches UI-owned state. It reports stage transitions,
//! progress and its final result as [`StageMessage`]s over a bounded channel;
//! the controller drains them on the UI thread and re-dispatches to observers
//! there.

use super::{ControllerError, ControllerState, ProgressUpdate};
use crate::graph::Graph;
use crate::progress::ProgressSink;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::Mutex;

/// Channel capacity for worker → UI messages.
const MSG_CHANNEL_CAPACITY: usize = 1024;

/// Messages from a pipeline run. Every message carries the generation of the
/// run that produced it; the controller drops messages from superseded runs.
#[derive(Debug)]
pub enum StageMessage {
    /// The run moved to a new stage.
    State {
        generation: u64,
        state: ControllerState,
    },

    Progress {
        generation: u64,
        update: ProgressUpdate,
    },

    /// Loading and filtering finished.
    Filtered {
        generation: u64,
        graph: Graph,
        filters: Vec<String>,
    },

    Failed {
        generation: u64,
        error: ControllerError,
    },

    /// The run observed a cancel request between stages.
    Cancelled { generation: u64 },
}

impl StageMessage {
    pub fn generation(&self) -> u64 {
        match self {
            StageMessage::State { generation, .. }
            | StageMessage::Progress { generation, .. }
            | StageMessage::Filtered { generation, .. }
            | StageMessage::Failed { generation, .. }
            | StageMessage::Cancelled { generation } => *generation,
        }
    }

    /// Whether this message ends a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageMessage::Filtered { .. } | StageMessage::Failed { .. } | StageMessage::Cancelled { .. }
        )
    }
}

/// Create the worker → UI channel pair.
pub fn stage_channel() -> (Sender<StageMessage>, Receiver<StageMessage>) {
    bounded(MSG_CHANNEL_CAPACITY)
}

/// Worker-side sender for one run.
#[derive(Clone)]
pub struct RunSender {
    tx: Sender<StageMessage>,
    generation: u64,
}

impl RunSender {
    pub fn new(tx: Sender<StageMessage>, generation: u64) -> Self {
        Self { tx, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn send(&self, msg: StageMessage) {
        if self.tx.send(msg).is_err() {
            tracing::debug!("Run {} finished after its controller went away", self.generation);
        }
    }

    pub fn state(&self, state: ControllerState) {
        self.send(StageMessage::State {
            generation: self.generation,
            state,
        });
    }
}

/// Progress sink that marshals every callback onto the UI thread as a
/// [`StageMessage::Progress`].
pub struct UiProgress {
    run: RunSender,
    counters: Mutex<ProgressUpdate>,
}

impl UiProgress {
    pub fn new(run: RunSender) -> Self {
        Self {
            run,
            counters: Mutex::new(ProgressUpdate::default()),
        }
    }

    fn publish(&self, update: ProgressUpdate) {
        self.run.send(StageMessage::Progress {
            generation: self.run.generation(),
            update,
        });
    }
}

impl ProgressSink for UiProgress {
    fn begin(&self, stage: &str, total: u32) {
        let update = {
            let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
            *counters = ProgressUpdate {
                stage: stage.to_string(),
                done: 0,
                total,
                detail: String::new(),
            };
            counters.clone()
        };
        self.publish(update);
    }

    fn advance(&self, detail: &str) {
        let update = {
            let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
            counters.done += 1;
            counters.detail = detail.to_string();
            counters.clone()
        };
        self.publish(update);
    }
}
