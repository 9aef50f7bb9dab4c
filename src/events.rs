//! Run lifecycle events and the optional sink that observes them.

use tokio::sync::broadcast;

use crate::utils::now_secs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    TaskStarted {
        run_id: String,
        task: String,
        at: u64,
    },
    IterationStarted {
        run_id: String,
        iteration: usize,
    },
    ToolStarted {
        run_id: String,
        call_id: String,
        tool: String,
    },
    ToolFinished {
        run_id: String,
        call_id: String,
        tool: String,
        success: bool,
    },
    SummaryReady {
        run_id: String,
        summary: String,
    },
    TaskFinished {
        run_id: String,
        success: bool,
        at: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event delivery failed: {0}")]
pub struct EventDeliveryError(pub String);

/// Observer for run events. Delivery failures are logged by the engine and
/// never abort the run.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &TaskEvent) -> Result<(), EventDeliveryError>;
}

/// Default sink: a broadcast channel. Sends to a channel with no active
/// receivers are not failures; subscribers simply joined late or left.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for EventBus {
    fn deliver(&self, event: &TaskEvent) -> Result<(), EventDeliveryError> {
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}

pub fn task_started(run_id: &str, task: &str) -> TaskEvent {
    TaskEvent::TaskStarted {
        run_id: run_id.to_string(),
        task: task.to_string(),
        at: now_secs(),
    }
}

pub fn task_finished(run_id: &str, success: bool) -> TaskEvent {
    TaskEvent::TaskFinished {
        run_id: run_id.to_string(),
        success,
        at: now_secs(),
    }
}
