//! Background task runner for pages.
//!
//! Jobs run on tokio's blocking pool. Their results come back to the UI loop
//! as [`ShellMessage::TaskCompleted`], and the completion callback (which may
//! hold UI-thread state and need not be `Send`) runs only when the loop hands
//! that message to [`TaskRunner::complete`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use uuid::Uuid;

use crate::queue::{QueueSender, ShellMessage};

/// Unique identifier for a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a background job produces.
pub type TaskOutcome = anyhow::Result<serde_json::Value>;

type Completion = Box<dyn FnOnce(TaskOutcome)>;

/// Runs jobs off the UI thread and routes results back through the queue.
#[derive(Clone)]
pub struct TaskRunner {
    queue: QueueSender,
    handle: tokio::runtime::Handle,
    pending: Rc<RefCell<HashMap<TaskId, Completion>>>,
}

impl TaskRunner {
    /// Creates a runner that spawns onto `handle`.
    pub fn new(queue: QueueSender, handle: tokio::runtime::Handle) -> Self {
        Self {
            queue,
            handle,
            pending: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Creates a runner on the runtime the caller is running in.
    pub fn current(queue: QueueSender) -> Result<Self, TaskError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| TaskError::NoRuntime)?;
        Ok(Self::new(queue, handle))
    }

    /// Submits a job. `on_done` runs on the UI loop once the result arrives.
    pub fn spawn<J, C>(&self, job: J, on_done: C) -> TaskId
    where
        J: FnOnce() -> TaskOutcome + Send + 'static,
        C: FnOnce(TaskOutcome) + 'static,
    {
        let id = TaskId::new();
        self.pending.borrow_mut().insert(id, Box::new(on_done));

        let queue = self.queue.clone();
        self.handle.spawn(async move {
            let outcome = match tokio::task::spawn_blocking(job).await {
                Ok(outcome) => outcome,
                Err(err) => Err(anyhow::anyhow!("task {} did not finish: {}", id, err)),
            };
            if !queue.post(ShellMessage::TaskCompleted { id, outcome }) {
                tracing::debug!("Dropping result of task {}: loop is gone", id);
            }
        });

        tracing::debug!("Spawned background task {}", id);
        id
    }

    /// Delivers a finished task to its callback. Returns `false` for unknown
    /// or cancelled tasks.
    pub fn complete(&self, id: TaskId, outcome: TaskOutcome) -> bool {
        let callback = self.pending.borrow_mut().remove(&id);
        match callback {
            Some(callback) => {
                callback(outcome);
                true
            }
            None => false,
        }
    }

    /// Forgets a task; its result will be discarded on arrival.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.pending.borrow_mut().remove(&id).is_some()
    }

    /// Number of tasks still waiting for delivery.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Task runner errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("No tokio runtime available for background tasks")]
    NoRuntime,
}
