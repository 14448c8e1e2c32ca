//! The shell context.
//!
//! Built once at startup and passed by reference to every component that
//! needs shared services. There are no process-wide singletons.

use crate::config::Config;
use crate::event::{EventBus, ShellEvent};
use crate::queue::QueueSender;
use crate::settings::SharedSettings;
use crate::task::TaskRunner;

/// Shared services for the router, the theme service and pages.
pub struct ShellContext {
    /// Effective configuration
    pub config: Config,

    /// Event bus for shell notifications
    pub events: EventBus<ShellEvent>,

    /// Sender into the UI loop queue
    pub queue: QueueSender,

    /// Persisted settings
    pub settings: SharedSettings,

    /// Background task runner, when a runtime is available
    pub tasks: Option<TaskRunner>,
}

impl ShellContext {
    /// Creates a context without a task runner.
    pub fn new(config: Config, queue: QueueSender, settings: SharedSettings) -> Self {
        Self {
            config,
            events: EventBus::new(),
            queue,
            settings,
            tasks: None,
        }
    }

    /// Attaches a task runner.
    pub fn with_task_runner(mut self, runner: TaskRunner) -> Self {
        self.tasks = Some(runner);
        self
    }
}
