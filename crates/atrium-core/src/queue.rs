//! The UI loop message queue.
//!
//! This is the only synchronization point between the UI thread and the
//! rest of the process. Watcher threads, the task runner and timers post
//! [`ShellMessage`]s; the loop drains them in order and performs every
//! state mutation itself.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::event::RouteParams;
use crate::task::{TaskId, TaskOutcome};

/// Messages delivered to the UI loop.
#[derive(Debug)]
pub enum ShellMessage {
    /// A debounced batch of modified paths from the theme watcher.
    FilesChanged(Vec<PathBuf>),
    /// The theme watcher gave up after repeated failures.
    WatcherDisabled { reason: String },
    /// A theme animation frame is due.
    AnimationTick { generation: u64 },
    /// A background task finished.
    TaskCompleted { id: TaskId, outcome: TaskOutcome },
    /// A page asked the shell to navigate.
    Navigate { path: String, params: RouteParams },
    /// A page asked the shell to switch themes.
    ApplyTheme { name: String, animate: bool },
    /// Stop the loop.
    Quit,
}

/// Cloneable, thread-safe handle for posting into the queue.
#[derive(Debug, Clone)]
pub struct QueueSender {
    sender: mpsc::UnboundedSender<ShellMessage>,
}

impl QueueSender {
    /// Posts a message. Returns `false` if the loop has shut down.
    pub fn post(&self, message: ShellMessage) -> bool {
        self.sender.send(message).is_ok()
    }

    /// Posts `message` after `delay` on the current tokio runtime.
    ///
    /// Outside a runtime the message is posted immediately.
    pub fn post_after(&self, delay: Duration, message: ShellMessage) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sender = self.clone();
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    sender.post(message);
                });
            }
            Err(_) => {
                self.post(message);
            }
        }
    }

    /// Asks the shell to navigate to `path`.
    pub fn request_navigation(&self, path: impl Into<String>, params: RouteParams) -> bool {
        self.post(ShellMessage::Navigate {
            path: path.into(),
            params,
        })
    }

    /// Asks the shell to apply a theme.
    pub fn request_theme(&self, name: impl Into<String>, animate: bool) -> bool {
        self.post(ShellMessage::ApplyTheme {
            name: name.into(),
            animate,
        })
    }

    /// Returns true if the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Receiving side of the UI loop queue.
pub struct ShellQueue {
    sender: QueueSender,
    receiver: mpsc::UnboundedReceiver<ShellMessage>,
}

impl ShellQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: QueueSender { sender },
            receiver,
        }
    }

    /// Returns a sender for this queue.
    pub fn sender(&self) -> QueueSender {
        self.sender.clone()
    }

    /// Takes the next message without waiting.
    pub fn try_next(&mut self) -> Option<ShellMessage> {
        self.receiver.try_recv().ok()
    }

    /// Waits for the next message.
    ///
    /// The queue holds its own sender, so this only returns `None` after
    /// [`ShellQueue::close`].
    pub async fn next(&mut self) -> Option<ShellMessage> {
        self.receiver.recv().await
    }

    /// Takes every message currently queued.
    pub fn drain(&mut self) -> Vec<ShellMessage> {
        let mut messages = Vec::new();
        while let Some(message) = self.try_next() {
            messages.push(message);
        }
        messages
    }

    /// Stops accepting new messages. Already queued ones can still be read.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl Default for ShellQueue {
    fn default() -> Self {
        Self::new()
    }
}
