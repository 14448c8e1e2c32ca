//! # Atrium Core
//!
//! Shared plumbing for the shell: configuration, the typed event bus,
//! the UI loop queue, persisted settings and the background task runner.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      ShellContext                        │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌─────────────┐  │
//! │  │  Config  │ │ EventBus │ │ Settings │ │ TaskRunner  │  │
//! │  └──────────┘ └──────────┘ └──────────┘ └──────┬──────┘  │
//! │                                                │         │
//! │  watcher thread ──┐        blocking pool ──────┘         │
//! │                   ▼                                      │
//! │            ┌────────────┐                                │
//! │            │ ShellQueue │ ──▶ UI loop (single thread)    │
//! │            └────────────┘                                │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything that mutates router or theme state runs on the UI loop.
//! Other threads only ever talk to it through [`QueueSender`].

pub mod config;
pub mod context;
pub mod event;
pub mod queue;
pub mod settings;
pub mod task;

pub use config::{Config, ConfigError, EasingCurve, PagePolicy};
pub use context::ShellContext;
pub use event::{EventBus, RouteParams, ShellEvent, Subscription, TokenMap};
pub use queue::{QueueSender, ShellMessage, ShellQueue};
pub use settings::{PersistedSettings, SettingsError, SettingsStore, SharedSettings, write_atomic};
pub use task::{TaskError, TaskId, TaskOutcome, TaskRunner};
