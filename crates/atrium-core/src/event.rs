//! Typed event bus for shell notifications.
//!
//! Subscribers are plain closures owned by the bus. [`EventBus::subscribe`]
//! hands back a [`Subscription`] that unregisters the closure when dropped,
//! so an owner that keeps its subscriptions in a field releases all of them
//! on teardown without any bookkeeping.
//!
//! The bus is deliberately `!Send`: it lives on the UI loop together with
//! the router and the theme service.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// Parameters attached to a navigation.
pub type RouteParams = serde_json::Map<String, serde_json::Value>;

/// Resolved theme tokens, ordered by name so iteration is deterministic.
pub type TokenMap = BTreeMap<String, String>;

/// Events emitted by the router and the theme service.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    /// The active route changed (or was re-activated with new params).
    RouteChanged { path: String, params: RouteParams },
    /// A theme finished applying.
    ThemeApplied(String),
    /// The set of available themes changed on disk.
    ThemesChanged(Vec<String>),
    /// The effective token values changed (including animation frames).
    ThemeTokensChanged(TokenMap),
}

type Handler<E> = Rc<RefCell<dyn FnMut(&E)>>;

struct Registry<E> {
    next_id: u64,
    handlers: Vec<(u64, Handler<E>)>,
}

/// Event bus for broadcasting shell events to local subscribers.
pub struct EventBus<E = ShellEvent> {
    registry: Rc<RefCell<Registry<E>>>,
}

impl<E: 'static> EventBus<E> {
    /// Creates a new event bus.
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    /// Registers a handler. The handler stays registered until the returned
    /// [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&E) + 'static,
    {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.handlers.push((id, Rc::new(RefCell::new(handler))));
            id
        };

        let weak: Weak<RefCell<Registry<E>>> = Rc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry.borrow_mut().handlers.retain(|(hid, _)| *hid != id);
                }
            })),
        }
    }

    /// Delivers an event to every subscriber, in subscription order.
    ///
    /// Handlers may subscribe, unsubscribe or emit further events while
    /// being called. A handler that is already running is skipped for
    /// nested emissions.
    pub fn emit(&self, event: E) {
        let handlers: Vec<Handler<E>> = self
            .registry
            .borrow()
            .handlers
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();

        for handler in handlers {
            match handler.try_borrow_mut() {
                Ok(mut handler) => (handler)(&event),
                Err(_) => tracing::warn!("Skipping re-entrant delivery to a busy event handler"),
            }
        }
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.registry.borrow().handlers.len()
    }
}

impl<E: 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

/// Disposer for a registered handler.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Unregisters the handler now.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
