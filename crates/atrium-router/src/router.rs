//! The router.
//!
//! Owns the active entry, the navigation history and the mounted pages.
//! Every operation is synchronous: a page that needs async work on
//! activation starts it through its task runner.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use atrium_core::{EventBus, PagePolicy, RouteParams, ShellContext, ShellEvent};
use atrium_core::config::RouterConfig;

use crate::history::{HistoryEntry, NavigationHistory};
use crate::page::{PageDeps, PageInstance};
use crate::route::{Route, RouteTable, normalize_path};
use crate::{RouterError, RouterResult};

/// Hierarchical page router with back/forward history.
pub struct Router {
    /// Registered routes (read-only)
    table: RouteTable,

    /// Back and forward stacks
    history: NavigationHistory,

    /// Active entry
    current: Option<HistoryEntry>,

    /// Mounted pages by path
    pages: HashMap<String, PageInstance>,

    /// Page reuse policy
    policy: PagePolicy,

    /// Dependencies handed to page factories
    deps: PageDeps,

    /// Where `RouteChanged` goes
    events: EventBus<ShellEvent>,
}

impl Router {
    /// Creates a router over `table`.
    pub fn new(
        table: RouteTable,
        events: EventBus<ShellEvent>,
        config: &RouterConfig,
        deps: PageDeps,
    ) -> Self {
        Self {
            table,
            history: NavigationHistory::new(config.max_history),
            current: None,
            pages: HashMap::new(),
            policy: config.page_policy,
            deps,
            events,
        }
    }

    /// Creates a router wired to the shell context.
    pub fn from_context(table: RouteTable, ctx: &ShellContext) -> Self {
        Self::new(
            table,
            ctx.events.clone(),
            &ctx.config.router,
            PageDeps::from_context(ctx),
        )
    }

    /// Navigates to `path`.
    ///
    /// Unknown paths fail with [`RouterError::NotFound`] and leave all state
    /// untouched. Navigating to the active path re-runs the activation hook
    /// with the new params without adding a history entry.
    pub fn go(&mut self, path: &str, params: RouteParams) -> RouterResult<()> {
        let key = normalize_path(path)
            .filter(|key| self.table.contains(key))
            .ok_or_else(|| RouterError::NotFound(path.to_string()))?
            .to_string();

        if let Some(current) = self.current.as_mut() {
            if current.path == key {
                tracing::debug!("Refreshing route {}", key);
                current.params = params.clone();
                current.timestamp = std::time::Instant::now();
                if let Some(page) = self.mount(&key) {
                    page.activate(&params);
                }
                self.events.emit(ShellEvent::RouteChanged { path: key, params });
                return Ok(());
            }
        }

        tracing::debug!("Navigating to {}", key);
        self.leave_current();
        if let Some(previous) = self.current.take() {
            self.history.push(previous);
        }
        self.enter(HistoryEntry::new(key, params));
        Ok(())
    }

    /// Steps back. Returns `false` (and does nothing) on an empty stack.
    pub fn go_back(&mut self) -> bool {
        let Some(current) = self.current.as_ref() else {
            return false;
        };
        let Some(target) = self.history.back(current) else {
            return false;
        };
        tracing::debug!("Going back to {}", target.path);
        self.leave_current();
        self.enter(target);
        true
    }

    /// Steps forward. Returns `false` (and does nothing) on an empty stack.
    pub fn go_forward(&mut self) -> bool {
        let Some(current) = self.current.as_ref() else {
            return false;
        };
        let Some(target) = self.history.forward(current) else {
            return false;
        };
        tracing::debug!("Going forward to {}", target.path);
        self.leave_current();
        self.enter(target);
        true
    }

    /// Makes `entry` active, runs its hook, then notifies observers.
    fn enter(&mut self, entry: HistoryEntry) {
        let path = entry.path.clone();
        let params = entry.params.clone();
        self.current = Some(entry);

        if let Some(page) = self.mount(&path) {
            page.activate(&params);
        }
        self.events.emit(ShellEvent::RouteChanged { path, params });
    }

    fn leave_current(&mut self) {
        let Some(current) = self.current.as_ref() else {
            return;
        };
        if let Some(page) = self.pages.get(&current.path) {
            page.leave();
        }
        if self.policy == PagePolicy::Rebuild {
            self.pages.remove(&current.path);
        }
    }

    /// Returns the page for `path`, building it as the policy requires.
    ///
    /// The active page is always reused: only entering a route counts as
    /// a fresh navigation under [`PagePolicy::Rebuild`].
    fn mount(&mut self, path: &str) -> Option<&mut PageInstance> {
        let route = self.table.get(path)?;
        let deps = &self.deps;
        let page = match self.pages.entry(path.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                tracing::debug!("Building page for {}", path);
                entry.insert(route.build(deps))
            }
        };
        Some(page)
    }

    /// Active path.
    pub fn current(&self) -> Option<&str> {
        self.current.as_ref().map(|entry| entry.path.as_str())
    }

    /// Params of the active entry.
    pub fn current_params(&self) -> Option<&RouteParams> {
        self.current.as_ref().map(|entry| &entry.params)
    }

    /// Route of the active entry.
    pub fn current_route(&self) -> Option<&Route> {
        self.current().and_then(|path| self.table.get(path))
    }

    /// `(path, label)` for each registered prefix of the active path,
    /// outermost first.
    pub fn breadcrumbs(&self) -> Vec<(&str, &str)> {
        let Some(path) = self.current() else {
            return Vec::new();
        };
        path.match_indices('/')
            .map(|(i, _)| &path[..i])
            .chain(std::iter::once(path))
            .filter_map(|prefix| self.table.get(prefix))
            .map(|route| (route.path(), route.label()))
            .collect()
    }

    pub fn can_go_back(&self) -> bool {
        self.history.can_go_back()
    }

    pub fn can_go_forward(&self) -> bool {
        self.history.can_go_forward()
    }

    pub fn back_len(&self) -> usize {
        self.history.back_len()
    }

    pub fn forward_len(&self) -> usize {
        self.history.forward_len()
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub fn routes(&self) -> &RouteTable {
        &self.table
    }

    pub fn policy(&self) -> PagePolicy {
        self.policy
    }

    /// Mounted page for `path`, if any.
    pub fn page(&self, path: &str) -> Option<&PageInstance> {
        self.pages.get(path)
    }

    /// Number of mounted pages.
    pub fn mounted_pages(&self) -> usize {
        self.pages.len()
    }
}
