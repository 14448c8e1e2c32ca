//! Route registration.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::page::{PageDeps, PageFactory, PageInstance};
use crate::{RouterError, RouterResult};

/// Normalizes a route path: surrounding `/` are dropped and empty segments
/// are rejected. Returns `None` for paths that can never be registered.
pub fn normalize_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(|segment| segment.trim().is_empty()) {
        return None;
    }
    Some(trimmed)
}

/// A registered route.
#[derive(Clone)]
pub struct Route {
    path: String,
    label: String,
    sidebar: bool,
    order: i32,
    factory: PageFactory,
}

impl Route {
    /// Default sort key for routes that do not set one.
    pub const DEFAULT_ORDER: i32 = 999;

    /// Creates a sidebar-visible route.
    pub fn new<F>(path: impl Into<String>, label: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PageDeps) -> PageInstance + 'static,
    {
        Self {
            path: path.into(),
            label: label.into(),
            sidebar: true,
            order: Self::DEFAULT_ORDER,
            factory: Rc::new(factory),
        }
    }

    /// Sets whether the route appears in the sidebar.
    pub fn sidebar(mut self, visible: bool) -> Self {
        self.sidebar = visible;
        self
    }

    /// Sets the sort key.
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn in_sidebar(&self) -> bool {
        self.sidebar
    }

    pub fn sort_order(&self) -> i32 {
        self.order
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/')
    }

    /// Builds a page for this route.
    pub fn build(&self, deps: &PageDeps) -> PageInstance {
        (self.factory)(deps)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("label", &self.label)
            .field("sidebar", &self.sidebar)
            .field("order", &self.order)
            .finish()
    }
}

/// Immutable registry of routes, sorted by `(order, label)`.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    /// Starts building a table.
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// Looks up a route by exact, normalized path.
    pub fn get(&self, path: &str) -> Option<&Route> {
        self.index.get(path).map(|&i| &self.routes[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// All routes in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Routes shown in the sidebar, in display order.
    pub fn sidebar_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|route| route.sidebar)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Collects routes and validates them into a [`RouteTable`].
#[derive(Default)]
pub struct RouteTableBuilder {
    routes: Vec<Route>,
}

impl RouteTableBuilder {
    /// Adds a route.
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds several routes.
    pub fn routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Validates paths and uniqueness, then sorts for display.
    pub fn build(self) -> RouterResult<RouteTable> {
        let mut routes = Vec::with_capacity(self.routes.len());
        let mut seen = HashSet::new();

        for mut route in self.routes {
            let path = normalize_path(&route.path)
                .ok_or_else(|| RouterError::InvalidPath(route.path.clone()))?
                .to_string();
            if !seen.insert(path.clone()) {
                return Err(RouterError::DuplicateRoute(path));
            }
            route.path = path;
            routes.push(route);
        }

        routes.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
        });

        let index = routes
            .iter()
            .enumerate()
            .map(|(i, route)| (route.path.clone(), i))
            .collect();

        tracing::debug!("Route table built with {} routes", routes.len());
        Ok(RouteTable { routes, index })
    }
}
