//! # Atrium Router
//!
//! Hierarchical page routing with browser-style history.
//!
//! Routes are registered once in a [`RouteTable`] under fully-qualified
//! `/`-delimited paths such as `home/details`. The hierarchy is a naming
//! convention: lookup is an exact match on the full path, and the segments
//! only matter for breadcrumbs.
//!
//! ```rust,ignore
//! let table = RouteTable::builder()
//!     .route(Route::new("home", "Home", |_| PageInstance::new(HomePage)))
//!     .route(Route::new("home/details", "Details", |_| PageInstance::route_aware(Details::default())).sidebar(false))
//!     .build()?;
//!
//! let mut router = Router::from_context(table, &ctx);
//! router.go("home/details", RouteParams::new())?;
//! router.go_back();
//! ```

mod history;
mod page;
mod route;
mod router;

pub use atrium_core::{PagePolicy, RouteParams};
pub use history::{HistoryEntry, NavigationHistory};
pub use page::{Page, PageDeps, PageFactory, PageInstance, RouteAware};
pub use route::{Route, RouteTable, RouteTableBuilder, normalize_path};
pub use router::Router;

/// Result type for router operations
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors that can occur while building routes or navigating
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    #[error("Route not found: {0}")]
    NotFound(String),

    #[error("Route registered twice: {0}")]
    DuplicateRoute(String),

    #[error("Invalid route path: {0:?}")]
    InvalidPath(String),
}
