//! Pages and their optional capabilities.
//!
//! A factory decides once, when it builds a page, whether the page wants
//! activation callbacks: [`PageInstance::route_aware`] stores the hook next
//! to the page, [`PageInstance::new`] stores none. The router never probes
//! a page at navigation time.

use std::cell::RefCell;
use std::rc::Rc;

use atrium_core::{QueueSender, RouteParams, ShellContext, TaskRunner};

/// A page shown by the router.
pub trait Page {
    /// Called when the router switches away from this page.
    fn on_leave(&mut self) {}
}

/// Capability for pages that react to navigation parameters.
pub trait RouteAware: Page {
    /// Called after the page becomes active, with the navigation params.
    fn on_route(&mut self, params: &RouteParams);
}

type RouteHook = Box<dyn FnMut(&RouteParams)>;

/// A built page plus its activation hook, if it has one.
pub struct PageInstance {
    page: Rc<RefCell<dyn Page>>,
    on_route: Option<RouteHook>,
}

impl PageInstance {
    /// Wraps a page without an activation hook.
    pub fn new<P: Page + 'static>(page: P) -> Self {
        Self::shared(Rc::new(RefCell::new(page)))
    }

    /// Wraps a page and installs its [`RouteAware::on_route`] hook.
    pub fn route_aware<P: RouteAware + 'static>(page: P) -> Self {
        Self::shared_route_aware(Rc::new(RefCell::new(page)))
    }

    /// Like [`PageInstance::new`], for a page the host also keeps a handle to.
    pub fn shared<P: Page + 'static>(page: Rc<RefCell<P>>) -> Self {
        Self {
            page,
            on_route: None,
        }
    }

    /// Like [`PageInstance::route_aware`], for a page the host also keeps a handle to.
    pub fn shared_route_aware<P: RouteAware + 'static>(page: Rc<RefCell<P>>) -> Self {
        let target = Rc::clone(&page);
        Self {
            page,
            on_route: Some(Box::new(move |params| target.borrow_mut().on_route(params))),
        }
    }

    /// Returns true if the page receives activation callbacks.
    pub fn has_route_hook(&self) -> bool {
        self.on_route.is_some()
    }

    /// Returns the page itself.
    pub fn page(&self) -> &Rc<RefCell<dyn Page>> {
        &self.page
    }

    pub(crate) fn activate(&mut self, params: &RouteParams) {
        if let Some(hook) = self.on_route.as_mut() {
            hook(params);
        }
    }

    pub(crate) fn leave(&self) {
        self.page.borrow_mut().on_leave();
    }
}

impl std::fmt::Debug for PageInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageInstance")
            .field("has_route_hook", &self.has_route_hook())
            .finish()
    }
}

/// Dependencies a factory may hand to the page it builds.
///
/// Pages never reach the theme service or the router directly; they post
/// requests through `requests` and the UI loop carries them out.
#[derive(Debug, Clone, Default)]
pub struct PageDeps {
    /// Background task runner
    pub tasks: Option<TaskRunner>,

    /// Sender for navigation and theme requests
    pub requests: Option<QueueSender>,
}

impl PageDeps {
    /// Collects dependencies from the shell context.
    pub fn from_context(ctx: &ShellContext) -> Self {
        Self {
            tasks: ctx.tasks.clone(),
            requests: Some(ctx.queue.clone()),
        }
    }
}

/// Builds a page for a route.
pub type PageFactory = Rc<dyn Fn(&PageDeps) -> PageInstance>;
