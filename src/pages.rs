//! Demo pages and the shell's route table.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};

use atrium_core::{QueueSender, TaskId};
use atrium_router::{
    Page, PageDeps, PageInstance, Route, RouteAware, RouteParams, RouteTable, RouterResult,
};

/// Builds the shell's routes.
pub fn route_table() -> RouterResult<RouteTable> {
    RouteTable::builder()
        .route(Route::new("home", "Home", |_| PageInstance::new(HomePage::default())).order(0))
        .route(
            Route::new("home/details", "Details", |deps: &PageDeps| {
                PageInstance::route_aware(DetailsPage::new(deps.clone()))
            })
            .sidebar(false),
        )
        .route(
            Route::new("settings", "Settings", |deps: &PageDeps| {
                PageInstance::route_aware(SettingsPage::new(deps.requests.clone()))
            })
            .order(100),
        )
        .build()
}

/// Landing page.
#[derive(Debug, Default)]
pub struct HomePage {
    leaves: usize,
}

impl Page for HomePage {
    fn on_leave(&mut self) {
        self.leaves += 1;
        tracing::trace!("Leaving home ({} times)", self.leaves);
    }
}

/// What the details page is showing.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DetailsState {
    #[default]
    Empty,
    Loading(String),
    Loaded(Value),
    Failed(String),
}

/// Shows one item, loaded off the UI thread.
#[derive(Debug)]
pub struct DetailsPage {
    deps: PageDeps,
    state: Rc<RefCell<DetailsState>>,
    pending: Option<TaskId>,
}

impl DetailsPage {
    pub fn new(deps: PageDeps) -> Self {
        Self {
            deps,
            state: Rc::default(),
            pending: None,
        }
    }

    pub fn state(&self) -> DetailsState {
        self.state.borrow().clone()
    }

    fn cancel_pending(&mut self) {
        if let (Some(id), Some(tasks)) = (self.pending.take(), self.deps.tasks.as_ref()) {
            tasks.cancel(id);
        }
    }
}

impl Page for DetailsPage {
    fn on_leave(&mut self) {
        self.cancel_pending();
    }
}

impl RouteAware for DetailsPage {
    fn on_route(&mut self, params: &RouteParams) {
        self.cancel_pending();

        let Some(id) = params.get("id").map(param_text) else {
            *self.state.borrow_mut() = DetailsState::Empty;
            return;
        };
        *self.state.borrow_mut() = DetailsState::Loading(id.clone());

        match &self.deps.tasks {
            Some(tasks) => {
                let state = Rc::clone(&self.state);
                let task = tasks.spawn(
                    move || load_details(&id),
                    move |outcome| {
                        *state.borrow_mut() = match outcome {
                            Ok(details) => DetailsState::Loaded(details),
                            Err(err) => DetailsState::Failed(err.to_string()),
                        };
                    },
                );
                self.pending = Some(task);
            }
            None => {
                *self.state.borrow_mut() = match load_details(&id) {
                    Ok(details) => DetailsState::Loaded(details),
                    Err(err) => DetailsState::Failed(err.to_string()),
                };
            }
        }
    }
}

fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn load_details(id: &str) -> anyhow::Result<Value> {
    if id.trim().is_empty() {
        anyhow::bail!("empty item id");
    }
    Ok(json!({ "id": id, "title": format!("Item {id}") }))
}

/// Theme picker. Selections go to the theme service through the loop.
#[derive(Debug)]
pub struct SettingsPage {
    requests: Option<QueueSender>,
}

impl SettingsPage {
    pub fn new(requests: Option<QueueSender>) -> Self {
        Self { requests }
    }

    /// Asks the shell to switch theme. Returns false if nobody is listening.
    pub fn choose_theme(&self, name: &str) -> bool {
        match &self.requests {
            Some(requests) => requests.request_theme(name, true),
            None => {
                tracing::warn!("Settings page has no request channel");
                false
            }
        }
    }
}

impl Page for SettingsPage {}

impl RouteAware for SettingsPage {
    fn on_route(&mut self, params: &RouteParams) {
        if let Some(theme) = params.get("theme").and_then(Value::as_str) {
            self.choose_theme(theme);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atrium_core::{ShellMessage, ShellQueue, TaskRunner};

    fn params(value: Value) -> RouteParams {
        match value {
            Value::Object(map) => map,
            _ => RouteParams::new(),
        }
    }

    #[test]
    fn test_route_table() {
        let table = route_table().unwrap();
        let sidebar: Vec<_> = table.sidebar_routes().map(Route::path).collect();
        assert_eq!(sidebar, vec!["home", "settings"]);
        assert!(table.contains("home/details"));
    }

    #[test]
    fn test_details_without_runner_loads_inline() {
        let mut page = DetailsPage::new(PageDeps::default());
        page.on_route(&params(json!({ "id": 7 })));
        assert_eq!(
            page.state(),
            DetailsState::Loaded(json!({ "id": "7", "title": "Item 7" }))
        );

        page.on_route(&RouteParams::new());
        assert_eq!(page.state(), DetailsState::Empty);
    }

    #[tokio::test]
    async fn test_details_load_in_background() {
        let mut queue = ShellQueue::new();
        let tasks = TaskRunner::current(queue.sender()).unwrap();
        let deps = PageDeps {
            tasks: Some(tasks.clone()),
            requests: Some(queue.sender()),
        };

        let mut page = DetailsPage::new(deps);
        page.on_route(&params(json!({ "id": "a1" })));
        assert_eq!(page.state(), DetailsState::Loading("a1".into()));

        match queue.next().await {
            Some(ShellMessage::TaskCompleted { id, outcome }) => {
                assert!(tasks.complete(id, outcome));
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(matches!(page.state(), DetailsState::Loaded(v) if v["id"] == "a1"));
    }

    #[tokio::test]
    async fn test_leaving_details_drops_pending_result() {
        let mut queue = ShellQueue::new();
        let tasks = TaskRunner::current(queue.sender()).unwrap();
        let mut page = DetailsPage::new(PageDeps {
            tasks: Some(tasks.clone()),
            requests: None,
        });

        page.on_route(&params(json!({ "id": "a1" })));
        page.on_leave();
        assert_eq!(tasks.pending(), 0);

        if let Some(ShellMessage::TaskCompleted { id, outcome }) = queue.next().await {
            assert!(!tasks.complete(id, outcome));
        }
        assert_eq!(page.state(), DetailsState::Loading("a1".into()));
    }

    #[test]
    fn test_settings_requests_theme() {
        let mut queue = ShellQueue::new();
        let mut page = SettingsPage::new(Some(queue.sender()));

        page.on_route(&params(json!({ "theme": "Light" })));
        match queue.try_next() {
            Some(ShellMessage::ApplyTheme { name, animate }) => {
                assert_eq!(name, "Light");
                assert!(animate);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(!SettingsPage::new(None).choose_theme("Light"));
    }
}
