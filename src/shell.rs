//! The shell: wires router, theme service and pages to one UI loop.
//!
//! ```text
//! watcher thread ─┐   blocking pool ─┐   pages ─┐
//!                 ▼                  ▼          ▼
//!             ShellQueue ──▶ Shell::dispatch ──▶ Router / ThemeService
//! ```

use std::rc::Rc;

use anyhow::Context;

use atrium_core::config::ThemeConfig;
use atrium_core::{
    Config, QueueSender, RouteParams, SettingsStore, ShellContext, ShellEvent, ShellMessage,
    ShellQueue, Subscription, TaskRunner, write_atomic,
};
use atrium_router::Router;
use atrium_theme::{JsonThemeRepository, ThemeError, ThemeRepository, ThemeService, ThemeWatcher};

use crate::pages;

const BUNDLED_THEMES: &[(&str, &str)] = &[
    ("Dracula", include_str!("../assets/themes/Dracula.json")),
    ("Light", include_str!("../assets/themes/Light.json")),
];

const BUNDLED_TEMPLATE: &str = include_str!("../assets/qss/base.qss");

/// Copies the bundled themes into an empty theme directory and the bundled
/// template where none exists. Returns the number of files written.
pub fn seed_assets(theme: &ThemeConfig) -> anyhow::Result<usize> {
    let repo = JsonThemeRepository::new(&theme.themes_dir, &theme.template_path);
    let mut written = 0;

    if repo.list_themes().is_empty() {
        for (name, body) in BUNDLED_THEMES {
            let path = theme.themes_dir.join(format!("{name}.json"));
            write_atomic(&path, body.as_bytes())
                .with_context(|| format!("Failed to seed theme {}", path.display()))?;
            written += 1;
        }
        tracing::info!(
            "Seeded {} bundled themes into {}",
            BUNDLED_THEMES.len(),
            theme.themes_dir.display()
        );
    }

    if !theme.template_path.exists() {
        write_atomic(&theme.template_path, BUNDLED_TEMPLATE.as_bytes()).with_context(|| {
            format!("Failed to seed template {}", theme.template_path.display())
        })?;
        written += 1;
    }

    Ok(written)
}

/// Owns every UI-loop component.
pub struct Shell {
    ctx: ShellContext,
    queue: ShellQueue,
    router: Router,
    themes: ThemeService,
    watcher: Option<ThemeWatcher>,
    watcher_disabled: bool,
    _subscriptions: Vec<Subscription>,
}

impl Shell {
    /// Builds the shell. Background tasks are only available when called
    /// inside a tokio runtime.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let queue = ShellQueue::new();
        let settings = SettingsStore::shared(config.paths.settings_file.clone());
        let mut ctx = ShellContext::new(config, queue.sender(), settings);

        match TaskRunner::current(queue.sender()) {
            Ok(runner) => ctx = ctx.with_task_runner(runner),
            Err(err) => tracing::warn!("{}; background tasks disabled", err),
        }

        if let Err(err) = seed_assets(&ctx.config.theme) {
            tracing::warn!("{:#}", err);
        }

        let repo = JsonThemeRepository::new(
            ctx.config.theme.themes_dir.clone(),
            ctx.config.theme.template_path.clone(),
        );
        let themes = ThemeService::from_context(Box::new(repo), &ctx);

        let table = pages::route_table().context("Invalid route table")?;
        let router = Router::from_context(table, &ctx);

        let subscriptions = vec![persist_last_route(&ctx), log_theme_events(&ctx)];

        Ok(Self {
            ctx,
            queue,
            router,
            themes,
            watcher: None,
            watcher_disabled: false,
            _subscriptions: subscriptions,
        })
    }

    /// Restores the theme and route, then starts hot reload.
    ///
    /// `theme` overrides the persisted selection and is persisted itself.
    pub fn start(&mut self, theme: Option<&str>) {
        match theme {
            Some(name) => match self.themes.apply(name, false) {
                Ok(_) => {}
                Err(ThemeError::Settings(err)) => {
                    tracing::warn!("Theme {} applied but not saved: {}", name, err);
                }
                Err(err) => {
                    tracing::warn!("Cannot apply requested theme {}: {}", name, err);
                    self.themes.apply_initial();
                }
            },
            None => {
                self.themes.apply_initial();
            }
        }

        let last_route = self.ctx.settings.borrow().get().last_route.clone();
        let first_route = self.ctx.config.router.first_route.clone();
        let target = last_route
            .filter(|path| self.router.routes().contains(path))
            .unwrap_or(first_route);
        if let Err(err) = self.router.go(&target, RouteParams::new()) {
            tracing::warn!("Cannot open {}: {}", target, err);
        }

        self.watcher = self
            .themes
            .watch(&self.ctx.config.watcher, self.ctx.queue.clone());
    }

    /// Handles one loop message. Returns false on quit.
    pub fn dispatch(&mut self, message: ShellMessage) -> bool {
        match message {
            ShellMessage::FilesChanged(paths) => self.themes.handle_fs_change(&paths),
            ShellMessage::WatcherDisabled { reason } => {
                if !self.watcher_disabled {
                    tracing::warn!("Theme hot reload disabled: {}", reason);
                    self.watcher_disabled = true;
                }
                self.watcher = None;
            }
            ShellMessage::AnimationTick { generation } => {
                self.themes.tick(generation);
            }
            ShellMessage::TaskCompleted { id, outcome } => match &self.ctx.tasks {
                Some(tasks) => {
                    if !tasks.complete(id, outcome) {
                        tracing::debug!("Discarding result of task {}", id);
                    }
                }
                None => tracing::warn!("Task {} completed without a runner", id),
            },
            ShellMessage::Navigate { path, params } => {
                if let Err(err) = self.router.go(&path, params) {
                    tracing::warn!("Navigation failed: {}", err);
                }
            }
            ShellMessage::ApplyTheme { name, animate } => {
                if let Err(err) = self.themes.apply(&name, animate) {
                    tracing::warn!("Theme switch failed: {}", err);
                }
            }
            ShellMessage::Quit => return false,
        }
        true
    }

    /// Handles everything already queued. Returns false on quit.
    pub fn pump(&mut self) -> bool {
        while let Some(message) = self.queue.try_next() {
            if !self.dispatch(message) {
                return false;
            }
        }
        true
    }

    /// Runs the loop until quit or Ctrl-C.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        tracing::info!("Shell running");
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            let next = tokio::select! {
                message = self.queue.next() => message,
                signal = &mut ctrl_c => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    tracing::info!("Interrupted");
                    None
                }
            };
            let Some(message) = next else {
                break;
            };
            if !self.dispatch(message) {
                break;
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Stops the watcher and closes the queue.
    pub fn shutdown(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.stop();
        }
        self.queue.close();
        tracing::info!("Shell stopped");
    }

    pub fn sender(&self) -> QueueSender {
        self.ctx.queue.clone()
    }

    pub fn context(&self) -> &ShellContext {
        &self.ctx
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn themes(&self) -> &ThemeService {
        &self.themes
    }
}

fn persist_last_route(ctx: &ShellContext) -> Subscription {
    let settings = Rc::clone(&ctx.settings);
    ctx.events.subscribe(move |event: &ShellEvent| {
        if let ShellEvent::RouteChanged { path, .. } = event {
            if let Err(err) = settings.borrow_mut().set_last_route(path.clone()) {
                tracing::warn!("Cannot save last route: {}", err);
            }
        }
    })
}

fn log_theme_events(ctx: &ShellContext) -> Subscription {
    ctx.events.subscribe(|event: &ShellEvent| match event {
        ShellEvent::ThemesChanged(names) => {
            tracing::info!("Available themes: {}", names.join(", "));
        }
        ShellEvent::RouteChanged { path, .. } => tracing::debug!("Route: {}", path),
        _ => {}
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use serde_json::json;
    use tempfile::TempDir;

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.theme.themes_dir = dir.join("themes");
        config.theme.template_path = dir.join("qss").join("base.qss");
        config.theme.animation_ms = 80;
        config.theme.animation_steps = 4;
        config.paths.settings_file = dir.join("settings.json");
        config.paths.cache_dir = dir.join("cache");
        config.watcher.enabled = false;
        config
    }

    async fn pump_until(shell: &mut Shell, done: impl Fn(&Shell) -> bool) {
        for _ in 0..200 {
            shell.pump();
            if done(shell) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_seed_only_when_empty() {
        let dir = TempDir::new().unwrap();
        let theme = config(dir.path()).theme;

        assert_eq!(seed_assets(&theme).unwrap(), 3);
        assert!(theme.themes_dir.join("Dracula.json").exists());
        assert_eq!(seed_assets(&theme).unwrap(), 0);
    }

    #[test]
    fn test_bundled_themes_parse() {
        for (name, body) in BUNDLED_THEMES {
            let theme = atrium_theme::Theme::from_json(name, body).unwrap();
            assert!(theme.vars.contains_key("accent"));
        }
    }

    #[tokio::test]
    async fn test_startup_applies_default_and_first_route() {
        let dir = TempDir::new().unwrap();
        let mut shell = Shell::new(config(dir.path())).unwrap();
        shell.start(None);

        assert_eq!(shell.themes().current(), Some("Dracula"));
        assert!(shell.themes().stylesheet().contains("#1e1f29"));
        assert!(shell.themes().unresolved().is_empty());
        assert_eq!(shell.router().current(), Some("home"));

        let settings = shell.context().settings.borrow().get().clone();
        assert_eq!(settings.last_route.as_deref(), Some("home"));
        assert_eq!(settings.selected_theme, None);
    }

    #[tokio::test]
    async fn test_startup_restores_persisted_state() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            r#"{"selectedTheme": "Light", "lastRoute": "settings"}"#,
        )
        .unwrap();

        let mut shell = Shell::new(config(dir.path())).unwrap();
        shell.start(None);

        assert_eq!(shell.themes().current(), Some("Light"));
        assert_eq!(shell.router().current(), Some("settings"));
    }

    #[tokio::test]
    async fn test_unknown_last_route_falls_back() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("settings.json"), r#"{"lastRoute": "gone"}"#).unwrap();

        let mut shell = Shell::new(config(dir.path())).unwrap();
        shell.start(Some("Light"));

        assert_eq!(shell.router().current(), Some("home"));
        assert_eq!(
            shell.context().settings.borrow().get().selected_theme.as_deref(),
            Some("Light")
        );
    }

    #[tokio::test]
    async fn test_navigation_request_runs_background_load() {
        let dir = TempDir::new().unwrap();
        let mut shell = Shell::new(config(dir.path())).unwrap();
        shell.start(None);

        let mut params = RouteParams::new();
        params.insert("id".into(), json!(7));
        shell.sender().request_navigation("home/details", params);
        shell.pump();

        assert_eq!(shell.router().current(), Some("home/details"));
        assert!(shell.router().can_go_back());
        pump_until(&mut shell, |s| {
            s.context().tasks.as_ref().is_some_and(|t| t.pending() == 0)
        })
        .await;
        assert_eq!(
            shell.context().settings.borrow().get().last_route.as_deref(),
            Some("home/details")
        );
    }

    #[tokio::test]
    async fn test_theme_request_animates_to_completion() {
        let dir = TempDir::new().unwrap();
        let mut shell = Shell::new(config(dir.path())).unwrap();
        shell.start(None);

        shell.sender().request_theme("Light", true);
        shell.pump();
        assert!(shell.themes().is_animating());

        pump_until(&mut shell, |s| !s.themes().is_animating()).await;
        assert_eq!(shell.themes().current(), Some("Light"));
        assert!(shell.themes().stylesheet().contains("#f5f6fa"));
    }

    #[tokio::test]
    async fn test_file_change_message_reloads_theme() {
        let dir = TempDir::new().unwrap();
        let mut shell = Shell::new(config(dir.path())).unwrap();
        shell.start(None);

        let path = dir.path().join("themes").join("Dracula.json");
        fs::write(&path, r##"{"vars": {"bg": "#123456"}}"##).unwrap();
        shell.sender().post(ShellMessage::FilesChanged(vec![path]));
        shell.pump();

        assert!(shell.themes().stylesheet().contains("#123456"));
    }

    #[tokio::test]
    async fn test_quit_ends_run() {
        let dir = TempDir::new().unwrap();
        let mut shell = Shell::new(config(dir.path())).unwrap();
        shell.start(None);

        shell.sender().post(ShellMessage::Quit);
        shell.run().await.unwrap();
        assert!(!shell.sender().post(ShellMessage::Quit));
    }
}
