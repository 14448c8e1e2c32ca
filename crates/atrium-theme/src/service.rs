//! The theme service.
//!
//! Owns the active theme, the rendered stylesheet and at most one running
//! transition. All methods run on the UI loop. Animation frames arrive as
//! ticks scheduled through a [`TickScheduler`]; each tick names the
//! generation it belongs to and is ignored once a newer apply or reload
//! has bumped the counter.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use atrium_core::config::{ThemeConfig, WatcherConfig};
use atrium_core::{
    EventBus, QueueSender, ShellContext, ShellEvent, ShellMessage, SharedSettings, write_atomic,
};

use crate::animator::AnimationState;
use crate::repository::{Theme, ThemeRepository};
use crate::resolver::{ResolvedStyle, StyleTemplate};
use crate::tokens::{TokenMap, TokenSet};
use crate::watcher::{ThemeWatcher, WatchTargets, resolve_path};
use crate::ThemeResult;

/// Name under which the built-in token set is applied.
pub const BUILTIN_THEME: &str = "default";

/// File the last applied stylesheet is dumped to, inside the cache dir.
pub const DUMP_FILE: &str = "last_applied.qss";

/// Delivers animation ticks back to the service.
pub trait TickScheduler {
    /// Arranges for `ThemeService::tick(generation)` to run after `delay`.
    fn schedule(&self, generation: u64, delay: Duration);
}

impl TickScheduler for QueueSender {
    fn schedule(&self, generation: u64, delay: Duration) {
        self.post_after(delay, ShellMessage::AnimationTick { generation });
    }
}

/// How a theme is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Animate from the current tokens
    pub animate: bool,
    /// Store the name as the selected theme
    pub persist: bool,
}

impl ApplyOptions {
    /// Startup restore: no animation, nothing written.
    pub const STARTUP: Self = Self {
        animate: false,
        persist: false,
    };
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            animate: true,
            persist: true,
        }
    }
}

/// Result of delivering one animation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belongs to a superseded or finished transition.
    Stale,
    /// An intermediate frame was shown.
    Frame,
    /// The last frame was shown and the theme is applied.
    Finished,
}

#[derive(Debug, Clone)]
struct ActiveTheme {
    name: String,
    tokens: TokenSet,
    from_repository: bool,
}

#[derive(Debug)]
struct Transition {
    name: String,
    state: AnimationState,
}

/// Applies themes and keeps the rendered stylesheet current.
pub struct ThemeService {
    repo: Box<dyn ThemeRepository>,
    template: StyleTemplate,
    events: EventBus<ShellEvent>,
    scheduler: Box<dyn TickScheduler>,
    settings: Option<SharedSettings>,
    config: ThemeConfig,
    dump_dir: Option<PathBuf>,

    active: Option<ActiveTheme>,
    last_good: Option<String>,
    /// Tokens on screen, mid-transition included
    tokens: TokenMap,
    style: ResolvedStyle,
    generation: u64,
    transition: Option<Transition>,
}

impl ThemeService {
    /// Creates a service with no theme applied.
    ///
    /// A template that cannot be read is logged and replaced by an empty
    /// one; the watcher picks it up once it appears.
    pub fn new(
        repo: Box<dyn ThemeRepository>,
        events: EventBus<ShellEvent>,
        scheduler: Box<dyn TickScheduler>,
        config: ThemeConfig,
    ) -> Self {
        let template = match repo.load_template() {
            Ok(text) => StyleTemplate::new(text),
            Err(err) => {
                tracing::warn!("{}; rendering without a template", err);
                StyleTemplate::default()
            }
        };

        Self {
            repo,
            template,
            events,
            scheduler,
            settings: None,
            config,
            dump_dir: None,
            active: None,
            last_good: None,
            tokens: TokenMap::new(),
            style: ResolvedStyle::default(),
            generation: 0,
            transition: None,
        }
    }

    /// Wires the service to the shell: its bus, its queue for ticks, its
    /// settings and, when enabled, the stylesheet dump.
    pub fn from_context(repo: Box<dyn ThemeRepository>, ctx: &ShellContext) -> Self {
        let service = Self::new(
            repo,
            ctx.events.clone(),
            Box::new(ctx.queue.clone()),
            ctx.config.theme.clone(),
        )
        .with_settings(Rc::clone(&ctx.settings));

        if ctx.config.theme.dump_stylesheet {
            service.with_stylesheet_dump(ctx.config.paths.cache_dir.clone())
        } else {
            service
        }
    }

    /// Persists selections into `settings`.
    pub fn with_settings(mut self, settings: SharedSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Writes every applied stylesheet to `<dir>/last_applied.qss`.
    pub fn with_stylesheet_dump(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    /// Applies `name`, animating when asked, and persists the selection.
    pub fn apply(&mut self, name: &str, animate: bool) -> ThemeResult<u64> {
        self.apply_with(
            name,
            ApplyOptions {
                animate,
                persist: true,
            },
        )
    }

    /// Applies `name` and returns the new generation.
    ///
    /// [`BUILTIN_THEME`] selects the built-in token set without touching the
    /// repository. A theme that fails to load leaves everything as it was.
    /// A failed settings write is returned as an error, but the theme stays
    /// applied.
    pub fn apply_with(&mut self, name: &str, options: ApplyOptions) -> ThemeResult<u64> {
        let (target, from_repository) = if name == BUILTIN_THEME {
            (TokenSet::builtin(), false)
        } else {
            let theme = self.repo.load_theme(name).inspect_err(|err| {
                tracing::warn!("Cannot apply theme {}: {}", name, err);
            })?;
            (TokenSet::new(theme.vars), true)
        };

        let generation = self.activate(name, target, from_repository, options.animate);

        if options.persist {
            if let Some(settings) = &self.settings {
                settings.borrow_mut().set_selected_theme(name)?;
            }
        }
        Ok(generation)
    }

    /// Shows `target` under `name`, animated when allowed.
    fn activate(&mut self, name: &str, target: TokenSet, from_repository: bool, animate: bool) -> u64 {
        let flat = target.flatten();
        let animate = animate && self.config.animate && !self.tokens.is_empty();
        let generation = self.begin(name, target, from_repository);

        if animate {
            let state = AnimationState::new(
                self.tokens.clone(),
                flat,
                generation,
                self.config.steps(),
                self.config.easing,
            );
            self.transition = Some(Transition {
                name: name.to_string(),
                state,
            });
            self.scheduler.schedule(generation, self.config.frame_interval());
            tracing::debug!("Animating to theme {} (generation {})", name, generation);
        } else {
            self.finish(name, flat);
        }

        self.last_good = Some(name.to_string());
        generation
    }

    /// Applies the first theme that loads, in order: the persisted
    /// selection, the configured default, then every available theme.
    /// Falls back to the built-in tokens. Returns the applied name.
    pub fn apply_initial(&mut self) -> String {
        let mut candidates: Vec<String> = Vec::new();
        candidates.extend(self.selected_from_settings());
        candidates.push(self.config.default_theme.clone());
        candidates.extend(self.available());

        let mut tried: Vec<&str> = Vec::new();
        for name in &candidates {
            if tried.contains(&name.as_str()) {
                continue;
            }
            tried.push(name);
            if self.apply_with(name, ApplyOptions::STARTUP).is_ok() {
                return name.clone();
            }
        }

        tracing::warn!("No theme could be loaded, using built-in tokens");
        self.apply_builtin_default();
        BUILTIN_THEME.to_string()
    }

    /// Applies the built-in token set under [`BUILTIN_THEME`].
    pub fn apply_builtin_default(&mut self) -> u64 {
        self.activate(BUILTIN_THEME, TokenSet::builtin(), false, false)
    }

    /// Delivers an animation tick.
    pub fn tick(&mut self, generation: u64) -> TickOutcome {
        let Some(transition) = self.transition.as_mut() else {
            tracing::trace!("Ignoring tick {} with no transition running", generation);
            return TickOutcome::Stale;
        };
        if transition.state.generation() != generation {
            tracing::trace!("Ignoring stale tick {}", generation);
            return TickOutcome::Stale;
        }

        let frame = transition.state.advance();
        if transition.state.is_finished() {
            let name = transition.name.clone();
            self.transition = None;
            self.finish(&name, frame);
            return TickOutcome::Finished;
        }

        self.show(frame);
        self.scheduler.schedule(generation, self.config.frame_interval());
        TickOutcome::Frame
    }

    /// Reacts to a debounced batch of changed files.
    ///
    /// Any change in the theme directory refreshes the theme list. A change
    /// to the template or to the active theme's file re-applies the active
    /// theme without animation and without persisting. If the active theme
    /// no longer loads, its last good tokens are kept.
    ///
    /// Paths are compared in resolved form, so relative or symlinked
    /// repository paths match what the watcher reports.
    pub fn handle_fs_change(&mut self, paths: &[PathBuf]) {
        let paths: Vec<PathBuf> = paths.iter().map(|p| resolve_path(p)).collect();
        let template_changed = self
            .repo
            .template_path()
            .map(resolve_path)
            .is_some_and(|template| paths.contains(&template));
        let themes_changed = self
            .repo
            .theme_dir()
            .map(resolve_path)
            .is_some_and(|dir| paths.iter().any(|p| p.parent() == Some(dir.as_path())));
        let active_changed = self
            .active
            .as_ref()
            .filter(|active| active.from_repository)
            .and_then(|active| self.repo.theme_path(&active.name))
            .is_some_and(|path| paths.contains(&resolve_path(&path)));

        if themes_changed {
            self.events.emit(ShellEvent::ThemesChanged(self.available()));
        }
        if template_changed {
            if let Err(err) = self.reload_template() {
                tracing::warn!("{}; keeping the previous template", err);
            }
        }
        if template_changed || active_changed {
            self.refresh_active();
        }
    }

    /// Re-reads the template and re-renders the tokens on screen.
    pub fn reload_template(&mut self) -> ThemeResult<()> {
        let text = self.repo.load_template()?;
        self.template = StyleTemplate::new(text);
        self.style = self.template.render(&self.tokens, None);
        tracing::info!("Reloaded stylesheet template");
        Ok(())
    }

    fn refresh_active(&mut self) {
        let Some(active) = self.active.clone() else {
            return;
        };

        let tokens = if active.from_repository {
            match self.repo.load_theme(&active.name) {
                Ok(theme) => TokenSet::new(theme.vars),
                Err(err) => {
                    tracing::warn!(
                        "Reload of theme {} failed, keeping the last good version: {}",
                        active.name,
                        err
                    );
                    active.tokens
                }
            }
        } else {
            active.tokens
        };

        let flat = tokens.flatten();
        self.begin(&active.name, tokens, active.from_repository);
        self.finish(&active.name, flat);
    }

    /// Starts a new generation for `name`, dropping any running transition.
    fn begin(&mut self, name: &str, tokens: TokenSet, from_repository: bool) -> u64 {
        self.generation += 1;
        if let Some(previous) = self.transition.take() {
            tracing::debug!(
                "Transition to {} superseded by {} (generation {})",
                previous.name,
                name,
                self.generation
            );
        }
        self.active = Some(ActiveTheme {
            name: name.to_string(),
            tokens,
            from_repository,
        });
        self.generation
    }

    fn show(&mut self, tokens: TokenMap) {
        self.style = self.template.render(&tokens, None);
        self.tokens = tokens.clone();
        self.events.emit(ShellEvent::ThemeTokensChanged(tokens));
    }

    fn finish(&mut self, name: &str, tokens: TokenMap) {
        self.show(tokens);
        if !self.style.is_complete() {
            tracing::warn!(
                "Theme {} leaves tokens unresolved: {}",
                name,
                self.style.unresolved.join(", ")
            );
        }
        self.dump_stylesheet();
        tracing::info!("Applied theme {}", name);
        self.events.emit(ShellEvent::ThemeApplied(name.to_string()));
    }

    fn dump_stylesheet(&self) {
        let Some(dir) = &self.dump_dir else {
            return;
        };
        let path = dir.join(DUMP_FILE);
        if let Err(err) = write_atomic(&path, self.style.text.as_bytes()) {
            tracing::warn!("Cannot dump stylesheet to {}: {}", path.display(), err);
        }
    }

    /// Renders the active theme with caller overrides on top.
    pub fn render_with_overrides(&self, overrides: &TokenMap) -> ResolvedStyle {
        match &self.active {
            Some(active) => self.template.render(&active.tokens, Some(overrides)),
            None => self.template.render(&TokenSet::builtin(), Some(overrides)),
        }
    }

    /// Theme names available in the repository.
    pub fn available(&self) -> Vec<String> {
        self.repo.list_themes()
    }

    pub fn load_theme(&self, name: &str) -> ThemeResult<Theme> {
        Ok(self.repo.load_theme(name)?)
    }

    /// Stores a theme and announces the new list. Saving the active theme
    /// re-applies it.
    pub fn save_theme(&mut self, name: &str, theme: &Theme) -> ThemeResult<()> {
        self.repo.save_theme(name, theme)?;
        self.events.emit(ShellEvent::ThemesChanged(self.available()));
        if self.current() == Some(name) {
            self.refresh_active();
        }
        Ok(())
    }

    /// Deletes a theme and announces the new list. The active theme stays
    /// on screen even if its file is gone.
    pub fn delete_theme(&mut self, name: &str) -> ThemeResult<()> {
        self.repo.delete_theme(name)?;
        self.events.emit(ShellEvent::ThemesChanged(self.available()));
        Ok(())
    }

    /// The persisted theme selection.
    pub fn selected_from_settings(&self) -> Option<String> {
        self.settings
            .as_ref()
            .and_then(|settings| settings.borrow().get().selected_theme.clone())
    }

    /// The last theme that loaded successfully.
    pub fn fallback(&self) -> Option<&str> {
        self.last_good.as_deref()
    }

    /// Starts the hot-reload watcher for this service's repository.
    pub fn watch(&self, config: &WatcherConfig, queue: QueueSender) -> Option<ThemeWatcher> {
        if !config.enabled {
            tracing::info!("Theme hot reload disabled");
            return None;
        }
        let targets = WatchTargets::new(
            self.repo.theme_dir().map(Path::to_path_buf),
            self.repo.template_path().map(Path::to_path_buf),
        );
        if targets.is_empty() {
            return None;
        }
        match ThemeWatcher::spawn(targets, config, queue) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                tracing::warn!("Cannot start theme watcher: {}", err);
                None
            }
        }
    }

    /// Name of the active theme; during a transition, its target.
    pub fn current(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.name.as_str())
    }

    /// Tokens on screen.
    pub fn tokens(&self) -> &TokenMap {
        &self.tokens
    }

    /// Stylesheet on screen.
    pub fn stylesheet(&self) -> &str {
        &self.style.text
    }

    pub fn unresolved(&self) -> &[String] {
        &self.style.unresolved
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    pub fn template(&self) -> &StyleTemplate {
        &self.template
    }
}

impl std::fmt::Debug for ThemeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeService")
            .field("current", &self.current())
            .field("generation", &self.generation)
            .field("animating", &self.is_animating())
            .finish()
    }
}
