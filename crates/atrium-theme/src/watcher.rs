//! Hot-reload file watching.
//!
//! A background thread owns the notify watcher. Raw events are filtered to
//! theme files and the template, coalesced over a short window and posted
//! to the UI loop as [`ShellMessage::FilesChanged`]. The thread never
//! touches theme state.
//!
//! Watcher failures are retried with exponential backoff. After too many
//! consecutive failures the thread posts [`ShellMessage::WatcherDisabled`]
//! once and exits. A delivered event, or a connection that stays up longer
//! than the longest retry delay, ends a failure streak.

use std::collections::BTreeSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use notify::{Event, EventKind, RecursiveMode, Watcher};

use atrium_core::config::WatcherConfig;
use atrium_core::{QueueSender, ShellMessage};

/// Paths reported by the backend, or the reason it failed.
pub type RawEvent = Result<Vec<PathBuf>, String>;

/// Where a watch backend delivers its events.
pub type RawSender = Sender<RawEvent>;

/// Keeps a watch backend alive until dropped.
pub type WatchGuard = Box<dyn Send>;

/// Absolute, symlink-free form of `path`, used to compare configured paths
/// with the ones backends report.
///
/// Paths that do not exist (yet, or any more) are resolved through their
/// nearest existing ancestor.
pub fn resolve_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut clean = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other),
        }
    }

    let mut missing = Vec::new();
    let mut existing = clean.as_path();
    loop {
        if let Ok(resolved) = existing.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(resolved, |acc: PathBuf, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }
    clean
}

/// What the watcher is interested in. Paths are stored resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchTargets {
    theme_dir: Option<PathBuf>,
    template: Option<PathBuf>,
}

impl WatchTargets {
    pub fn new(theme_dir: Option<PathBuf>, template: Option<PathBuf>) -> Self {
        Self {
            theme_dir: theme_dir.as_deref().map(resolve_path),
            template: template.as_deref().map(resolve_path),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.theme_dir.is_none() && self.template.is_none()
    }

    /// Directories to watch, non-recursively.
    pub fn dirs(&self) -> Vec<PathBuf> {
        let template_dir = self.template.as_deref().map(|template| {
            match template.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            }
        });

        let mut dirs: Vec<PathBuf> = Vec::new();
        for dir in self.theme_dir.iter().cloned().chain(template_dir) {
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }

    /// Resolved form of `path` if it is the template or a `*.json` file in
    /// the theme dir.
    pub fn relevant(&self, path: &Path) -> Option<PathBuf> {
        let path = resolve_path(path);
        let is_template = self.template.as_ref() == Some(&path);
        let is_theme = self
            .theme_dir
            .as_deref()
            .is_some_and(|dir| path.parent() == Some(dir))
            && path.extension().is_some_and(|ext| ext == "json");
        (is_template || is_theme).then_some(path)
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        self.relevant(path).is_some()
    }
}

/// Backoff schedule for watcher failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_failures: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &WatcherConfig) -> Self {
        Self {
            base: Duration::from_millis(config.retry_base_ms),
            max: Duration::from_millis(config.retry_max_ms),
            max_failures: config.max_failures.max(1),
        }
    }

    /// Delay after the `failures`-th consecutive failure, doubling each
    /// time up to `max`.
    pub fn delay(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(16);
        self.base.saturating_mul(1 << shift).min(self.max)
    }

    pub fn gives_up_after(&self, failures: u32) -> bool {
        failures >= self.max_failures
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WatcherConfig::default())
    }
}

/// Collects paths and releases them as one batch once the window closes.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: BTreeSet<PathBuf>,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeSet::new(),
            deadline: None,
        }
    }

    /// Adds a path. The window starts with the first path of a batch.
    pub fn push(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path);
        self.deadline.get_or_insert(now + self.window);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the batch if its window has closed.
    pub fn take_due(&mut self, now: Instant) -> Option<Vec<PathBuf>> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(std::mem::take(&mut self.pending).into_iter().collect())
            }
            _ => None,
        }
    }
}

/// Handle to the watcher thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct ThemeWatcher {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ThemeWatcher {
    /// Starts watching with the platform's notify backend.
    pub fn spawn(targets: WatchTargets, config: &WatcherConfig, queue: QueueSender) -> io::Result<Self> {
        Self::spawn_with(targets, config, queue, connect_notify)
    }

    /// Starts watching with a custom backend.
    ///
    /// `connect` is called on the watcher thread at startup and after every
    /// failure. It must deliver events into the given sender and return a
    /// guard that keeps the backend alive.
    pub fn spawn_with<C>(
        targets: WatchTargets,
        config: &WatcherConfig,
        queue: QueueSender,
        connect: C,
    ) -> io::Result<Self>
    where
        C: FnMut(&WatchTargets, RawSender) -> Result<WatchGuard, String> + Send + 'static,
    {
        let (stop_tx, stop_rx) = unbounded();
        let worker = WatchLoop {
            targets,
            policy: RetryPolicy::from_config(config),
            debouncer: Debouncer::new(config.debounce()),
            queue,
            stop: stop_rx,
        };
        let handle = std::thread::Builder::new()
            .name("atrium-theme-watcher".into())
            .spawn(move || worker.run(connect))?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the thread and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Theme watcher thread panicked");
            }
        }
    }
}

impl Drop for ThemeWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum Step {
    Stop,
    Raw(RawEvent),
    Timer,
}

struct WatchLoop {
    targets: WatchTargets,
    policy: RetryPolicy,
    debouncer: Debouncer,
    queue: QueueSender,
    stop: Receiver<()>,
}

impl WatchLoop {
    fn run<C>(mut self, mut connect: C)
    where
        C: FnMut(&WatchTargets, RawSender) -> Result<WatchGuard, String>,
    {
        let (raw_tx, raw_rx) = unbounded::<RawEvent>();
        let mut guard: Option<WatchGuard> = None;
        let mut failures = 0u32;
        let mut connected_at = Instant::now();

        loop {
            if guard.is_none() {
                match connect(&self.targets, raw_tx.clone()) {
                    Ok(backend) => {
                        tracing::info!("Watching {:?} for theme changes", self.targets.dirs());
                        guard = Some(backend);
                        connected_at = Instant::now();
                    }
                    Err(reason) => {
                        failures += 1;
                        if !self.back_off(failures, &reason) {
                            return;
                        }
                        continue;
                    }
                }
            }

            let timer = self
                .debouncer
                .deadline()
                .map(crossbeam_channel::at)
                .unwrap_or_else(crossbeam_channel::never);

            let step = select! {
                recv(self.stop) -> _ => Step::Stop,
                recv(raw_rx) -> raw => match raw {
                    Ok(event) => Step::Raw(event),
                    Err(_) => Step::Stop,
                },
                recv(timer) -> _ => Step::Timer,
            };

            match step {
                Step::Stop => break,
                Step::Raw(Ok(paths)) => {
                    failures = 0;
                    let now = Instant::now();
                    for path in paths {
                        if let Some(path) = self.targets.relevant(&path) {
                            self.debouncer.push(path, now);
                        }
                    }
                }
                Step::Raw(Err(reason)) => {
                    guard = None;
                    // A backend that outlived the longest retry delay
                    // starts a new streak.
                    if connected_at.elapsed() >= self.policy.max {
                        failures = 0;
                    }
                    failures += 1;
                    if !self.back_off(failures, &reason) {
                        return;
                    }
                }
                Step::Timer => {}
            }

            if let Some(batch) = self.debouncer.take_due(Instant::now()) {
                tracing::debug!("Theme files changed: {:?}", batch);
                if !self.queue.post(ShellMessage::FilesChanged(batch)) {
                    break;
                }
            }
        }
        tracing::debug!("Theme watcher stopped");
    }

    /// Waits out the retry delay. Returns false when the loop should end,
    /// either because it gave up or because it was asked to stop.
    fn back_off(&self, failures: u32, reason: &str) -> bool {
        if self.policy.gives_up_after(failures) {
            tracing::warn!(
                "Theme watcher disabled after {} consecutive failures: {}",
                failures,
                reason
            );
            self.queue.post(ShellMessage::WatcherDisabled {
                reason: reason.to_string(),
            });
            return false;
        }

        let delay = self.policy.delay(failures);
        tracing::warn!("Theme watcher failed ({}), retrying in {:?}", reason, delay);
        select! {
            recv(self.stop) -> _ => false,
            default(delay) => true,
        }
    }
}

fn connect_notify(targets: &WatchTargets, sink: RawSender) -> Result<WatchGuard, String> {
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        let raw = match res {
            Ok(event) => match event.kind {
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                    Ok(event.paths)
                }
                _ => return,
            },
            Err(err) => Err(err.to_string()),
        };
        let _ = sink.send(raw);
    })
    .map_err(|e| e.to_string())?;

    for dir in targets.dirs() {
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| format!("{}: {}", dir.display(), e))?;
    }
    Ok(Box::new(watcher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use atrium_core::ShellQueue;

    fn targets() -> WatchTargets {
        WatchTargets::new(
            Some(PathBuf::from("/themes")),
            Some(PathBuf::from("/qss/base.qss")),
        )
    }

    fn fast_config(max_failures: u32) -> WatcherConfig {
        WatcherConfig {
            enabled: true,
            debounce_ms: 20,
            retry_base_ms: 1,
            retry_max_ms: 4,
            max_failures,
        }
    }

    fn wait_for(queue: &mut ShellQueue) -> Option<ShellMessage> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(message) = queue.try_next() {
                return Some(message);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_relevance_filter() {
        let targets = targets();
        assert!(targets.is_relevant(Path::new("/themes/Dracula.json")));
        assert!(targets.is_relevant(Path::new("/qss/base.qss")));
        assert!(!targets.is_relevant(Path::new("/themes/notes.txt")));
        assert!(!targets.is_relevant(Path::new("/themes/sub/Deep.json")));
        assert!(!targets.is_relevant(Path::new("/qss/other.qss")));
        assert_eq!(
            targets.dirs(),
            vec![PathBuf::from("/themes"), PathBuf::from("/qss")]
        );
    }

    #[test]
    fn test_relative_template_matches_reported_path() {
        let targets = WatchTargets::new(None, Some(PathBuf::from("base.qss")));
        let cwd = resolve_path(Path::new("."));

        assert_eq!(targets.dirs(), vec![cwd.clone()]);
        assert!(targets.is_relevant(Path::new("./base.qss")));
        assert!(targets.is_relevant(&cwd.join("base.qss")));
        assert_eq!(targets.relevant(Path::new("./base.qss")), Some(cwd.join("base.qss")));
        assert!(!targets.is_relevant(Path::new("./other.qss")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_dirs_match_canonical_events() {
        let root = tempfile::TempDir::new().unwrap();
        let real = root.path().join("real");
        std::fs::create_dir(&real).unwrap();
        let link = root.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let targets = WatchTargets::new(Some(link.clone()), Some(link.join("base.qss")));
        let canonical = real.canonicalize().unwrap();

        assert_eq!(targets.dirs(), vec![canonical.clone()]);
        assert!(targets.is_relevant(&canonical.join("Dracula.json")));
        assert!(targets.is_relevant(&canonical.join("base.qss")));
        assert!(targets.is_relevant(&link.join("Gone.json")));
        assert!(!targets.is_relevant(&root.path().join("Dracula.json")));
    }

    #[test]
    fn test_retry_delays_double_and_cap() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=6).map(|n| policy.delay(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![250, 500, 1000, 2000, 4000, 4000]);
        assert!(!policy.gives_up_after(4));
        assert!(policy.gives_up_after(5));
    }

    #[test]
    fn test_debouncer_coalesces_burst() {
        let mut debouncer = Debouncer::new(Duration::from_millis(150));
        let start = Instant::now();
        let a = PathBuf::from("/themes/A.json");
        let b = PathBuf::from("/themes/B.json");

        debouncer.push(a.clone(), start);
        debouncer.push(b.clone(), start + Duration::from_millis(10));
        debouncer.push(a.clone(), start + Duration::from_millis(40));

        assert_eq!(debouncer.take_due(start + Duration::from_millis(100)), None);
        assert_eq!(
            debouncer.take_due(start + Duration::from_millis(150)),
            Some(vec![a, b])
        );
        assert_eq!(debouncer.deadline(), None);
    }

    #[test]
    fn test_loop_posts_one_filtered_batch() {
        let sink: Arc<Mutex<Option<RawSender>>> = Arc::default();
        let slot = Arc::clone(&sink);
        let mut queue = ShellQueue::new();

        let watcher = ThemeWatcher::spawn_with(
            targets(),
            &fast_config(3),
            queue.sender(),
            move |_targets: &WatchTargets, tx: RawSender| {
                *slot.lock().unwrap() = Some(tx);
                Ok(Box::new(()) as WatchGuard)
            },
        )
        .unwrap();

        let tx = loop {
            if let Some(tx) = sink.lock().unwrap().clone() {
                break tx;
            }
            thread::sleep(Duration::from_millis(1));
        };
        tx.send(Ok(vec![
            PathBuf::from("/themes/Dracula.json"),
            PathBuf::from("/themes/notes.txt"),
        ]))
        .unwrap();
        tx.send(Ok(vec![PathBuf::from("/themes/Dracula.json")])).unwrap();

        match wait_for(&mut queue) {
            Some(ShellMessage::FilesChanged(paths)) => {
                assert_eq!(paths, vec![PathBuf::from("/themes/Dracula.json")]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        watcher.stop();
        assert!(queue.try_next().is_none());
    }

    #[test]
    fn test_gives_up_after_repeated_failures() {
        let attempts = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&attempts);
        let mut queue = ShellQueue::new();

        let watcher = ThemeWatcher::spawn_with(
            targets(),
            &fast_config(3),
            queue.sender(),
            move |_targets: &WatchTargets, _tx: RawSender| {
                *counter.lock().unwrap() += 1;
                Err("backend unavailable".to_string())
            },
        )
        .unwrap();

        match wait_for(&mut queue) {
            Some(ShellMessage::WatcherDisabled { reason }) => {
                assert_eq!(reason, "backend unavailable");
            }
            other => panic!("unexpected message: {other:?}"),
        }
        watcher.stop();
        assert_eq!(*attempts.lock().unwrap(), 3);
        assert!(queue.try_next().is_none());
    }

    #[test]
    fn test_backend_error_reconnects() {
        let connects = Arc::new(Mutex::new(Vec::<RawSender>::new()));
        let log = Arc::clone(&connects);
        let mut queue = ShellQueue::new();

        let watcher = ThemeWatcher::spawn_with(
            targets(),
            &fast_config(5),
            queue.sender(),
            move |_targets: &WatchTargets, tx: RawSender| {
                log.lock().unwrap().push(tx);
                Ok(Box::new(()) as WatchGuard)
            },
        )
        .unwrap();

        let first = loop {
            if let Some(tx) = connects.lock().unwrap().first().cloned() {
                break tx;
            }
            thread::sleep(Duration::from_millis(1));
        };
        first.send(Err("inotify queue overflow".into())).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while connects.lock().unwrap().len() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(connects.lock().unwrap().len(), 2);

        first.send(Ok(vec![PathBuf::from("/qss/base.qss")])).unwrap();
        assert!(matches!(wait_for(&mut queue), Some(ShellMessage::FilesChanged(_))));
        watcher.stop();
    }

    fn wait_for_connects(connects: &Mutex<Vec<RawSender>>, count: usize) -> RawSender {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            {
                let senders = connects.lock().unwrap();
                if senders.len() >= count {
                    return senders[count - 1].clone();
                }
            }
            assert!(Instant::now() < deadline, "watcher never connected {count} times");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_isolated_failures_do_not_accumulate() {
        let connects = Arc::new(Mutex::new(Vec::<RawSender>::new()));
        let log = Arc::clone(&connects);
        let mut queue = ShellQueue::new();

        let watcher = ThemeWatcher::spawn_with(
            targets(),
            &fast_config(2),
            queue.sender(),
            move |_targets: &WatchTargets, tx: RawSender| {
                log.lock().unwrap().push(tx);
                Ok(Box::new(()) as WatchGuard)
            },
        )
        .unwrap();

        for round in 1..=3 {
            let tx = wait_for_connects(&connects, round);
            thread::sleep(Duration::from_millis(30));
            tx.send(Err("transient backend error".into())).unwrap();
        }

        let tx = wait_for_connects(&connects, 4);
        tx.send(Ok(vec![PathBuf::from("/qss/base.qss")])).unwrap();
        assert!(matches!(wait_for(&mut queue), Some(ShellMessage::FilesChanged(_))));
        assert!(watcher.is_running());
        watcher.stop();
    }

    #[test]
    fn test_flapping_backend_still_gives_up() {
        let connects = Arc::new(Mutex::new(Vec::<RawSender>::new()));
        let log = Arc::clone(&connects);
        let mut queue = ShellQueue::new();
        let config = WatcherConfig {
            retry_max_ms: 500,
            ..fast_config(2)
        };

        let watcher = ThemeWatcher::spawn_with(
            targets(),
            &config,
            queue.sender(),
            move |_targets: &WatchTargets, tx: RawSender| {
                log.lock().unwrap().push(tx);
                Ok(Box::new(()) as WatchGuard)
            },
        )
        .unwrap();

        let tx = wait_for_connects(&connects, 1);
        tx.send(Err("backend dropped".into())).unwrap();
        tx.send(Err("backend dropped".into())).unwrap();

        match wait_for(&mut queue) {
            Some(ShellMessage::WatcherDisabled { reason }) => assert_eq!(reason, "backend dropped"),
            other => panic!("unexpected message: {other:?}"),
        }
        watcher.stop();
    }
}
