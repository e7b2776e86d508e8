//! Folder watching.
//!
//! Watches the status folders (non-recursively) for Markdown changes,
//! debounces bursts per file, and runs each settled change through the
//! [`ArticleProcessor`]. A periodic rescan catches anything the platform's
//! notifications missed.

mod debounce;
mod processor;

pub use debounce::{Debouncer, Fired};
pub use processor::{ArticleProcessor, ProcessOutcome, ScanSummary};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};

use crate::core::{is_article_path, Config, Result};

/// Capacity of the change event stream; slower receivers lose events.
const EVENT_CAPACITY: usize = 256;

/// Kind of a file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// File appeared
    Created,
    /// File contents changed
    Modified,
    /// File disappeared
    Deleted,
}

/// A settled change to an article document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Kind of change
    pub kind: ChangeKind,
    /// Document path
    pub path: PathBuf,
}

/// Watcher timing.
#[derive(Debug, Clone, Copy)]
pub struct WatcherSettings {
    /// Quiet period before a change is handled
    pub debounce: Duration,
    /// Interval between full rescans
    pub rescan: Duration,
}

impl WatcherSettings {
    /// Settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: Duration::from_millis(config.watcher.debounce_ms),
            rescan: Duration::from_secs(config.watcher.rescan_secs.max(1)),
        }
    }
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self { debounce: Duration::from_millis(500), rescan: Duration::from_secs(120) }
    }
}

/// Watches the status folders and feeds changes to the processor.
pub struct FolderWatcher {
    watcher: Option<RecommendedWatcher>,
    tasks: Vec<JoinHandle<()>>,
    events: Option<broadcast::Sender<ChangeEvent>>,
}

impl FolderWatcher {
    /// Start watching. Must be called from within a tokio runtime.
    ///
    /// Creates missing status folders, subscribes to notifications, and
    /// starts the rescan loop, whose first pass runs immediately.
    pub fn start(processor: Arc<ArticleProcessor>, settings: WatcherSettings) -> Result<Self> {
        let router = processor.router().clone();
        router.ensure_folders()?;

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                for change in translate(&event) {
                    let _ = raw_tx.send(change);
                }
            }
            Err(e) => tracing::warn!(error = %e, "Watch error"),
        })?;

        for folder in router.monitored_folders() {
            watcher.watch(&folder, RecursiveMode::NonRecursive)?;
            tracing::debug!(folder = %folder.display(), "Watching");
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let consumer = tokio::spawn(consume(raw_rx, events.clone(), Arc::clone(&processor), settings.debounce));
        let rescan = tokio::spawn(rescan_loop(processor, settings.rescan));

        tracing::info!(
            folders = router.monitored_folders().len(),
            debounce_ms = settings.debounce.as_millis() as u64,
            rescan_secs = settings.rescan.as_secs(),
            "Folder watcher started"
        );

        Ok(Self { watcher: Some(watcher), tasks: vec![consumer, rescan], events: Some(events) })
    }

    /// Subscribe to settled change events.
    ///
    /// After [`Self::stop`] the returned receiver is already closed.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        match self.events {
            Some(ref tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Stop watching. Pending debounce timers are abandoned.
    pub fn stop(&mut self) {
        self.watcher.take();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.events.take();
        tracing::info!("Folder watcher stopped");
    }

    /// Whether the watcher is running.
    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}

impl Drop for FolderWatcher {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

/// Map a raw notification to article changes.
fn translate(event: &notify::Event) -> Vec<ChangeEvent> {
    let kinds: Vec<ChangeKind> = match event.kind {
        EventKind::Create(_) => vec![ChangeKind::Created],
        EventKind::Remove(_) => vec![ChangeKind::Deleted],
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => vec![ChangeKind::Deleted],
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => vec![ChangeKind::Created],
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => vec![ChangeKind::Deleted, ChangeKind::Created],
        EventKind::Modify(_) => vec![ChangeKind::Modified],
        _ => Vec::new(),
    };

    let pairs: Vec<(ChangeKind, &PathBuf)> = if kinds.len() == event.paths.len() {
        kinds.into_iter().zip(event.paths.iter()).collect()
    } else {
        kinds.first().map_or_else(Vec::new, |k| event.paths.iter().map(|p| (*k, p)).collect())
    };

    pairs
        .into_iter()
        .filter(|(_, path)| is_article_path(path))
        .map(|(kind, path)| ChangeEvent { kind, path: path.clone() })
        .collect()
}

/// Debounce raw changes, publish settled ones, and process them.
async fn consume(
    mut raw_rx: mpsc::UnboundedReceiver<ChangeEvent>,
    events: broadcast::Sender<ChangeEvent>,
    processor: Arc<ArticleProcessor>,
    delay: Duration,
) {
    let (fired_tx, mut fired_rx) = mpsc::unbounded_channel();
    let mut debouncer = Debouncer::new(delay, fired_tx);
    let mut running = JoinSet::new();

    loop {
        tokio::select! {
            raw = raw_rx.recv() => {
                let Some(change) = raw else { break };
                debouncer.schedule(change.path, change.kind);
            }
            Some(fired) = fired_rx.recv() => {
                if !debouncer.complete(&fired) {
                    continue;
                }

                let event = ChangeEvent { kind: fired.kind, path: fired.path };
                let _ = events.send(event.clone());

                if event.kind != ChangeKind::Deleted && event.path.exists() {
                    let processor = Arc::clone(&processor);
                    running.spawn(async move {
                        if let Err(e) = processor.process(&event.path).await {
                            tracing::warn!(path = %event.path.display(), error = %e, "Failed to process change");
                        }
                    });
                }
            }
            Some(_) = running.join_next(), if !running.is_empty() => {}
        }
    }
}

/// Rescan every monitored folder on a fixed interval, starting immediately.
async fn rescan_loop(processor: Arc<ArticleProcessor>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let summary = processor.scan_all().await;
        if summary.failed > 0 {
            tracing::warn!(failed = summary.failed, processed = summary.processed, "Rescan finished with errors");
        }
    }
}
