//! Per-path debouncing of change notifications.
//!
//! Each path gets its own timer. A new notification for the path restarts
//! the timer, so only the last notification in a burst fires.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::ChangeKind;

/// A debounced notification that is ready to be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired {
    /// Path that changed
    pub path: PathBuf,

    /// Kind of the change
    pub kind: ChangeKind,

    generation: u64,
}

struct Pending {
    generation: u64,
    kind: ChangeKind,
    timer: JoinHandle<()>,
}

/// Holds one timer per path with a pending notification.
pub struct Debouncer {
    delay: Duration,
    next_generation: u64,
    pending: HashMap<PathBuf, Pending>,
    fired_tx: mpsc::UnboundedSender<Fired>,
}

impl Debouncer {
    /// Create a debouncer; fired notifications are sent to `fired_tx`.
    pub fn new(delay: Duration, fired_tx: mpsc::UnboundedSender<Fired>) -> Self {
        Self { delay, next_generation: 0, pending: HashMap::new(), fired_tx }
    }

    /// Record a notification, restarting the path's timer.
    pub fn schedule(&mut self, path: PathBuf, kind: ChangeKind) {
        let kind = match self.pending.remove(&path) {
            Some(previous) => {
                previous.timer.abort();
                merge(previous.kind, kind)
            }
            None => kind,
        };

        self.next_generation += 1;
        let generation = self.next_generation;
        let fired = Fired { path: path.clone(), kind, generation };
        let tx = self.fired_tx.clone();
        let delay = self.delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(fired);
        });

        self.pending.insert(path, Pending { generation, kind, timer });
    }

    /// Accept a fired notification if it is still the latest for its path.
    pub fn complete(&mut self, fired: &Fired) -> bool {
        match self.pending.get(&fired.path) {
            Some(p) if p.generation == fired.generation => {
                self.pending.remove(&fired.path);
                true
            }
            _ => false,
        }
    }

    /// Number of paths with a running timer.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.timer.abort();
        }
    }
}

/// Combine the kind of a pending notification with a newer one.
fn merge(previous: ChangeKind, next: ChangeKind) -> ChangeKind {
    match (previous, next) {
        (ChangeKind::Created, ChangeKind::Modified) => ChangeKind::Created,
        (_, next) => next,
    }
}
