//! Event-driven pass scheduling.
//!
//! One loop, three wakeup sources: a change to the desired-state file, a
//! periodic timer, and a termination signal. Passes run synchronously on
//! the loop thread, so wakeups arriving mid-pass queue up and at most one
//! pass runs at a time.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, bounded, select, tick, unbounded};
use log::{debug, info, warn};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::engine::Reconciler;
use crate::error::{Error, Result};

/// Default seconds between timer-driven passes.
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

pub struct Scheduler {
    reconciler: Reconciler,
    interval: Duration,
}

impl Scheduler {
    #[must_use]
    pub fn new(reconciler: Reconciler, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Run until SIGINT or SIGTERM arrives.
    ///
    /// The watch is registered on the parent directory rather than the
    /// file itself so editors that replace the file on save keep being
    /// observed.
    pub fn run(mut self) -> Result<()> {
        let path = canonical_topology_path(&self.reconciler.context().topology_path)?;
        let parent = path
            .parent()
            .ok_or_else(|| Error::Config(format!("{} has no parent directory", path.display())))?
            .to_path_buf();

        let (fs_tx, fs_rx) = unbounded::<Event>();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = fs_tx.send(event);
                }
                Err(e) => warn!("file watcher error: {e}"),
            })
            .map_err(|e| Error::Config(format!("cannot create file watcher: {e}")))?;
        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Config(format!("cannot watch {}: {e}", parent.display())))?;

        let ticker = tick(self.interval);
        let signals = signal_channel()?;

        info!(
            "watching {} (interval {}s)",
            path.display(),
            self.interval.as_secs()
        );
        self.pass("startup");

        loop {
            select! {
                recv(fs_rx) -> msg => {
                    let Ok(event) = msg else { break };
                    if !touches_file(&event, &path) {
                        continue;
                    }
                    // Editors save in several steps; drain the burst so
                    // one save triggers one pass.
                    while fs_rx.try_recv().is_ok() {}
                    self.pass("file change");
                }
                recv(ticker) -> _ => self.pass("timer"),
                recv(signals) -> sig => {
                    match sig {
                        Ok(sig) => info!("received signal {sig}, shutting down"),
                        Err(_) => warn!("signal listener stopped, shutting down"),
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    fn pass(&mut self, trigger: &str) {
        debug!("pass triggered by {trigger}");
        match self.reconciler.run_pass() {
            Ok(summary) => {
                for (address, message) in &summary.failures {
                    warn!("{address}: {message}");
                }
            }
            Err(e) => warn!("pass aborted: {e}"),
        }
    }
}

fn canonical_topology_path(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .map_err(|e| Error::Config(format!("cannot resolve {}: {e}", path.display())))
}

/// Forward SIGINT and SIGTERM onto a channel from a dedicated thread.
fn signal_channel() -> Result<Receiver<i32>> {
    let (tx, rx) = bounded(1);
    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| Error::Config(format!("cannot register signal handlers: {e}")))?;
    thread::spawn(move || {
        for sig in signals.forever() {
            if tx.send(sig).is_err() {
                break;
            }
        }
    });
    Ok(rx)
}

/// Whether a watcher event is a write or create touching the watched file.
///
/// Events from the parent-directory watch may report the path the editor
/// actually wrote, so the file name is compared as well as the full path.
fn touches_file(event: &Event, watched: &Path) -> bool {
    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| p == watched || (p.file_name().is_some() && p.file_name() == watched.file_name()))
}
