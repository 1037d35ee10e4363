//! File watching for interactive re-validation.

use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::time::{Duration, Instant};

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::schedule::Debouncer;

const IDLE_WAIT: Duration = Duration::from_secs(60 * 60);

pub struct FileWatcher {
    watcher: RecommendedWatcher,
    receiver: Receiver<Result<notify::Event, notify::Error>>,
    debouncer: Debouncer,
    target: Option<OsString>,
}

impl FileWatcher {
    pub fn new(debounce: Duration) -> Result<Self, notify::Error> {
        let (tx, rx) = channel();
        let watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        Ok(Self {
            watcher,
            receiver: rx,
            debouncer: Debouncer::new(debounce),
            target: None,
        })
    }

    /// Watches the file's directory so editors that replace the file on save
    /// are still seen; events for sibling files are ignored.
    pub fn watch_file(&mut self, file: &Path) -> Result<(), notify::Error> {
        let dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        self.target = file.file_name().map(ToOwned::to_owned);
        self.watcher.watch(dir, RecursiveMode::NonRecursive)
    }

    fn is_target(&self, event: &notify::Event) -> bool {
        let Some(target) = &self.target else {
            return true;
        };
        event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(target.as_os_str()))
    }

    /// Blocks until a burst of changes has settled. Returns `false` once the
    /// event source is gone.
    pub fn wait_for_change(&mut self) -> bool {
        loop {
            let wait = self
                .debouncer
                .remaining(Instant::now())
                .unwrap_or(IDLE_WAIT);
            match self.receiver.recv_timeout(wait) {
                Ok(Ok(event)) => {
                    if matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) && self.is_target(&event)
                    {
                        self.debouncer.schedule(Instant::now());
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "file watch error");
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.debouncer.poll(Instant::now()).is_some() {
                        return true;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.debouncer.cancel();
                    return false;
                }
            }
        }
    }
}
