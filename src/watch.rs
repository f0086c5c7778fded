use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use notify::RecommendedWatcher;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind, Debouncer};

const DEBOUNCE: Duration = Duration::from_millis(200);
const MAX_WATCHER_RETRIES: u32 = 3;

/// Outcome of polling the watcher once per frame
#[derive(Debug, PartialEq, Eq)]
pub enum WatchStatus {
    Idle,
    Changed,
    /// The watcher failed and was rebuilt
    Recovered,
    /// The watcher failed and could not be rebuilt; carries a user-facing message
    Failed(String),
}

struct ActiveWatcher {
    // Kept alive for as long as notifications are wanted
    _debouncer: Debouncer<RecommendedWatcher>,
    rx: Receiver<DebounceEventResult>,
}

/// Live reload of the previewed file, with bounded recovery after errors
#[derive(Default)]
pub struct LiveReload {
    path: Option<PathBuf>,
    active: Option<ActiveWatcher>,
    retry_count: u32,
}

impl LiveReload {
    pub fn is_watching(&self) -> bool {
        self.active.is_some()
    }

    /// Watch `path`, replacing any previous watch
    pub fn start(&mut self, path: &Path) -> Result<(), notify::Error> {
        self.stop();
        self.path = Some(path.to_path_buf());
        self.retry_count = 0;
        self.connect()
    }

    pub fn stop(&mut self) {
        if self.active.take().is_some() {
            log::info!("Stopped watching file");
        }
        self.path = None;
    }

    fn connect(&mut self) -> Result<(), notify::Error> {
        let Some(path) = &self.path else {
            log::warn!("Cannot start watching: no file loaded");
            return Ok(());
        };

        let (tx, rx) = mpsc::channel();
        let mut debouncer = new_debouncer(DEBOUNCE, tx)?;
        debouncer
            .watcher()
            .watch(path, notify::RecursiveMode::NonRecursive)?;

        log::info!("Started watching file: {:?}", path);
        self.active = Some(ActiveWatcher {
            _debouncer: debouncer,
            rx,
        });
        Ok(())
    }

    /// Drain pending notifications without blocking
    pub fn poll(&mut self) -> WatchStatus {
        let Some(active) = &self.active else {
            return WatchStatus::Idle;
        };

        let mut changed = false;
        let mut failure = None;
        while let Ok(result) = active.rx.try_recv() {
            match result {
                Ok(events) => {
                    self.retry_count = 0;
                    for event in events {
                        if event.kind == DebouncedEventKind::Any {
                            log::debug!("File change detected: {:?}", event.path);
                            changed = true;
                        }
                    }
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        match failure {
            Some(e) => self.recover(e),
            None if changed => WatchStatus::Changed,
            None => WatchStatus::Idle,
        }
    }

    fn recover(&mut self, error: notify::Error) -> WatchStatus {
        log::error!("File watcher error: {}", error);
        self.active = None;

        if self.retry_count >= MAX_WATCHER_RETRIES {
            self.path = None;
            return WatchStatus::Failed(format!(
                "File watcher failed after {} retries: {}",
                MAX_WATCHER_RETRIES, error
            ));
        }

        self.retry_count += 1;
        log::info!("Attempting watcher recovery (attempt {})", self.retry_count);
        match self.connect() {
            Ok(()) if self.active.is_some() => WatchStatus::Recovered,
            Ok(()) => WatchStatus::Failed(format!("File watcher error: {}", error)),
            Err(e) => WatchStatus::Failed(format!(
                "File watcher error (retry {}): {}",
                self.retry_count, e
            )),
        }
    }
}
