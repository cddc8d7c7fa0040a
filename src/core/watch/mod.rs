//! Watch trigger: re-runs a task whenever a watched file changes.
//!
//! State machine: `Idle -> Debouncing -> Running -> Idle`. Matching events
//! that arrive while a run is in progress coalesce into a single pending
//! re-run, which starts after a fresh debounce once the current run ends.

#![allow(clippy::result_large_err)]

mod fs;

pub use fs::FsWatcher;

use crate::core::error::AppError;
use crate::core::matcher::PatternSet;
use crate::core::types::BuildStatus;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};

/// Patterns watched and the task re-run when one of them changes.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    patterns: PatternSet,
    task: String,
}

impl WatchBinding {
    pub fn new<I, S>(patterns: I, task: impl Into<String>) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            patterns: PatternSet::new(patterns)?,
            task: task.into(),
        })
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// Whether a changed path (absolute, or relative to `root`) is watched.
    pub fn matches(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        self.patterns.matches(relative)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Debouncing,
    Running,
}

/// A batch of changed paths reported by a file-system source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub paths: Vec<PathBuf>,
}

impl ChangeEvent {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }
}

/// What the trigger runs.
#[async_trait]
pub trait WatchTarget: Send + Sync + 'static {
    /// Run the task to completion.
    async fn run(&self, task: &str) -> BuildStatus;

    /// Called after every run, whatever its status.
    async fn finished(&self, _task: &str, _status: BuildStatus) {}
}

pub struct WatchTrigger {
    root: PathBuf,
    binding: WatchBinding,
    debounce: Duration,
    state: watch::Sender<WatchState>,
}

impl WatchTrigger {
    pub fn new(root: impl Into<PathBuf>, binding: WatchBinding, debounce: Duration) -> Self {
        let (state, _) = watch::channel(WatchState::Idle);
        Self {
            root: root.into(),
            binding,
            debounce,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WatchState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: WatchState) {
        self.state.send_replace(state);
        tracing::trace!(?state, "watch state");
    }

    fn is_relevant(&self, event: &ChangeEvent) -> bool {
        event
            .paths
            .iter()
            .any(|path| self.binding.matches(&self.root, path))
    }

    /// Consume events until the channel closes and no re-run is pending.
    /// Returns the number of runs performed.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<ChangeEvent>,
        target: Arc<dyn WatchTarget>,
    ) -> usize {
        let mut runs = 0usize;
        let mut closed = false;
        let mut pending = false;

        loop {
            if !pending {
                self.set_state(WatchState::Idle);
                if closed {
                    break;
                }
                match events.recv().await {
                    Some(event) if self.is_relevant(&event) => {
                        tracing::debug!(paths = ?event.paths, "change detected");
                    }
                    Some(_) => continue,
                    None => break,
                }
            }
            pending = false;

            self.set_state(WatchState::Debouncing);
            let mut deadline = Instant::now() + self.debounce;
            loop {
                tokio::select! {
                    _ = sleep_until(deadline) => break,
                    event = events.recv(), if !closed => match event {
                        Some(event) if self.is_relevant(&event) => {
                            deadline = Instant::now() + self.debounce;
                        }
                        Some(_) => {}
                        None => closed = true,
                    },
                }
            }

            self.set_state(WatchState::Running);
            runs += 1;
            let task = self.binding.task().to_string();
            tracing::info!(task = %task, run = runs, "watch run started");
            let run = target.run(&task);
            tokio::pin!(run);
            let status = loop {
                tokio::select! {
                    status = &mut run => break status,
                    event = events.recv(), if !closed => match event {
                        Some(event) if self.is_relevant(&event) => {
                            if !pending {
                                tracing::debug!("change during run, re-run queued");
                            }
                            pending = true;
                        }
                        Some(_) => {}
                        None => closed = true,
                    },
                }
            };
            target.finished(&task, status).await;
            tracing::info!(task = %task, status = %status, "watch run finished");
        }

        tracing::debug!(runs, "watch trigger stopped");
        runs
    }
}
