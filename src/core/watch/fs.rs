use super::ChangeEvent;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;

/// Bridges the platform file watcher into a tokio channel of
/// [`ChangeEvent`]s. Watching stops when this value is dropped.
pub struct FsWatcher {
    _watcher: notify::RecommendedWatcher,
}

impl FsWatcher {
    pub fn start(root: &Path, sender: mpsc::Sender<ChangeEvent>) -> Result<Self, AppError> {
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if let Some(change) = classify_event(event) {
                        let _ = sender.blocking_send(change);
                    }
                }
                Err(err) => tracing::warn!(error = %err, "file watcher error"),
            }
        })
        .map_err(|err| watch_error(root, err))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|err| watch_error(root, err))?;
        tracing::debug!(root = %root.display(), "file watcher started");

        Ok(Self { _watcher: watcher })
    }
}

fn classify_event(event: Event) -> Option<ChangeEvent> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
            if event.paths.is_empty() {
                None
            } else {
                Some(ChangeEvent::new(event.paths))
            }
        }
        _ => None,
    }
}

fn watch_error(root: &Path, err: notify::Error) -> AppError {
    AppError::with_source(
        ErrorCategory::FilesystemError,
        format!("failed to watch {}", root.display()),
        Box::new(err),
    )
    .with_code("BLD-WATCH-001")
    .with_path(root)
}
