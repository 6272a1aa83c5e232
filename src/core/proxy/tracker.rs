//! Updater status store
//!
//! Process-wide record of what the updater last reported. Any number of views
//! may observe it; all of them see the same sequence of changes.

use super::models::{DownloadProgress, UpdaterStatus};
use tokio::sync::broadcast;

const CHANGE_CAPACITY: usize = 256;

/// A change applied to the updater store
#[derive(Debug, Clone, PartialEq)]
pub enum UpdaterChange {
    Status(UpdaterStatus),
    Progress(DownloadProgress),
    Visibility(bool),
}

#[derive(Debug)]
pub struct UpdaterTracker {
    status: Option<UpdaterStatus>,
    progress: Option<DownloadProgress>,
    visible: bool,
    changes: broadcast::Sender<UpdaterChange>,
}

impl UpdaterTracker {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            status: None,
            progress: None,
            visible: false,
            changes,
        }
    }

    pub fn status(&self) -> Option<&UpdaterStatus> {
        self.status.as_ref()
    }

    /// Download progress, kept only while the last status is downloading
    pub fn progress(&self) -> Option<&DownloadProgress> {
        self.progress.as_ref()
    }

    /// Whether the update overlay should be shown
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdaterChange> {
        self.changes.subscribe()
    }

    pub fn apply(&mut self, change: UpdaterChange) {
        match &change {
            UpdaterChange::Status(status) => {
                if !matches!(status, UpdaterStatus::Downloading { .. }) {
                    self.progress = None;
                } else if !matches!(self.status, Some(UpdaterStatus::Downloading { .. })) {
                    self.progress = None;
                }
                self.status = Some(status.clone());
            }
            UpdaterChange::Progress(progress) => {
                if matches!(self.status, Some(UpdaterStatus::Downloading { .. })) {
                    self.progress = Some(*progress);
                }
            }
            UpdaterChange::Visibility(visible) => self.visible = *visible,
        }
        // No observers is fine
        let _ = self.changes.send(change);
    }
}

impl Default for UpdaterTracker {
    fn default() -> Self {
        Self::new()
    }
}
