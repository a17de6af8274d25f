// Called on startup, on quit, on demand and shortly after every change;
// keeps the flat snapshot of the live state next to the project.
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;

use crate::sequencer::snapshot::{Snapshot, SnapshotPatch};

pub const NEONBEAT_DIR: &str = ".neonbeat";
const STATE_FILE: &str = "state.json";

// <project_dir>/.neonbeat/
pub fn data_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(NEONBEAT_DIR)
}

// <project_dir>/.neonbeat/state.json
pub fn state_file_path(project_dir: &Path) -> PathBuf {
    data_dir(project_dir).join(STATE_FILE)
}

/// `Ok(None)` when nothing has been saved yet. A file that exists but can't
/// be parsed is an error so the caller can say so.
pub fn load_state(project_dir: &Path) -> anyhow::Result<Option<SnapshotPatch>> {
    let path = state_file_path(project_dir);
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let patch = SnapshotPatch::from_json(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(patch))
}

// Save the snapshot, making .neonbeat/ if it doesn't exist already
pub fn save_state(project_dir: &Path, snapshot: &Snapshot) -> anyhow::Result<PathBuf> {
    let path = state_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    // write then rename so a crash mid-save never leaves half a file
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, &path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(path)
}

/// Decides when a changed snapshot is worth writing: once it has held
/// still for `quiet`, so a knob being dragged is saved once at the end.
pub struct Autosave {
    quiet: Duration,
    saved: Snapshot,
    // latest unsaved state and when it was first seen
    changed: Option<(Snapshot, Instant)>,
}

impl Autosave {
    pub fn new(quiet: Duration, saved: Snapshot) -> Self {
        Self {
            quiet,
            saved,
            changed: None,
        }
    }

    /// Returns the snapshot to write, if any. The caller reports a
    /// successful write back through `mark_saved`.
    pub fn poll(&mut self, current: Snapshot, now: Instant) -> Option<Snapshot> {
        if current == self.saved {
            self.changed = None;
            return None;
        }
        match &self.changed {
            Some((seen, since)) if *seen == current => {
                if now.duration_since(*since) < self.quiet {
                    return None;
                }
                // retried after another quiet period if the write fails
                self.changed = Some((current.clone(), now));
                Some(current)
            }
            _ => {
                self.changed = Some((current, now));
                None
            }
        }
    }

    pub fn mark_saved(&mut self, snapshot: Snapshot) {
        if self.changed.as_ref().is_some_and(|(seen, _)| *seen == snapshot) {
            self.changed = None;
        }
        self.saved = snapshot;
    }
}
