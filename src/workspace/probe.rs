//! Before/after workspace probing.
//!
//! The probe exists purely for side-effect detection: a cheap mtime+size
//! index taken around a tool body, diffed to recover file effects even when
//! the tool reports none. Execution correctness never depends on it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use ignore::WalkBuilder;

use crate::types::{FileChange, FileChangeKind};

/// Cap on indexed files; larger workspaces yield a partial snapshot.
pub const MAX_INDEX_ENTRIES: usize = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStat {
    size: u64,
    modified: Option<SystemTime>,
}

/// Snapshot of workspace files keyed by path relative to the root.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceIndex {
    entries: BTreeMap<PathBuf, FileStat>,
}

impl WorkspaceIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File effects between two snapshots of the same root.
    pub fn diff(before: &WorkspaceIndex, after: &WorkspaceIndex) -> Vec<FileChange> {
        let mut changes = Vec::new();
        for (path, stat) in &after.entries {
            match before.entries.get(path) {
                None => changes.push(FileChange {
                    path: path.clone(),
                    kind: FileChangeKind::Created,
                }),
                Some(previous) if previous != stat => changes.push(FileChange {
                    path: path.clone(),
                    kind: FileChangeKind::Modified,
                }),
                Some(_) => {}
            }
        }
        for path in before.entries.keys() {
            if !after.entries.contains_key(path) {
                changes.push(FileChange {
                    path: path.clone(),
                    kind: FileChangeKind::Deleted,
                });
            }
        }
        changes
    }
}

/// Index the workspace under `root`. The second value is true when the
/// snapshot is partial (entry cap reached, or some entries unreadable).
pub fn snapshot(root: &Path) -> (WorkspaceIndex, bool) {
    let mut entries = BTreeMap::new();
    let mut partial = false;

    let walk = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .follow_links(false)
        .build();

    for entry in walk {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => {
                partial = true;
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if entries.len() >= MAX_INDEX_ENTRIES {
            partial = true;
            break;
        }
        let Ok(metadata) = entry.metadata() else {
            partial = true;
            continue;
        };
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();
        entries.insert(
            relative,
            FileStat {
                size: metadata.len(),
                modified: metadata.modified().ok(),
            },
        );
    }

    (WorkspaceIndex { entries }, partial)
}
