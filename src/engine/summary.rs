//! Best-effort partial-progress section for unsuccessful terminations.
//!
//! Whatever the run managed before stopping (narration, files it looked
//! at, changes it made) is appended to the summary so partial work is
//! never silently lost.

use std::path::PathBuf;

use crate::types::{FileChange, FileChangeKind};

const NARRATION_LIMIT: usize = 600;

/// Build the "work already completed" section, or `None` when there is
/// nothing to report.
pub(crate) fn partial_progress_section(
    assistant_texts: &[&str],
    observed_files: &[PathBuf],
    file_changes: &[FileChange],
) -> Option<String> {
    if assistant_texts.is_empty() && observed_files.is_empty() && file_changes.is_empty() {
        return None;
    }

    let mut section = String::from("Work already completed before the stop:");

    if let Some(last) = assistant_texts.last() {
        let mut narration = (*last).to_string();
        if narration.chars().count() > NARRATION_LIMIT {
            narration = narration.chars().take(NARRATION_LIMIT).collect();
            narration.push('…');
        }
        section.push_str("\n- Last progress note: ");
        section.push_str(&narration);
    }

    if !observed_files.is_empty() {
        let listed: Vec<String> = observed_files
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        section.push_str("\n- Files touched: ");
        section.push_str(&listed.join(", "));
    }

    if !file_changes.is_empty() {
        let mut created = 0;
        let mut modified = 0;
        let mut deleted = 0;
        for change in file_changes {
            match change.kind {
                FileChangeKind::Created => created += 1,
                FileChangeKind::Modified => modified += 1,
                FileChangeKind::Deleted => deleted += 1,
            }
        }
        section.push_str(&format!(
            "\n- File changes: {created} created, {modified} modified, {deleted} deleted"
        ));
    }

    Some(section)
}
