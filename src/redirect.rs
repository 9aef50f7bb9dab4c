//! Copy-on-write redirection of protected file paths.
//!
//! Tools must never mutate a protected source file in place. Given a map
//! from protected relative path to shadow-copy relative path, any path-
//! bearing argument naming a protected file is rewritten to its shadow
//! before execution, preserving the caller's prefix style.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// Argument fields that are checked for protected paths.
pub const PATH_ARGUMENT_FIELDS: [&str; 6] = [
    "path",
    "file_path",
    "source",
    "source_path",
    "output_path",
    "target_path",
];

#[derive(Debug, Clone, Default)]
pub struct PathRedirector {
    workspace_root: PathBuf,
    mapping: BTreeMap<PathBuf, PathBuf>,
}

impl PathRedirector {
    pub fn new(workspace_root: impl Into<PathBuf>, mapping: BTreeMap<PathBuf, PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            mapping,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Rewrite protected paths in `arguments` in place. Returns one warning
    /// string per rewrite; no mapping means no-op.
    pub fn apply(&self, arguments: &mut Map<String, Value>) -> Vec<String> {
        if self.mapping.is_empty() {
            return Vec::new();
        }
        let mut warnings = Vec::new();
        for field in PATH_ARGUMENT_FIELDS {
            let Some(Value::String(raw)) = arguments.get(field) else {
                continue;
            };
            let Some((rewritten, protected)) = self.rewrite(raw) else {
                continue;
            };
            warnings.push(format!(
                "argument '{field}' referenced protected file '{}'; redirected to its working copy '{rewritten}'",
                protected.display(),
            ));
            arguments.insert(field.to_string(), Value::String(rewritten));
        }
        warnings
    }

    /// Match `raw` against each protected path, in relative form and in
    /// workspace-root-prefixed form, and return the shadow path in the same
    /// prefix style.
    fn rewrite(&self, raw: &str) -> Option<(String, &Path)> {
        let candidate = Path::new(raw);
        for (protected, shadow) in &self.mapping {
            if candidate == protected.as_path() {
                return Some((shadow.display().to_string(), protected));
            }
            if candidate == self.workspace_root.join(protected) {
                return Some((
                    self.workspace_root.join(shadow).display().to_string(),
                    protected,
                ));
            }
        }
        None
    }
}
