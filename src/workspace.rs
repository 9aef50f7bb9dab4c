//! Workspace side-effect detection.

pub mod probe;

pub use probe::{snapshot, WorkspaceIndex, MAX_INDEX_ENTRIES};
