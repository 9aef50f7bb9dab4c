//! Tool descriptors, the registry boundary, and the per-run capability scope.

pub mod schema;
pub mod scope;

pub use schema::{ToolDescriptor, ToolKind, ToolRegistry, ToolSchema, DEFAULT_RESULT_BUDGET};
pub use scope::ToolScopeView;
