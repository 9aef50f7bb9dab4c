//! Capability-restricted projection over the global tool set.

use std::collections::BTreeSet;

use crate::config::{CapabilityMode, TaskConfig};
use crate::tools::schema::{ToolKind, ToolRegistry};

/// Read-only membership snapshot, fixed for the lifetime of one run.
///
/// Later mutation of the global registry does not change which tools a
/// running task may call; the view holds names, and calls re-resolve the
/// descriptor through the registry at dispatch time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolScopeView {
    members: BTreeSet<String>,
}

impl ToolScopeView {
    /// Project the registry through the task config: allow-list intersection,
    /// deny-list removal, then capability-mode meta-tool exclusion.
    pub fn for_run(registry: &dyn ToolRegistry, config: &TaskConfig) -> Self {
        let mut members = BTreeSet::new();
        for name in registry.names() {
            let Some(descriptor) = registry.get(&name) else {
                continue;
            };
            if !config.allowed_tools.is_empty() && !config.allowed_tools.contains(&name) {
                continue;
            }
            if config.disallowed_tools.contains(&name) {
                continue;
            }
            let excluded = match descriptor.kind {
                ToolKind::Delegation => true,
                ToolKind::Catalog => config.capability_mode == CapabilityMode::Scoped,
                ToolKind::Standard => false,
            };
            if excluded {
                continue;
            }
            members.insert(name);
        }
        Self { members }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Map, Value};

    use super::*;
    use crate::error::TaskError;
    use crate::tools::schema::ToolDescriptor;

    struct ListRegistry {
        tools: Vec<Arc<ToolDescriptor>>,
    }

    impl ListRegistry {
        fn new(tools: Vec<ToolDescriptor>) -> Self {
            Self {
                tools: tools.into_iter().map(Arc::new).collect(),
            }
        }
    }

    #[async_trait]
    impl ToolRegistry for ListRegistry {
        fn names(&self) -> Vec<String> {
            self.tools.iter().map(|t| t.name.clone()).collect()
        }

        fn get(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
            self.tools.iter().find(|t| t.name == name).cloned()
        }

        async fn call(
            &self,
            _name: &str,
            _arguments: &Map<String, Value>,
            _scope: &ToolScopeView,
        ) -> Result<Value, TaskError> {
            Ok(Value::Null)
        }
    }

    fn registry() -> ListRegistry {
        ListRegistry::new(vec![
            ToolDescriptor::new("read_sheet", "read a sheet", json!({})),
            ToolDescriptor::new("write_sheet", "write a sheet", json!({})),
            ToolDescriptor::new("list_tools", "list the catalog", json!({}))
                .with_kind(ToolKind::Catalog),
            ToolDescriptor::new("delegate_task", "spawn a subtask", json!({}))
                .with_kind(ToolKind::Delegation),
        ])
    }

    #[test]
    fn scoped_mode_hides_all_meta_tools() {
        let config = TaskConfig::new("t", "d");
        let scope = ToolScopeView::for_run(&registry(), &config);
        assert!(scope.contains("read_sheet"));
        assert!(scope.contains("write_sheet"));
        assert!(!scope.contains("list_tools"));
        assert!(!scope.contains("delegate_task"));
    }

    #[test]
    fn full_mode_keeps_catalog_but_never_delegation() {
        let mut config = TaskConfig::new("t", "d");
        config.capability_mode = CapabilityMode::Full;
        let scope = ToolScopeView::for_run(&registry(), &config);
        assert!(scope.contains("list_tools"));
        assert!(!scope.contains("delegate_task"));
    }

    #[test]
    fn allow_list_intersects_and_deny_list_removes() {
        let mut config = TaskConfig::new("t", "d");
        config.allowed_tools = vec!["read_sheet".to_string(), "write_sheet".to_string()];
        config.disallowed_tools = vec!["write_sheet".to_string()];
        let scope = ToolScopeView::for_run(&registry(), &config);
        assert_eq!(scope.iter().collect::<Vec<_>>(), vec!["read_sheet"]);
    }

    #[test]
    fn membership_is_a_snapshot_independent_of_the_registry() {
        let config = TaskConfig::new("t", "d");
        let scope = {
            let registry = registry();
            ToolScopeView::for_run(&registry, &config)
            // registry dropped here; the view keeps its members
        };
        assert_eq!(scope.len(), 2);
        assert!(scope.contains("read_sheet"));
    }
}
