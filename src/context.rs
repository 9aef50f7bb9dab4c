//! Task-local bindings for the active file-access guard and sandbox root.
//!
//! Tool bodies run outside this crate and cannot take the run's state as an
//! argument. The engine binds a [`ToolContext`] immediately around each tool
//! body and the binding is dropped on scope exit, success or failure, so
//! concurrent runs in one process never see each other's guard. A process-
//! wide default exists only as a single-session fallback.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crate::redirect::PathRedirector;

#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Root the tool is allowed to touch.
    pub sandbox_root: PathBuf,
    /// Active copy-on-write mapping, when the run protects any files.
    pub guard: Option<Arc<PathRedirector>>,
}

tokio::task_local! {
    static ACTIVE: Arc<ToolContext>;
}

static SESSION_DEFAULT: OnceLock<Arc<ToolContext>> = OnceLock::new();

impl ToolContext {
    pub fn new(sandbox_root: impl Into<PathBuf>) -> Self {
        Self {
            sandbox_root: sandbox_root.into(),
            guard: None,
        }
    }

    pub fn with_guard(mut self, guard: Arc<PathRedirector>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Run `fut` with `context` bound as the active tool context.
    pub async fn bind<F>(context: Arc<ToolContext>, fut: F) -> F::Output
    where
        F: std::future::Future,
    {
        ACTIVE.scope(context, fut).await
    }

    /// The context bound around the current tool body, falling back to the
    /// session default when called outside any binding.
    pub fn current() -> Option<Arc<ToolContext>> {
        ACTIVE
            .try_with(Arc::clone)
            .ok()
            .or_else(|| SESSION_DEFAULT.get().cloned())
    }

    /// Install the single-session fallback. Returns false when a default was
    /// already installed; the first one wins.
    pub fn install_session_default(context: Arc<ToolContext>) -> bool {
        SESSION_DEFAULT.set(context).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binding_is_visible_inside_and_gone_after() {
        let context = Arc::new(ToolContext::new("/tmp/run-a"));
        let seen = ToolContext::bind(context.clone(), async {
            ToolContext::current().map(|c| c.sandbox_root.clone())
        })
        .await;
        assert_eq!(seen, Some(PathBuf::from("/tmp/run-a")));
        // outside the scope, only the (unset-or-global) default remains
        let after = ToolContext::current();
        assert!(after.is_none() || after.unwrap().sandbox_root != PathBuf::from("/tmp/run-a"));
    }

    #[tokio::test]
    async fn nested_bindings_shadow_and_restore() {
        let outer = Arc::new(ToolContext::new("/tmp/outer"));
        let inner = Arc::new(ToolContext::new("/tmp/inner"));
        ToolContext::bind(outer, async {
            assert_eq!(
                ToolContext::current().unwrap().sandbox_root,
                PathBuf::from("/tmp/outer")
            );
            ToolContext::bind(inner, async {
                assert_eq!(
                    ToolContext::current().unwrap().sandbox_root,
                    PathBuf::from("/tmp/inner")
                );
            })
            .await;
            assert_eq!(
                ToolContext::current().unwrap().sandbox_root,
                PathBuf::from("/tmp/outer")
            );
        })
        .await;
    }

    #[tokio::test]
    async fn concurrent_bindings_do_not_leak_across_tasks() {
        let a = tokio::spawn(ToolContext::bind(
            Arc::new(ToolContext::new("/tmp/task-a")),
            async {
                tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
                ToolContext::current().unwrap().sandbox_root.clone()
            },
        ));
        let b = tokio::spawn(ToolContext::bind(
            Arc::new(ToolContext::new("/tmp/task-b")),
            async { ToolContext::current().unwrap().sandbox_root.clone() },
        ));
        assert_eq!(a.await.unwrap(), PathBuf::from("/tmp/task-a"));
        assert_eq!(b.await.unwrap(), PathBuf::from("/tmp/task-b"));
    }
}
