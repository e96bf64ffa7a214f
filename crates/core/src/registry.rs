//! Directory of known workflow definitions.
//!
//! Writers serialize on a mutex, copy the current map, apply their change
//! and swap the new map in. Readers load the current `Arc` without taking
//! any lock and work against that snapshot. Running executions hold their
//! own `Arc<Workflow>`.

use crate::workflow::Workflow;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

type WorkflowMap = HashMap<String, Arc<Workflow>>;

/// Process-wide workflow directory, injected wherever look-ups are needed.
///
/// Clones share the same underlying map.
#[derive(Clone)]
pub struct WorkflowRegistry {
    workflows: Arc<ArcSwap<WorkflowMap>>,
    writer: Arc<Mutex<()>>,
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self {
            workflows: Arc::new(ArcSwap::from_pointee(WorkflowMap::new())),
            writer: Arc::new(Mutex::new(())),
        }
    }
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any prior one with the same id.
    ///
    /// Returns the replaced definition.
    pub fn register(&self, workflow: impl Into<Arc<Workflow>>) -> Option<Arc<Workflow>> {
        let workflow = workflow.into();
        let id = workflow.id().to_string();

        let previous = self.update(|map| map.insert(id.clone(), workflow));
        info!(workflow_id = %id, replaced = previous.is_some(), "workflow registered");
        previous
    }

    pub fn unregister(&self, id: &str) -> Option<Arc<Workflow>> {
        let removed = self.update(|map| map.remove(id));
        if removed.is_some() {
            info!(workflow_id = %id, "workflow unregistered");
        }
        removed
    }

    /// Look up a definition. Unknown ids yield `None`.
    pub fn get(&self, id: &str) -> Option<Arc<Workflow>> {
        self.snapshot().get(id).cloned()
    }

    /// All definitions, ordered by id.
    pub fn list(&self) -> Vec<Arc<Workflow>> {
        let mut workflows: Vec<_> = self.snapshot().values().cloned().collect();
        workflows.sort_by(|a, b| a.id().cmp(b.id()));
        workflows
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn snapshot(&self) -> Arc<WorkflowMap> {
        self.workflows.load_full()
    }

    fn update<R>(&self, change: impl FnOnce(&mut WorkflowMap) -> R) -> R {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = WorkflowMap::clone(&self.workflows.load());
        let result = change(&mut map);
        self.workflows.store(Arc::new(map));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{Step, StepOutput};

    fn workflow(id: &str, name: &str) -> Workflow {
        Workflow::builder(id)
            .name(name)
            .step(Step::func("noop", |_d, _c| async { Ok(StepOutput::empty()) }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let registry = WorkflowRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.register(workflow("greeting", "Greeting")).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("greeting").unwrap().name(), "Greeting");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_register_replaces_same_id() {
        let registry = WorkflowRegistry::new();
        registry.register(workflow("greeting", "v1"));

        let previous = registry.register(workflow("greeting", "v2")).unwrap();
        assert_eq!(previous.name(), "v1");
        assert_eq!(registry.get("greeting").unwrap().name(), "v2");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = WorkflowRegistry::new();
        registry.register(workflow("greeting", "Greeting"));

        assert!(registry.unregister("greeting").is_some());
        assert!(registry.unregister("greeting").is_none());
        assert!(registry.get("greeting").is_none());
    }

    #[test]
    fn test_list_is_sorted_by_id() {
        let registry = WorkflowRegistry::new();
        registry.register(workflow("b", "B"));
        registry.register(workflow("a", "A"));
        registry.register(workflow("c", "C"));

        let ids: Vec<_> = registry.list().iter().map(|w| w.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_held_definition_survives_replacement() {
        let registry = WorkflowRegistry::new();
        registry.register(workflow("greeting", "v1"));

        let held = registry.get("greeting").unwrap();
        registry.register(workflow("greeting", "v2"));
        registry.unregister("greeting");

        assert_eq!(held.name(), "v1");
    }

    #[test]
    fn test_clones_share_state() {
        let registry = WorkflowRegistry::new();
        let other = registry.clone();
        other.register(workflow("greeting", "Greeting"));
        assert!(registry.get("greeting").is_some());
    }

    #[test]
    fn test_reads_do_not_wait_on_writer() {
        let registry = WorkflowRegistry::new();
        registry.register(workflow("greeting", "Greeting"));

        let _writer = registry.writer.lock().unwrap();
        assert_eq!(registry.get("greeting").unwrap().name(), "Greeting");
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_snapshot_is_stable_across_writes() {
        let registry = WorkflowRegistry::new();
        registry.register(workflow("a", "A"));

        let before = registry.snapshot();
        registry.register(workflow("b", "B"));
        registry.unregister("a");

        assert_eq!(before.len(), 1);
        assert!(before.contains_key("a"));
        assert_eq!(registry.snapshot().keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = WorkflowRegistry::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.register(workflow(&format!("wf-{i}"), "concurrent"));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.len(), 16);
    }
}
