//! Execution manager for coordinating multiple workflow executions.
//!
//! The ExecutionManager is the central orchestrator for background
//! executions. It looks workflows up in an injected registry, keeps each
//! live execution's controller by id, and hands suspension snapshots to a
//! [`SnapshotStore`] so they can be resumed later.

use crate::controller::SuspendController;
use crate::engine::{RunOptions, WorkflowEngine};
use crate::error::{WorkflowError, WorkflowResult};
use crate::registry::WorkflowRegistry;
use crate::state::store::{InMemorySnapshotStore, SnapshotStore};
use crate::stream::WorkflowStream;
use fk_protocol::{ExecutionResult, ExecutionStatus, SuspensionSnapshot};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Terminal outcome of a tracked execution. Failures that carry no
/// recorded state keep only their message.
type Outcome = Result<ExecutionResult, String>;

struct TrackedExecution {
    workflow_id: String,
    controller: SuspendController,
    outcome: watch::Receiver<Option<Outcome>>,
}

impl TrackedExecution {
    fn status(&self) -> ExecutionStatus {
        match &*self.outcome.borrow() {
            None => ExecutionStatus::Running,
            Some(Ok(result)) => result.status,
            Some(Err(_)) => ExecutionStatus::Error,
        }
    }
}

/// Manages all workflow executions started through it.
///
/// The ExecutionManager provides a centralized interface for:
/// - Starting executions of registered workflows
/// - Suspending, cancelling and resuming them by id
/// - Waiting for and querying their terminal state
///
/// Finished executions stay queryable until [`ExecutionManager::forget`] or
/// [`ExecutionManager::prune`] drops them.
pub struct ExecutionManager {
    engine: WorkflowEngine,
    registry: WorkflowRegistry,
    store: Arc<dyn SnapshotStore>,

    /// Every execution started by this manager, indexed by execution id.
    executions: Arc<Mutex<HashMap<Uuid, TrackedExecution>>>,
}

impl ExecutionManager {
    /// Create a manager that keeps snapshots in memory.
    ///
    /// # Arguments
    ///
    /// * `engine` - The engine executions run on
    /// * `registry` - Where workflows are looked up by id
    pub fn new(engine: WorkflowEngine, registry: WorkflowRegistry) -> Self {
        Self::with_store(engine, registry, Arc::new(InMemorySnapshotStore::new()))
    }

    pub fn with_store(
        engine: WorkflowEngine,
        registry: WorkflowRegistry,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            engine,
            registry,
            store,
            executions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    /// Start executing a registered workflow in the background.
    ///
    /// The execution id is returned as soon as the input is validated and
    /// the task is spawned. Consumers may attach to its events through
    /// `engine().streams()` from then on.
    ///
    /// # Errors
    ///
    /// Returns an error if the workflow is not registered or the input
    /// fails validation.
    pub async fn start(
        &self,
        workflow_id: &str,
        input: Value,
        options: RunOptions,
    ) -> WorkflowResult<Uuid> {
        let workflow = self
            .registry
            .get(workflow_id)
            .ok_or_else(|| WorkflowError::WorkflowNotFound(workflow_id.to_string()))?;

        let (controller, options) = Self::ensure_controller(options);
        let stream = self.engine.stream(&workflow, input, options)?;
        let execution_id = stream.execution_id();

        self.track(workflow_id.to_string(), controller, stream).await;
        info!(%execution_id, %workflow_id, "execution started");
        Ok(execution_id)
    }

    /// Ask a running execution to suspend at its next step boundary.
    ///
    /// Returns `false` if the execution already finished or its controller
    /// ignored the request.
    pub async fn suspend(&self, execution_id: Uuid, reason: Option<&str>) -> WorkflowResult<bool> {
        let executions = self.executions.lock().await;
        let tracked = executions
            .get(&execution_id)
            .ok_or(WorkflowError::ExecutionNotFound(execution_id))?;

        if tracked.status().is_terminal() {
            return Ok(false);
        }
        Ok(tracked.controller.suspend(reason))
    }

    /// Cancel a running execution. Cancellation is final.
    pub async fn cancel(&self, execution_id: Uuid, reason: Option<&str>) -> WorkflowResult<bool> {
        let executions = self.executions.lock().await;
        let tracked = executions
            .get(&execution_id)
            .ok_or(WorkflowError::ExecutionNotFound(execution_id))?;

        if tracked.status().is_terminal() {
            return Ok(false);
        }
        Ok(tracked.controller.cancel(reason))
    }

    /// Resume a suspended execution with new input.
    ///
    /// The stored snapshot is taken out of the store before the execution
    /// restarts, so concurrent calls for the same id start it at most once.
    /// It is put back if the resume is rejected. The execution continues in
    /// the background under the same id with a fresh controller, unless
    /// `options` supplies one.
    ///
    /// # Errors
    ///
    /// Returns an error if no snapshot is stored for the id, its workflow
    /// is no longer registered, or the snapshot does not fit the workflow.
    pub async fn resume(
        &self,
        execution_id: Uuid,
        new_input: Value,
        options: RunOptions,
    ) -> WorkflowResult<Uuid> {
        let snapshot = self
            .store
            .remove(execution_id)
            .await
            .map_err(|e| WorkflowError::Internal(e.to_string()))?
            .ok_or(WorkflowError::ExecutionNotFound(execution_id))?;

        let (controller, options) = Self::ensure_controller(options);
        let started = match self.registry.get(&snapshot.workflow_id) {
            Some(workflow) => self
                .engine
                .resume_stream(&workflow, &snapshot, new_input, options),
            None => Err(WorkflowError::WorkflowNotFound(snapshot.workflow_id.clone())),
        };

        let stream = match started {
            Ok(stream) => stream,
            Err(e) => {
                if let Err(save_err) = self.store.save(snapshot).await {
                    warn!(%execution_id, error = %save_err, "failed to restore rejected snapshot");
                }
                return Err(e);
            }
        };

        self.track(snapshot.workflow_id, controller, stream).await;
        Ok(execution_id)
    }

    /// Wait for an execution to reach a terminal state.
    ///
    /// Step and result-validation failures resolve to `Ok` with status
    /// `error`; the recorded state is what callers of this method inspect.
    pub async fn wait(&self, execution_id: Uuid) -> WorkflowResult<ExecutionResult> {
        let mut outcome = {
            let executions = self.executions.lock().await;
            executions
                .get(&execution_id)
                .ok_or(WorkflowError::ExecutionNotFound(execution_id))?
                .outcome
                .clone()
        };

        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|e| WorkflowError::Internal(e.to_string()))?
            .clone();

        match settled {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(WorkflowError::Internal(message)),
            None => Err(WorkflowError::Internal(format!(
                "execution {execution_id} ended without an outcome"
            ))),
        }
    }

    /// Current status of an execution, or `None` if it is unknown.
    pub async fn status(&self, execution_id: Uuid) -> Option<ExecutionStatus> {
        let executions = self.executions.lock().await;
        executions.get(&execution_id).map(TrackedExecution::status)
    }

    /// Stored snapshot of a suspended execution.
    pub async fn snapshot(&self, execution_id: Uuid) -> WorkflowResult<Option<SuspensionSnapshot>> {
        self.store
            .load(execution_id)
            .await
            .map_err(|e| WorkflowError::Internal(e.to_string()))
    }

    /// Ids and workflow ids of every tracked execution with its status.
    pub async fn list(&self) -> Vec<(Uuid, String, ExecutionStatus)> {
        let executions = self.executions.lock().await;
        executions
            .iter()
            .map(|(id, tracked)| (*id, tracked.workflow_id.clone(), tracked.status()))
            .collect()
    }

    /// Get the number of executions still running.
    pub async fn active_count(&self) -> usize {
        let executions = self.executions.lock().await;
        executions
            .values()
            .filter(|tracked| !tracked.status().is_terminal())
            .count()
    }

    /// Stop tracking a finished execution.
    ///
    /// Returns `false` without removing anything while the execution is
    /// still running. A stored snapshot is kept, so a forgotten suspended
    /// execution can still be resumed.
    pub async fn forget(&self, execution_id: Uuid) -> WorkflowResult<bool> {
        let mut executions = self.executions.lock().await;
        let tracked = executions
            .get(&execution_id)
            .ok_or(WorkflowError::ExecutionNotFound(execution_id))?;

        if !tracked.status().is_terminal() {
            return Ok(false);
        }
        executions.remove(&execution_id);
        debug!(%execution_id, "execution forgotten");
        Ok(true)
    }

    /// Stop tracking every finished execution. Returns how many were removed.
    pub async fn prune(&self) -> usize {
        let mut executions = self.executions.lock().await;
        let before = executions.len();
        executions.retain(|_, tracked| !tracked.status().is_terminal());
        let removed = before - executions.len();
        if removed > 0 {
            info!(removed, "pruned finished executions");
        }
        removed
    }

    fn ensure_controller(options: RunOptions) -> (SuspendController, RunOptions) {
        match &options.controller {
            Some(controller) => (controller.clone(), options),
            None => {
                let controller = SuspendController::new();
                (controller.clone(), options.with_controller(controller))
            }
        }
    }

    /// Record the execution and spawn a task that settles its outcome.
    async fn track(&self, workflow_id: String, controller: SuspendController, stream: WorkflowStream) {
        let execution_id = stream.execution_id();
        let (tx, rx) = watch::channel(None);

        self.executions.lock().await.insert(
            execution_id,
            TrackedExecution {
                workflow_id,
                controller,
                outcome: rx,
            },
        );

        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let outcome: Outcome = match stream.result().await {
                Ok(result) => Ok(result),
                Err(e) => e.execution_result().cloned().ok_or_else(|| e.to_string()),
            };

            if let Ok(ExecutionResult {
                suspension: Some(snapshot),
                ..
            }) = &outcome
            {
                if let Err(e) = store.save(snapshot.clone()).await {
                    warn!(%execution_id, error = %e, "failed to store suspension snapshot");
                }
            }

            tx.send_replace(Some(outcome));
        });
    }
}
