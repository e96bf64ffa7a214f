//! Storage for suspension snapshots.
//!
//! The engine never persists anything itself; the [`ExecutionManager`]
//! hands each snapshot to a [`SnapshotStore`] so suspended executions can
//! be resumed later, possibly by another process.
//!
//! [`ExecutionManager`]: crate::state::ExecutionManager

use anyhow::Result;
use async_trait::async_trait;
use fk_protocol::SuspensionSnapshot;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: SuspensionSnapshot) -> Result<()>;

    async fn load(&self, execution_id: Uuid) -> Result<Option<SuspensionSnapshot>>;

    /// Remove and return the snapshot, e.g. once its execution is resumed.
    async fn remove(&self, execution_id: Uuid) -> Result<Option<SuspensionSnapshot>>;
}

/// Keeps snapshots in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Mutex<HashMap<Uuid, SuspensionSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.lock().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: SuspensionSnapshot) -> Result<()> {
        self.snapshots
            .lock()
            .await
            .insert(snapshot.execution_id, snapshot);
        Ok(())
    }

    async fn load(&self, execution_id: Uuid) -> Result<Option<SuspensionSnapshot>> {
        Ok(self.snapshots.lock().await.get(&execution_id).cloned())
    }

    async fn remove(&self, execution_id: Uuid) -> Result<Option<SuspensionSnapshot>> {
        Ok(self.snapshots.lock().await.remove(&execution_id))
    }
}
