//! Per-run options.

use crate::controller::SuspendController;
use std::time::Duration;
use uuid::Uuid;

/// Options accepted by `run`, `stream` and `resume`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Externally created controller. A fresh one is used when absent.
    pub controller: Option<SuspendController>,

    pub user_id: Option<String>,

    pub conversation_id: Option<String>,

    /// Cancel with reason `"timeout"` after this long.
    pub timeout: Option<Duration>,

    /// Use this id instead of generating one. Ignored on resume, which keeps
    /// the snapshot's id.
    pub execution_id: Option<Uuid>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_controller(mut self, controller: SuspendController) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_execution_id(mut self, execution_id: Uuid) -> Self {
        self.execution_id = Some(execution_id);
        self
    }
}
