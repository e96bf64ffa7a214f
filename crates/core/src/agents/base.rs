//! Base Agent trait and supporting types.
//!
//! Agent steps hand a prompt to an [`Agent`] and fold the events it streams
//! back into the step's output.

use async_trait::async_trait;
use fk_protocol::Usage;
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;
use uuid::Uuid;

/// Context information passed to agents during execution.
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// The prompt built from the workflow's accumulated data.
    pub instruction: String,

    /// Execution the invoking step belongs to.
    pub execution_id: Uuid,

    /// Id of the invoking step.
    pub step_id: String,

    pub user_id: Option<String>,

    pub conversation_id: Option<String>,
}

impl AgentContext {
    /// Create a context for a standalone instruction.
    ///
    /// Defaults:
    /// - execution_id: nil
    /// - step_id: empty
    /// - user_id, conversation_id: none
    pub fn new(instruction: String) -> Self {
        Self {
            instruction,
            execution_id: Uuid::nil(),
            step_id: String::new(),
            user_id: None,
            conversation_id: None,
        }
    }

    pub fn with_execution(mut self, execution_id: Uuid, step_id: &str) -> Self {
        self.execution_id = execution_id;
        self.step_id = step_id.to_string();
        self
    }

    pub fn with_user(mut self, user_id: Option<String>, conversation_id: Option<String>) -> Self {
        self.user_id = user_id;
        self.conversation_id = conversation_id;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    Thought(String),
    ToolCall(String),
    MessageChunk(String),
    Usage(Usage),
    Completed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent not available: {0}")]
    NotAvailable(String),
    #[error("API call failed: {0}")]
    ApiError(String),
    #[error("Stream parsing error: {0}")]
    StreamParseError(String),
    #[error("Execution failed: {0}")]
    ExecutionError(String),
}

pub type AgentStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send>>;

#[async_trait]
pub trait Agent: Send + Sync {
    async fn check_availability(&self) -> bool;
    async fn execute(&self, context: &AgentContext) -> Result<AgentStream, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    struct EchoAgent {
        available: bool,
    }

    #[async_trait]
    impl Agent for EchoAgent {
        async fn check_availability(&self) -> bool {
            self.available
        }

        async fn execute(&self, context: &AgentContext) -> Result<AgentStream, AgentError> {
            if !self.available {
                return Err(AgentError::NotAvailable("Echo agent not available".to_string()));
            }

            let instruction = context.instruction.clone();
            let stream = tokio_stream::iter(vec![
                Ok(AgentEvent::Thought(format!("Processing: {instruction}"))),
                Ok(AgentEvent::MessageChunk(instruction)),
                Ok(AgentEvent::Usage(Usage::new(4, 2))),
                Ok(AgentEvent::Completed),
            ]);

            Ok(Box::pin(stream))
        }
    }

    #[tokio::test]
    async fn test_agent_execute_success() {
        let agent = EchoAgent { available: true };
        let context = AgentContext::new("hello".to_string());

        let stream = agent.execute(&context).await.unwrap();
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], Ok(AgentEvent::Thought(_))));
        assert_eq!(events[1], Ok(AgentEvent::MessageChunk("hello".to_string())));
        assert_eq!(events[2], Ok(AgentEvent::Usage(Usage::new(4, 2))));
        assert_eq!(events[3], Ok(AgentEvent::Completed));
    }

    #[tokio::test]
    async fn test_agent_execute_unavailable() {
        let agent = EchoAgent { available: false };
        assert!(!agent.check_availability().await);

        let result = agent.execute(&AgentContext::new("x".to_string())).await;
        assert!(matches!(result, Err(AgentError::NotAvailable(_))));
    }

    #[test]
    fn test_agent_context_builder() {
        let execution_id = Uuid::new_v4();
        let context = AgentContext::new("Test".to_string())
            .with_execution(execution_id, "summarize")
            .with_user(Some("u1".to_string()), None);

        assert_eq!(context.instruction, "Test");
        assert_eq!(context.execution_id, execution_id);
        assert_eq!(context.step_id, "summarize");
        assert_eq!(context.user_id.as_deref(), Some("u1"));
        assert!(context.conversation_id.is_none());
    }
}
