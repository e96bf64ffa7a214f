//! Scripted agent that replays a fixed list of events.

use crate::agents::base::{Agent, AgentContext, AgentError, AgentEvent, AgentStream};
use async_trait::async_trait;
use fk_protocol::Usage;
use std::time::Duration;

#[derive(Clone)]
pub struct MockAgent {
    available: bool,
    events: Vec<Result<AgentEvent, AgentError>>,
    delay: Option<Duration>,
}

impl MockAgent {
    pub fn new(available: bool, events: Vec<Result<AgentEvent, AgentError>>) -> Self {
        Self {
            available,
            events,
            delay: None,
        }
    }

    /// Replies with `text` and reports the given token usage.
    pub fn replying(text: &str, usage: Usage) -> Self {
        Self::new(
            true,
            vec![
                Ok(AgentEvent::Thought("Mock agent thinking".to_string())),
                Ok(AgentEvent::MessageChunk(text.to_string())),
                Ok(AgentEvent::Usage(usage)),
                Ok(AgentEvent::Completed),
            ],
        )
    }

    pub fn unavailable() -> Self {
        Self::new(false, vec![])
    }

    pub fn failing() -> Self {
        Self::new(
            true,
            vec![
                Ok(AgentEvent::Thought("Starting...".to_string())),
                Err(AgentError::ExecutionError("Mock failure".to_string())),
            ],
        )
    }

    /// Sleep before each event, to simulate a slow model.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Agent for MockAgent {
    async fn check_availability(&self) -> bool {
        self.available
    }

    async fn execute(&self, _context: &AgentContext) -> Result<AgentStream, AgentError> {
        if !self.available {
            return Err(AgentError::NotAvailable("Mock agent not available".to_string()));
        }

        let events = self.events.clone();
        let delay = self.delay;
        let stream = async_stream::stream! {
            for event in events {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                yield event;
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_mock_agent_replying() {
        let agent = MockAgent::replying("hi", Usage::new(3, 1));
        assert!(agent.check_availability().await);

        let stream = agent
            .execute(&AgentContext::new("test".to_string()))
            .await
            .unwrap();
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], Ok(AgentEvent::Thought(_))));
        assert_eq!(events[1], Ok(AgentEvent::MessageChunk("hi".to_string())));
        assert_eq!(events[2], Ok(AgentEvent::Usage(Usage::new(3, 1))));
        assert_eq!(events[3], Ok(AgentEvent::Completed));
    }

    #[tokio::test]
    async fn test_mock_agent_unavailable() {
        let agent = MockAgent::unavailable();
        assert!(!agent.check_availability().await);

        let result = agent.execute(&AgentContext::new("test".to_string())).await;
        assert!(matches!(result, Err(AgentError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_mock_agent_failing() {
        let agent = MockAgent::failing();

        let stream = agent
            .execute(&AgentContext::new("test".to_string()))
            .await
            .unwrap();
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Err(AgentError::ExecutionError(_))));
    }
}
