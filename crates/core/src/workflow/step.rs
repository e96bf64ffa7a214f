//! Workflow steps.
//!
//! A [`Step`] is a named, stateless unit of work. It receives a copy of the
//! execution's accumulated data plus a [`StepContext`] and returns a partial
//! object that the executor merges back into the data.
//!
//! Four kinds are supported:
//! - [`Step::func`]: an async closure
//! - [`Step::agent`]: a prompt sent to an [`Agent`]
//! - [`Step::branch`]: the first branch whose predicate matches
//! - [`Step::parallel`]: nested steps run concurrently

use crate::agents::base::{Agent, AgentContext, AgentError, AgentEvent};
use crate::controller::SuspendController;
use fk_protocol::{StepType, Usage};
use futures::future::{join_all, BoxFuture};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_stream::StreamExt;
use tracing::debug;
use uuid::Uuid;

use super::schema::value_kind;

/// Accumulated workflow data. Always a JSON object.
pub type Data = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StepError {
    #[error("{0}")]
    Failed(String),

    #[error("step output must be a JSON object, got {0}")]
    InvalidOutput(&'static str),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),

    #[error("step panicked: {0}")]
    Panicked(String),
}

impl StepError {
    pub fn failed(message: impl Into<String>) -> Self {
        StepError::Failed(message.into())
    }

    /// Build from the payload of a caught panic.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        StepError::Panicked(message)
    }
}

/// Partial result of one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutput {
    pub data: Data,
    pub usage: Option<Usage>,
}

impl StepOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(data: Data) -> Self {
        Self { data, usage: None }
    }

    /// Build from a JSON value. `null` is an empty output.
    pub fn from_value(value: Value) -> Result<Self, StepError> {
        match value {
            Value::Object(data) => Ok(Self::new(data)),
            Value::Null => Ok(Self::empty()),
            other => Err(StepError::InvalidOutput(value_kind(&other))),
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

impl From<Data> for StepOutput {
    fn from(data: Data) -> Self {
        Self::new(data)
    }
}

/// Per-invocation view of the execution handed to a step.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub(crate) execution_id: Uuid,
    pub(crate) workflow_id: String,
    pub(crate) step_id: String,
    pub(crate) step_index: usize,
    pub(crate) user_id: Option<String>,
    pub(crate) conversation_id: Option<String>,
    pub(crate) controller: SuspendController,
    pub(crate) resume_data: Option<Value>,
}

impl StepContext {
    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn controller(&self) -> &SuspendController {
        &self.controller
    }

    /// Input handed to `resume`, present only on the step the run resumed at.
    pub fn resume_data(&self) -> Option<&Value> {
        self.resume_data.as_ref()
    }

    /// Suspend the execution at this step.
    ///
    /// The step should return right after calling this; its output is
    /// discarded and the step runs again on resume.
    pub fn suspend(&self, reason: &str) -> StepOutput {
        self.controller.suspend(Some(reason));
        StepOutput::empty()
    }

    pub fn is_cancelled(&self) -> bool {
        self.controller.is_cancelled()
    }
}

pub type StepFn =
    Arc<dyn Fn(Data, StepContext) -> BoxFuture<'static, Result<StepOutput, StepError>> + Send + Sync>;
pub type Predicate = Arc<dyn Fn(&Data) -> bool + Send + Sync>;
pub type PromptFn = Arc<dyn Fn(&Data) -> String + Send + Sync>;

/// One arm of a conditional step.
#[derive(Clone)]
pub struct Branch {
    predicate: Predicate,
    step: Step,
}

impl Branch {
    pub fn when<P>(predicate: P, step: Step) -> Self
    where
        P: Fn(&Data) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            step,
        }
    }

    /// A branch that always matches.
    pub fn otherwise(step: Step) -> Self {
        Self::when(|_| true, step)
    }
}

#[derive(Clone)]
pub enum StepKind {
    Func(StepFn),
    Agent {
        agent: Arc<dyn Agent>,
        prompt: PromptFn,
        output_key: String,
    },
    Conditional(Vec<Branch>),
    Parallel(Vec<Step>),
}

#[derive(Clone)]
pub struct Step {
    id: String,
    name: Option<String>,
    kind: StepKind,
}

impl Step {
    pub fn func<F, Fut>(id: impl Into<String>, f: F) -> Self
    where
        F: Fn(Data, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepOutput, StepError>> + Send + 'static,
    {
        let f: StepFn = Arc::new(move |data, ctx| Box::pin(f(data, ctx)));
        Self {
            id: id.into(),
            name: None,
            kind: StepKind::Func(f),
        }
    }

    /// Sends `prompt(data)` to `agent`; message chunks land under `"text"`.
    pub fn agent<P>(id: impl Into<String>, agent: Arc<dyn Agent>, prompt: P) -> Self
    where
        P: Fn(&Data) -> String + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: None,
            kind: StepKind::Agent {
                agent,
                prompt: Arc::new(prompt),
                output_key: "text".to_string(),
            },
        }
    }

    pub fn branch(id: impl Into<String>, branches: Vec<Branch>) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: StepKind::Conditional(branches),
        }
    }

    pub fn parallel(id: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: StepKind::Parallel(steps),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Change the key an agent step writes its text to. Ignored for other kinds.
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        if let StepKind::Agent { output_key, .. } = &mut self.kind {
            *output_key = key.into();
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn step_type(&self) -> StepType {
        match self.kind {
            StepKind::Func(_) => StepType::Func,
            StepKind::Agent { .. } => StepType::Agent,
            StepKind::Conditional(_) => StepType::Conditional,
            StepKind::Parallel(_) => StepType::Parallel,
        }
    }

    /// Ids of this step and every nested step.
    pub(crate) fn collect_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        ids.push(&self.id);
        match &self.kind {
            StepKind::Conditional(branches) => {
                for branch in branches {
                    branch.step.collect_ids(ids);
                }
            }
            StepKind::Parallel(steps) => {
                for step in steps {
                    step.collect_ids(ids);
                }
            }
            StepKind::Func(_) | StepKind::Agent { .. } => {}
        }
    }

    /// Run the step against a copy of the accumulated data.
    pub fn execute<'a>(
        &'a self,
        data: Data,
        ctx: &'a StepContext,
    ) -> BoxFuture<'a, Result<StepOutput, StepError>> {
        Box::pin(async move {
            match &self.kind {
                StepKind::Func(f) => f(data, ctx.clone()).await,
                StepKind::Agent {
                    agent,
                    prompt,
                    output_key,
                } => run_agent(agent.as_ref(), prompt(&data), output_key, ctx).await,
                StepKind::Conditional(branches) => {
                    match branches.iter().find(|b| (b.predicate)(&data)) {
                        Some(branch) => {
                            debug!(step_id = %self.id, branch = %branch.step.id, "branch selected");
                            branch.step.execute(data, ctx).await
                        }
                        None => Ok(StepOutput::empty()),
                    }
                }
                StepKind::Parallel(steps) => {
                    let outputs =
                        join_all(steps.iter().map(|step| step.execute(data.clone(), ctx))).await;

                    let mut merged = StepOutput::empty();
                    for output in outputs {
                        let output = output?;
                        merged.data.extend(output.data);
                        if let Some(usage) = output.usage {
                            merged
                                .usage
                                .get_or_insert_with(Usage::default)
                                .accumulate(&usage);
                        }
                    }
                    Ok(merged)
                }
            }
        })
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.step_type())
            .finish()
    }
}

/// Drive an agent until it completes or the controller's signal fires.
async fn run_agent(
    agent: &dyn Agent,
    instruction: String,
    output_key: &str,
    ctx: &StepContext,
) -> Result<StepOutput, StepError> {
    if !agent.check_availability().await {
        return Err(AgentError::NotAvailable(format!("agent for step '{}'", ctx.step_id)).into());
    }

    let context = AgentContext::new(instruction)
        .with_execution(ctx.execution_id, &ctx.step_id)
        .with_user(ctx.user_id.clone(), ctx.conversation_id.clone());
    let mut stream = agent.execute(&context).await?;

    let signal = ctx.controller.signal().clone();
    let mut text = String::new();
    let mut usage: Option<Usage> = None;

    loop {
        tokio::select! {
            biased;
            payload = signal.fired() => {
                debug!(step_id = %ctx.step_id, kind = ?payload.kind, "agent step interrupted");
                break;
            }
            next = stream.next() => match next {
                Some(Ok(AgentEvent::MessageChunk(chunk))) => text.push_str(&chunk),
                Some(Ok(AgentEvent::Usage(reported))) => {
                    usage.get_or_insert_with(Usage::default).accumulate(&reported);
                }
                Some(Ok(AgentEvent::Thought(thought))) => {
                    debug!(step_id = %ctx.step_id, %thought, "agent thought");
                }
                Some(Ok(AgentEvent::ToolCall(tool))) => {
                    debug!(step_id = %ctx.step_id, %tool, "agent tool call");
                }
                Some(Ok(AgentEvent::Completed)) | None => break,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    let mut data = Data::new();
    data.insert(output_key.to_string(), Value::String(text));
    let mut output = StepOutput::new(data);
    output.usage = usage;
    Ok(output)
}
