//! Immutable workflow definitions.

use crate::error::WorkflowError;
use crate::workflow::schema::{AnySchema, Schema};
use crate::workflow::step::Step;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A named, ordered pipeline of steps with input and result contracts.
///
/// Built once through [`WorkflowBuilder`] and shared behind an `Arc` by the
/// registry and by every execution running it.
pub struct Workflow {
    id: String,
    name: String,
    description: Option<String>,
    input_schema: Arc<dyn Schema>,
    result_schema: Arc<dyn Schema>,
    steps: Vec<Step>,
}

impl Workflow {
    pub fn builder(id: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn input_schema(&self) -> &dyn Schema {
        self.input_schema.as_ref()
    }

    pub fn result_schema(&self) -> &dyn Schema {
        self.result_schema.as_ref()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("steps", &self.steps)
            .finish()
    }
}

pub struct WorkflowBuilder {
    id: String,
    name: Option<String>,
    description: Option<String>,
    input_schema: Arc<dyn Schema>,
    result_schema: Arc<dyn Schema>,
    steps: Vec<Step>,
}

impl WorkflowBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            input_schema: Arc::new(AnySchema),
            result_schema: Arc::new(AnySchema),
            steps: Vec::new(),
        }
    }

    /// Display name. Defaults to the id.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn input_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.input_schema = Arc::new(schema);
        self
    }

    pub fn result_schema(mut self, schema: impl Schema + 'static) -> Self {
        self.result_schema = Arc::new(schema);
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Validate and freeze the definition.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::InvalidDefinition` if the id is empty or two
    /// steps (nested ones included) share an id.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        if self.id.trim().is_empty() {
            return Err(WorkflowError::InvalidDefinition(
                "workflow id must not be empty".to_string(),
            ));
        }

        let mut ids = Vec::new();
        for step in &self.steps {
            step.collect_ids(&mut ids);
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = ids.into_iter().find(|id| !seen.insert(*id)) {
            return Err(WorkflowError::InvalidDefinition(format!(
                "duplicate step id '{duplicate}' in workflow '{}'",
                self.id
            )));
        }

        Ok(Workflow {
            name: self.name.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            description: self.description,
            input_schema: self.input_schema,
            result_schema: self.result_schema,
            steps: self.steps,
        })
    }
}
