//! Workflow definitions, steps and schemas.

pub mod definition;
pub mod schema;
pub mod step;

pub use definition::{Workflow, WorkflowBuilder};
pub use schema::{AnySchema, FnSchema, RequiredFields, Schema, SchemaError, TypedSchema};
pub use step::{Branch, Data, Step, StepContext, StepError, StepKind, StepOutput};
