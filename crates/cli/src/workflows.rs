//! Sample workflows registered by the CLI.

use fk_core::agents::MockAgent;
use fk_core::error::WorkflowResult;
use fk_core::registry::WorkflowRegistry;
use fk_core::workflow::{Branch, Data, RequiredFields, Step, StepContext, StepOutput, Workflow};
use fk_protocol::Usage;
use serde_json::{json, Value};
use std::sync::Arc;

const LONG_TEXT_CHARS: usize = 80;

/// Build a registry holding every sample workflow.
pub fn builtin() -> WorkflowResult<WorkflowRegistry> {
    let registry = WorkflowRegistry::new();
    registry.register(greeting()?);
    registry.register(approval()?);
    registry.register(summarize()?);
    Ok(registry)
}

fn text_field<'a>(data: &'a Data, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Appends " john" then " doe" to `name`.
fn greeting() -> WorkflowResult<Workflow> {
    let append = |id: &str, suffix: &'static str| {
        Step::func(id, move |data: Data, _ctx| async move {
            let name = text_field(&data, "name");
            StepOutput::from_value(json!({ "name": format!("{name}{suffix}") }))
        })
    };

    Workflow::builder("greeting")
        .description("Appends a first and last name in two steps")
        .input_schema(RequiredFields::new(["name"]))
        .step(append("first-name", " john"))
        .step(append("last-name", " doe"))
        .build()
}

/// Suspends for a decision, then records whether the request was approved.
fn approval() -> WorkflowResult<Workflow> {
    Workflow::builder("approval")
        .description("Waits for an approval decision before finalizing")
        .input_schema(RequiredFields::new(["amount"]))
        .result_schema(RequiredFields::new(["decision"]))
        .step(Step::func("review", |data: Data, _ctx| async move {
            let amount = data.get("amount").and_then(Value::as_f64).unwrap_or(0.0);
            StepOutput::from_value(json!({ "needsApproval": amount > 100.0 }))
        }))
        .step(Step::func("await-approval", |data: Data, ctx: StepContext| async move {
            let needs_approval = data
                .get("needsApproval")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if needs_approval && ctx.resume_data().is_none() {
                return Ok(ctx.suspend("awaiting approval"));
            }
            StepOutput::from_value(json!({ "reviewedBy": ctx.user_id() }))
        }))
        .step(Step::func("finalize", |data: Data, _ctx| async move {
            let needs_approval = data
                .get("needsApproval")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let approved = data.get("approved").and_then(Value::as_bool).unwrap_or(false);
            let decision = match (needs_approval, approved) {
                (false, _) => "auto-approved",
                (true, true) => "approved",
                (true, false) => "rejected",
            };
            StepOutput::from_value(json!({ "decision": decision }))
        }))
        .build()
}

/// Classifies, measures and summarizes `text` with a mock agent.
fn summarize() -> WorkflowResult<Workflow> {
    let agent = Arc::new(MockAgent::replying(
        "The text describes a workflow run.",
        Usage::new(24, 8),
    ));

    Workflow::builder("summarize")
        .description("Classifies, measures and summarizes a text")
        .input_schema(RequiredFields::new(["text"]))
        .step(Step::branch(
            "classify",
            vec![
                Branch::when(
                    |data| text_field(data, "text").chars().count() > LONG_TEXT_CHARS,
                    Step::func("long", |_d, _c| async {
                        StepOutput::from_value(json!({ "length": "long" }))
                    }),
                ),
                Branch::otherwise(Step::func("short", |_d, _c| async {
                    StepOutput::from_value(json!({ "length": "short" }))
                })),
            ],
        ))
        .step(Step::parallel(
            "measure",
            vec![
                Step::func("words", |data: Data, _ctx| async move {
                    let words = text_field(&data, "text").split_whitespace().count();
                    StepOutput::from_value(json!({ "words": words }))
                }),
                Step::func("chars", |data: Data, _ctx| async move {
                    let chars = text_field(&data, "text").chars().count();
                    StepOutput::from_value(json!({ "chars": chars }))
                }),
            ],
        ))
        .step(
            Step::agent("summary", agent, |data| {
                format!("Summarize in one sentence:\n{}", text_field(data, "text"))
            })
            .with_output_key("summary"),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = builtin().unwrap();
        let ids: Vec<_> = registry.list().iter().map(|w| w.id().to_string()).collect();
        assert_eq!(ids, vec!["approval", "greeting", "summarize"]);
    }
}
