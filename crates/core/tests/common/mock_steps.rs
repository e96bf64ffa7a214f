//! Mock steps for integration tests.

use fk_core::workflow::{Data, Step, StepContext, StepError, StepOutput};
use fk_protocol::Usage;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Appends `suffix` to the string under `key`.
#[allow(dead_code)]
pub fn append_step(id: &str, key: &'static str, suffix: &'static str) -> Step {
    Step::func(id, move |data: Data, _ctx| async move {
        let current = data.get(key).and_then(Value::as_str).unwrap_or_default();
        StepOutput::from_value(json!({ key: format!("{current}{suffix}") }))
    })
}

/// Counts its invocations and writes the count under its own id.
#[allow(dead_code)]
pub fn counting_step(id: &'static str, calls: Arc<AtomicUsize>) -> Step {
    Step::func(id, move |_data, _ctx| {
        let calls = Arc::clone(&calls);
        async move {
            let count = calls.fetch_add(1, Ordering::SeqCst) + 1;
            StepOutput::from_value(json!({ id: count }))
        }
    })
}

#[allow(dead_code)]
pub fn failing_step(id: &str, message: &'static str) -> Step {
    Step::func(id, move |_data, _ctx| async move { Err(StepError::failed(message)) })
}

async fn explode(_data: Data, _ctx: StepContext) -> Result<StepOutput, StepError> {
    panic!("step exploded")
}

#[allow(dead_code)]
pub fn panicking_step(id: &str) -> Step {
    Step::func(id, explode)
}

/// Reports fixed usage and no data.
#[allow(dead_code)]
pub fn usage_step(id: &str, prompt: u64, completion: u64) -> Step {
    Step::func(id, move |_data, _ctx| async move {
        Ok(StepOutput::empty().with_usage(Usage::new(prompt, completion)))
    })
}

/// Suspends on first run; once resumed, records the resume input under `resumedWith`.
#[allow(dead_code)]
pub fn suspending_step(id: &str, reason: &'static str) -> Step {
    Step::func(id, move |_data, ctx: StepContext| async move {
        match ctx.resume_data() {
            Some(input) => StepOutput::from_value(json!({ "resumedWith": input })),
            None => Ok(ctx.suspend(reason)),
        }
    })
}

/// Sleeps for `duration` unless the controller's signal fires first.
#[allow(dead_code)]
pub fn slow_step(id: &str, duration: Duration) -> Step {
    Step::func(id, move |_data, ctx: StepContext| async move {
        tokio::select! {
            _ = tokio::time::sleep(duration) => StepOutput::from_value(json!({ "slept": true })),
            _ = ctx.controller().signal().fired() => Ok(StepOutput::empty()),
        }
    })
}
