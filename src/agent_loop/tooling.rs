//! Tool call execution.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::tools::{ToolArguments, ToolExecutionContext, ToolRegistry};
use crate::types::{ToolCall, ToolResult};

/// Execute `calls` in order. Never fails: lookup misses, tool errors and
/// tool panics all become error results.
pub(crate) async fn execute_tool_calls(
    registry: Option<&dyn ToolRegistry>,
    calls: &[&ToolCall],
) -> Vec<ToolResult> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        results.push(execute_tool_call(registry, call).await);
    }
    results
}

async fn execute_tool_call(registry: Option<&dyn ToolRegistry>, call: &ToolCall) -> ToolResult {
    let Some(tool) = registry.and_then(|registry| registry.get(&call.name)) else {
        warn!(tool = %call.name, tool_call_id = %call.id, "model requested unknown tool");
        return ToolResult::error(&call.id, format!("Tool '{}' not found", call.name));
    };

    let args = ToolArguments::merged(tool.defaults(), &call.input);
    let ctx = ToolExecutionContext {
        tool_call_id: Some(call.id.clone()),
        tool_name: Some(call.name.clone()),
    };

    debug!(tool = %call.name, tool_call_id = %call.id, "executing tool");
    match AssertUnwindSafe(tool.execute(&args, &ctx)).catch_unwind().await {
        Ok(Ok(output)) => ToolResult::ok(&call.id, output),
        Ok(Err(err)) => {
            warn!(tool = %call.name, error = %err, "Tool execution failed");
            ToolResult::error(&call.id, err.to_string())
        }
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            warn!(tool = %call.name, reason = %reason, "Tool panicked");
            ToolResult::error(&call.id, format!("Tool '{}' panicked: {reason}", call.name))
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
