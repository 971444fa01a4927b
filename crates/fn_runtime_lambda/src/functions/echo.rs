//! `demo.echo`: reflects events and invocation context back to the caller.

use fn_runtime_core::context::ExecutionContext;
use fn_runtime_core::handler::handler_fn;
use fn_runtime_core::resolver::HandlerModule;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const MODULE_PATH: &str = "demo.echo";

pub fn module() -> HandlerModule {
    HandlerModule::new()
        .with_function("handle", handler_fn(handle))
        .with_function("context", handler_fn(describe_context))
        .with_function("fail", handler_fn(fail))
}

pub fn handle(event: Value, _context: &ExecutionContext) -> Result<Value, EchoError> {
    Ok(event)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSummary {
    pub invocation_id: String,
    pub function_name: Option<String>,
    pub memory_limit_mb: Option<u32>,
    pub invoked_resource_id: Option<String>,
    pub remaining_time_ms: u64,
}

pub fn describe_context(
    _event: Value,
    context: &ExecutionContext,
) -> Result<ContextSummary, EchoError> {
    Ok(ContextSummary {
        invocation_id: context.invocation_id.clone(),
        function_name: context.function_name.clone(),
        memory_limit_mb: context.memory_limit_mb,
        invoked_resource_id: context.invoked_resource_id.clone(),
        remaining_time_ms: context.remaining_time_ms(),
    })
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub reason: String,
}

pub fn fail(request: FailRequest, _context: &ExecutionContext) -> Result<Value, EchoError> {
    Err(EchoError::Rejected(request.reason))
}

#[derive(Debug, Error)]
pub enum EchoError {
    #[error("rejected: {0}")]
    Rejected(String),
}
