//! Processing of a single invocation: context, decode, dispatch, encode.

use std::sync::Arc;

use crate::clock::Clock;
use crate::codec::{decode_event, DECODE_ERROR_CONTEXT, ENCODE_ERROR_CONTEXT};
use crate::context::{ExecutionContext, FunctionMetadata};
use crate::contract::{ErrorWireShape, InvocationRequest};
use crate::fault::{HandlerError, InvocationError};
use crate::handler::Handler;
use crate::panic::catch_handler_panic;

/// What gets reported back for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    Success(Vec<u8>),
    Failure(ErrorWireShape),
}

pub fn process_invocation(
    request: &InvocationRequest,
    handler: &dyn Handler,
    function: &FunctionMetadata,
    clock: Arc<dyn Clock>,
) -> InvocationOutcome {
    match run_stages(request, handler, function, clock) {
        Ok(body) => InvocationOutcome::Success(body),
        Err(error) => {
            log_failure(&error);
            InvocationOutcome::Failure(error.to_wire_shape())
        }
    }
}

fn run_stages(
    request: &InvocationRequest,
    handler: &dyn Handler,
    function: &FunctionMetadata,
    clock: Arc<dyn Clock>,
) -> Result<Vec<u8>, InvocationError> {
    let context = ExecutionContext::build(request, function, clock);

    let event = decode_event(&request.body).map_err(|error| {
        InvocationError::runtime_with_context(HandlerError::untraced(error), DECODE_ERROR_CONTEXT)
    })?;

    let response = catch_handler_panic(|| handler.invoke(event, &context))
        .map_err(InvocationError::runtime)??;

    response.encode().map_err(|error| {
        InvocationError::runtime_with_context(HandlerError::untraced(error), ENCODE_ERROR_CONTEXT)
    })
}

fn log_failure(error: &InvocationError) {
    match error {
        InvocationError::Fault(fault) => tracing::error!(
            cause = fault.secondary_value().unwrap_or_default(),
            trace = fault.trace().unwrap_or_default(),
            "{}",
            fault.message()
        ),
        InvocationError::Runtime { error, context } => tracing::error!(
            error_type = error.error_type(),
            context = context.as_deref().unwrap_or_default(),
            frames = error.frames().len(),
            "{}",
            error.message()
        ),
    }
}
