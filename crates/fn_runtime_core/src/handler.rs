use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::codec::encode_result;
use crate::context::ExecutionContext;
use crate::fault::{Fault, HandlerError, InvocationError};

/// A function invocable by the runtime loop.
///
/// The loop depends only on this capability; how a handler was found (or
/// that it is a stand-in for one that could not be found) is invisible to it.
pub trait Handler: Send + Sync {
    fn invoke(
        &self,
        event: Value,
        context: &ExecutionContext,
    ) -> Result<HandlerResponse, InvocationError>;
}

/// A handler result whose JSON encoding is deferred to the reporting stage,
/// so that encoding failures are attributed to the invocation.
pub struct HandlerResponse {
    encode: Box<dyn FnOnce() -> Result<Vec<u8>, serde_json::Error>>,
}

impl HandlerResponse {
    pub fn new<T: Serialize + 'static>(value: T) -> Self {
        Self {
            encode: Box::new(move || encode_result(&value)),
        }
    }

    /// The handler produced no value.
    pub fn empty() -> Self {
        Self {
            encode: Box::new(|| Ok(Vec::new())),
        }
    }

    pub fn encode(self) -> Result<Vec<u8>, serde_json::Error> {
        (self.encode)()
    }
}

impl std::fmt::Debug for HandlerResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerResponse").finish_non_exhaustive()
    }
}

/// Adapts a typed function into a [`Handler`].
///
/// The event is converted from JSON into `E` before the call; a mismatch is
/// reported as a failure of the invocation. A returned [`Fault`] is reported
/// as a fault; any other error keeps its type name. Only a [`HandlerError`]
/// built inside the function (for example by `?`) carries stack frames.
pub struct FnHandler<F, E, R, Err> {
    function: F,
    _marker: PhantomData<fn(E) -> Result<R, Err>>,
}

pub fn handler_fn<F, E, R, Err>(function: F) -> FnHandler<F, E, R, Err>
where
    F: Fn(E, &ExecutionContext) -> Result<R, Err> + Send + Sync,
    E: DeserializeOwned,
    R: Serialize + 'static,
    Err: Into<InvocationError>,
{
    FnHandler {
        function,
        _marker: PhantomData,
    }
}

impl<F, E, R, Err> Handler for FnHandler<F, E, R, Err>
where
    F: Fn(E, &ExecutionContext) -> Result<R, Err> + Send + Sync,
    E: DeserializeOwned,
    R: Serialize + 'static,
    Err: Into<InvocationError>,
{
    fn invoke(
        &self,
        event: Value,
        context: &ExecutionContext,
    ) -> Result<HandlerResponse, InvocationError> {
        let event: E = serde_json::from_value(event).map_err(HandlerError::untraced)?;
        let value = (self.function)(event, context).map_err(Into::<InvocationError>::into)?;
        Ok(HandlerResponse::new(value))
    }
}

/// Stand-in for a handler that could not be resolved. Every invocation fails
/// with the bound fault.
#[derive(Debug, Clone)]
pub struct FaultHandler {
    fault: Fault,
}

impl FaultHandler {
    pub fn new(fault: Fault) -> Self {
        Self { fault }
    }

    pub fn fault(&self) -> &Fault {
        &self.fault
    }
}

impl Handler for FaultHandler {
    fn invoke(
        &self,
        _event: Value,
        _context: &ExecutionContext,
    ) -> Result<HandlerResponse, InvocationError> {
        Err(InvocationError::Fault(self.fault.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::clock::ManualClock;
    use crate::context::FunctionMetadata;
    use crate::contract::InvocationRequest;

    #[derive(Deserialize)]
    struct Order {
        quantity: u32,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("quantity must be positive")]
    struct EmptyOrder;

    fn context() -> ExecutionContext {
        let request = InvocationRequest::new("req-1", 10_000, b"{}".to_vec());
        ExecutionContext::build(
            &request,
            &FunctionMetadata::default(),
            Arc::new(ManualClock::at_epoch_ms(0)),
        )
    }

    fn order_handler() -> impl Handler {
        handler_fn(|order: Order, _context: &ExecutionContext| {
            if order.quantity == 0 {
                return Err(EmptyOrder);
            }
            Ok(json!({"accepted": order.quantity}))
        })
    }

    #[test]
    fn typed_handler_encodes_its_result() {
        let response = order_handler()
            .invoke(json!({"quantity": 2}), &context())
            .expect("handler should succeed");
        assert_eq!(
            response.encode().expect("should encode"),
            b"{\"accepted\":2}".to_vec()
        );
    }

    #[test]
    fn typed_handler_reports_error_type() {
        let error = order_handler()
            .invoke(json!({"quantity": 0}), &context())
            .expect_err("handler should fail");
        match error {
            InvocationError::Runtime { error, context } => {
                assert!(error.error_type().ends_with("EmptyOrder"));
                assert_eq!(error.message(), "quantity must be positive");
                assert!(context.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn typed_handler_rejects_mismatched_event() {
        let error = order_handler()
            .invoke(json!({"quantity": "many"}), &context())
            .expect_err("event should not convert");
        assert!(matches!(error, InvocationError::Runtime { .. }));
    }

    #[test]
    fn returned_fault_is_reported_without_type() {
        let handler = handler_fn(|_: Value, _: &ExecutionContext| -> Result<Value, Fault> {
            Err(Fault::new("custom fault"))
        });
        let error = handler
            .invoke(Value::Null, &context())
            .expect_err("handler returns a fault");
        assert_eq!(error, InvocationError::Fault(Fault::new("custom fault")));
    }

    #[test]
    fn fault_handler_always_fails_with_its_fault() {
        let handler = FaultHandler::new(Fault::new("Bad handler 'x'"));
        for _ in 0..2 {
            let error = handler
                .invoke(Value::Null, &context())
                .expect_err("stand-in always fails");
            assert_eq!(error, InvocationError::Fault(Fault::new("Bad handler 'x'")));
        }
    }
}
