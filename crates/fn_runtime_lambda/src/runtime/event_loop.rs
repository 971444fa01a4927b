use std::convert::Infallible;
use std::sync::Arc;

use fn_runtime_core::clock::{Clock, SystemClock};
use fn_runtime_core::context::FunctionMetadata;
use fn_runtime_core::handler::Handler;
use fn_runtime_core::invocation::{process_invocation, InvocationOutcome};

use crate::adapters::control_plane::{ControlPlane, ControlPlaneError};
use crate::adapters::environment::propagate_trace_id;
use crate::logging::INVOCATION_SPAN;

/// Sequential fetch, process, report loop around one resolved handler.
pub struct EventLoop<C> {
    control_plane: C,
    handler: Arc<dyn Handler>,
    function: FunctionMetadata,
    clock: Arc<dyn Clock>,
}

impl<C: ControlPlane> EventLoop<C> {
    pub fn new(control_plane: C, handler: Arc<dyn Handler>, function: FunctionMetadata) -> Self {
        Self {
            control_plane,
            handler,
            function,
            clock: Arc::new(SystemClock::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn control_plane(&self) -> &C {
        &self.control_plane
    }

    /// Serve exactly one invocation: one fetch followed by exactly one post.
    pub fn run_once(&self) -> Result<(), ControlPlaneError> {
        let request = self.control_plane.fetch_next()?;

        let span = tracing::info_span!(
            INVOCATION_SPAN,
            request_id = request.invocation_id.as_str()
        );
        let _entered = span.enter();
        propagate_trace_id(request.trace_id.as_deref());

        let outcome = process_invocation(
            &request,
            self.handler.as_ref(),
            &self.function,
            Arc::clone(&self.clock),
        );
        match outcome {
            InvocationOutcome::Success(body) => self
                .control_plane
                .post_success(&request.invocation_id, &body),
            InvocationOutcome::Failure(shape) => self
                .control_plane
                .post_error(&request.invocation_id, &shape.to_json_bytes()),
        }
    }

    /// Serve invocations until the control plane fails.
    pub fn run(&self) -> Result<Infallible, ControlPlaneError> {
        loop {
            self.run_once()?;
        }
    }
}
