use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::Clock;
use crate::contract::InvocationRequest;

/// Function identity read once from the environment at bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionMetadata {
    pub function_name: Option<String>,
    pub function_version: Option<String>,
    pub memory_limit_mb: Option<u32>,
    pub log_group_name: Option<String>,
    pub log_stream_name: Option<String>,
}

/// Mobile client metadata attached to an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    #[serde(default)]
    pub client: Option<Client>,
    #[serde(default)]
    pub custom: Option<Map<String, Value>>,
    #[serde(default)]
    pub env: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    #[serde(default)]
    pub installation_id: Option<String>,
    #[serde(default)]
    pub app_title: Option<String>,
    #[serde(default)]
    pub app_version_name: Option<String>,
    #[serde(default)]
    pub app_version_code: Option<String>,
    #[serde(default)]
    pub app_package_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CognitoIdentity {
    #[serde(rename = "cognitoIdentityId", default)]
    pub cognito_identity_id: Option<String>,
    #[serde(rename = "cognitoIdentityPoolId", default)]
    pub cognito_identity_pool_id: Option<String>,
}

/// Per-invocation context handed to the handler next to the event.
#[derive(Clone)]
pub struct ExecutionContext {
    pub invocation_id: String,
    pub function_name: Option<String>,
    pub function_version: Option<String>,
    pub memory_limit_mb: Option<u32>,
    pub log_group_name: Option<String>,
    pub log_stream_name: Option<String>,
    pub invoked_resource_id: Option<String>,
    pub client_context: Option<ClientContext>,
    pub cloud_events: Option<Value>,
    pub identity: Option<CognitoIdentity>,
    pub deadline_epoch_ms: i64,
    clock: Arc<dyn Clock>,
}

/// `tracing` target of lines written through [`ExecutionContext::log`].
pub const FUNCTION_LOG_TARGET: &str = "function";

impl ExecutionContext {
    /// Assemble the context for one invocation.
    ///
    /// Header-supplied JSON that fails to decode is dropped (the field reads as
    /// absent) instead of failing the invocation.
    pub fn build(
        request: &InvocationRequest,
        function: &FunctionMetadata,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            invocation_id: request.invocation_id.clone(),
            function_name: function.function_name.clone(),
            function_version: function.function_version.clone(),
            memory_limit_mb: function.memory_limit_mb,
            log_group_name: function.log_group_name.clone(),
            log_stream_name: function.log_stream_name.clone(),
            invoked_resource_id: request.invoked_resource_id.clone(),
            client_context: lenient_decode(
                "client context",
                request.client_context_json.as_deref(),
            ),
            cloud_events: lenient_decode(
                "cloud events context",
                request.cloud_events_context_json.as_deref(),
            ),
            identity: lenient_decode(
                "cognito identity",
                request.cognito_identity_json.as_deref(),
            ),
            deadline_epoch_ms: request.deadline_epoch_ms,
            clock,
        }
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining_time(&self) -> Duration {
        let remaining_ms = self
            .deadline_epoch_ms
            .saturating_sub(self.clock.now_epoch_ms())
            .max(0);
        Duration::from_millis(remaining_ms as u64)
    }

    pub fn remaining_time_ms(&self) -> u64 {
        self.remaining_time().as_millis() as u64
    }

    /// Write a line to the function log. Inside the invocation span it is
    /// tagged with the invocation id like every other runtime line.
    pub fn log(&self, message: impl fmt::Display) {
        tracing::info!(target: FUNCTION_LOG_TARGET, "{message}");
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("invocation_id", &self.invocation_id)
            .field("function_name", &self.function_name)
            .field("function_version", &self.function_version)
            .field("invoked_resource_id", &self.invoked_resource_id)
            .field("deadline_epoch_ms", &self.deadline_epoch_ms)
            .finish_non_exhaustive()
    }
}

fn lenient_decode<T: DeserializeOwned>(label: &str, raw: Option<&str>) -> Option<T> {
    let raw = raw.filter(|value| !value.trim().is_empty())?;
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(%error, "ignoring undecodable {label} header");
            None
        }
    }
}
