use serde::{Deserialize, Serialize};

pub const RUNTIME_API_VERSION: &str = "2018-06-01";

pub const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";
pub const TRACE_ID_HEADER: &str = "Lambda-Runtime-Trace-Id";
pub const INVOKED_FUNCTION_ARN_HEADER: &str = "Lambda-Runtime-Invoked-Function-Arn";
pub const DEADLINE_MS_HEADER: &str = "Lambda-Runtime-Deadline-Ms";
pub const CLIENT_CONTEXT_HEADER: &str = "Lambda-Runtime-Client-Context";
pub const CLOUD_EVENTS_CONTEXT_HEADER: &str = "Lambda-Runtime-Cloudevents-Context";
pub const COGNITO_IDENTITY_HEADER: &str = "Lambda-Runtime-Cognito-Identity";

/// Environment variable that carries the trace id of the active invocation.
pub const TRACE_ID_ENV: &str = "_X_AMZN_TRACE_ID";

/// One unit of work handed out by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub invocation_id: String,
    pub trace_id: Option<String>,
    pub invoked_resource_id: Option<String>,
    pub deadline_epoch_ms: i64,
    pub client_context_json: Option<String>,
    pub cloud_events_context_json: Option<String>,
    pub cognito_identity_json: Option<String>,
    pub body: Vec<u8>,
}

impl InvocationRequest {
    /// Request with only the required fields populated.
    pub fn new(
        invocation_id: impl Into<String>,
        deadline_epoch_ms: i64,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            trace_id: None,
            invoked_resource_id: None,
            deadline_epoch_ms,
            client_context_json: None,
            cloud_events_context_json: None,
            cognito_identity_json: None,
            body: body.into(),
        }
    }
}

/// The only body ever posted to the error endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorWireShape {
    #[serde(
        rename = "errorMessage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_message: Option<String>,
    #[serde(rename = "errorType", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(rename = "stackTrace", default, skip_serializing_if = "Vec::is_empty")]
    pub stack_trace: Vec<String>,
}

impl ErrorWireShape {
    /// Build a wire shape, dropping empty values so they are omitted on the wire.
    pub fn new(
        error_message: impl Into<String>,
        error_type: Option<String>,
        stack_trace: Vec<String>,
    ) -> Self {
        let error_message = error_message.into();
        Self {
            error_message: (!error_message.is_empty()).then_some(error_message),
            error_type: error_type.filter(|value| !value.is_empty()),
            stack_trace,
        }
    }

    pub fn to_json_bytes(&self) -> Vec<u8> {
        match serde_json::to_vec(self) {
            Ok(bytes) => bytes,
            Err(error) => format!(
                "{{\"errorMessage\":{}}}",
                serde_json::Value::String(format!("failed to encode error: {error}"))
            )
            .into_bytes(),
        }
    }
}

/// Endpoint paths of the runtime control API as unescaped path segments.
///
/// The invocation id is always a single segment; escaping is left to the URL
/// builder so that no id can change which endpoint is addressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeApiPaths;

impl RuntimeApiPaths {
    pub fn next_invocation(&self) -> Vec<&'static str> {
        vec![RUNTIME_API_VERSION, "runtime", "invocation", "next"]
    }

    pub fn invocation_response<'a>(&self, invocation_id: &'a str) -> Vec<&'a str> {
        vec![RUNTIME_API_VERSION, "runtime", "invocation", invocation_id, "response"]
    }

    pub fn invocation_error<'a>(&self, invocation_id: &'a str) -> Vec<&'a str> {
        vec![RUNTIME_API_VERSION, "runtime", "invocation", invocation_id, "error"]
    }

    pub fn init_error(&self) -> Vec<&'static str> {
        vec![RUNTIME_API_VERSION, "runtime", "init", "error"]
    }

    /// Unescaped `/`-joined rendering, for logs and test doubles.
    pub fn join(segments: &[&str]) -> String {
        format!("/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_omits_empty_fields() {
        let shape = ErrorWireShape::new("", Some(String::new()), Vec::new());
        assert_eq!(shape.to_json_bytes(), b"{}".to_vec());
    }

    #[test]
    fn wire_shape_uses_camel_case_keys() {
        let shape = ErrorWireShape::new(
            "boom",
            Some("my_fn::Failure".to_string()),
            vec!["  File \"src/lib.rs\", line 3, in my_fn::run".to_string()],
        );
        let value: serde_json::Value =
            serde_json::from_slice(&shape.to_json_bytes()).expect("wire shape should parse");

        assert_eq!(value["errorMessage"], "boom");
        assert_eq!(value["errorType"], "my_fn::Failure");
        assert_eq!(value["stackTrace"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn endpoint_paths_follow_runtime_api_layout() {
        let paths = RuntimeApiPaths;
        assert_eq!(
            RuntimeApiPaths::join(&paths.next_invocation()),
            "/2018-06-01/runtime/invocation/next"
        );
        assert_eq!(
            RuntimeApiPaths::join(&paths.invocation_response("abc")),
            "/2018-06-01/runtime/invocation/abc/response"
        );
        assert_eq!(
            RuntimeApiPaths::join(&paths.invocation_error("abc")),
            "/2018-06-01/runtime/invocation/abc/error"
        );
        assert_eq!(
            RuntimeApiPaths::join(&paths.init_error()),
            "/2018-06-01/runtime/init/error"
        );
    }

    #[test]
    fn invocation_id_stays_one_segment() {
        let segments = RuntimeApiPaths.invocation_error("a/b?c#d");
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[3], "a/b?c#d");
        assert_eq!(segments[4], "error");
    }
}
