use fn_runtime_core::contract::InvocationRequest;
use thiserror::Error;

/// Blocking conversation with the runtime control API.
///
/// None of the calls retry; every error is fatal to the process.
pub trait ControlPlane {
    fn fetch_next(&self) -> Result<InvocationRequest, ControlPlaneError>;

    fn post_success(&self, invocation_id: &str, body: &[u8]) -> Result<(), ControlPlaneError>;

    fn post_error(&self, invocation_id: &str, error_body: &[u8]) -> Result<(), ControlPlaneError>;

    fn post_init_error(&self, error_body: &[u8]) -> Result<(), ControlPlaneError>;
}

impl<T: ControlPlane + ?Sized> ControlPlane for &T {
    fn fetch_next(&self) -> Result<InvocationRequest, ControlPlaneError> {
        (**self).fetch_next()
    }

    fn post_success(&self, invocation_id: &str, body: &[u8]) -> Result<(), ControlPlaneError> {
        (**self).post_success(invocation_id, body)
    }

    fn post_error(&self, invocation_id: &str, error_body: &[u8]) -> Result<(), ControlPlaneError> {
        (**self).post_error(invocation_id, error_body)
    }

    fn post_init_error(&self, error_body: &[u8]) -> Result<(), ControlPlaneError> {
        (**self).post_init_error(error_body)
    }
}

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("{endpoint} answered with status {status}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("response from {endpoint} has no {header} header")]
    MissingHeader {
        endpoint: String,
        header: &'static str,
    },
    #[error("invalid control plane address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("deadline header is not an epoch millisecond value: {value:?}")]
    InvalidDeadline { value: Option<String> },
}
