//! HTTP implementation of [`ControlPlane`] over a blocking `reqwest` client.

use fn_runtime_core::contract::{
    InvocationRequest, RuntimeApiPaths, CLIENT_CONTEXT_HEADER, CLOUD_EVENTS_CONTEXT_HEADER,
    COGNITO_IDENTITY_HEADER, DEADLINE_MS_HEADER, INVOKED_FUNCTION_ARN_HEADER, REQUEST_ID_HEADER,
    TRACE_ID_HEADER,
};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use std::time::Duration;

use super::control_plane::{ControlPlane, ControlPlaneError};

/// Client for the runtime control API at a fixed `host:port`.
///
/// One client is built per process; its pool keeps the keep-alive connection
/// to the control plane open between invocations.
#[derive(Debug, Clone)]
pub struct RuntimeApiClient {
    client: Client,
    base_url: Url,
    paths: RuntimeApiPaths,
}

impl RuntimeApiClient {
    /// Create a client for `address`, usually the value of
    /// `AWS_LAMBDA_RUNTIME_API` (e.g. `127.0.0.1:9001`).
    pub fn new(address: &str) -> Result<Self, ControlPlaneError> {
        let base_url = base_url(address)?;
        // The fetch is a long poll, so requests never time out.
        let client = Client::builder()
            .timeout(None::<Duration>)
            .pool_idle_timeout(None::<Duration>)
            .no_proxy()
            .build()
            .map_err(|source| transport_error(base_url.as_str(), source))?;
        Ok(Self {
            client,
            base_url,
            paths: RuntimeApiPaths,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Endpoint URL with every segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `base_url` only accepts URLs that can carry a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn post(&self, segments: &[&str], body: &[u8], json: bool) -> Result<(), ControlPlaneError> {
        let endpoint = self.url(segments);
        let mut request = self.client.post(endpoint.clone()).body(body.to_vec());
        if json {
            request = request.header(CONTENT_TYPE, "application/json");
        }
        let response = request
            .send()
            .map_err(|source| transport_error(endpoint.as_str(), source))?;
        expect_status(endpoint.as_str(), StatusCode::ACCEPTED, response)
    }
}

impl ControlPlane for RuntimeApiClient {
    fn fetch_next(&self) -> Result<InvocationRequest, ControlPlaneError> {
        let endpoint = self.url(&self.paths.next_invocation());
        let response = self
            .client
            .get(endpoint.clone())
            .send()
            .map_err(|source| transport_error(endpoint.as_str(), source))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .map_err(|source| transport_error(endpoint.as_str(), source))?;
        parse_next_invocation(status, &headers, body.to_vec(), endpoint.as_str())
    }

    fn post_success(&self, invocation_id: &str, body: &[u8]) -> Result<(), ControlPlaneError> {
        self.post(&self.paths.invocation_response(invocation_id), body, false)
    }

    fn post_error(&self, invocation_id: &str, error_body: &[u8]) -> Result<(), ControlPlaneError> {
        self.post(&self.paths.invocation_error(invocation_id), error_body, true)
    }

    fn post_init_error(&self, error_body: &[u8]) -> Result<(), ControlPlaneError> {
        self.post(&self.paths.init_error(), error_body, true)
    }
}

fn base_url(address: &str) -> Result<Url, ControlPlaneError> {
    let address = address.trim().trim_end_matches('/');
    let text = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };
    let invalid = |reason: String| ControlPlaneError::InvalidAddress {
        address: address.to_string(),
        reason,
    };
    let url = Url::parse(&text).map_err(|error| invalid(error.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("address cannot carry a path".to_string()));
    }
    Ok(url)
}

fn transport_error(endpoint: &str, source: reqwest::Error) -> ControlPlaneError {
    ControlPlaneError::Transport {
        endpoint: endpoint.to_string(),
        source,
    }
}

fn expect_status(
    endpoint: &str,
    expected: StatusCode,
    response: Response,
) -> Result<(), ControlPlaneError> {
    let status = response.status();
    if status == expected {
        return Ok(());
    }
    let body = response.text().unwrap_or_default();
    Err(ControlPlaneError::UnexpectedStatus {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Translate a fetch response into an [`InvocationRequest`].
pub fn parse_next_invocation(
    status: StatusCode,
    headers: &HeaderMap,
    body: Vec<u8>,
    endpoint: &str,
) -> Result<InvocationRequest, ControlPlaneError> {
    if status != StatusCode::OK {
        return Err(ControlPlaneError::UnexpectedStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    let invocation_id = header(headers, REQUEST_ID_HEADER)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ControlPlaneError::MissingHeader {
            endpoint: endpoint.to_string(),
            header: REQUEST_ID_HEADER,
        })?;

    let deadline = header(headers, DEADLINE_MS_HEADER);
    let deadline_epoch_ms = deadline
        .as_deref()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| ControlPlaneError::InvalidDeadline {
            value: deadline.clone(),
        })?;

    let mut request = InvocationRequest::new(invocation_id, deadline_epoch_ms, body);
    request.trace_id = header(headers, TRACE_ID_HEADER);
    request.invoked_resource_id = header(headers, INVOKED_FUNCTION_ARN_HEADER);
    request.client_context_json = header(headers, CLIENT_CONTEXT_HEADER);
    request.cloud_events_context_json = header(headers, CLOUD_EVENTS_CONTEXT_HEADER);
    request.cognito_identity_json = header(headers, COGNITO_IDENTITY_HEADER);
    Ok(request)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}
