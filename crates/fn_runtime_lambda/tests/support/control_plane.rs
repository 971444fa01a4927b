#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use fn_runtime_core::contract::{InvocationRequest, RuntimeApiPaths};
use fn_runtime_lambda::adapters::control_plane::{ControlPlane, ControlPlaneError};
use serde_json::Value;

/// One call made against the fake control plane.
#[derive(Debug, Clone, PartialEq)]
pub enum Posted {
    Success { invocation_id: String, body: Vec<u8> },
    Error { invocation_id: String, body: Value },
    InitError { body: Value },
}

/// Scripted step for the next fetch.
pub enum Fetch {
    Invocation(InvocationRequest),
    Status(u16),
}

/// Control plane that replays scripted fetches and records every post.
/// Once the script runs out, fetches fail with a 500.
pub struct ScriptedControlPlane {
    fetches: Mutex<VecDeque<Fetch>>,
    posts: Mutex<Vec<Posted>>,
    fetch_count: Mutex<usize>,
}

impl ScriptedControlPlane {
    pub fn new(fetches: impl IntoIterator<Item = Fetch>) -> Self {
        Self {
            fetches: Mutex::new(fetches.into_iter().collect()),
            posts: Mutex::new(Vec::new()),
            fetch_count: Mutex::new(0),
        }
    }

    pub fn with_invocations(requests: impl IntoIterator<Item = InvocationRequest>) -> Self {
        Self::new(requests.into_iter().map(Fetch::Invocation))
    }

    pub fn posts(&self) -> Vec<Posted> {
        self.posts.lock().expect("poisoned mutex").clone()
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetch_count.lock().expect("poisoned mutex")
    }

    fn record(&self, posted: Posted) {
        self.posts.lock().expect("poisoned mutex").push(posted);
    }
}

fn parse_json(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("error bodies are JSON")
}

impl ControlPlane for ScriptedControlPlane {
    fn fetch_next(&self) -> Result<InvocationRequest, ControlPlaneError> {
        *self.fetch_count.lock().expect("poisoned mutex") += 1;
        let next = self.fetches.lock().expect("poisoned mutex").pop_front();
        match next {
            Some(Fetch::Invocation(request)) => Ok(request),
            Some(Fetch::Status(status)) => Err(unexpected_status(status)),
            None => Err(unexpected_status(500)),
        }
    }

    fn post_success(&self, invocation_id: &str, body: &[u8]) -> Result<(), ControlPlaneError> {
        self.record(Posted::Success {
            invocation_id: invocation_id.to_string(),
            body: body.to_vec(),
        });
        Ok(())
    }

    fn post_error(&self, invocation_id: &str, error_body: &[u8]) -> Result<(), ControlPlaneError> {
        self.record(Posted::Error {
            invocation_id: invocation_id.to_string(),
            body: parse_json(error_body),
        });
        Ok(())
    }

    fn post_init_error(&self, error_body: &[u8]) -> Result<(), ControlPlaneError> {
        self.record(Posted::InitError {
            body: parse_json(error_body),
        });
        Ok(())
    }
}

fn unexpected_status(status: u16) -> ControlPlaneError {
    ControlPlaneError::UnexpectedStatus {
        endpoint: RuntimeApiPaths::join(&RuntimeApiPaths.next_invocation()),
        status,
        body: "scripted failure".to_string(),
    }
}
