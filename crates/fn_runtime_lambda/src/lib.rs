//! Process-facing side of the function runtime.
//!
//! This crate owns everything that touches the outside world: the HTTP
//! conversation with the runtime control API, environment configuration,
//! log formatting, bootstrap, and the invocation loop. The sample handler
//! modules shipped with the `bootstrap` binary live in [`functions`].

pub mod adapters;
pub mod functions;
pub mod logging;
pub mod runtime;
