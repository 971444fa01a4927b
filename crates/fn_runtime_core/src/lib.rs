//! Shared function-runtime domain primitives.
//!
//! This crate owns the deterministic part of the runtime: the control-plane
//! contract types, fault normalization into the error wire shape, execution
//! contexts, handler resolution, and single-invocation processing. It
//! intentionally excludes HTTP transport and process environment concerns,
//! which live in `fn_runtime_lambda`.

pub mod clock;
pub mod codec;
pub mod context;
pub mod contract;
pub mod fault;
pub mod handler;
pub mod invocation;
pub mod panic;
pub mod resolver;
