//! Fault normalization.
//!
//! Every way an invocation can go wrong ends up as an [`InvocationError`],
//! which has exactly one rendering on the wire: [`ErrorWireShape`].
//!
//! - [`Fault`] is raised by the runtime itself (for example by a stand-in
//!   for an unresolvable handler) and is reported without a type or stack.
//! - [`HandlerError`] wraps an arbitrary error, keeping its type name and,
//!   when it was created inside handler code, the stack frames at that point.

use std::any::type_name;
use std::backtrace::Backtrace;
use std::fmt;

use crate::contract::ErrorWireShape;

/// Symbol prefixes of frames that belong to the runtime rather than to
/// handler-reachable code.
pub const INTERNAL_FRAME_MARKERS: &[&str] = &[
    "fn_runtime_core::",
    "fn_runtime_lambda::",
    "bootstrap::",
    "std::",
    "core::",
    "alloc::",
    "__rust",
    "__libc_start",
    "_start",
];

/// Crates whose frames mark the dispatch boundary: handler code only ever
/// runs inside them.
const RUNTIME_CRATE_MARKERS: &[&str] = &["fn_runtime_core::", "fn_runtime_lambda::"];

/// Innermost frames produced by the capture itself rather than by the code
/// that failed.
const CAPTURE_FRAME_MARKERS: &[&str] = &[
    "std::backtrace",
    "std::sys::backtrace",
    "std::panicking",
    "std::panic::",
    "alloc::boxed::",
    "core::panicking",
    "rust_begin_unwind",
    "__rustc::",
    "core::convert::",
    "T as core::convert::",
    "fn_runtime_core::fault::",
    "fn_runtime_core::panic::",
];

/// The runtime's own error record. Building one never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    message: String,
    secondary_value: Option<String>,
    trace: Option<String>,
}

impl Fault {
    pub fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
            secondary_value: None,
            trace: None,
        }
    }

    /// Attach a secondary value, usually the underlying cause.
    pub fn with_secondary(mut self, value: impl fmt::Display) -> Self {
        self.secondary_value = Some(value.to_string());
        self
    }

    pub fn with_trace(mut self, trace: impl Into<FaultTrace>) -> Self {
        self.trace = trace.into().0;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn secondary_value(&self) -> Option<&str> {
        self.secondary_value.as_deref()
    }

    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(secondary) = &self.secondary_value {
            write!(f, " ({secondary})")?;
        }
        Ok(())
    }
}

/// Trace text for a [`Fault`]; sequences of lines are joined with newlines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultTrace(Option<String>);

impl FaultTrace {
    pub fn lines<I>(lines: I) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        let joined = lines
            .into_iter()
            .map(|line| line.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Self(Some(joined))
    }
}

impl From<String> for FaultTrace {
    fn from(value: String) -> Self {
        Self(Some(value))
    }
}

impl From<&str> for FaultTrace {
    fn from(value: &str) -> Self {
        Self(Some(value.to_string()))
    }
}

impl<T: fmt::Display> From<Vec<T>> for FaultTrace {
    fn from(value: Vec<T>) -> Self {
        Self::lines(value)
    }
}

impl<T: fmt::Display> From<&[T]> for FaultTrace {
    fn from(value: &[T]) -> Self {
        Self::lines(value)
    }
}

impl<T: Into<FaultTrace>> From<Option<T>> for FaultTrace {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// One captured stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub location: String,
    pub line: Option<u32>,
    pub name: String,
    pub source_line: Option<String>,
}

impl StackFrame {
    pub fn new(location: impl Into<String>, line: Option<u32>, name: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            line,
            name: name.into(),
            source_line: None,
        }
    }

    fn is_internal(&self) -> bool {
        let name = self.name.trim_start_matches('<');
        name.is_empty()
            || name == "main"
            || name.starts_with("unknown>")
            || INTERNAL_FRAME_MARKERS
                .iter()
                .any(|marker| name.starts_with(marker))
    }

    fn is_runtime(&self) -> bool {
        let name = self.name.trim_start_matches('<');
        RUNTIME_CRATE_MARKERS
            .iter()
            .any(|marker| name.starts_with(marker))
    }

    fn is_capture_machinery(&self) -> bool {
        let name = self.name.trim_start_matches('<');
        name.contains("FromResidual")
            || name.contains("as core::convert::From<")
            || CAPTURE_FRAME_MARKERS
                .iter()
                .any(|marker| name.starts_with(marker))
    }

    /// Human readable trace line.
    pub fn format(&self) -> String {
        let line = self
            .line
            .map(|line| line.to_string())
            .unwrap_or_else(|| "?".to_string());
        let mut text = format!("  File \"{}\", line {line}, in {}", self.location, self.name);
        if let Some(source) = &self.source_line {
            text.push_str("\n    ");
            text.push_str(source.trim());
        }
        text
    }
}

/// Cut the runtime's frames so the trace starts at handler code.
///
/// Frames must be ordered outermost first. Everything up to the innermost
/// runtime frame goes, then the std frames leading into the handler. An empty
/// result means no handler code was on the stack when it was captured.
pub fn strip_internal_frames(frames: Vec<StackFrame>) -> Vec<StackFrame> {
    let handler_start = frames
        .iter()
        .rposition(StackFrame::is_runtime)
        .map_or(0, |innermost_runtime| innermost_runtime + 1);
    frames
        .into_iter()
        .skip(handler_start)
        .skip_while(StackFrame::is_internal)
        .collect()
}

/// Parse the text rendering of a [`Backtrace`] into frames, innermost first.
pub fn parse_backtrace(rendered: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();
    for raw in rendered.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                let (file, line) = split_location(location);
                frame.location = file;
                frame.line = line;
            }
            continue;
        }

        let name = match trimmed.split_once(": ") {
            Some((index, rest)) if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) => {
                rest
            }
            _ => trimmed,
        };
        if name == "disabled backtrace" || name == "unsupported backtrace" {
            return Vec::new();
        }
        frames.push(StackFrame::new("<unknown>", None, strip_symbol_hash(name)));
    }
    frames
}

fn split_location(location: &str) -> (String, Option<u32>) {
    let mut parts = location.rsplitn(3, ':');
    let column = parts.next();
    let line = parts.next();
    let file = parts.next();
    match (file, line, column) {
        (Some(file), Some(line), Some(_)) => (file.to_string(), line.parse().ok()),
        _ => (location.to_string(), None),
    }
}

fn strip_symbol_hash(name: &str) -> &str {
    match name.rsplit_once("::h") {
        Some((head, hash))
            if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            head
        }
        _ => name,
    }
}

/// Turn a backtrace into handler-facing frames: capture machinery removed
/// from the innermost end, then reordered outermost first.
pub fn frames_from_backtrace(backtrace: &Backtrace) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = parse_backtrace(&backtrace.to_string())
        .into_iter()
        .skip_while(StackFrame::is_capture_machinery)
        .collect();
    frames.reverse();
    frames
}

/// An arbitrary runtime error raised while serving an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    error_type: String,
    message: String,
    frames: Vec<StackFrame>,
}

impl HandlerError {
    /// Capture `error` together with the stack at the point of the call.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        let backtrace = Backtrace::force_capture();
        Self {
            error_type: type_name::<E>().to_string(),
            message: error.to_string(),
            frames: frames_from_backtrace(&backtrace),
        }
    }

    /// Wrap an error observed after the code that raised it has returned.
    /// The stack at that point says nothing about the failure, so none is kept.
    pub fn untraced<E>(error: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self {
            error_type: type_name::<E>().to_string(),
            message: error.to_string(),
            frames: Vec::new(),
        }
    }

    /// Build from already-known parts, frames ordered outermost first.
    pub fn from_parts(
        error_type: impl Into<String>,
        message: impl Into<String>,
        frames: Vec<StackFrame>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            frames,
        }
    }

    pub fn error_type(&self) -> &str {
        &self.error_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }
}

/// `?` on any standard error inside a handler captures the stack at that point.
impl<E> From<E> for HandlerError
where
    E: std::error::Error + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}

/// Outcome of any failing stage of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    Fault(Fault),
    Runtime {
        error: HandlerError,
        context: Option<String>,
    },
}

impl InvocationError {
    pub fn runtime(error: HandlerError) -> Self {
        Self::Runtime {
            error,
            context: None,
        }
    }

    pub fn runtime_with_context(error: HandlerError, context: impl Into<String>) -> Self {
        Self::Runtime {
            error,
            context: Some(context.into()),
        }
    }

    pub fn to_wire_shape(&self) -> ErrorWireShape {
        match self {
            Self::Fault(fault) => ErrorWireShape::new(fault.message(), None, Vec::new()),
            Self::Runtime { error, context } => {
                let message = match context {
                    Some(context) => format!("{context}: {}", error.message()),
                    None => error.message().to_string(),
                };
                let stack_trace = strip_internal_frames(error.frames().to_vec())
                    .iter()
                    .map(StackFrame::format)
                    .collect();
                ErrorWireShape::new(message, Some(error.error_type().to_string()), stack_trace)
            }
        }
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(fault) => fault.fmt(f),
            Self::Runtime {
                error,
                context: Some(context),
            } => write!(f, "{context}: {error}"),
            Self::Runtime { error, .. } => error.fmt(f),
        }
    }
}

impl From<Fault> for InvocationError {
    fn from(fault: Fault) -> Self {
        Self::Fault(fault)
    }
}

impl From<HandlerError> for InvocationError {
    fn from(error: HandlerError) -> Self {
        Self::runtime(error)
    }
}

/// A typed error handed back by a handler. It reaches the runtime only after
/// the handler returned, so it carries no frames.
impl<E> From<E> for InvocationError
where
    E: std::error::Error + 'static,
{
    fn from(error: E) -> Self {
        Self::runtime(HandlerError::untraced(error))
    }
}
