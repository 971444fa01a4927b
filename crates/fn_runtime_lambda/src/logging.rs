//! Log output for the runtime and for handler code.
//!
//! Every event becomes one line on stdout:
//!
//! ```text
//! [LEVEL]\t2024-01-01T00:00:00.000Z\t<request id>\t<message and fields>
//! ```
//!
//! The request id comes from the enclosing `invocation` span, so lines
//! emitted between invocations carry an empty id.

use std::fmt;

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

pub const INVOCATION_SPAN: &str = "invocation";
pub const REQUEST_ID_FIELD: &str = "request_id";

const DEFAULT_FILTER: &str = "info";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init() -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(RequestIdLayer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stdout)
                .event_format(InvocationLineFormat),
        )
        .try_init()
}

/// Request id of the invocation a span belongs to, kept in span extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Records the `request_id` field of new spans into their extensions.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = RequestIdVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(request_id), Some(span)) = (visitor.request_id, ctx.span(id)) {
            span.extensions_mut().insert(RequestId(request_id));
        }
    }
}

#[derive(Default)]
struct RequestIdVisitor {
    request_id: Option<String>,
}

impl Visit for RequestIdVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == REQUEST_ID_FIELD {
            self.request_id = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == REQUEST_ID_FIELD {
            self.request_id = Some(format!("{value:?}"));
        }
    }
}

/// Tab-separated line format tagged with the current request id.
#[derive(Debug, Default, Clone, Copy)]
pub struct InvocationLineFormat;

impl<S, N> FormatEvent<S, N> for InvocationLineFormat
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let request_id = ctx
            .event_scope()
            .into_iter()
            .flatten()
            .find_map(|span| span.extensions().get::<RequestId>().map(|id| id.0.clone()))
            .unwrap_or_default();

        write!(
            writer,
            "[{}]\t{}\t{}\t",
            event.metadata().level(),
            Utc::now().format(TIMESTAMP_FORMAT),
            request_id
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
