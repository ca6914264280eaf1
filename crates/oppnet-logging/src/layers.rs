//! Custom tracing layers for oppnet
//!
//! This module provides the layer that attaches node context to spans, and
//! the formatting layers the subscriber builder composes.

use tracing::{Subscriber, span};
use tracing_subscriber::{
    Layer,
    fmt::MakeWriter,
    layer::Context,
    registry::LookupSpan,
};

use crate::config::JsonlConfig;
use crate::context::{NodeContextData, NodeContextGuard};

/// A type-erased layer over subscriber `S`
pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Layer that attaches node context to spans
///
/// Every span created while a [`NodeContextGuard`] is active gets a
/// [`NodeContextExtension`] holding the node identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeContextLayer;

impl NodeContextLayer {
    /// Create a new node context layer
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct NodeContextExtension {
    pub data: NodeContextData,
}

impl<S> Layer<S> for NodeContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        if let Some(node) = NodeContextGuard::current() {
            span.extensions_mut().insert(NodeContextExtension { data: node });
        }
    }
}

/// JSONL formatting layer writing to `writer`
pub fn jsonl_layer<S, W>(config: &JsonlConfig, writer: W) -> BoxedLayer<S>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(config.include_current_span)
        .with_span_list(config.include_spans)
        .flatten_event(config.flatten_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_info)
        .with_thread_names(config.include_thread_info)
        .with_writer(writer)
        .boxed()
}

/// Human-readable console layer
pub fn pretty_layer<S>(ansi: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .boxed()
}
