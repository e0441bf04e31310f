//! Request submission pipeline.
//!
//! `submit` runs the request stack, hands the prepared request to the
//! response stack (whose innermost endpoint is the transport adapter) and
//! returns what comes out. Body decoding is installed as the outermost
//! response stage so every user stage observes the raw body.

use crate::adapters::Adapter;
use crate::error::{ActionClientError, ConfigError};
use crate::middleware::{BoxedService, RequestStack, ResponseStack, Stage, TraceLayer, parse_body};
use crate::parser::{
    BodyParser, ContentNegotiator, DecodeErrorHandler, ErrorHandlerRegistry, ParserRegistry,
};
use crate::request::Request;
use crate::response::Response;
use std::fmt;
use std::sync::Arc;
use tower::ServiceExt;
use tower::util::BoxCloneSyncService;
use tracing::Instrument;

/// Immutable, shareable request pipeline.
///
/// Cloning is cheap; clones share the composed stacks and the adapter, so a
/// pipeline can serve concurrent submissions from many tasks.
#[derive(Clone)]
pub struct Pipeline {
    request_service: BoxedService<Request>,
    response_service: BoxedService<Response>,
    request_stages: Arc<[String]>,
    response_stages: Arc<[String]>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("request_stages", &self.request_stages)
            .field("response_stages", &self.response_stages)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Send `request` through both stacks.
    ///
    /// Non-2xx statuses are returned as responses.
    ///
    /// # Errors
    /// Returns the first error raised by a stage, the transport, or a parser
    /// whose error handler re-raises.
    pub async fn submit(&self, request: Request) -> Result<Response, ActionClientError> {
        let span = tracing::debug_span!(
            "submit",
            method = %request.method(),
            host = request.host().unwrap_or_default()
        );
        async {
            let request = self.request_service.clone().oneshot(request).await?;
            self.response_service.clone().oneshot(request).await
        }
        .instrument(span)
        .await
    }

    /// Run only the request stack; useful for inspecting what would be sent.
    ///
    /// # Errors
    /// Returns the first error raised by a request stage.
    pub async fn prepare(&self, request: Request) -> Result<Request, ActionClientError> {
        self.request_service.clone().oneshot(request).await
    }

    /// Request stage names, outermost first.
    #[must_use]
    pub fn request_stages(&self) -> &[String] {
        &self.request_stages
    }

    /// Response stage names as composed, outermost first.
    #[must_use]
    pub fn response_stages(&self) -> &[String] {
        &self.response_stages
    }
}

/// Builder for [`Pipeline`]
#[must_use]
pub struct PipelineBuilder {
    adapter: Option<Arc<dyn Adapter>>,
    request_stack: RequestStack,
    response_stack: ResponseStack,
    parsers: ParserRegistry,
    error_handlers: ErrorHandlerRegistry,
    trace: bool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Default request stack, empty response stack, default parsers, no
    /// adapter.
    pub fn new() -> Self {
        Self {
            adapter: None,
            request_stack: RequestStack::with_defaults(),
            response_stack: ResponseStack::new(),
            parsers: ParserRegistry::defaults(),
            error_handlers: ErrorHandlerRegistry::defaults(),
            trace: false,
        }
    }

    pub fn adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    pub fn shared_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Replace the request stack.
    pub fn request_stack(mut self, stack: RequestStack) -> Self {
        self.request_stack = stack;
        self
    }

    /// Replace the response stack.
    pub fn response_stack(mut self, stack: ResponseStack) -> Self {
        self.response_stack = stack;
        self
    }

    /// Append a request stage inside the existing ones.
    pub fn request_stage(mut self, stage: Stage<Request>) -> Self {
        self.request_stack.push(stage);
        self
    }

    /// Append a response stage inside the existing ones.
    pub fn response_stage(mut self, stage: Stage<Response>) -> Self {
        self.response_stack.push(stage);
        self
    }

    /// Override or add the parser for `prefix`.
    pub fn parser(mut self, prefix: impl Into<String>, parser: impl BodyParser + 'static) -> Self {
        self.parsers.insert(prefix, Arc::new(parser));
        self
    }

    /// Override or add the decode error handler for `prefix`.
    pub fn error_handler(
        mut self,
        prefix: impl Into<String>,
        handler: impl DecodeErrorHandler + 'static,
    ) -> Self {
        self.error_handlers.insert(prefix, Arc::new(handler));
        self
    }

    /// Merge `overrides` onto the current parsers.
    pub fn parsers(mut self, overrides: &ParserRegistry) -> Self {
        self.parsers.merge(overrides);
        self
    }

    /// Merge `overrides` onto the current error handlers.
    pub fn error_handlers(mut self, overrides: &ErrorHandlerRegistry) -> Self {
        self.error_handlers.merge(overrides);
        self
    }

    /// Wrap each submission's transport phase in an `outgoing_http` span.
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Compose the stacks.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingAdapter` if no adapter was set.
    pub fn build(self) -> Result<Pipeline, ActionClientError> {
        let adapter = self.adapter.ok_or(ConfigError::MissingAdapter)?;

        let mut response_stack = self.response_stack;
        response_stack.push_front(parse_body(ContentNegotiator::new(
            self.parsers,
            self.error_handlers,
        )));
        if self.trace {
            response_stack.push_front(Stage::from_layer("trace", TraceLayer::new()));
        }

        let endpoint: BoxedService<Response> =
            BoxCloneSyncService::new(tower::service_fn(move |request: Request| {
                let adapter = Arc::clone(&adapter);
                async move { adapter.call(request).await }
            }));

        let pipeline = Pipeline {
            request_service: self.request_stack.build(RequestStack::identity()),
            response_service: response_stack.build(endpoint),
            request_stages: self.request_stack.names().map(str::to_owned).collect(),
            response_stages: response_stack.names().map(str::to_owned).collect(),
        };
        tracing::debug!(
            request_stages = ?pipeline.request_stages,
            response_stages = ?pipeline.response_stages,
            "pipeline built"
        );
        Ok(pipeline)
    }
}
