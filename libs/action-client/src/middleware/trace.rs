use crate::error::ActionClientError;
use crate::request::Request;
use crate::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{Instrument, Level};

/// Tower layer that opens a tracing span around each submitted request
///
/// Creates a span `outgoing_http` with:
/// - `http.method`: The HTTP method
/// - `http.url`: scheme, authority and path (the query string is dropped)
///
/// Records `http.status_code` on response and sets `error=true` for 4xx/5xx
/// statuses and failed submissions.
#[derive(Clone, Debug, Default)]
pub struct TraceLayer;

impl TraceLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TraceLayer {
    type Service = TraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceService { inner }
    }
}

/// Service that wraps submissions with tracing spans
#[derive(Clone, Debug)]
pub struct TraceService<S> {
    inner: S,
}

impl<S> Service<Request> for TraceService<S>
where
    S: Service<Request, Response = Response, Error = ActionClientError> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = ActionClientError;
    type Future = Pin<Box<dyn Future<Output = Result<Response, ActionClientError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method();
        let uri = req.url();
        // Query strings may carry credentials
        let url_str = format!(
            "{}://{}{}",
            uri.scheme_str().unwrap_or("https"),
            uri.authority().map_or("", http::uri::Authority::as_str),
            uri.path()
        );

        // Swap so we call the instance that was poll_ready'd, leaving a fresh clone
        // for the next poll_ready cycle.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let span = tracing::span!(
                Level::INFO, "outgoing_http",
                http.method = %method,
                http.url = %url_str,
                http.status_code = tracing::field::Empty,
                error = tracing::field::Empty,
            );
            let started = Instant::now();

            let result = inner.call(req).instrument(span.clone()).await;

            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            match &result {
                Ok(response) => {
                    let status = response.status();
                    span.record("http.status_code", status.as_u16());
                    if status.is_client_error() || status.is_server_error() {
                        span.record("error", true);
                    }
                    span.in_scope(|| {
                        tracing::debug!(status = status.as_u16(), elapsed_ms, "request completed");
                    });
                }
                Err(err) => {
                    span.record("error", true);
                    span.in_scope(|| {
                        tracing::debug!(error = %err, elapsed_ms, "request failed");
                    });
                }
            }

            result
        })
    }
}
