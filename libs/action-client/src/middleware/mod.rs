//! Onion-style middleware stacks.
//!
//! A [`Stage`] wraps the next service in the chain. A [`MiddlewareStack`] is
//! an ordered list of stages composed so that the first declared stage is the
//! outermost: it sees the request first and the result last. Stages may
//! rewrite the request, short-circuit by not calling [`Next::run`], or
//! post-process whatever the inner chain returns.
//!
//! The request stack transforms a [`Request`] into a [`Request`]; its
//! innermost endpoint returns the request unchanged. The response stack turns
//! a [`Request`] into a [`Response`]; its innermost endpoint is the transport
//! adapter.

mod stages;
mod trace;
mod user_agent;

pub use stages::{content_length, default_headers, parse_body, request_logger, user_agent};
pub use trace::{TraceLayer, TraceService};
pub use user_agent::{UserAgentLayer, UserAgentService};

use crate::error::ActionClientError;
use crate::request::Request;
use crate::response::Response;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceExt};

/// Type-erased service a stage wraps and produces.
pub type BoxedService<Out> = BoxCloneSyncService<Request, Out, ActionClientError>;

type WrapFn<Out> = dyn Fn(BoxedService<Out>) -> BoxedService<Out> + Send + Sync;

/// The rest of the chain, handed to a stage built with [`Stage::from_fn`].
pub struct Next<Out> {
    inner: BoxedService<Out>,
}

impl<Out: 'static> Next<Out> {
    /// Invoke the rest of the chain with `request`.
    ///
    /// # Errors
    /// Returns whatever error the inner chain produces.
    pub async fn run(self, request: Request) -> Result<Out, ActionClientError> {
        self.inner.oneshot(request).await
    }
}

/// A named middleware stage: a function from the next service to a new one.
pub struct Stage<Out> {
    name: Arc<str>,
    wrap: Arc<WrapFn<Out>>,
}

impl<Out> Clone for Stage<Out> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            wrap: Arc::clone(&self.wrap),
        }
    }
}

impl<Out> fmt::Debug for Stage<Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage").field("name", &self.name).finish()
    }
}

impl<Out: Send + 'static> Stage<Out> {
    /// Stage from a raw `(next) -> service` function.
    pub fn new<F>(name: impl Into<Arc<str>>, wrap: F) -> Self
    where
        F: Fn(BoxedService<Out>) -> BoxedService<Out> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            wrap: Arc::new(wrap),
        }
    }

    /// Stage from an async function of the request and the rest of the chain.
    ///
    /// ```ignore
    /// let stage = Stage::from_fn("auth", |request: Request, next: Next<Response>| async move {
    ///     next.run(request.with_header("Authorization", "Bearer token")).await
    /// });
    /// ```
    pub fn from_fn<F, Fut>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(Request, Next<Out>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Out, ActionClientError>> + Send + 'static,
    {
        let f = Arc::new(f);
        Self::new(name, move |inner: BoxedService<Out>| {
            let f = Arc::clone(&f);
            BoxCloneSyncService::new(tower::service_fn(move |request: Request| {
                f(
                    request,
                    Next {
                        inner: inner.clone(),
                    },
                )
            }))
        })
    }

    /// Stage from a tower [`Layer`].
    pub fn from_layer<L>(name: impl Into<Arc<str>>, layer: L) -> Self
    where
        L: Layer<BoxedService<Out>> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Out, Error = ActionClientError>
            + Clone
            + Send
            + Sync
            + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        Self::new(name, move |inner| {
            BoxCloneSyncService::new(layer.layer(inner))
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wrap `next` with this stage.
    #[must_use]
    pub fn wrap(&self, next: BoxedService<Out>) -> BoxedService<Out> {
        (self.wrap)(next)
    }
}

/// Ordered list of stages; the first declared stage is the outermost.
pub struct MiddlewareStack<Out> {
    stages: Vec<Stage<Out>>,
}

/// Stack applied to outgoing requests before they reach the transport.
pub type RequestStack = MiddlewareStack<Request>;

/// Stack wrapped around the transport adapter.
pub type ResponseStack = MiddlewareStack<Response>;

impl<Out> Default for MiddlewareStack<Out> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<Out> Clone for MiddlewareStack<Out> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<Out> fmt::Debug for MiddlewareStack<Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|stage| &stage.name))
            .finish()
    }
}

impl<Out: Send + 'static> MiddlewareStack<Out> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `stage` as the innermost stage so far.
    #[must_use]
    pub fn with(mut self, stage: Stage<Out>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Append `stage` as the innermost stage so far.
    pub fn push(&mut self, stage: Stage<Out>) {
        self.stages.push(stage);
    }

    /// Insert `stage` as the new outermost stage.
    pub fn push_front(&mut self, stage: Stage<Out>) {
        self.stages.insert(0, stage);
    }

    /// Remove every stage called `name`; returns whether any was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.stages.len();
        self.stages.retain(|stage| stage.name() != name);
        self.stages.len() != before
    }

    /// Stage names, outermost first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(Stage::name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Compose the stages around `endpoint`.
    #[must_use]
    pub fn build(&self, endpoint: BoxedService<Out>) -> BoxedService<Out> {
        self.stages
            .iter()
            .rev()
            .fold(endpoint, |next, stage| stage.wrap(next))
    }
}

impl MiddlewareStack<Request> {
    /// Default request stack: computes `Content-Length`.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new().with(content_length())
    }

    /// Endpoint of the request stack: returns the request unchanged.
    #[must_use]
    pub fn identity() -> BoxedService<Request> {
        BoxCloneSyncService::new(tower::service_fn(|request: Request| {
            std::future::ready(Ok::<_, ActionClientError>(request))
        }))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::headers::Headers;
    use crate::request::Method;
    use http::StatusCode;
    use parking_lot::Mutex;

    fn request() -> Request {
        Request::new(Method::Get, "https://example.com/").unwrap()
    }

    fn tagging(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Stage<Request> {
        Stage::from_fn(name, move |request: Request, next: Next<Request>| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(format!("{name}:before"));
                let request = next.run(request).await?;
                log.lock().push(format!("{name}:after"));
                Ok(request)
            }
        })
    }

    #[tokio::test]
    async fn test_first_declared_stage_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stack = RequestStack::new()
            .with(tagging("outer", Arc::clone(&log)))
            .with(tagging("inner", Arc::clone(&log)));

        stack
            .build(RequestStack::identity())
            .oneshot(request())
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec!["outer:before", "inner:before", "inner:after", "outer:after"]
        );
    }

    #[tokio::test]
    async fn test_identity_returns_request_unchanged() {
        let original = request().with_header("Accept", "text/plain");
        let out = RequestStack::identity()
            .oneshot(original.clone())
            .await
            .unwrap();
        assert_eq!(out, original);
    }

    #[tokio::test]
    async fn test_stage_can_short_circuit() {
        let endpoint_called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&endpoint_called);
        let endpoint: BoxedService<Response> =
            BoxCloneSyncService::new(tower::service_fn(move |_request: Request| {
                *flag.lock() = true;
                std::future::ready(Ok::<_, ActionClientError>(Response::empty()))
            }));

        let stack = ResponseStack::new().with(Stage::from_fn(
            "cache",
            |_request: Request, _next: Next<Response>| async move {
                Ok(Response::new(StatusCode::NOT_MODIFIED, Headers::new(), ""))
            },
        ));

        let response = stack.build(endpoint).oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(!*endpoint_called.lock());
    }

    #[tokio::test]
    async fn test_stage_error_propagates() {
        let stack = RequestStack::new().with(Stage::from_fn(
            "deny",
            |_request: Request, _next: Next<Request>| async move {
                Err(ActionClientError::middleware("deny", "blocked"))
            },
        ));

        let err = stack
            .build(RequestStack::identity())
            .oneshot(request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ActionClientError::Middleware { ref stage, .. } if stage == "deny"
        ));
    }

    #[test]
    fn test_stack_editing() {
        let mut stack = RequestStack::with_defaults();
        stack.push(default_headers(Headers::from([("Accept", "text/plain")])));
        stack.push_front(request_logger());

        assert_eq!(
            stack.names().collect::<Vec<_>>(),
            vec!["request_logger", "content_length", "default_headers"]
        );
        assert!(stack.remove("content_length"));
        assert!(!stack.remove("content_length"));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_empty_stack_is_endpoint() {
        let stack = RequestStack::new();
        assert!(stack.is_empty());
        let _service = stack.build(RequestStack::identity());
    }
}
