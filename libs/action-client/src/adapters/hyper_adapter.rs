use super::{Adapter, tls};
use crate::error::{ActionClientError, BoxError};
use crate::headers::Headers;
use crate::request::Request;
use crate::response::{Body, Response, status_code};
use async_trait::async_trait;
use bytes::Bytes;
use http::Uri;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneSyncService;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit on the decompressed response body (10 MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport security configuration
///
/// Controls whether the transport enforces TLS or allows plain HTTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only)
    #[default]
    TlsOnly,
    /// Allow plain HTTP connections, e.g. against local mock servers
    AllowInsecureHttp,
}

/// Settings for [`HyperAdapter`]
#[derive(Debug, Clone)]
pub struct HyperAdapterConfig {
    /// Timeout for one exchange, including reading the body headers
    pub request_timeout: Duration,
    /// Limit on the decompressed response body
    pub max_body_size: usize,
    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,
    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,
    /// Idle timeout for pooled connections; `None` keeps them indefinitely
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
}

impl Default for HyperAdapterConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
        }
    }
}

type ResponseBody = BoxBody<Bytes, BoxError>;

type TransportService = BoxCloneSyncService<
    http::Request<Full<Bytes>>,
    http::Response<ResponseBody>,
    ActionClientError,
>;

/// Transport backed by a pooled hyper client over rustls.
///
/// Responses are transparently decompressed (gzip, brotli, deflate) and the
/// body limit applies to the decompressed bytes.
#[derive(Clone)]
pub struct HyperAdapter {
    service: TransportService,
    max_body_size: usize,
    transport: TransportSecurity,
}

impl fmt::Debug for HyperAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperAdapter")
            .field("max_body_size", &self.max_body_size)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl HyperAdapter {
    /// Build the transport.
    ///
    /// # Errors
    /// Returns `Transport` if the TLS configuration cannot be built.
    pub fn new(config: HyperAdapterConfig) -> Result<Self, ActionClientError> {
        if config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 use only for testing with mock servers"
            );
        }

        let timeout = config.request_timeout;
        let https = tls::https_connector(config.tls_roots, config.transport)?;

        let mut client_builder = Client::builder(TokioExecutor::new());
        // pool_timer is required for pool_idle_timeout to take effect
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host);
        if let Some(idle_timeout) = config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle_timeout);
        }
        let client = client_builder.build::<_, Full<Bytes>>(https);

        // Request flow: Timeout -> Decompression -> hyper client
        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(timeout))
            .layer(DecompressionLayer::new())
            .service(client)
            .map_response(box_response_body)
            .map_err(move |e: tower::BoxError| map_transport_error(e, timeout));

        Ok(Self {
            service: BoxCloneSyncService::new(service),
            max_body_size: config.max_body_size,
            transport: config.transport,
        })
    }

    fn check_scheme(&self, uri: &Uri) -> Result<(), ActionClientError> {
        match uri.scheme_str() {
            Some("https") => Ok(()),
            Some("http") => match self.transport {
                TransportSecurity::AllowInsecureHttp => Ok(()),
                TransportSecurity::TlsOnly => Err(ActionClientError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                }),
            },
            other => Err(ActionClientError::InvalidScheme {
                scheme: other.unwrap_or_default().to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
        }
    }
}

#[async_trait]
impl Adapter for HyperAdapter {
    async fn call(&self, request: Request) -> Result<Response, ActionClientError> {
        self.check_scheme(request.url())?;
        let wire = request.to_http()?;

        let response = self.service.clone().oneshot(wire).await?;
        let (parts, body) = response.into_parts();
        // hyper accepts any three-digit status; only 100..=599 is meaningful
        let status = status_code(parts.status.as_u16())
            .map_err(|e| ActionClientError::Transport(Box::new(e)))?;
        let body = read_body_limited(body, self.max_body_size).await?;

        tracing::debug!(
            status = status.as_u16(),
            bytes = body.len(),
            "response received"
        );
        Ok(Response::new(
            status,
            Headers::from_header_map(&parts.headers),
            Body::Raw(body),
        ))
    }
}

fn map_transport_error(err: tower::BoxError, timeout: Duration) -> ActionClientError {
    if err.is::<tower::timeout::error::Elapsed>() {
        return ActionClientError::Timeout(timeout);
    }
    match err.downcast::<ActionClientError>() {
        Ok(err) => *err,
        Err(other) => ActionClientError::Transport(other),
    }
}

/// Box the decompression body so the service type can be erased.
fn box_response_body<B>(response: http::Response<B>) -> http::Response<ResponseBody>
where
    B: http_body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    let (parts, body) = response.into_parts();
    http::Response::from_parts(parts, body.map_err(Into::into).boxed())
}

/// Collect `body`, failing as soon as it grows past `limit` bytes.
async fn read_body_limited(body: ResponseBody, limit: usize) -> Result<Bytes, ActionClientError> {
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(ActionClientError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(ActionClientError::BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}
