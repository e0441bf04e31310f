use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed error used at the seams where arbitrary user code can fail
/// (middleware stages, parsers, transports).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL is missing required scheme (http/https)
    MissingScheme,
}

/// Misconfiguration detected while building a request or a pipeline.
///
/// These are raised before any network activity takes place.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Both an absolute URL and a relative path were supplied
    #[error("both `url` and `path` were supplied; pass exactly one")]
    AmbiguousTarget,

    /// Neither an absolute URL nor a relative path was supplied
    #[error("neither `url` nor `path` was supplied")]
    MissingTarget,

    /// A relative path was supplied but the client has no default URL
    #[error("`path` was supplied but no default URL is configured")]
    MissingDefaultUrl,

    /// No action with this name is declared on the client
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// No transport adapter is registered under this identifier
    #[error("unknown adapter '{0}'")]
    UnknownAdapter(String),

    /// A pipeline was built without a transport adapter
    #[error("no transport adapter configured")]
    MissingAdapter,

    /// The method name is not one of the supported HTTP verbs
    #[error("unsupported HTTP method '{0}'")]
    UnknownMethod(String),

    /// Response status outside the `100..=599` range
    #[error("status code {0} is outside 100..=599")]
    InvalidStatus(u16),

    /// Configuration sources could not be read or merged
    #[error("failed to load configuration: {0}")]
    Load(#[source] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// A registered parser rejected a response body.
///
/// Carries the matched content type and the raw, undecoded body so that
/// callers can inspect what the server actually sent.
pub struct DecodeError {
    content_type: String,
    body: Bytes,
    source: BoxError,
}

impl DecodeError {
    /// Create a decode error for `body` received with `content_type`.
    pub fn new(content_type: impl Into<String>, body: Bytes, source: impl Into<BoxError>) -> Self {
        Self {
            content_type: content_type.into(),
            body,
            source: source.into(),
        }
    }

    /// Content type the body was declared with.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The raw body exactly as received.
    #[must_use]
    pub fn raw_body(&self) -> &Bytes {
        &self.body
    }

    /// The raw body as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn raw_body_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Consume the error and return the raw body.
    #[must_use]
    pub fn into_raw_body(self) -> Bytes {
        self.body
    }
}

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeError")
            .field("content_type", &self.content_type)
            .field("body_len", &self.body.len())
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to decode '{}' body: {}",
            self.content_type, self.source
        )
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Action client error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ActionClientError {
    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Transport attempt timed out
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport error (network, connection, TLS, etc)
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// A parser rejected the response body and the error handler re-raised it
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Request or pipeline misconfiguration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// JSON serialization of a request body failed
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Form URL encoding of a request body failed
    #[error("Form encoding failed: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),

    /// A middleware stage failed
    #[error("Middleware stage '{stage}' failed: {source}")]
    Middleware {
        /// Name of the failing stage
        stage: String,
        /// Error raised by the stage
        #[source]
        source: BoxError,
    },

    /// The body renderer failed for a template
    #[error("Failed to render template '{template}': {source}")]
    Render {
        /// Template path, `client/action`
        template: String,
        #[source]
        source: BoxError,
    },

    /// Invalid URL (failed to parse)
    ///
    /// Use the `kind` field for programmatic matching. The `reason` field contains
    /// a diagnostic message intended for logging only.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        /// The URL that failed to parse
        url: String,
        /// Structured failure classification for programmatic matching
        kind: InvalidUriKind,
        /// Diagnostic message (unstable format, for logging only)
        reason: String,
    },

    /// Invalid URL scheme for the transport security configuration
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme {
        /// The URL scheme that was rejected
        scheme: String,
        /// Reason the scheme was rejected
        reason: String,
    },
}

impl ActionClientError {
    /// Wrap an error raised inside the middleware stage called `stage`.
    pub fn middleware(stage: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ActionClientError::Middleware {
            stage: stage.into(),
            source: source.into(),
        }
    }

    /// Wrap an error raised while rendering `template`.
    pub fn render(template: impl Into<String>, source: impl Into<BoxError>) -> Self {
        ActionClientError::Render {
            template: template.into(),
            source: source.into(),
        }
    }

    /// Whether the failure happened while talking to the remote server.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ActionClientError::Transport(_)
                | ActionClientError::Timeout(_)
                | ActionClientError::BodyTooLarge { .. }
        )
    }

    /// Whether a response body could not be decoded.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, ActionClientError::Decode(_))
    }

    /// Whether the request or pipeline was misconfigured.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, ActionClientError::Config(_))
    }

    /// The decode failure, if this is one.
    #[must_use]
    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            ActionClientError::Decode(err) => Some(err),
            _ => None,
        }
    }

    /// The configuration failure, if this is one.
    #[must_use]
    pub fn as_config(&self) -> Option<&ConfigError> {
        match self {
            ActionClientError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<hyper::Error> for ActionClientError {
    fn from(err: hyper::Error) -> Self {
        ActionClientError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for ActionClientError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        ActionClientError::Transport(Box::new(err))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::error::Error;

    #[derive(Debug)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Error for TestError {}

    #[test]
    fn test_transport_error_preserves_source() {
        let err = ActionClientError::Transport(Box::new(TestError("connection refused")));

        let source = err.source().unwrap();
        let downcast = source.downcast_ref::<TestError>();
        assert_eq!(downcast.unwrap().0, "connection refused");
        assert!(err.is_transport());
        assert!(!err.is_decode());
    }

    #[test]
    fn test_decode_error_keeps_raw_body() {
        let err = DecodeError::new(
            "application/json",
            Bytes::from_static(b"junk"),
            TestError("expected value"),
        );

        assert_eq!(err.content_type(), "application/json");
        assert_eq!(err.raw_body().as_ref(), b"junk");
        assert_eq!(err.raw_body_lossy(), "junk");
        assert!(err.to_string().contains("application/json"));
        assert!(err.to_string().contains("expected value"));

        let wrapped = ActionClientError::from(err);
        assert!(wrapped.is_decode());
        assert_eq!(wrapped.as_decode().unwrap().raw_body().as_ref(), b"junk");
    }

    #[test]
    fn test_decode_error_debug_omits_body_contents() {
        let err = DecodeError::new("text/xml", Bytes::from_static(b"secret"), TestError("bad"));
        let debug = format!("{err:?}");
        assert!(debug.contains("body_len: 6"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_config_error_is_config() {
        let err = ActionClientError::from(ConfigError::AmbiguousTarget);
        assert!(err.is_config());
        assert!(matches!(
            err.as_config(),
            Some(ConfigError::AmbiguousTarget)
        ));
    }

    #[test]
    fn test_middleware_error_chain() {
        let err = ActionClientError::middleware("auth", TestError("token expired"));

        assert_eq!(
            err.to_string(),
            "Middleware stage 'auth' failed: token expired"
        );

        let mut count = 0;
        let mut current: Option<&(dyn Error + 'static)> = Some(&err);
        while let Some(e) = current {
            count += 1;
            current = e.source();
        }
        assert_eq!(count, 2);
    }
}
