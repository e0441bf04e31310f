use crate::error::{ActionClientError, ConfigError, InvalidUriKind};
use crate::headers::Headers;
use bytes::Bytes;
use http::Uri;
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP verbs understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
}

impl Method {
    pub const ALL: [Method; 9] = [
        Method::Connect,
        Method::Delete,
        Method::Get,
        Method::Head,
        Method::Options,
        Method::Patch,
        Method::Post,
        Method::Put,
        Method::Trace,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Connect => "CONNECT",
            Method::Delete => "DELETE",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownMethod(s.to_owned()))
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Connect => http::Method::CONNECT,
            Method::Delete => http::Method::DELETE,
            Method::Get => http::Method::GET,
            Method::Head => http::Method::HEAD,
            Method::Options => http::Method::OPTIONS,
            Method::Patch => http::Method::PATCH,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Trace => http::Method::TRACE,
        }
    }
}

impl TryFrom<&http::Method> for Method {
    type Error = ConfigError;

    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

/// Parse an absolute `http`/`https` URL.
///
/// Uses `http::Uri` parsing rather than string prefix matching. Whether plain
/// `http` is acceptable is decided later by the transport.
///
/// # Errors
/// Returns `InvalidUri` when the URL is malformed or lacks a scheme or host,
/// and `InvalidScheme` for schemes other than `http` and `https`.
pub fn parse_url(url: &str) -> Result<Uri, ActionClientError> {
    let uri: Uri =
        url.parse()
            .map_err(|e: http::uri::InvalidUri| ActionClientError::InvalidUri {
                url: url.to_owned(),
                kind: InvalidUriKind::ParseError,
                reason: e.to_string(),
            })?;

    if uri.authority().is_none() {
        return Err(ActionClientError::InvalidUri {
            url: url.to_owned(),
            kind: InvalidUriKind::MissingAuthority,
            reason: "missing host/authority".to_owned(),
        });
    }

    match uri.scheme_str() {
        Some("http" | "https") => Ok(uri),
        Some(scheme) => Err(ActionClientError::InvalidScheme {
            scheme: scheme.to_owned(),
            reason: "only http:// and https:// schemes are supported".to_owned(),
        }),
        None => Err(ActionClientError::InvalidUri {
            url: url.to_owned(),
            kind: InvalidUriKind::MissingScheme,
            reason: "missing scheme".to_owned(),
        }),
    }
}

/// An outbound HTTP request as it travels through the request stack.
///
/// Requests are values: every `with_*` method consumes the request and
/// returns a modified copy, so stages never observe each other's edits
/// except through the request they are handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    url: Uri,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Create a request with no headers and an empty body.
    ///
    /// # Errors
    /// Returns an error if `url` is not an absolute `http`/`https` URL.
    pub fn new(method: Method, url: &str) -> Result<Self, ActionClientError> {
        Ok(Self::from_uri(method, parse_url(url)?))
    }

    /// Create a request for an already validated URI.
    #[must_use]
    pub fn from_uri(method: Method, url: Uri) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Start building a request with header validation and typed bodies.
    pub fn builder(method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, url.into())
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn url(&self) -> &Uri {
        &self.url
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.url.host()
    }

    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.url.port_u16()
    }

    /// Path and query, `/` when the URL has neither.
    #[must_use]
    pub fn path_and_query(&self) -> &str {
        self.url
            .path_and_query()
            .map_or("/", http::uri::PathAndQuery::as_str)
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Set a header, replacing any value with the same name.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Overlay `headers`; the given values win over existing ones.
    #[must_use]
    pub fn with_headers(mut self, headers: &Headers) -> Self {
        self.headers.merge(headers);
        self
    }

    #[must_use]
    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: Uri) -> Self {
        self.url = url;
        self
    }

    /// Mutable access to the headers for stages that edit several at once.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Convert into a wire request for hyper-based transports.
    ///
    /// # Errors
    /// Returns an error if a header name or value is not legal on the wire.
    pub fn to_http(&self) -> Result<http::Request<Full<Bytes>>, ActionClientError> {
        let mut builder = http::Request::builder()
            .method(http::Method::from(self.method))
            .uri(self.url.clone());
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers.to_header_map()?;
        }
        Ok(builder.body(Full::new(self.body.clone()))?)
    }
}

/// Fluent request builder.
///
/// Header validation errors are captured and reported from [`build`](Self::build)
/// so that calls can be chained without intermediate `?`.
#[must_use = "RequestBuilder does nothing until .build() is called"]
pub struct RequestBuilder {
    method: Method,
    url: String,
    headers: Headers,
    body: Bytes,
    default_content_type: Option<&'static str>,
    /// Error captured during building (deferred to `build()`)
    error: Option<ActionClientError>,
}

impl RequestBuilder {
    fn new(method: Method, url: String) -> Self {
        Self {
            method,
            url,
            headers: Headers::new(),
            body: Bytes::new(),
            default_content_type: None,
            error: None,
        }
    }

    fn check_header(name: &str, value: &str) -> Result<(), ActionClientError> {
        http::header::HeaderName::try_from(name)?;
        http::header::HeaderValue::try_from(value)?;
        Ok(())
    }

    /// Add a single header to the request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match Self::check_header(name, value) {
            Ok(()) => self.headers.insert(name, value),
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Add every header from `headers`; later values win.
    pub fn headers(mut self, headers: &Headers) -> Self {
        for (name, value) in headers.iter() {
            if self.error.is_some() {
                break;
            }
            self = self.header(name, value);
        }
        self
    }

    /// Set request body as JSON
    ///
    /// Sets Content-Type to application/json unless one was already provided.
    ///
    /// # Errors
    /// Returns `Err(ActionClientError::Json)` if serialization fails, or any
    /// header error captured earlier.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ActionClientError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.body = Bytes::from(serde_json::to_vec(body)?);
        self.default_content_type = Some("application/json");
        Ok(self)
    }

    /// Set request body as form URL-encoded
    ///
    /// Sets Content-Type to application/x-www-form-urlencoded unless one was
    /// already provided.
    ///
    /// # Errors
    /// Returns `Err(ActionClientError::FormEncode)` if encoding fails.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Result<Self, ActionClientError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.body = Bytes::from(serde_urlencoded::to_string(fields)?);
        self.default_content_type = Some("application/x-www-form-urlencoded");
        Ok(self)
    }

    /// Set the raw request body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Validate the URL and produce the request.
    ///
    /// # Errors
    /// Returns the first header error captured while building, or a URL
    /// validation error.
    pub fn build(self) -> Result<Request, ActionClientError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut headers = self.headers;
        if let Some(content_type) = self.default_content_type {
            headers.insert_if_absent("Content-Type", content_type);
        }
        Ok(Request {
            method: self.method,
            url: parse_url(&self.url)?,
            headers,
            body: self.body,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parse_ignores_case() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("Patch".parse::<Method>().unwrap(), Method::Patch);
        assert!(matches!(
            "FETCH".parse::<Method>(),
            Err(ConfigError::UnknownMethod(m)) if m == "FETCH"
        ));
    }

    #[test]
    fn test_method_round_trips_through_http() {
        for method in Method::ALL {
            let wire = http::Method::from(method);
            assert_eq!(wire.as_str(), method.as_str());
            assert_eq!(Method::try_from(&wire).unwrap(), method);
        }
    }

    #[test]
    fn test_parse_url_rejects_relative_and_foreign_schemes() {
        assert!(matches!(
            parse_url("/articles"),
            Err(ActionClientError::InvalidUri {
                kind: InvalidUriKind::MissingAuthority,
                ..
            })
        ));
        assert!(matches!(
            parse_url("ftp://example.com/file"),
            Err(ActionClientError::InvalidScheme { scheme, .. }) if scheme == "ftp"
        ));
        assert!(matches!(
            parse_url("http://exa mple.com"),
            Err(ActionClientError::InvalidUri {
                kind: InvalidUriKind::ParseError,
                ..
            })
        ));
    }

    #[test]
    fn test_request_accessors() {
        let request =
            Request::new(Method::Get, "https://example.com:8443/articles?page=2").unwrap();
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.host(), Some("example.com"));
        assert_eq!(request.port(), Some(8443));
        assert_eq!(request.path_and_query(), "/articles?page=2");
        assert!(request.body().is_empty());
        assert!(request.headers().is_empty());
    }

    #[test]
    fn test_with_methods_return_modified_copies() {
        let original = Request::new(Method::Post, "https://example.com/").unwrap();
        let changed = original
            .clone()
            .with_header("Accept", "application/json")
            .with_body("{}");

        assert!(original.headers().is_empty());
        assert!(original.body().is_empty());
        assert_eq!(changed.headers().get("accept"), Some("application/json"));
        assert_eq!(changed.body().as_ref(), b"{}");
        assert!(changed.without_header("ACCEPT").headers().is_empty());
    }

    #[test]
    fn test_builder_json_sets_content_type_once() {
        let request = Request::builder(Method::Post, "https://example.com/articles")
            .json(&json!({"title": "Hello"}))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(request.headers().content_type(), Some("application/json"));
        assert_eq!(request.body().as_ref(), br#"{"title":"Hello"}"#);

        let request = Request::builder(Method::Post, "https://example.com/articles")
            .header("Content-Type", "application/vnd.api+json")
            .json(&json!({}))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers().content_type(),
            Some("application/vnd.api+json")
        );
    }

    #[test]
    fn test_builder_form_body() {
        let request = Request::builder(Method::Post, "https://auth.example.com/token")
            .form(&[("grant_type", "client_credentials"), ("scope", "a b")])
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.body().as_ref(),
            b"grant_type=client_credentials&scope=a+b"
        );
        assert_eq!(
            request.headers().content_type(),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_builder_defers_header_errors() {
        let result = Request::builder(Method::Get, "https://example.com")
            .header("bad header", "x")
            .header("Accept", "text/plain")
            .build();
        assert!(matches!(
            result,
            Err(ActionClientError::InvalidHeaderName(_))
        ));

        let result = Request::builder(Method::Get, "https://example.com")
            .header("X-Value", "line\nbreak")
            .build();
        assert!(matches!(
            result,
            Err(ActionClientError::InvalidHeaderValue(_))
        ));
    }

    #[test]
    fn test_to_http() {
        let request = Request::new(Method::Put, "https://example.com/a")
            .unwrap()
            .with_header("X-Request-Id", "abc")
            .with_body("payload");
        let wire = request.to_http().unwrap();
        assert_eq!(wire.method(), http::Method::PUT);
        assert_eq!(wire.uri(), "https://example.com/a");
        assert_eq!(wire.headers().get("x-request-id").unwrap(), "abc");
    }
}
