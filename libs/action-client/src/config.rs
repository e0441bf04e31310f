//! Client configuration.
//!
//! Sources are layered with figment: built-in defaults, then an optional YAML
//! file, then `ACTION_CLIENT_*` environment variables (nested keys separated
//! by `__`, e.g. `ACTION_CLIENT_HEADERS__ACCEPT`).

use crate::adapters::{
    DEFAULT_MAX_BODY_SIZE, DEFAULT_REQUEST_TIMEOUT, HYPER_ADAPTER, HyperAdapterConfig,
    TlsRootConfig, TransportSecurity,
};
use crate::error::{ActionClientError, ConfigError};
use crate::headers::Headers;
use crate::request::parse_url;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use http::Uri;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Prefix of environment variables read by [`ClientConfig::load`].
pub const ENV_PREFIX: &str = "ACTION_CLIENT_";

/// Default `User-Agent` for outbound requests.
pub const DEFAULT_USER_AGENT: &str = concat!("action-client/", env!("CARGO_PKG_VERSION"));

/// Serializable client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL that relative action paths are joined onto
    pub url: Option<String>,
    /// Headers applied to every request unless overridden per call
    pub headers: BTreeMap<String, String>,
    /// Identifier of the transport adapter
    pub adapter: String,
    pub user_agent: String,
    pub request_timeout_ms: u64,
    /// Limit on the decompressed response body
    pub max_body_size: usize,
    /// Permit plain `http://` URLs (mock servers, local development)
    pub allow_insecure_http: bool,
    pub tls_roots: TlsRootConfig,
    /// Wrap submissions in an `outgoing_http` tracing span
    pub trace: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: None,
            headers: BTreeMap::new(),
            adapter: HYPER_ADAPTER.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            request_timeout_ms: u64::try_from(DEFAULT_REQUEST_TIMEOUT.as_millis())
                .unwrap_or(u64::MAX),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            allow_insecure_http: false,
            tls_roots: TlsRootConfig::default(),
            trace: false,
        }
    }
}

impl ClientConfig {
    /// Load defaults, then `path` (if given), then the environment.
    ///
    /// # Errors
    /// Returns `ConfigError::Load` if a source cannot be read or a value has
    /// the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(ClientConfig::default()));
        if let Some(path) = path {
            if !path.is_file() {
                return Err(figment::Error::from(format!(
                    "configuration file not found: {}",
                    path.display()
                ))
                .into());
            }
            figment = figment.merge(Yaml::file(path));
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract from an already assembled figment.
    ///
    /// # Errors
    /// Returns `ConfigError::Load` if extraction fails.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn transport_security(&self) -> TransportSecurity {
        if self.allow_insecure_http {
            TransportSecurity::AllowInsecureHttp
        } else {
            TransportSecurity::TlsOnly
        }
    }

    /// Settings for the hyper transport.
    #[must_use]
    pub fn hyper_adapter_config(&self) -> HyperAdapterConfig {
        HyperAdapterConfig {
            request_timeout: self.request_timeout(),
            max_body_size: self.max_body_size,
            transport: self.transport_security(),
            tls_roots: self.tls_roots,
            ..HyperAdapterConfig::default()
        }
    }

    /// Validate and convert the request defaults.
    ///
    /// # Errors
    /// Returns an error if `url` is not an absolute `http`/`https` URL.
    pub fn resolve(&self) -> Result<ClientDefaults, ActionClientError> {
        let url = self.url.as_deref().map(parse_url).transpose()?;
        Ok(ClientDefaults {
            url,
            headers: self.headers.iter().collect(),
        })
    }
}

/// Validated request defaults shared by all actions of a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientDefaults {
    url: Option<Uri>,
    headers: Headers,
}

impl ClientDefaults {
    #[must_use]
    pub fn new(url: Option<Uri>, headers: Headers) -> Self {
        Self { url, headers }
    }

    #[must_use]
    pub fn url(&self) -> Option<&Uri> {
        self.url.as_ref()
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Join `path` onto the default URL with exactly one `/` between them.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingDefaultUrl` when no default URL is set, or
    /// a URL error if the joined URL is invalid.
    pub fn join_path(&self, path: &str) -> Result<Uri, ActionClientError> {
        let base = self.url.as_ref().ok_or(ConfigError::MissingDefaultUrl)?;
        let base = base.to_string();
        let joined = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        parse_url(&joined)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.adapter, "hyper");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.transport_security(), TransportSecurity::TlsOnly);
        assert!(config.user_agent.starts_with("action-client/"));
        assert!(!config.trace);
    }

    #[test]
    fn test_figment_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(ClientConfig::default())).merge(
            Serialized::defaults(serde_json::json!({
                "url": "https://api.example.com/v1",
                "headers": {"Accept": "application/json"},
                "adapter": "null",
                "allow_insecure_http": true,
                "tls_roots": "native",
            })),
        );
        let config = ClientConfig::from_figment(figment).unwrap();

        assert_eq!(config.url.as_deref(), Some("https://api.example.com/v1"));
        assert_eq!(config.adapter, "null");
        assert_eq!(config.tls_roots, TlsRootConfig::Native);
        assert_eq!(
            config.hyper_adapter_config().transport,
            TransportSecurity::AllowInsecureHttp
        );
        assert_eq!(config.request_timeout_ms, 30_000);
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = std::env::temp_dir().join(format!("action-client-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("client.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "url: https://example.com\nheaders:\n  X-Api-Key: secret\nrequest_timeout_ms: 1500\ntrace: true"
        )
        .unwrap();

        let config = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(config.url.as_deref(), Some("https://example.com"));
        assert_eq!(
            config.headers.get("X-Api-Key").map(String::as_str),
            Some("secret")
        );
        assert_eq!(config.request_timeout(), Duration::from_millis(1500));
        assert!(config.trace);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err =
            ClientConfig::load(Some(Path::new("/nonexistent/action-client.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_wrong_type_fails() {
        let figment = Figment::from(Serialized::defaults(ClientConfig::default())).merge(
            Serialized::defaults(serde_json::json!({"request_timeout_ms": "soon"})),
        );
        assert!(matches!(
            ClientConfig::from_figment(figment),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_resolve_validates_url() {
        let config = ClientConfig {
            url: Some("not a url".to_owned()),
            ..ClientConfig::default()
        };
        assert!(config.resolve().is_err());

        let config = ClientConfig {
            url: Some("https://example.com".to_owned()),
            headers: BTreeMap::from([("Accept".to_owned(), "text/plain".to_owned())]),
            ..ClientConfig::default()
        };
        let defaults = config.resolve().unwrap();
        assert_eq!(defaults.url().unwrap().host(), Some("example.com"));
        assert_eq!(defaults.headers().get("accept"), Some("text/plain"));
    }

    #[test]
    fn test_join_path() {
        let defaults = ClientDefaults::new(
            Some(parse_url("https://api.example.com/v1/").unwrap()),
            Headers::new(),
        );
        assert_eq!(
            defaults.join_path("/articles/1").unwrap(),
            "https://api.example.com/v1/articles/1"
        );
        assert_eq!(
            defaults.join_path("articles?page=2").unwrap(),
            "https://api.example.com/v1/articles?page=2"
        );

        let defaults = ClientDefaults::new(
            Some(parse_url("https://example.com").unwrap()),
            Headers::new(),
        );
        assert_eq!(
            defaults.join_path("/articles").unwrap(),
            "https://example.com/articles"
        );

        assert!(matches!(
            ClientDefaults::default().join_path("/articles"),
            Err(ActionClientError::Config(ConfigError::MissingDefaultUrl))
        ));
    }
}
