//! Transport adapters.
//!
//! An adapter performs the actual exchange for a fully prepared request and
//! returns the status, canonical headers and raw body. Non-2xx statuses are
//! responses, not errors. Adapters are looked up by identifier in an
//! [`AdapterRegistry`].

mod hyper_adapter;
mod null;
mod tls;

pub use hyper_adapter::{
    DEFAULT_MAX_BODY_SIZE, DEFAULT_REQUEST_TIMEOUT, HyperAdapter, HyperAdapterConfig,
    TlsRootConfig, TransportSecurity,
};
pub use null::NullAdapter;

use crate::config::ClientConfig;
use crate::error::{ActionClientError, ConfigError};
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identifier of the hyper-based HTTPS transport.
pub const HYPER_ADAPTER: &str = "hyper";

/// Identifier of the in-memory test transport.
pub const NULL_ADAPTER: &str = "null";

/// Performs one HTTP exchange.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Send `request` and return the response with canonical header names
    /// and an undecoded body.
    ///
    /// # Errors
    /// Returns an error for transport failures only.
    async fn call(&self, request: Request) -> Result<Response, ActionClientError>;
}

#[async_trait]
impl<A: Adapter + ?Sized> Adapter for Arc<A> {
    async fn call(&self, request: Request) -> Result<Response, ActionClientError> {
        (**self).call(request).await
    }
}

/// Adapters keyed by identifier.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn Adapter>>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.adapters.keys()).finish()
    }
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in adapters configured from `config`.
    ///
    /// The hyper transport is only constructed when `config` selects it, so
    /// its TLS setup never affects clients running on another adapter.
    ///
    /// # Errors
    /// Returns an error if the hyper transport cannot be constructed (for
    /// example when native TLS roots are requested but none are available).
    pub fn from_config(config: &ClientConfig) -> Result<Self, ActionClientError> {
        let mut registry = Self::new().with(NULL_ADAPTER, NullAdapter::default());
        if config.adapter == HYPER_ADAPTER {
            registry = registry.with(
                HYPER_ADAPTER,
                HyperAdapter::new(config.hyper_adapter_config())?,
            );
        }
        Ok(registry)
    }

    /// Register `adapter` under `name`, replacing any previous registration.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, adapter: impl Adapter + 'static) -> Self {
        self.register(name, Arc::new(adapter));
        self
    }

    pub fn register(&mut self, name: impl Into<String>, adapter: Arc<dyn Adapter>) {
        self.adapters.insert(name.into(), adapter);
    }

    /// Adapter registered under `name`.
    ///
    /// # Errors
    /// Returns `ConfigError::UnknownAdapter` if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Adapter>, ConfigError> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownAdapter(name.to_owned()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}
