#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Declarative outbound HTTP clients
//!
//! Callers declare *actions* that produce a fully-formed [`Request`], then
//! submit it through a [`Pipeline`]:
//! - a request middleware stack (`Content-Length`, default headers,
//!   `User-Agent`, logging, or any tower layer)
//! - a pluggable transport [`Adapter`] (hyper + rustls, or an in-memory
//!   [`NullAdapter`] for tests)
//! - a response middleware stack
//! - content-type based body decoding (JSON, XML) with per-prefix
//!   error handlers
//!
//! Non-2xx statuses are ordinary responses. Transport failures, decode
//! failures nobody handled, and misconfiguration surface as
//! [`ActionClientError`].
//!
//! # Example
//!
//! ```ignore
//! use action_client::{ActionClient, ClientConfig, TemplateSet};
//! use serde_json::json;
//!
//! let client = ActionClient::builder("articles")
//!     .config(&ClientConfig::load(None)?)
//!     .renderer(TemplateSet::new().json("articles/create", |locals| {
//!         json!({"title": locals["title"]})
//!     }))
//!     .action("create", |ctx, _args| ctx.post().path("/articles").build())
//!     .action("all", |ctx, _args| ctx.get().path("/articles").build())
//!     .build()?;
//!
//! let (status, headers, body) = client
//!     .submit("create", &json!({"title": "Hello"}))
//!     .await?
//!     .into_parts();
//! ```

pub mod adapters;
mod client;
mod config;
mod error;
mod headers;
pub mod middleware;
pub mod parser;
mod pipeline;
mod render;
mod request;
mod response;

pub use adapters::{
    Adapter, AdapterRegistry, HYPER_ADAPTER, HyperAdapter, HyperAdapterConfig, NULL_ADAPTER,
    NullAdapter, TlsRootConfig, TransportSecurity,
};
pub use client::{ActionClient, ActionClientBuilder, ActionContext, ActionRequest};
pub use config::{ClientConfig, ClientDefaults, DEFAULT_USER_AGENT, ENV_PREFIX};
pub use error::{ActionClientError, BoxError, ConfigError, DecodeError, InvalidUriKind};
pub use headers::{Headers, canonical_name};
pub use middleware::{MiddlewareStack, Next, RequestStack, ResponseStack, Stage};
pub use parser::{
    BodyParser, ContentNegotiator, DecodeErrorHandler, ErrorHandlerRegistry, ParserRegistry,
};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use render::{BodyRenderer, NoBody, RenderedBody, TemplateRef, TemplateSet};
pub use request::{Method, Request, RequestBuilder, parse_url};
pub use response::{Body, Response, XmlDocument, XmlElement, XmlNode, status_code};

pub use http::StatusCode;
