//! Declarative clients built from named actions.
//!
//! Each action is a handler that turns caller arguments into a [`Request`]
//! through an [`ActionContext`]. The context knows the client's default URL,
//! default headers and body renderer, so handlers only state what differs.
//!
//! ```ignore
//! let client = ActionClient::builder("articles")
//!     .config(&ClientConfig::load(None)?)
//!     .renderer(TemplateSet::new().json("articles/create", |locals| {
//!         json!({"title": locals["title"]})
//!     }))
//!     .action("create", |ctx, _args| ctx.post().path("/articles").build())
//!     .build()?;
//!
//! let response = client.submit("create", &json!({"title": "Hello"})).await?;
//! ```

use crate::adapters::AdapterRegistry;
use crate::config::{ClientConfig, ClientDefaults};
use crate::error::{ActionClientError, ConfigError};
use crate::headers::Headers;
use crate::middleware::user_agent;
use crate::pipeline::Pipeline;
use crate::render::{BodyRenderer, NoBody, TemplateRef};
use crate::request::{Method, Request, parse_url};
use crate::response::Response;
use bytes::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type ActionFn =
    dyn Fn(&ActionContext<'_>, &Value) -> Result<Request, ActionClientError> + Send + Sync;

struct Inner {
    name: String,
    defaults: ClientDefaults,
    renderer: Arc<dyn BodyRenderer>,
    actions: HashMap<String, Arc<ActionFn>>,
    pipeline: Pipeline,
}

/// A named set of actions sharing defaults, a renderer and a pipeline.
///
/// Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct ActionClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for ActionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionClient")
            .field("name", &self.inner.name)
            .field("defaults", &self.inner.defaults)
            .field("actions", &self.actions())
            .field("pipeline", &self.inner.pipeline)
            .finish_non_exhaustive()
    }
}

impl ActionClient {
    pub fn builder(name: impl Into<String>) -> ActionClientBuilder {
        ActionClientBuilder::new(name)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn defaults(&self) -> &ClientDefaults {
        &self.inner.defaults
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// Declared action names, sorted.
    #[must_use]
    pub fn actions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the request for `action` without sending it.
    ///
    /// # Errors
    /// Returns `ConfigError::UnknownAction` for undeclared actions, or
    /// whatever the action handler fails with.
    pub fn request(&self, action: &str, args: &Value) -> Result<Request, ActionClientError> {
        let handler = self
            .inner
            .actions
            .get(action)
            .ok_or_else(|| ConfigError::UnknownAction(action.to_owned()))?;

        let context = ActionContext {
            inner: &self.inner,
            action,
            args,
        };
        let request = handler(&context, args)?;
        tracing::debug!(
            client = %self.inner.name,
            action,
            method = %request.method(),
            url = %request.url(),
            "action request built"
        );
        Ok(request)
    }

    /// Build the request for `action` and submit it through the pipeline.
    ///
    /// # Errors
    /// Returns request building errors as [`request`](Self::request) does,
    /// and any error raised by the pipeline.
    pub async fn submit(&self, action: &str, args: &Value) -> Result<Response, ActionClientError> {
        let request = self.request(action, args)?;
        self.inner.pipeline.submit(request).await
    }
}

/// Builder for [`ActionClient`]
#[must_use]
pub struct ActionClientBuilder {
    name: String,
    config: ClientConfig,
    defaults: Option<ClientDefaults>,
    adapters: Option<AdapterRegistry>,
    renderer: Arc<dyn BodyRenderer>,
    actions: HashMap<String, Arc<ActionFn>>,
    pipeline: Option<Pipeline>,
}

impl ActionClientBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: ClientConfig::default(),
            defaults: None,
            adapters: None,
            renderer: Arc::new(NoBody),
            actions: HashMap::new(),
            pipeline: None,
        }
    }

    /// Take the default URL, default headers and transport settings from
    /// `config`.
    pub fn config(mut self, config: &ClientConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Use already validated defaults instead of the ones in the config.
    pub fn defaults(mut self, defaults: ClientDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Adapters the configured adapter identifier is resolved against.
    ///
    /// Without this, the built-in `hyper` and `null` adapters are available.
    pub fn adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = Some(adapters);
        self
    }

    pub fn renderer(mut self, renderer: impl BodyRenderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Declare `name`; a later declaration with the same name replaces it.
    pub fn action<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ActionContext<'_>, &Value) -> Result<Request, ActionClientError>
            + Send
            + Sync
            + 'static,
    {
        self.actions.insert(name.into(), Arc::new(handler));
        self
    }

    /// Submit through `pipeline` instead of one assembled from the config.
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Resolve defaults and the adapter, then assemble the client.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid default URL, an unknown
    /// adapter identifier or an invalid user agent, and a transport error if
    /// the adapter cannot be constructed.
    pub fn build(self) -> Result<ActionClient, ActionClientError> {
        let defaults = match self.defaults {
            Some(defaults) => defaults,
            None => self.config.resolve()?,
        };

        let pipeline = match self.pipeline {
            Some(pipeline) => pipeline,
            None => {
                let adapters = match self.adapters {
                    Some(adapters) => adapters,
                    None => AdapterRegistry::from_config(&self.config)?,
                };
                Pipeline::builder()
                    .shared_adapter(adapters.get(&self.config.adapter)?)
                    .request_stage(user_agent(&self.config.user_agent)?)
                    .trace(self.config.trace)
                    .build()?
            }
        };

        tracing::debug!(
            client = %self.name,
            actions = self.actions.len(),
            adapter = %self.config.adapter,
            "action client built"
        );

        Ok(ActionClient {
            inner: Arc::new(Inner {
                name: self.name,
                defaults,
                renderer: self.renderer,
                actions: self.actions,
                pipeline,
            }),
        })
    }
}

/// Handed to action handlers; starts a request for one HTTP verb.
pub struct ActionContext<'a> {
    inner: &'a Inner,
    action: &'a str,
    args: &'a Value,
}

impl<'a> ActionContext<'a> {
    #[must_use]
    pub fn client_name(&self) -> &'a str {
        &self.inner.name
    }

    #[must_use]
    pub fn action(&self) -> &'a str {
        self.action
    }

    pub fn request(&self, method: Method) -> ActionRequest<'a> {
        ActionRequest {
            inner: self.inner,
            action: self.action,
            method,
            path: None,
            url: None,
            headers: Headers::new(),
            locals: None,
            args: self.args,
            body: None,
        }
    }

    pub fn connect(&self) -> ActionRequest<'a> {
        self.request(Method::Connect)
    }

    pub fn delete(&self) -> ActionRequest<'a> {
        self.request(Method::Delete)
    }

    pub fn get(&self) -> ActionRequest<'a> {
        self.request(Method::Get)
    }

    pub fn head(&self) -> ActionRequest<'a> {
        self.request(Method::Head)
    }

    pub fn options(&self) -> ActionRequest<'a> {
        self.request(Method::Options)
    }

    pub fn patch(&self) -> ActionRequest<'a> {
        self.request(Method::Patch)
    }

    pub fn post(&self) -> ActionRequest<'a> {
        self.request(Method::Post)
    }

    pub fn put(&self) -> ActionRequest<'a> {
        self.request(Method::Put)
    }

    pub fn trace(&self) -> ActionRequest<'a> {
        self.request(Method::Trace)
    }
}

/// Request under construction inside an action handler.
#[must_use = "ActionRequest does nothing until .build() is called"]
pub struct ActionRequest<'a> {
    inner: &'a Inner,
    action: &'a str,
    method: Method,
    path: Option<String>,
    url: Option<String>,
    headers: Headers,
    locals: Option<Value>,
    args: &'a Value,
    body: Option<Bytes>,
}

impl ActionRequest<'_> {
    /// Path joined onto the client's default URL.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Absolute URL; the default URL is not used.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Per-call header; overrides defaults and the rendered content type.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Values passed to the body template. Defaults to the action arguments.
    pub fn locals(mut self, locals: Value) -> Self {
        self.locals = Some(locals);
        self
    }

    /// Explicit body; the template is not rendered.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Resolve the URL, render the body and merge headers.
    ///
    /// # Errors
    /// Returns `AmbiguousTarget` when both `path` and `url` are set,
    /// `MissingTarget` when neither is, `MissingDefaultUrl` for a path without
    /// a default URL, URL and header validation errors, and `Render` when the
    /// template fails.
    pub fn build(self) -> Result<Request, ActionClientError> {
        let defaults = &self.inner.defaults;
        let url = match (&self.path, &self.url) {
            (Some(_), Some(_)) => return Err(ConfigError::AmbiguousTarget.into()),
            (None, None) => return Err(ConfigError::MissingTarget.into()),
            (Some(path), None) => defaults.join_path(path)?,
            (None, Some(url)) => parse_url(url)?,
        };

        let mut headers = Headers::new();
        let body = match self.body {
            Some(body) => body,
            None => {
                let template = TemplateRef::new(self.inner.name.as_str(), self.action);
                let locals = self.locals.as_ref().unwrap_or(self.args);
                match self.inner.renderer.render(&template, locals)? {
                    Some(rendered) => {
                        headers.insert("Content-Type", rendered.content_type);
                        rendered.body
                    }
                    None => Bytes::new(),
                }
            }
        };
        headers.merge(defaults.headers());
        headers.merge(&self.headers);

        Request::builder(self.method, url.to_string())
            .headers(&headers)
            .body(body)
            .build()
    }
}
