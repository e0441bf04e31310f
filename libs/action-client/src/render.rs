//! Request body rendering.
//!
//! An [`ActionClient`](crate::ActionClient) asks its [`BodyRenderer`] for the
//! template `<client>/<action>` with the action's locals. Returning
//! `Ok(None)` means the action declares no body.

use crate::error::ActionClientError;
use bytes::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// Template address: the client name and the action name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateRef {
    client: String,
    action: String,
}

impl TemplateRef {
    #[must_use]
    pub fn new(client: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            action: action.into(),
        }
    }

    #[must_use]
    pub fn client(&self) -> &str {
        &self.client
    }

    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// `client/action`
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.client, self.action)
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.client, self.action)
    }
}

/// A rendered request body and the media type of its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBody {
    pub body: Bytes,
    pub content_type: String,
}

impl RenderedBody {
    #[must_use]
    pub fn new(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.into(),
        }
    }

    /// Serialized JSON document.
    ///
    /// # Errors
    /// Returns `Json` if `value` cannot be serialized.
    pub fn json(value: &Value) -> Result<Self, ActionClientError> {
        Ok(Self::new(serde_json::to_vec(value)?, JSON_CONTENT_TYPE))
    }

    #[must_use]
    pub fn xml(document: impl Into<String>) -> Self {
        Self::new(document.into(), XML_CONTENT_TYPE)
    }
}

/// Renders the body of an action's request.
pub trait BodyRenderer: Send + Sync {
    /// # Errors
    /// Returns `Render` when a declared template fails.
    fn render(
        &self,
        template: &TemplateRef,
        locals: &Value,
    ) -> Result<Option<RenderedBody>, ActionClientError>;
}

impl<F> BodyRenderer for F
where
    F: Fn(&TemplateRef, &Value) -> Result<Option<RenderedBody>, ActionClientError> + Send + Sync,
{
    fn render(
        &self,
        template: &TemplateRef,
        locals: &Value,
    ) -> Result<Option<RenderedBody>, ActionClientError> {
        self(template, locals)
    }
}

/// Renderer that never declares a body.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBody;

impl BodyRenderer for NoBody {
    fn render(
        &self,
        _template: &TemplateRef,
        _locals: &Value,
    ) -> Result<Option<RenderedBody>, ActionClientError> {
        Ok(None)
    }
}

type TemplateFn = dyn Fn(&Value) -> Result<RenderedBody, ActionClientError> + Send + Sync;

/// Templates registered in code, keyed by `client/action`.
#[derive(Clone, Default)]
pub struct TemplateSet {
    templates: HashMap<String, Arc<TemplateFn>>,
}

impl fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut paths: Vec<_> = self.templates.keys().collect();
        paths.sort();
        f.debug_set().entries(paths).finish()
    }
}

impl TemplateSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template producing an arbitrary body.
    #[must_use]
    pub fn template<F>(mut self, path: impl Into<String>, template: F) -> Self
    where
        F: Fn(&Value) -> Result<RenderedBody, ActionClientError> + Send + Sync + 'static,
    {
        self.templates.insert(path.into(), Arc::new(template));
        self
    }

    /// Register a JSON template.
    #[must_use]
    pub fn json<F>(self, path: impl Into<String>, template: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.template(path, move |locals| RenderedBody::json(&template(locals)))
    }

    /// Register an XML template.
    #[must_use]
    pub fn xml<F>(self, path: impl Into<String>, template: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.template(path, move |locals| Ok(RenderedBody::xml(template(locals))))
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.templates.contains_key(path)
    }
}

impl BodyRenderer for TemplateSet {
    fn render(
        &self,
        template: &TemplateRef,
        locals: &Value,
    ) -> Result<Option<RenderedBody>, ActionClientError> {
        let path = template.path();
        match self.templates.get(&path) {
            Some(render) => render(locals).map(Some).map_err(|e| match e {
                ActionClientError::Render { .. } => e,
                other => ActionClientError::render(path, other),
            }),
            None => Ok(None),
        }
    }
}
