//! Content-type keyed parsers and decode error handlers.
//!
//! A registry maps content-type prefixes to entries. Lookup strips media type
//! parameters (`; charset=utf-8`), lowercases, and returns the first entry
//! whose prefix matches. Per-pipeline overrides replace defaults with the same
//! prefix in place and append new prefixes after them.

use crate::error::{ActionClientError, BoxError, DecodeError};
use crate::response::{Body, Response, XmlDocument, XmlElement, XmlNode};
use bytes::Bytes;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Decodes a raw response body.
pub trait BodyParser: Send + Sync {
    /// Decode `body`.
    ///
    /// # Errors
    /// Returns an error when the body is not valid for this format.
    fn parse(&self, body: &Bytes) -> Result<Body, BoxError>;
}

impl<F> BodyParser for F
where
    F: Fn(&Bytes) -> Result<Body, BoxError> + Send + Sync,
{
    fn parse(&self, body: &Bytes) -> Result<Body, BoxError> {
        self(body)
    }
}

/// Decides what happens when a parser rejects a body.
///
/// Receives the decode failure, the content type it was matched under, and
/// the original response with its raw body. Returning `Ok` substitutes a
/// response; returning `Err` fails the submission.
pub trait DecodeErrorHandler: Send + Sync {
    /// Handle a decode failure.
    ///
    /// # Errors
    /// Returns the error to surface from the pipeline.
    fn handle(
        &self,
        error: DecodeError,
        content_type: &str,
        original: Response,
    ) -> Result<Response, ActionClientError>;
}

impl<F> DecodeErrorHandler for F
where
    F: Fn(DecodeError, &str, Response) -> Result<Response, ActionClientError> + Send + Sync,
{
    fn handle(
        &self,
        error: DecodeError,
        content_type: &str,
        original: Response,
    ) -> Result<Response, ActionClientError> {
        self(error, content_type, original)
    }
}

/// JSON decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl BodyParser for JsonParser {
    fn parse(&self, body: &Bytes) -> Result<Body, BoxError> {
        Ok(Body::Json(serde_json::from_slice(body)?))
    }
}

/// XML decoder.
///
/// Well-formedness errors fail the decode. Validity findings (duplicate `id`
/// attributes) are recorded as warnings on the document.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlParser;

impl BodyParser for XmlParser {
    fn parse(&self, body: &Bytes) -> Result<Body, BoxError> {
        Ok(Body::Xml(parse_xml(body)?))
    }
}

/// Leaves the body untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullParser;

impl BodyParser for NullParser {
    fn parse(&self, body: &Bytes) -> Result<Body, BoxError> {
        Ok(Body::Raw(body.clone()))
    }
}

/// Re-raises every decode failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullErrorHandler;

impl DecodeErrorHandler for NullErrorHandler {
    fn handle(
        &self,
        error: DecodeError,
        _content_type: &str,
        _original: Response,
    ) -> Result<Response, ActionClientError> {
        Err(error.into())
    }
}

/// Parse `body` into an owned XML tree.
///
/// # Errors
/// Returns an error if the body is not UTF-8 or not well-formed XML.
pub fn parse_xml(body: &[u8]) -> Result<XmlDocument, BoxError> {
    let text = std::str::from_utf8(body)?;
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let document = roxmltree::Document::parse_with_options(text, options)?;
    let root = convert_element(document.root_element());
    let warnings = validity_warnings(&document);
    Ok(XmlDocument::new(root, warnings))
}

fn convert_element(node: roxmltree::Node<'_, '_>) -> XmlElement {
    let attributes = node
        .attributes()
        .map(|attr| (attr.name().to_owned(), attr.value().to_owned()))
        .collect();
    let children = node
        .children()
        .filter_map(|child| {
            if child.is_element() {
                Some(XmlNode::Element(convert_element(child)))
            } else if child.is_text() {
                child.text().map(|text| XmlNode::Text(text.to_owned()))
            } else {
                None
            }
        })
        .collect();
    XmlElement::new(
        node.tag_name().name(),
        node.tag_name().namespace().map(str::to_owned),
        attributes,
        children,
    )
}

fn validity_warnings(document: &roxmltree::Document<'_>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut warnings = Vec::new();
    for node in document.descendants().filter(roxmltree::Node::is_element) {
        for attr in node.attributes().filter(|attr| attr.name() == "id") {
            if !seen.insert(attr.value()) {
                warnings.push(format!(
                    "duplicate id '{}' on <{}>",
                    attr.value(),
                    node.tag_name().name()
                ));
            }
        }
    }
    warnings
}

/// Prefix-matched registry of content-type handlers.
pub struct ContentTypeRegistry<T: ?Sized> {
    entries: Vec<(String, Arc<T>)>,
}

/// Registry of body parsers.
pub type ParserRegistry = ContentTypeRegistry<dyn BodyParser>;

/// Registry of decode error handlers.
pub type ErrorHandlerRegistry = ContentTypeRegistry<dyn DecodeErrorHandler>;

impl<T: ?Sized> ContentTypeRegistry<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register `entry` under `prefix`, replacing any entry with the same prefix.
    pub fn insert(&mut self, prefix: impl Into<String>, entry: Arc<T>) {
        let prefix = prefix.into().to_ascii_lowercase();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| *existing == prefix)
        {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((prefix, entry)),
        }
    }

    /// Overlay `overrides`: matching prefixes are replaced in place, new ones
    /// are appended in their declared order.
    pub fn merge(&mut self, overrides: &ContentTypeRegistry<T>) {
        for (prefix, entry) in &overrides.entries {
            self.insert(prefix.clone(), Arc::clone(entry));
        }
    }

    /// First entry whose prefix matches `content_type`.
    #[must_use]
    pub fn find(&self, content_type: &str) -> Option<&Arc<T>> {
        let media_type = normalize_media_type(content_type);
        self.entries
            .iter()
            .find(|(prefix, _)| media_type.starts_with(prefix.as_str()))
            .map(|(_, entry)| entry)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(prefix, _)| prefix.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Media type without parameters, trimmed and lowercased.
#[must_use]
pub fn normalize_media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

impl<T: ?Sized> Default for ContentTypeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for ContentTypeRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ContentTypeRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.prefixes()).finish()
    }
}

static DEFAULT_PARSERS: OnceLock<ParserRegistry> = OnceLock::new();

impl ContentTypeRegistry<dyn BodyParser> {
    /// Process-wide default parsers: JSON and XML.
    #[must_use]
    pub fn defaults() -> Self {
        DEFAULT_PARSERS
            .get_or_init(|| {
                Self::new()
                    .parser("application/json", JsonParser)
                    .parser("application/xml", XmlParser)
            })
            .clone()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn parser(mut self, prefix: impl Into<String>, parser: impl BodyParser + 'static) -> Self {
        self.insert(prefix, Arc::new(parser));
        self
    }
}

impl ContentTypeRegistry<dyn DecodeErrorHandler> {
    /// Process-wide default error handlers. None are registered, so decode
    /// failures propagate.
    #[must_use]
    pub fn defaults() -> Self {
        Self::new()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn handler(
        mut self,
        prefix: impl Into<String>,
        handler: impl DecodeErrorHandler + 'static,
    ) -> Self {
        self.insert(prefix, Arc::new(handler));
        self
    }
}

/// Decodes responses using a parser registry and routes failures to the
/// matching error handler.
#[derive(Clone, Debug, Default)]
pub struct ContentNegotiator {
    parsers: ParserRegistry,
    error_handlers: ErrorHandlerRegistry,
}

impl ContentNegotiator {
    #[must_use]
    pub fn new(parsers: ParserRegistry, error_handlers: ErrorHandlerRegistry) -> Self {
        Self {
            parsers,
            error_handlers,
        }
    }

    #[must_use]
    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    #[must_use]
    pub fn error_handlers(&self) -> &ErrorHandlerRegistry {
        &self.error_handlers
    }

    /// Decode the body of `response` according to its `Content-Type`.
    ///
    /// Responses without a content type, with a blank body, with an already
    /// decoded body, or with no matching parser pass through unchanged.
    ///
    /// # Errors
    /// Returns `Decode` when the parser fails and no handler recovers.
    pub fn decode(&self, response: Response) -> Result<Response, ActionClientError> {
        let Some(content_type) = response.content_type().map(str::to_owned) else {
            return Ok(response);
        };
        let Some(raw) = response.body().as_bytes().cloned() else {
            return Ok(response);
        };
        if response.body().is_blank() {
            return Ok(response);
        }
        let Some(parser) = self.parsers.find(&content_type) else {
            return Ok(response);
        };

        match parser.parse(&raw) {
            Ok(body) => Ok(response.with_body(body)),
            Err(source) => {
                tracing::warn!(
                    content_type = %content_type,
                    error = %source,
                    "failed to decode response body"
                );
                let error = DecodeError::new(content_type.clone(), raw, source);
                match self.error_handlers.find(&content_type) {
                    Some(handler) => handler.handle(error, &content_type, response),
                    None => NullErrorHandler.handle(error, &content_type, response),
                }
            }
        }
    }
}
