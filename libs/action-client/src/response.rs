use crate::error::{ActionClientError, ConfigError};
use crate::headers::Headers;
use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Validate a numeric status code.
///
/// # Errors
/// Returns `ConfigError::InvalidStatus` for codes outside `100..=599`.
pub fn status_code(code: u16) -> Result<StatusCode, ActionClientError> {
    if (100..=599).contains(&code) {
        StatusCode::from_u16(code).map_err(|_| ConfigError::InvalidStatus(code).into())
    } else {
        Err(ConfigError::InvalidStatus(code).into())
    }
}

/// Response body, either raw bytes or the value produced by a parser.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Body {
    /// Undecoded bytes, as read from the transport
    Raw(Bytes),
    /// Text produced by a custom parser
    Text(String),
    /// Decoded JSON document
    Json(Value),
    /// Decoded XML document
    Xml(XmlDocument),
}

impl Default for Body {
    fn default() -> Self {
        Body::Raw(Bytes::new())
    }
}

impl Body {
    /// Whether the body is raw and empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Body::Raw(bytes) => bytes.iter().all(u8::is_ascii_whitespace),
            Body::Text(text) => text.trim().is_empty(),
            Body::Json(_) | Body::Xml(_) => false,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Text view of the body: custom text, or raw bytes that are valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            Body::Raw(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_xml(&self) -> Option<&XmlDocument> {
        match self {
            Body::Xml(document) => Some(document),
            _ => None,
        }
    }

    /// Top-level JSON field `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_json().and_then(|value| value.get(key))
    }

    /// Walk a JSON document by object keys and array indices.
    ///
    /// Each path segment is tried as an object key first and, for arrays, as
    /// a decimal index.
    #[must_use]
    pub fn dig<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let mut current = self.as_json()?;
        for segment in path {
            let segment = segment.as_ref();
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Deserialize a JSON body into `T`.
    ///
    /// # Errors
    /// Returns `Json` if the body is not JSON-decoded or does not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ActionClientError> {
        match self {
            Body::Json(value) => Ok(T::deserialize(value)?),
            Body::Raw(bytes) => Ok(serde_json::from_slice(bytes)?),
            Body::Text(text) => Ok(serde_json::from_str(text)?),
            Body::Xml(_) => Err(ActionClientError::Json(
                <serde_json::Error as serde::de::Error>::custom(
                    "XML body cannot be deserialized as JSON",
                ),
            )),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Raw(bytes)
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Raw(Bytes::from_static(text.as_bytes()))
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

/// Response produced by a transport adapter and shaped by the response stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
}

impl Response {
    #[must_use]
    pub fn new(status: StatusCode, headers: Headers, body: impl Into<Body>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// `200 OK` with no headers and an empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(StatusCode::OK, Headers::new(), Body::default())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.content_type()
    }

    #[must_use]
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Split into the `(status, headers, body)` triple.
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, Headers, Body) {
        (self.status, self.headers, self.body)
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }
}

/// Owned XML document produced by the XML parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
    warnings: Vec<String>,
}

impl XmlDocument {
    #[must_use]
    pub fn new(root: XmlElement, warnings: Vec<String>) -> Self {
        Self { root, warnings }
    }

    #[must_use]
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// Validity findings that did not prevent parsing.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Child of an [`XmlElement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        namespace: Option<String>,
        attributes: Vec<(String, String)>,
        children: Vec<XmlNode>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace,
            attributes,
            children,
        }
    }

    /// Local tag name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element called `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|element| element.name == name)
    }

    /// Concatenated direct text content.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }
}
