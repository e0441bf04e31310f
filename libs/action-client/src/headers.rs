//! Ordered, case-insensitive header collection.
//!
//! Header names are compared ignoring ASCII case but keep the spelling they
//! were inserted with. Transports normalize response headers to the
//! canonical `Title-Case` form via [`canonical_name`].

use crate::error::ActionClientError;
use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};

/// Canonical spelling of a header name: each dash-separated segment is
/// capitalized and the rest lowercased (`content-type` becomes `Content-Type`).
#[must_use]
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, segment) in name.split('-').enumerate() {
        if i > 0 {
            out.push('-');
        }
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars.map(|c| c.to_ascii_lowercase()));
        }
    }
    out
}

/// Ordered header list with case-insensitive lookup and last-write-wins updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    /// Value of the header `name`, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Set `name` to `value`. An existing header with the same name (in any
    /// case) is replaced in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.entries[i] = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    /// Set `name` only when no header with that name exists yet.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if !self.contains(&name) {
            self.entries.push((name, value.into()));
        }
    }

    /// Remove `name` and return its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    /// Overlay `other` onto `self`; values from `other` win.
    pub fn merge(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    /// Fill in headers from `defaults` that `self` does not already declare.
    pub fn with_defaults(&mut self, defaults: &Headers) {
        for (name, value) in defaults.iter() {
            self.insert_if_absent(name, value);
        }
    }

    /// Same headers with every name in canonical form.
    #[must_use]
    pub fn canonicalized(&self) -> Headers {
        self.iter()
            .map(|(name, value)| (canonical_name(name), value.to_owned()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Value of `Content-Type`, if declared.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.get("content-type")
    }

    /// Convert to an [`http::HeaderMap`], validating every name and value.
    /// Each line of a `Set-Cookie` value becomes its own entry.
    ///
    /// # Errors
    /// Returns `InvalidHeaderName` or `InvalidHeaderValue` for entries that are
    /// not legal on the wire.
    pub fn to_header_map(&self) -> Result<HeaderMap, ActionClientError> {
        let mut map = HeaderMap::with_capacity(self.len());
        for (name, value) in self.iter() {
            let name = HeaderName::try_from(name)?;
            if name == http::header::SET_COOKIE {
                for cookie in value.lines() {
                    map.append(name.clone(), HeaderValue::try_from(cookie)?);
                }
            } else {
                map.insert(name, HeaderValue::try_from(value)?);
            }
        }
        Ok(map)
    }

    /// Build from an [`http::HeaderMap`] with canonical names.
    ///
    /// Repeated headers are folded into one comma-separated value, except
    /// `Set-Cookie`, whose values may themselves contain commas and are
    /// joined with `\n` instead (split them with [`str::lines`]). Values
    /// that are not visible ASCII are decoded lossily.
    #[must_use]
    pub fn from_header_map(map: &HeaderMap) -> Headers {
        let mut headers = Headers::new();
        for (name, value) in map {
            let separator = if *name == http::header::SET_COOKIE {
                "\n"
            } else {
                ", "
            };
            let name = canonical_name(name.as_str());
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            match headers.position(&name) {
                Some(i) => {
                    let existing = &mut headers.entries[i].1;
                    existing.push_str(separator);
                    existing.push_str(&value);
                }
                None => headers.entries.push((name, value)),
            }
        }
        headers
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Headers {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}
