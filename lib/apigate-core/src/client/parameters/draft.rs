use std::sync::LazyLock;

use bytes::Bytes;
use http::{HeaderMap, Method};
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use url::Url;

use super::ParameterValidationError;
use crate::client::ApiRequest;

/// Placeholders in a path template, in the format `{param_name}`.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?<name>\w+)}").expect("a valid regex"));

/// Characters escaped in query keys and values: everything but RFC 3986 unreserved.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A request under construction, before its path template is resolved.
///
/// Appliers write into it; [`RequestDraft::finish`] turns it into an [`ApiRequest`].
#[derive(Debug, Clone)]
pub struct RequestDraft {
    method: Method,
    base_url: Url,
    path: String,
    query: IndexMap<String, Vec<String>>,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl RequestDraft {
    /// Starts a draft for `path` relative to `base_url`.
    ///
    /// Query pairs already present in `base_url` or in `path` are kept, repeated keys included.
    pub fn new(method: Method, base_url: &Url, path: &str) -> Self {
        let mut query = IndexMap::new();
        keep_pairs(&mut query, base_url.query_pairs());

        let path = match path.split_once('?') {
            Some((path, existing)) => {
                keep_pairs(&mut query, url::form_urlencoded::parse(existing.as_bytes()));
                path.to_string()
            }
            None => path.to_string(),
        };

        let mut base_url = base_url.clone();
        base_url.set_query(None);
        base_url.set_fragment(None);

        Self {
            method,
            base_url,
            path,
            query,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// The method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path template, with placeholders resolved so far.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Replaces the path template.
    pub fn set_path(&mut self, path: String) {
        self.path = path;
    }

    /// Query parameters by key, in insertion order.
    pub fn query(&self) -> &IndexMap<String, Vec<String>> {
        &self.query
    }

    /// Sets a query parameter, replacing every previous value of the same key.
    pub fn set_query_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.insert(key.into(), vec![value.into()]);
    }

    /// The headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The body, if any.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = Some(body);
    }

    /// Names of placeholders not yet substituted.
    pub fn unresolved_placeholders(&self) -> Vec<String> {
        PLACEHOLDER
            .captures_iter(&self.path)
            .filter_map(|captures| captures.name("name"))
            .map(|name| name.as_str().to_string())
            .collect()
    }

    fn encoded_query(&self) -> Option<String> {
        if self.query.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .query
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key, value)))
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(key, QUERY_ENCODE_SET),
                    utf8_percent_encode(value, QUERY_ENCODE_SET)
                )
            })
            .collect();
        Some(pairs.join("&"))
    }

    /// Resolves the URL and produces the request.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterValidationError::PathUnresolved`] when placeholders remain,
    /// or [`ParameterValidationError::InvalidUrl`] when the joined URL does not parse.
    pub fn finish(self) -> Result<ApiRequest, ParameterValidationError> {
        let missings = self.unresolved_placeholders();
        if !missings.is_empty() {
            return Err(ParameterValidationError::PathUnresolved {
                path: self.path,
                missings,
            });
        }

        let base = self.base_url.as_str().trim_end_matches('/');
        let path = self.path.trim_start_matches('/');
        let joined = if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        };
        let mut url = Url::parse(&joined).map_err(|err| ParameterValidationError::InvalidUrl {
            url: joined.clone(),
            reason: err.to_string(),
        })?;
        url.set_query(self.encoded_query().as_deref());

        let mut request = ApiRequest::new(self.method, url);
        *request.headers_mut() = self.headers;
        if let Some(body) = self.body {
            request = request.with_body(Bytes::from(body));
        }
        Ok(request)
    }
}

fn keep_pairs(query: &mut IndexMap<String, Vec<String>>, pairs: url::form_urlencoded::Parse<'_>) {
    for (key, value) in pairs.into_owned() {
        query.entry(key).or_default().push(value);
    }
}

/// Percent-encodes a path segment value.
pub(crate) fn encode_path_segment(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}
