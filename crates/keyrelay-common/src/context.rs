use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which the host stores inbound HTTP headers.
pub const HEADERS_KEY: &str = "headers";

/// State scoped to a single inbound request or session.
///
/// The host creates one per inbound request and drops it once the request
/// completes. Values are opaque JSON; plugins only read them. Inbound HTTP
/// headers live in a nested object under [`HEADERS_KEY`], keyed by the header
/// name exactly as it arrived (no case folding).
///
/// # Examples
///
/// ```
/// use keyrelay_common::RequestContext;
///
/// let state = RequestContext::new()
///     .with_header("authorization", "Bearer tok-A")
///     .with_value("user_id", "u-42");
///
/// assert_eq!(state.header("authorization"), Some("Bearer tok-A"));
/// assert_eq!(state.header("Authorization"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestContext {
    state: Map<String, Value>,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context whose header map holds the given pairs.
    pub fn from_headers<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(Self::new(), |state, (name, value)| {
                state.with_header(name, value)
            })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.state.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds a header, creating the header map if needed.
    ///
    /// A non-object value already stored under [`HEADERS_KEY`] is replaced.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let headers = self
            .state
            .entry(HEADERS_KEY)
            .or_insert_with(|| Value::Object(Map::new()));

        if !headers.is_object() {
            *headers = Value::Object(Map::new());
        }

        if let Value::Object(map) = headers {
            map.insert(name.into(), Value::String(value.into()));
        }

        self
    }

    /// The inbound header map, if one is present and is an object.
    #[must_use]
    pub fn headers(&self) -> Option<&Map<String, Value>> {
        self.state.get(HEADERS_KEY).and_then(Value::as_object)
    }

    /// Looks up a header by its exact name. Non-string values read as absent.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers()
            .and_then(|headers| headers.get(name))
            .and_then(Value::as_str)
    }

    /// Top-level state keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.state.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl From<Map<String, Value>> for RequestContext {
    fn from(state: Map<String, Value>) -> Self {
        Self { state }
    }
}
