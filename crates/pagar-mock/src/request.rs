//! Intercepted request and simulated response model.
//!
//! The mock engine consumes outbound calls through a narrow descriptor:
//! method, target path, JSON parameters. Responses carry a status code and a
//! JSON body so test assertions see the same shapes a real payment service
//! would produce.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Methods used by the intercepted payment protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiMethod {
    /// Retrieve a resource
    Get,
    /// Create or mutate a resource
    Post,
    /// Delete a resource
    Delete,
    /// Any method
    Any,
}

impl ApiMethod {
    /// Parse from string
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "DELETE" => Self::Delete,
            _ => Self::Any,
        }
    }

    /// Convert to string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Any => "*",
        }
    }

    /// Check if this method matches another
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        *self == Self::Any || *other == Self::Any || *self == *other
    }
}

impl std::fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pattern for matching request paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PathPattern {
    /// Exact path match
    Exact(String),
    /// Segment-wise match where `:name` segments capture the actual value
    /// (e.g. `/v1/customers/:id` matches `/v1/customers/cus_3`)
    Segments(String),
    /// Prefix match
    Prefix(String),
    /// Regex match over the whole path
    Regex(String),
    /// Match any path
    Any,
}

impl PathPattern {
    /// Check if a path matches this pattern
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(pattern) => path == pattern,
            Self::Segments(pattern) => Self::segments_match(pattern, path).is_some(),
            Self::Prefix(pattern) => path.starts_with(pattern),
            Self::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(path))
                .unwrap_or(false),
            Self::Any => true,
        }
    }

    /// Extract `:name` captures from a matching path
    ///
    /// Returns an empty map for non-capturing patterns that match, `None`
    /// when the path does not match at all.
    #[must_use]
    pub fn capture(&self, path: &str) -> Option<HashMap<String, String>> {
        match self {
            Self::Segments(pattern) => Self::segments_match(pattern, path),
            _ => self.matches(path).then(HashMap::new),
        }
    }

    fn segments_match(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
        let pattern_parts: Vec<&str> = pattern.trim_matches('/').split('/').collect();
        let path_parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        if pattern_parts.len() != path_parts.len() {
            return None;
        }

        let mut captures = HashMap::new();
        for (pat, actual) in pattern_parts.iter().zip(&path_parts) {
            if let Some(name) = pat.strip_prefix(':') {
                if actual.is_empty() {
                    return None;
                }
                captures.insert(name.to_string(), (*actual).to_string());
            } else if pat != actual {
                return None;
            }
        }
        Some(captures)
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(s) | Self::Segments(s) | Self::Prefix(s) | Self::Regex(s) => {
                write!(f, "{}", s)
            }
            Self::Any => write!(f, "*"),
        }
    }
}

/// An intercepted outbound call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    /// Request method
    pub method: ApiMethod,
    /// Target resource path
    pub path: String,
    /// Request parameters as a JSON object
    pub params: Map<String, Value>,
}

impl ApiRequest {
    /// Create a request with no parameters
    #[must_use]
    pub fn new(method: ApiMethod, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            params: Map::new(),
        }
    }

    /// Create a GET request
    #[must_use]
    pub fn get(path: &str) -> Self {
        Self::new(ApiMethod::Get, path)
    }

    /// Create a POST request
    #[must_use]
    pub fn post(path: &str) -> Self {
        Self::new(ApiMethod::Post, path)
    }

    /// Create a DELETE request
    #[must_use]
    pub fn delete(path: &str) -> Self {
        Self::new(ApiMethod::Delete, path)
    }

    /// Add a parameter
    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Replace all parameters with a JSON object
    ///
    /// Non-object values are ignored and leave the parameters empty.
    #[must_use]
    pub fn with_params(mut self, params: Value) -> Self {
        if let Value::Object(map) = params {
            self.params = map;
        }
        self
    }

    /// Look up a parameter value
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

/// A simulated response from the mock backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Simulated HTTP status code
    pub status: u16,
    /// Response body
    pub body: Value,
}

impl ApiResponse {
    /// Create a 200 response with the given body
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// Create a response with an explicit status
    #[must_use]
    pub fn with_status(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Create a 200 response from any serializable value
    pub fn json<T: Serialize>(data: &T) -> crate::result::PagarResult<Self> {
        Ok(Self {
            status: 200,
            body: serde_json::to_value(data)?,
        })
    }

    /// Create a deletion acknowledgement, as the real service shapes them
    #[must_use]
    pub fn deleted(id: &str) -> Self {
        Self::ok(json!({ "id": id, "deleted": true }))
    }
}
