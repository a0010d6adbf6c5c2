//! Per-request execution context.
//!
//! Everything an expression can read lives here: the inbound query, headers
//! and body, and (after the target call) the target's headers and body. A
//! context is created for one inbound request and dropped with it; the lazily
//! parsed bodies are cached on the context itself, never shared.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::trace;

/// Context available while mapping one request.
#[derive(Debug)]
pub struct ExecutionContext {
    /// Inbound request information
    pub request: RequestInfo,
    /// Target response information (after the target call)
    pub response: Option<ResponseInfo>,
    /// Raw inbound body
    request_body: Vec<u8>,
    /// Parsed inbound body (lazily, once)
    request_body_json: OnceLock<Option<JsonValue>>,
    /// Parsed target body (lazily, once)
    response_body_json: OnceLock<Option<JsonValue>>,
    /// Correlation ID
    pub correlation_id: String,
}

/// Inbound request information.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// HTTP method
    pub method: String,
    /// Request path (without query string)
    pub path: String,
    /// Query string (without leading ?)
    pub query_string: Option<String>,
    /// Parsed query parameters
    pub query_params: HashMap<String, Vec<String>>,
    /// Request headers (lowercase names)
    pub headers: HashMap<String, Vec<String>>,
}

/// Target response information.
#[derive(Debug, Clone, Default)]
pub struct ResponseInfo {
    /// HTTP status code
    pub status: u16,
    /// Response headers (lowercase names)
    pub headers: HashMap<String, Vec<String>>,
    /// Raw response body
    pub body: Vec<u8>,
}

impl ExecutionContext {
    /// Create a new context for an inbound request.
    pub fn new(request: RequestInfo, body: Vec<u8>, correlation_id: String) -> Self {
        Self {
            request,
            response: None,
            request_body: body,
            request_body_json: OnceLock::new(),
            response_body_json: OnceLock::new(),
            correlation_id,
        }
    }

    /// Attach the target's response.
    pub fn with_response(mut self, response: ResponseInfo) -> Self {
        self.response = Some(response);
        self.response_body_json = OnceLock::new();
        self
    }

    /// Value of an inbound query parameter, empty if absent.
    pub fn query_param(&self, name: &str) -> &str {
        self.request
            .query_params
            .get(name)
            .and_then(|v| v.first())
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// Value of an inbound header, empty if absent.
    pub fn request_header(&self, name: &str) -> &str {
        self.request.header(name).unwrap_or("")
    }

    /// Value of a target response header, empty if absent or if the target
    /// has not answered yet.
    pub fn response_header(&self, name: &str) -> &str {
        self.response
            .as_ref()
            .and_then(|r| r.header(name))
            .unwrap_or("")
    }

    /// Inbound body as JSON, `None` if empty or not JSON.
    pub fn request_body_json(&self) -> Option<&JsonValue> {
        self.request_body_json
            .get_or_init(|| parse_body(&self.request_body, "request"))
            .as_ref()
    }

    /// Target body as JSON, `None` if there is no response or it is not JSON.
    pub fn response_body_json(&self) -> Option<&JsonValue> {
        let response = self.response.as_ref()?;
        self.response_body_json
            .get_or_init(|| parse_body(&response.body, "response"))
            .as_ref()
    }
}

fn parse_body(body: &[u8], side: &'static str) -> Option<JsonValue> {
    if body.is_empty() {
        return None;
    }
    match serde_json::from_slice(body) {
        Ok(json) => Some(json),
        Err(e) => {
            trace!(side, error = %e, "Body is not JSON");
            None
        }
    }
}

impl RequestInfo {
    /// Build request info from a method, a request URI (path plus optional
    /// query) and raw headers.
    pub fn new(
        method: impl Into<String>,
        uri: &str,
        headers: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let (path, query_string) = match uri.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (uri.to_string(), None),
        };

        let query_params = parse_query_string(query_string.as_deref());

        Self {
            method: method.into(),
            path,
            query_string,
            query_params,
            headers: collect_headers(headers),
        }
    }

    /// Get a single header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }
}

impl ResponseInfo {
    /// Build response info from a status, raw headers and the raw body.
    pub fn new(
        status: u16,
        headers: impl IntoIterator<Item = (String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            status,
            headers: collect_headers(headers),
            body,
        }
    }

    /// Get a single header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }
}

/// Group header pairs by lowercase name, keeping repeated values in order.
pub fn collect_headers(
    headers: impl IntoIterator<Item = (String, String)>,
) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in headers {
        map.entry(name.to_lowercase()).or_default().push(value);
    }
    map
}

/// Parse query string into parameter map.
pub fn parse_query_string(query: Option<&str>) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();

    if let Some(qs) = query {
        for part in qs.split('&') {
            if let Some((k, v)) = part.split_once('=') {
                params.entry(decode(k)).or_default().push(decode(v));
            } else if !part.is_empty() {
                params.entry(decode(part)).or_default().push(String::new());
            }
        }
    }

    params
}

fn decode(raw: &str) -> String {
    // Form encoding uses '+' for spaces
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|s| s.into_owned())
        .unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_context() -> ExecutionContext {
        let request = RequestInfo::new(
            "POST",
            "/v1/users?user=alice&page=1&tag=a&tag=b",
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Custom".to_string(), "custom-value".to_string()),
            ],
        );
        let body = serde_json::to_vec(&serde_json::json!({
            "user": { "name": "John", "age": 30 },
            "items": ["a", "b", "c"]
        }))
        .unwrap();

        ExecutionContext::new(request, body, "test-correlation-id".to_string())
    }

    #[test]
    fn test_request_info() {
        let ctx = make_context();
        assert_eq!(ctx.request.method, "POST");
        assert_eq!(ctx.request.path, "/v1/users");
        assert_eq!(
            ctx.request.query_string.as_deref(),
            Some("user=alice&page=1&tag=a&tag=b")
        );
        assert_eq!(ctx.correlation_id, "test-correlation-id");
    }

    #[test]
    fn test_query_param() {
        let ctx = make_context();
        assert_eq!(ctx.query_param("user"), "alice");
        assert_eq!(ctx.query_param("tag"), "a");
        assert_eq!(ctx.query_param("missing"), "");
    }

    #[test]
    fn test_request_header_case_insensitive() {
        let ctx = make_context();
        assert_eq!(ctx.request_header("x-custom"), "custom-value");
        assert_eq!(ctx.request_header("X-CUSTOM"), "custom-value");
        assert_eq!(ctx.request_header("x-missing"), "");
    }

    #[test]
    fn test_response_header_without_response() {
        let ctx = make_context();
        assert_eq!(ctx.response_header("content-type"), "");
        assert!(ctx.response_body_json().is_none());
    }

    #[test]
    fn test_with_response() {
        let ctx = make_context().with_response(ResponseInfo::new(
            200,
            vec![("X-Request-Id".to_string(), "abc".to_string())],
            br#"{"status_code":"20005"}"#.to_vec(),
        ));
        assert_eq!(ctx.response_header("x-request-id"), "abc");
        assert_eq!(
            ctx.response_body_json().unwrap()["status_code"],
            "20005"
        );
    }

    #[test]
    fn test_request_body_parsed_once() {
        let ctx = make_context();
        let first = ctx.request_body_json().unwrap() as *const JsonValue;
        let second = ctx.request_body_json().unwrap() as *const JsonValue;
        assert_eq!(first, second);
        assert_eq!(ctx.request_body_json().unwrap()["user"]["name"], "John");
    }

    #[test]
    fn test_invalid_body_is_none() {
        let request = RequestInfo::new("POST", "/x", Vec::new());
        let ctx = ExecutionContext::new(request, b"not json".to_vec(), "id".to_string());
        assert!(ctx.request_body_json().is_none());

        let request = RequestInfo::new("GET", "/x", Vec::new());
        let ctx = ExecutionContext::new(request, Vec::new(), "id".to_string());
        assert!(ctx.request_body_json().is_none());
    }

    #[test]
    fn test_parse_query_string() {
        let params = parse_query_string(Some("foo=bar&baz=qux"));
        assert_eq!(params.get("foo"), Some(&vec!["bar".to_string()]));
        assert_eq!(params.get("baz"), Some(&vec!["qux".to_string()]));
    }

    #[test]
    fn test_parse_query_string_encoded() {
        let params = parse_query_string(Some("name=hello%20world&q=a+b&flag"));
        assert_eq!(params.get("name"), Some(&vec!["hello world".to_string()]));
        assert_eq!(params.get("q"), Some(&vec!["a b".to_string()]));
        assert_eq!(params.get("flag"), Some(&vec![String::new()]));
    }

    #[test]
    fn test_parse_query_string_multiple() {
        let params = parse_query_string(Some("tags=a&tags=b&tags=c"));
        assert_eq!(
            params.get("tags"),
            Some(&vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }
}
