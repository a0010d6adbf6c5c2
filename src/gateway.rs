//! Mapping gateway implementation.

use crate::config::{ConfigError, EndpointMapping, GatewayConfig, Settings};
use crate::context::{ExecutionContext, RequestInfo, ResponseInfo};
use crate::expression::Expression;
use crate::mapper::TreeMapper;
use crate::plugin::{PluginInvoker, PluginTable};
use crate::resolver::ValueResolver;
use crate::router::ResponseRouter;
use crate::target::{HttpTargetClient, TargetClient, TargetError, TargetRequest};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Header carrying the correlation ID, generated when absent.
pub const CORRELATION_HEADER: &str = "x-request-id";

/// Configuration-driven API mapping gateway.
///
/// Matches inbound requests to endpoint mappings, builds the target request
/// from the request templates, calls the target and maps the routed response
/// template back to the caller. Safe to share between tasks.
pub struct MappingGateway {
    /// Global settings
    settings: Settings,
    /// Compiled endpoints, in declaration order
    endpoints: Vec<CompiledEndpoint>,
    /// Expression resolver (shared plugin registry)
    resolver: ValueResolver,
    /// Outbound client
    client: Arc<dyn TargetClient>,
    /// Metrics: total requests handled.
    requests_total: AtomicU64,
    /// Metrics: requests mapped end to end.
    requests_mapped: AtomicU64,
    /// Metrics: failed target calls.
    target_errors: AtomicU64,
    /// Metrics: requests with no matching mapping.
    unmatched_requests: AtomicU64,
}

/// One endpoint mapping with its response routing compiled.
#[derive(Debug, Clone)]
pub struct CompiledEndpoint {
    mapping: EndpointMapping,
    method: String,
    router: ResponseRouter,
}

impl CompiledEndpoint {
    fn compile(mapping: EndpointMapping) -> Result<Self, ConfigError> {
        let router = ResponseRouter::compile(&mapping)?;
        Ok(Self {
            method: mapping.source.method.to_uppercase(),
            mapping,
            router,
        })
    }

    pub fn name(&self) -> &str {
        &self.mapping.name
    }

    fn matches(&self, method: &str, path: &str) -> bool {
        self.mapping.source.url == path && self.method.eq_ignore_ascii_case(method)
    }
}

/// An inbound request as received by the listener.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub method: String,
    /// Path plus optional query string
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// The response sent back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl OutboundResponse {
    fn json(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body,
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }).to_string().into_bytes())
    }

    /// Body parsed as JSON, if it is JSON.
    pub fn body_json(&self) -> Option<JsonValue> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Get a single header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Snapshot of the gateway counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatewayStats {
    pub requests_total: u64,
    pub requests_mapped: u64,
    pub target_errors: u64,
    pub unmatched_requests: u64,
}

impl MappingGateway {
    /// Create a gateway with the built-in plugins and an HTTP target client.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let timeout = Duration::from_millis(config.settings.target_timeout_ms);
        let client = HttpTargetClient::new(timeout)?;
        Self::with_parts(config, PluginTable::with_builtins(), Arc::new(client))
    }

    /// Create a gateway from its parts.
    ///
    /// `pluginConfigs` entries are bound into `plugins`; bindings that refer
    /// to unregistered instances are skipped with a warning and calls to them
    /// resolve to null.
    pub fn with_parts(
        config: GatewayConfig,
        mut plugins: PluginTable,
        client: Arc<dyn TargetClient>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        for plugin in &config.plugin_configs {
            if let Err(e) = plugins.bind(plugin) {
                warn!(plugin = %plugin.name, error = %e, "Plugin not bound");
            }
        }

        let endpoints = config
            .api_mappings
            .into_iter()
            .map(CompiledEndpoint::compile)
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            endpoints = endpoints.len(),
            plugins = ?plugins.names(),
            debug_headers = config.settings.debug_headers,
            "Mapping gateway initialized"
        );

        Ok(Self {
            settings: config.settings,
            endpoints,
            resolver: ValueResolver::new(PluginInvoker::new(Arc::new(plugins))),
            client,
            requests_total: AtomicU64::new(0),
            requests_mapped: AtomicU64::new(0),
            target_errors: AtomicU64::new(0),
            unmatched_requests: AtomicU64::new(0),
        })
    }

    /// Create from a YAML configuration string.
    pub fn from_yaml(yaml: &str) -> Result<Self, GatewayError> {
        let config: GatewayConfig = serde_yaml::from_str(yaml)?;
        Self::new(config)
    }

    /// Create from a JSON configuration string.
    pub fn from_json(json: &str) -> Result<Self, GatewayError> {
        let config: GatewayConfig = serde_json::from_str(json)?;
        Self::new(config)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn endpoints(&self) -> &[CompiledEndpoint] {
        &self.endpoints
    }

    /// First endpoint whose source contract matches.
    pub fn find_endpoint(&self, method: &str, path: &str) -> Option<&CompiledEndpoint> {
        self.endpoints.iter().find(|e| e.matches(method, path))
    }

    /// Current counter values.
    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_mapped: self.requests_mapped.load(Ordering::Relaxed),
            target_errors: self.target_errors.load(Ordering::Relaxed),
            unmatched_requests: self.unmatched_requests.load(Ordering::Relaxed),
        }
    }

    /// Handle one inbound request end to end.
    pub async fn handle(&self, request: InboundRequest) -> OutboundResponse {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        let start_time = Instant::now();

        let request_info = RequestInfo::new(request.method, &request.uri, request.headers);
        let correlation_id = request_info
            .header(CORRELATION_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let Some(endpoint) = self.find_endpoint(&request_info.method, &request_info.path) else {
            self.unmatched_requests.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %correlation_id,
                method = %request_info.method,
                path = %request_info.path,
                "No matching endpoint mapping"
            );
            return OutboundResponse::error(
                404,
                &format!("no mapping for {} {}", request_info.method, request_info.path),
            );
        };

        debug!(
            correlation_id = %correlation_id,
            endpoint = %endpoint.name(),
            "Matched endpoint mapping"
        );

        let ctx = ExecutionContext::new(request_info, request.body, correlation_id);

        let target_request = match self.build_target_request(endpoint, &ctx) {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    correlation_id = %ctx.correlation_id,
                    endpoint = %endpoint.name(),
                    error = %e,
                    "Failed to serialize target request body"
                );
                return self.finish(
                    OutboundResponse::error(500, "failed to serialize request"),
                    endpoint,
                    start_time,
                );
            }
        };

        trace!(
            correlation_id = %ctx.correlation_id,
            method = %target_request.method,
            url = %target_request.url,
            "Calling target"
        );

        let response = match self.client.send(target_request).await {
            Ok(r) => r,
            Err(e) => {
                self.target_errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    correlation_id = %ctx.correlation_id,
                    endpoint = %endpoint.name(),
                    error = %e,
                    "Target call failed"
                );
                return self.finish(
                    OutboundResponse::error(502, "target service unavailable"),
                    endpoint,
                    start_time,
                );
            }
        };

        let target_status = response.status;
        let ctx = ctx.with_response(ResponseInfo::new(
            response.status,
            response.headers,
            response.body,
        ));

        let outcome = endpoint.router.route(target_status, ctx.response_body_json());
        debug!(
            correlation_id = %ctx.correlation_id,
            endpoint = %endpoint.name(),
            target_status,
            matched = %outcome.matched,
            "Routed target response"
        );

        let body = TreeMapper::new(&self.resolver, &ctx).map(outcome.template);
        let body = match serde_json::to_vec(&body) {
            Ok(b) => b,
            Err(e) => {
                warn!(
                    correlation_id = %ctx.correlation_id,
                    endpoint = %endpoint.name(),
                    error = %e,
                    "Failed to serialize response"
                );
                return self.finish(
                    OutboundResponse::error(500, "failed to serialize response"),
                    endpoint,
                    start_time,
                );
            }
        };

        self.requests_mapped.fetch_add(1, Ordering::Relaxed);

        info!(
            correlation_id = %ctx.correlation_id,
            endpoint = %endpoint.name(),
            target_status,
            status = outcome.status,
            "Mapped request"
        );

        self.finish(
            OutboundResponse::json(outcome.status, body),
            endpoint,
            start_time,
        )
    }

    /// Resolve the target contract and request templates.
    fn build_target_request(
        &self,
        endpoint: &CompiledEndpoint,
        ctx: &ExecutionContext,
    ) -> Result<TargetRequest, serde_json::Error> {
        let mapping = &endpoint.mapping;
        let mapper = TreeMapper::new(&self.resolver, ctx);

        let query = mapper.map_query(&mapping.request_mapping.query_param);
        let url = append_query(&mapping.target.url, &query);

        let mut headers = Vec::with_capacity(mapping.target.headers.len() + 1);
        for (name, value) in &mapping.target.headers {
            let JsonValue::String(raw) = value else {
                debug!(header = %name, "Ignoring non-string target header");
                continue;
            };
            let value = match Expression::parse(raw) {
                Ok(expr) => match self.resolver.resolve(&expr, ctx) {
                    JsonValue::Null => continue,
                    JsonValue::String(s) => s,
                    other => other.to_string(),
                },
                Err(_) => raw.clone(),
            };
            headers.push((name.clone(), value));
        }

        let template = &mapping.request_mapping.request_body;
        let body = if template.is_null() {
            None
        } else {
            if !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case("content-type")) {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
            }
            Some(serde_json::to_vec(&mapper.map(template))?)
        };

        Ok(TargetRequest {
            method: mapping.target.method.clone(),
            url,
            headers,
            body,
        })
    }

    /// Add debug headers if enabled.
    fn finish(
        &self,
        mut response: OutboundResponse,
        endpoint: &CompiledEndpoint,
        start_time: Instant,
    ) -> OutboundResponse {
        if self.settings.debug_headers {
            response
                .headers
                .push(("X-Mapping-Endpoint".to_string(), endpoint.name().to_string()));
            response.headers.push((
                "X-Mapping-Time".to_string(),
                format!("{}ms", start_time.elapsed().as_millis()),
            ));
        }
        response
    }
}

/// Append encoded query parameters to a URL.
fn append_query(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query)
}

/// Gateway construction errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Target client error: {0}")]
    Target(#[from] TargetError),
}
