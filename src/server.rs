//! HTTP listener.
//!
//! Every request goes through one fallback handler that dispatches on the
//! configured source contracts, so mappings can claim any path.

use crate::gateway::{InboundRequest, MappingGateway, OutboundResponse};
use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Path served with gateway health unless a mapping claims it.
pub const HEALTH_PATH: &str = "/health";

/// Build the axum router for a gateway.
pub fn router(gateway: Arc<MappingGateway>) -> Router {
    let max_body_size = gateway.settings().max_body_size;

    Router::new()
        .fallback(dispatch)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(gateway: Arc<MappingGateway>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "Mapping gateway listening");

    axum::serve(listener, router(gateway))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}

async fn dispatch(
    State(gateway): State<Arc<MappingGateway>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::GET
        && uri.path() == HEALTH_PATH
        && gateway.find_endpoint(method.as_str(), HEALTH_PATH).is_none()
    {
        return health(&gateway);
    }

    let request = InboundRequest {
        method: method.as_str().to_string(),
        uri: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
        body: body.to_vec(),
    };

    into_response(gateway.handle(request).await)
}

fn health(gateway: &MappingGateway) -> Response {
    Json(json!({
        "status": "healthy",
        "endpoints": gateway.endpoints().len(),
        "stats": gateway.stats(),
    }))
    .into_response()
}

fn into_response(outbound: OutboundResponse) -> Response {
    let mut response = Response::new(Body::from(outbound.body));
    *response.status_mut() =
        StatusCode::from_u16(outbound.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    for (name, value) in outbound.headers {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().append(name, value);
            }
            _ => warn!(header = %name, "Dropping invalid response header"),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::plugin::PluginTable;
    use crate::target::{TargetClient, TargetError, TargetRequest, TargetResponse};
    use async_trait::async_trait;
    use axum::http::Request;
    use serde_json::Value as JsonValue;
    use tower::ServiceExt;

    struct FixedClient;

    #[async_trait]
    impl TargetClient for FixedClient {
        async fn send(&self, _request: TargetRequest) -> Result<TargetResponse, TargetError> {
            Ok(TargetResponse {
                status: 200,
                headers: vec![],
                body: br#"{"name":"alice"}"#.to_vec(),
            })
        }
    }

    fn make_app(yaml: &str) -> Router {
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        let gateway =
            MappingGateway::with_parts(config, PluginTable::new(), Arc::new(FixedClient)).unwrap();
        router(Arc::new(gateway))
    }

    const CONFIG: &str = r#"
settings:
  max_body_size: 64
apiMappings:
  - name: "user"
    source: { url: "/user", method: "POST" }
    target: { url: "http://backend/user", method: "GET" }
    responseMapping:
      byHTTPStatusCode:
        default: { response: { http_status_code: 500 } }
        custom:
          "200": { response: { json_body: { user: "src:res_body|name" } } }
"#;

    async fn body_json(response: Response) -> JsonValue {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_mapping() {
        let app = make_app(CONFIG);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/user")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(body_json(response).await, json!({ "user": "alice" }));
    }

    #[tokio::test]
    async fn test_health() {
        let app = make_app(CONFIG);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["endpoints"], 1);
        assert_eq!(body["stats"]["requests_total"], 0);
    }

    #[tokio::test]
    async fn test_health_path_claimed_by_mapping() {
        let app = make_app(
            r#"
apiMappings:
  - name: "custom-health"
    source: { url: "/health", method: "GET" }
    target: { url: "http://backend/status", method: "GET" }
    responseMapping:
      byHTTPStatusCode:
        default: { response: { http_status_code: 503 } }
        custom:
          "200": { response: { json_body: { up: "src:static|true" } } }
"#,
        );
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "up": true }));
    }

    #[tokio::test]
    async fn test_unmatched_is_404() {
        let app = make_app(CONFIG);
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/user")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "no mapping for GET /user" })
        );
    }

    #[tokio::test]
    async fn test_body_too_large() {
        let app = make_app(CONFIG);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/user")
                    .body(Body::from(vec![b'x'; 1024]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_into_response_drops_invalid_headers() {
        let response = into_response(OutboundResponse {
            status: 201,
            headers: vec![
                ("x-ok".to_string(), "yes".to_string()),
                ("bad header".to_string(), "no".to_string()),
            ],
            body: Vec::new(),
        });
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-ok").unwrap(), "yes");
        assert_eq!(response.headers().len(), 1);
    }
}
