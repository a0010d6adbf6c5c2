//! Configuration-driven API mapping gateway.
//!
//! Each configured endpoint mapping accepts requests on a source contract,
//! rewrites them for a target service and maps the target's answer back:
//!
//! - Request templates (query parameters and a JSON body tree) whose string
//!   leaves are expressions such as `src:query|user` or `src:req_body|a.b`
//! - Response routing by target status code or by a field of the target body
//! - Plugin calls from templates (`src:func|name(args...)`)
//!
//! ## Configuration Example
//!
//! ```yaml
//! apiMappings:
//!   - name: "user-lookup"
//!     source: { url: "/v1/users", method: "GET" }
//!     target: { url: "http://backend/users", method: "POST" }
//!     requestMapping:
//!       requestBody:
//!         id: "src:query|id"
//!     responseMapping:
//!       byHTTPStatusCode:
//!         default:
//!           response: { http_status_code: 502, json_body: { ok: "src:static|false" } }
//!         custom:
//!           "200":
//!             response: { json_body: { name: "src:res_body|data.name" } }
//! ```

pub mod config;
pub mod context;
pub mod expression;
pub mod gateway;
pub mod locator;
pub mod mapper;
pub mod plugin;
pub mod resolver;
pub mod router;
pub mod server;
pub mod target;

pub use config::{ConfigError, GatewayConfig};
pub use context::ExecutionContext;
pub use expression::{Expression, ExpressionError};
pub use gateway::{GatewayError, GatewayStats, InboundRequest, MappingGateway, OutboundResponse};
pub use mapper::TreeMapper;
pub use plugin::{Plugin, PluginInvoker, PluginRegistry, PluginTable};
pub use resolver::ValueResolver;
pub use router::ResponseRouter;
pub use target::{HttpTargetClient, TargetClient, TargetError};
