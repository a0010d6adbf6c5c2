//! Value resolution for template expressions.

use crate::context::ExecutionContext;
use crate::expression::{Argument, Expression, FunctionCall};
use crate::locator;
use crate::plugin::PluginInvoker;
use serde_json::Value as JsonValue;
use tracing::warn;

/// Resolves expressions against an [`ExecutionContext`].
///
/// Holds no per-request state, so one resolver is shared by every request.
#[derive(Clone, Default)]
pub struct ValueResolver {
    plugins: PluginInvoker,
}

impl ValueResolver {
    pub fn new(plugins: PluginInvoker) -> Self {
        Self { plugins }
    }

    /// Parse and resolve a template leaf. Malformed expressions are logged
    /// and resolve to null.
    pub fn resolve_str(&self, raw: &str, ctx: &ExecutionContext) -> JsonValue {
        match Expression::parse(raw) {
            Ok(expr) => self.resolve(&expr, ctx),
            Err(e) => {
                warn!(
                    correlation_id = %ctx.correlation_id,
                    expression = raw,
                    error = %e,
                    "Invalid mapping expression, resolving to null"
                );
                JsonValue::Null
            }
        }
    }

    /// Resolve a parsed expression.
    pub fn resolve(&self, expr: &Expression, ctx: &ExecutionContext) -> JsonValue {
        match expr {
            Expression::Static(text) => coerce_static(text),
            Expression::Query(name) => JsonValue::String(ctx.query_param(name).to_string()),
            Expression::RequestHeader(name) => {
                JsonValue::String(ctx.request_header(name).to_string())
            }
            Expression::ResponseHeader(name) => {
                JsonValue::String(ctx.response_header(name).to_string())
            }
            Expression::RequestBody(path) => ctx
                .request_body_json()
                .and_then(|json| locator::select(json, path))
                .unwrap_or(JsonValue::Null),
            Expression::ResponseBody(path) => ctx
                .response_body_json()
                .and_then(|json| locator::select(json, path))
                .unwrap_or(JsonValue::Null),
            Expression::Call(call) => self.call(call, ctx),
        }
    }

    fn call(&self, call: &FunctionCall, ctx: &ExecutionContext) -> JsonValue {
        let args: Vec<JsonValue> = call
            .args
            .iter()
            .map(|arg| match arg {
                Argument::Literal(token) => JsonValue::String(token.clone()),
                Argument::Expression(expr) => self.resolve(expr, ctx),
                Argument::Malformed { raw, error } => {
                    warn!(
                        correlation_id = %ctx.correlation_id,
                        plugin = %call.name,
                        argument = %raw,
                        error = %error,
                        "Invalid plugin argument, passing null"
                    );
                    JsonValue::Null
                }
            })
            .collect();

        self.plugins.invoke(&call.name, &args)
    }
}

/// Coerce `src:static` text: booleans, then integers, then plain text.
pub fn coerce_static(text: &str) -> JsonValue {
    match text {
        "true" => JsonValue::Bool(true),
        "false" => JsonValue::Bool(false),
        _ => match text.parse::<i64>() {
            Ok(n) => JsonValue::from(n),
            Err(_) => JsonValue::String(text.to_string()),
        },
    }
}
