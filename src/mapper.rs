//! Template tree mapping.

use crate::context::ExecutionContext;
use crate::resolver::ValueResolver;
use serde_json::{Map as JsonMap, Value as JsonValue};

/// Maps a template tree against one request's context.
///
/// - strings are resolved as expressions
/// - objects keep their keys (and order), values are mapped recursively
/// - arrays keep their order; only object elements are mapped, every other
///   element (strings included) is copied as-is
/// - numbers, booleans and null are copied as-is
pub struct TreeMapper<'a> {
    resolver: &'a ValueResolver,
    ctx: &'a ExecutionContext,
}

impl<'a> TreeMapper<'a> {
    pub fn new(resolver: &'a ValueResolver, ctx: &'a ExecutionContext) -> Self {
        Self { resolver, ctx }
    }

    /// Map a template.
    pub fn map(&self, template: &JsonValue) -> JsonValue {
        match template {
            JsonValue::String(expr) => self.resolver.resolve_str(expr, self.ctx),
            JsonValue::Object(obj) => JsonValue::Object(self.map_object(obj)),
            JsonValue::Array(arr) => JsonValue::Array(
                arr.iter()
                    .map(|item| match item {
                        JsonValue::Object(obj) => JsonValue::Object(self.map_object(obj)),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn map_object(&self, obj: &JsonMap<String, JsonValue>) -> JsonMap<String, JsonValue> {
        obj.iter()
            .map(|(key, value)| (key.clone(), self.map(value)))
            .collect()
    }

    /// Map a flat query-parameter template into `(name, value)` pairs.
    /// Null values are dropped; non-string values use their JSON text.
    pub fn map_query(&self, template: &JsonMap<String, JsonValue>) -> Vec<(String, String)> {
        template
            .iter()
            .filter_map(|(name, expr)| {
                let value = match self.map(expr) {
                    JsonValue::Null => return None,
                    JsonValue::String(s) => s,
                    other => other.to_string(),
                };
                Some((name.clone(), value))
            })
            .collect()
    }
}
