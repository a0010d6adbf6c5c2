//! Configuration types for the mapping gateway.
//!
//! The schema mirrors the JSON documents the gateway has always consumed
//! (`apiMappings`, `pluginConfigs`, `byHTTPStatusCode`, ...), so existing
//! configuration files load unchanged. YAML is accepted as well.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Main configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Configuration version
    pub version: String,
    /// Global settings
    pub settings: Settings,
    /// Endpoint mappings (matched in declaration order)
    pub api_mappings: Vec<EndpointMapping>,
    /// Plugin bindings (logical name -> registered instance)
    pub plugin_configs: Vec<PluginConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            settings: Settings::default(),
            api_mappings: vec![],
            plugin_configs: vec![],
        }
    }
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Address the HTTP listener binds to
    pub listen_address: String,
    /// Timeout for a single target call (ms)
    pub target_timeout_ms: u64,
    /// Maximum inbound body size (bytes)
    pub max_body_size: usize,
    /// Enable debug headers (X-Mapping-Endpoint, X-Mapping-Time)
    pub debug_headers: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8082".to_string(),
            target_timeout_ms: 30_000,
            max_body_size: 10 * 1024 * 1024, // 10MB
            debug_headers: false,
        }
    }
}

/// One source contract mapped onto one target contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMapping {
    /// Mapping name (for logging/debugging)
    pub name: String,
    /// Which response routing section applies
    #[serde(default)]
    pub response_mapping_type: ResponseMappingType,
    /// Inbound contract
    pub source: SourceContract,
    /// Outbound contract
    pub target: TargetContract,
    /// Request templates
    #[serde(default)]
    pub request_mapping: RequestMapping,
    /// Response routing
    #[serde(default)]
    pub response_mapping: ResponseMapping,
}

/// Response routing strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum ResponseMappingType {
    /// Route on the target's HTTP status code
    #[default]
    #[serde(rename = "byHTTPStatusCode")]
    ByHttpStatusCode,
    /// Route on a field of the target's JSON body
    #[serde(rename = "byBodyResponse")]
    ByBodyResponse,
}

impl fmt::Display for ResponseMappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByHttpStatusCode => f.write_str("byHTTPStatusCode"),
            Self::ByBodyResponse => f.write_str("byBodyResponse"),
        }
    }
}

/// Inbound contract: the path and method callers use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceContract {
    /// Request path (exact match)
    pub url: String,
    /// HTTP method (case-insensitive)
    pub method: String,
}

/// Outbound contract: where the rewritten request goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetContract {
    /// Absolute target URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Headers sent to the target (literal strings or expressions)
    #[serde(default)]
    pub headers: JsonMap<String, JsonValue>,
}

/// Request templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RequestMapping {
    /// Flat query parameter template appended to the target URL
    #[serde(default)]
    pub query_param: JsonMap<String, JsonValue>,
    /// Body template (any JSON tree); null sends no body
    #[serde(default)]
    pub request_body: JsonValue,
}

/// Response routing sections. Only the one selected by
/// [`ResponseMappingType`] is consulted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponseMapping {
    #[serde(default, rename = "byHTTPStatusCode")]
    pub by_http_status_code: Option<ByHttpStatusCode>,
    #[serde(default, rename = "byBodyResponse")]
    pub by_body_response: Option<ByBodyResponse>,
}

/// Routing by target status code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ByHttpStatusCode {
    /// Used when no custom entry matches
    pub default: ResponseCase,
    /// Keyed by decimal status code ("200", "404", ...)
    #[serde(default)]
    pub custom: HashMap<String, ResponseCase>,
}

/// Routing by a field of the target body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ByBodyResponse {
    /// Used when no rule matches
    pub default: ResponseCase,
    /// Field locator -> cases, in declaration order
    #[serde(default)]
    pub custom: BodyRules,
}

/// Wrapper object around a response template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseCase {
    pub response: ResponseSpec,
}

/// Outbound status plus body template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    /// Status code returned to the caller
    #[serde(default = "default_status_code")]
    pub http_status_code: u16,
    /// Body template (any JSON tree)
    #[serde(default)]
    pub json_body: JsonValue,
}

fn default_status_code() -> u16 {
    200
}

/// One accepted-values case of a body rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyResponse {
    /// Literal values compared against the field's text
    #[serde(deserialize_with = "scalar_strings")]
    pub values: Vec<String>,
    pub response: ResponseSpec,
}

/// All cases declared for one field locator.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyRule {
    pub locator: String,
    pub cases: Vec<BodyResponse>,
}

/// Ordered body rules.
///
/// Serialized as a JSON/YAML object keyed by locator, but kept as a list so
/// the declaration order survives deserialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyRules(pub Vec<BodyRule>);

impl BodyRules {
    pub fn iter(&self) -> impl Iterator<Item = &BodyRule> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for BodyRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for rule in &self.0 {
            map.serialize_entry(&rule.locator, &rule.cases)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BodyRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = BodyRules;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field locator to response cases")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut rules = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((locator, cases)) = access.next_entry::<String, Vec<BodyResponse>>()? {
                    rules.push(BodyRule { locator, cases });
                }
                Ok(BodyRules(rules))
            }
        }

        deserializer.deserialize_map(RulesVisitor)
    }
}

/// Accept `["20005", 20005, true]` alike; body values are compared as text.
fn scalar_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    struct ScalarsVisitor;

    impl<'de> Visitor<'de> for ScalarsVisitor {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a list of strings, numbers or booleans")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(value) = seq.next_element::<JsonValue>()? {
                match value {
                    JsonValue::String(s) => values.push(s),
                    JsonValue::Number(n) => values.push(n.to_string()),
                    JsonValue::Bool(b) => values.push(b.to_string()),
                    other => {
                        return Err(de::Error::custom(format!(
                            "unsupported match value: {}",
                            other
                        )))
                    }
                }
            }
            Ok(values)
        }
    }

    deserializer.deserialize_seq(ScalarsVisitor)
}

/// Binding of a logical plugin name to a registered instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    /// Name used in `src:func|name(...)`
    pub name: String,
    /// Module location (diagnostics only for in-process plugins)
    #[serde(default)]
    pub path: String,
    /// Instance name the plugin is registered under
    pub instance_name: String,
}

impl GatewayConfig {
    /// Check the configuration before serving traffic.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut contracts = HashSet::new();

        for mapping in &self.api_mappings {
            mapping.validate()?;

            let key = (
                mapping.source.method.to_uppercase(),
                mapping.source.url.clone(),
            );
            if !contracts.insert(key) {
                return Err(ConfigError::DuplicateSource {
                    method: mapping.source.method.to_uppercase(),
                    url: mapping.source.url.clone(),
                });
            }
        }

        let mut plugin_names = HashSet::new();
        for plugin in &self.plugin_configs {
            if plugin.name.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    mapping: "pluginConfigs".to_string(),
                    field: "name",
                });
            }
            if plugin.instance_name.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    mapping: plugin.name.clone(),
                    field: "instanceName",
                });
            }
            if !plugin_names.insert(plugin.name.as_str()) {
                return Err(ConfigError::DuplicatePlugin(plugin.name.clone()));
            }
        }

        Ok(())
    }
}

impl EndpointMapping {
    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("name", &self.name),
            ("source.url", &self.source.url),
            ("source.method", &self.source.method),
            ("target.url", &self.target.url),
            ("target.method", &self.target.method),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    mapping: self.name.clone(),
                    field,
                });
            }
        }

        match self.response_mapping_type {
            ResponseMappingType::ByHttpStatusCode => {
                let section = self
                    .response_mapping
                    .by_http_status_code
                    .as_ref()
                    .ok_or_else(|| self.missing_section())?;
                check_status(&self.name, section.default.response.http_status_code)?;
                for (key, case) in &section.custom {
                    parse_status_key(&self.name, key)?;
                    check_status(&self.name, case.response.http_status_code)?;
                }
            }
            ResponseMappingType::ByBodyResponse => {
                let section = self
                    .response_mapping
                    .by_body_response
                    .as_ref()
                    .ok_or_else(|| self.missing_section())?;
                check_status(&self.name, section.default.response.http_status_code)?;
                for rule in section.custom.iter() {
                    for case in &rule.cases {
                        check_status(&self.name, case.response.http_status_code)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn missing_section(&self) -> ConfigError {
        ConfigError::MissingRouting {
            mapping: self.name.clone(),
            kind: self.response_mapping_type,
        }
    }
}

/// Parse a `custom` key of the status-code section. Keys must be the
/// canonical decimal form of a valid status code.
pub(crate) fn parse_status_key(mapping: &str, key: &str) -> Result<u16, ConfigError> {
    let invalid = || ConfigError::InvalidStatusKey {
        mapping: mapping.to_string(),
        key: key.to_string(),
    };
    let code: u16 = key.parse().map_err(|_| invalid())?;
    if code.to_string() != key || !(100..=599).contains(&code) {
        return Err(invalid());
    }
    Ok(code)
}

fn check_status(mapping: &str, code: u16) -> Result<(), ConfigError> {
    if (100..=599).contains(&code) {
        Ok(())
    } else {
        Err(ConfigError::InvalidStatusCode {
            mapping: mapping.to_string(),
            code,
        })
    }
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("mapping '{mapping}': missing required field '{field}'")]
    MissingField { mapping: String, field: &'static str },

    #[error("mapping '{mapping}': responseMappingType is {kind} but that section is missing")]
    MissingRouting {
        mapping: String,
        kind: ResponseMappingType,
    },

    #[error("mapping '{mapping}': invalid status code key '{key}'")]
    InvalidStatusKey { mapping: String, key: String },

    #[error("mapping '{mapping}': invalid http_status_code {code}")]
    InvalidStatusCode { mapping: String, code: u16 },

    #[error("duplicate source contract {method} {url}")]
    DuplicateSource { method: String, url: String },

    #[error("duplicate plugin name '{0}'")]
    DuplicatePlugin(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIM_SWAP_JSON: &str = r#"{
        "apiMappings": [
            {
                "name": "sim-swap",
                "responseMappingType": "byBodyResponse",
                "source": {"url": "/v1/sim-swap/check", "method": "POST"},
                "target": {
                    "url": "http://localhost:8081/digihub/subscheck/simswapv2",
                    "method": "POST",
                    "headers": {"Content-Type": "application/json", "Retry": 3}
                },
                "requestMapping": {
                    "queryParam": {"lang": "src:query|lang"},
                    "requestBody": {
                        "transaction_id": "src:func|trx()",
                        "msisdn": "src:req_body|phoneNumber"
                    }
                },
                "responseMapping": {
                    "byBodyResponse": {
                        "default": {"response": {"http_status_code": 500, "json_body": {"error": "src:static|unknown"}}},
                        "custom": {
                            "status_code": [
                                {"values": ["20005", 20006], "response": {"http_status_code": 400, "json_body": "src:res_body|status_desc"}}
                            ],
                            "score": [
                                {"values": ["1"], "response": {"http_status_code": 200, "json_body": {"swapped": "src:static|true"}}}
                            ]
                        }
                    }
                }
            }
        ],
        "pluginConfigs": [
            {"name": "trx", "path": "plugins/generate_transaction_id_plugin.so", "instanceName": "GenerateTransactionIDPluginInstance"}
        ]
    }"#;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.version, "1");
        assert!(config.api_mappings.is_empty());
        assert_eq!(config.settings.listen_address, "0.0.0.0:8082");
        assert_eq!(config.settings.max_body_size, 10 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parsing() {
        let config: GatewayConfig = serde_json::from_str(SIM_SWAP_JSON).unwrap();
        assert_eq!(config.api_mappings.len(), 1);
        assert_eq!(config.plugin_configs.len(), 1);
        assert_eq!(
            config.plugin_configs[0].instance_name,
            "GenerateTransactionIDPluginInstance"
        );

        let mapping = &config.api_mappings[0];
        assert_eq!(mapping.response_mapping_type, ResponseMappingType::ByBodyResponse);
        assert_eq!(mapping.target.headers.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_body_rules_keep_declaration_order() {
        let config: GatewayConfig = serde_json::from_str(SIM_SWAP_JSON).unwrap();
        let section = config.api_mappings[0]
            .response_mapping
            .by_body_response
            .as_ref()
            .unwrap();

        let locators: Vec<&str> = section.custom.iter().map(|r| r.locator.as_str()).collect();
        assert_eq!(locators, vec!["status_code", "score"]);
        // Numeric match values are normalised to text
        assert_eq!(section.custom.0[0].cases[0].values, vec!["20005", "20006"]);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
settings:
  debug_headers: true
  target_timeout_ms: 500
apiMappings:
  - name: "users"
    source: { url: "/users", method: "get" }
    target: { url: "http://backend/users", method: "GET" }
    responseMapping:
      byHTTPStatusCode:
        default:
          response: { http_status_code: 502, json_body: { ok: "src:static|false" } }
        custom:
          "200":
            response: { http_status_code: 200, json_body: { ok: "src:static|true" } }
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.settings.debug_headers);
        assert_eq!(config.settings.target_timeout_ms, 500);
        let mapping = &config.api_mappings[0];
        assert_eq!(mapping.response_mapping_type, ResponseMappingType::ByHttpStatusCode);
        assert!(mapping.request_mapping.request_body.is_null());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_routing_section() {
        let yaml = r#"
apiMappings:
  - name: "broken"
    responseMappingType: byBodyResponse
    source: { url: "/x", method: "GET" }
    target: { url: "http://backend/x", method: "GET" }
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRouting { .. })
        ));
    }

    #[test]
    fn test_invalid_status_key() {
        assert_eq!(parse_status_key("m", "404"), Ok(404));
        assert!(parse_status_key("m", "0404").is_err());
        assert!(parse_status_key("m", "abc").is_err());
        assert!(parse_status_key("m", "999").is_err());
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let yaml = r#"
apiMappings:
  - name: "a"
    source: { url: "/x", method: "GET" }
    target: { url: "http://backend/a", method: "GET" }
    responseMapping:
      byHTTPStatusCode:
        default: { response: { http_status_code: 200 } }
  - name: "b"
    source: { url: "/x", method: "get" }
    target: { url: "http://backend/b", method: "GET" }
    responseMapping:
      byHTTPStatusCode:
        default: { response: { http_status_code: 200 } }
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateSource { .. })
        ));
    }

    #[test]
    fn test_missing_field_rejected() {
        let yaml = r#"
apiMappings:
  - name: "no-target-url"
    source: { url: "/x", method: "GET" }
    target: { url: "", method: "GET" }
    responseMapping:
      byHTTPStatusCode:
        default: { response: { http_status_code: 200 } }
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingField {
                mapping: "no-target-url".to_string(),
                field: "target.url",
            })
        );
    }
}
