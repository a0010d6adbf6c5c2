//! Response routing.
//!
//! After the target answers, exactly one response template is selected,
//! either by the target's status code or by a field of its JSON body.

mod body;
mod status;

pub use body::BodyRouter;
pub use status::StatusRouter;

use crate::config::{ConfigError, EndpointMapping, ResponseMappingType};
use serde_json::Value as JsonValue;
use std::fmt;

/// Compiled routing for one endpoint.
#[derive(Debug, Clone)]
pub enum ResponseRouter {
    ByStatus(StatusRouter),
    ByBody(BodyRouter),
}

/// The single outcome of routing a target response.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome<'a> {
    /// Response template to map
    pub template: &'a JsonValue,
    /// Status returned to the caller
    pub status: u16,
    /// What selected the template
    pub matched: RouteMatch<'a>,
}

/// Which branch produced a [`RouteOutcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatch<'a> {
    /// Custom entry for the target status
    Status(u16),
    /// Body rule on `locator` matched `value`
    Field { locator: &'a str, value: String },
    /// Nothing matched
    Default,
}

impl fmt::Display for RouteMatch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMatch::Status(code) => write!(f, "status {}", code),
            RouteMatch::Field { locator, value } => write!(f, "{}={}", locator, value),
            RouteMatch::Default => f.write_str("default"),
        }
    }
}

impl ResponseRouter {
    /// Compile the routing section selected by the mapping's
    /// `responseMappingType`.
    pub fn compile(mapping: &EndpointMapping) -> Result<Self, ConfigError> {
        let missing = || ConfigError::MissingRouting {
            mapping: mapping.name.clone(),
            kind: mapping.response_mapping_type,
        };

        match mapping.response_mapping_type {
            ResponseMappingType::ByHttpStatusCode => {
                let section = mapping
                    .response_mapping
                    .by_http_status_code
                    .as_ref()
                    .ok_or_else(missing)?;
                Ok(Self::ByStatus(StatusRouter::compile(&mapping.name, section)?))
            }
            ResponseMappingType::ByBodyResponse => {
                let section = mapping
                    .response_mapping
                    .by_body_response
                    .as_ref()
                    .ok_or_else(missing)?;
                Ok(Self::ByBody(BodyRouter::compile(section)))
            }
        }
    }

    /// Select the response for a target status and (parsed) body.
    ///
    /// `body` is `None` when the target body is empty or not JSON; body
    /// routing then falls back to the default.
    pub fn route(&self, status: u16, body: Option<&JsonValue>) -> RouteOutcome<'_> {
        match self {
            Self::ByStatus(router) => router.route(status),
            Self::ByBody(router) => router.route(body),
        }
    }

    /// Routing strategy name.
    pub fn kind(&self) -> ResponseMappingType {
        match self {
            Self::ByStatus(_) => ResponseMappingType::ByHttpStatusCode,
            Self::ByBody(_) => ResponseMappingType::ByBodyResponse,
        }
    }
}
