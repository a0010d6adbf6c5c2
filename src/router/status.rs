//! Routing by target status code.

use super::{RouteMatch, RouteOutcome};
use crate::config::{parse_status_key, ByHttpStatusCode, ConfigError, ResponseSpec};
use std::collections::HashMap;

/// Status-code router.
///
/// A custom entry keeps the target's status; only the default carries its
/// own configured status.
#[derive(Debug, Clone)]
pub struct StatusRouter {
    default: ResponseSpec,
    custom: HashMap<u16, ResponseSpec>,
}

impl StatusRouter {
    /// Compile a `byHTTPStatusCode` section. Keys must be canonical decimal
    /// status codes.
    pub fn compile(mapping: &str, section: &ByHttpStatusCode) -> Result<Self, ConfigError> {
        let mut custom = HashMap::with_capacity(section.custom.len());
        for (key, case) in &section.custom {
            custom.insert(parse_status_key(mapping, key)?, case.response.clone());
        }

        Ok(Self {
            default: section.default.response.clone(),
            custom,
        })
    }

    pub fn route(&self, status: u16) -> RouteOutcome<'_> {
        match self.custom.get(&status) {
            Some(spec) => RouteOutcome {
                template: &spec.json_body,
                status,
                matched: RouteMatch::Status(status),
            },
            None => RouteOutcome {
                template: &self.default.json_body,
                status: self.default.http_status_code,
                matched: RouteMatch::Default,
            },
        }
    }

    /// Number of custom entries.
    pub fn len(&self) -> usize {
        self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.custom.is_empty()
    }
}
