//! Routing by a field of the target body.

use super::{RouteMatch, RouteOutcome};
use crate::config::{BodyRule, ByBodyResponse, ResponseSpec};
use crate::locator;
use serde_json::Value as JsonValue;

/// Body-field router.
///
/// Rules are checked in declaration order and the first accepted value
/// wins. Values are compared by their text, so `20005` in the body matches
/// `"20005"` in the rule and the other way round.
#[derive(Debug, Clone)]
pub struct BodyRouter {
    default: ResponseSpec,
    rules: Vec<BodyRule>,
}

impl BodyRouter {
    pub fn compile(section: &ByBodyResponse) -> Self {
        Self {
            default: section.default.response.clone(),
            rules: section.custom.0.clone(),
        }
    }

    pub fn route(&self, body: Option<&JsonValue>) -> RouteOutcome<'_> {
        if let Some(body) = body {
            for rule in &self.rules {
                let Some(field) = locator::select(body, &rule.locator) else {
                    continue;
                };
                let text = locator::as_text(&field);

                if let Some(case) = rule.cases.iter().find(|c| c.values.contains(&text)) {
                    return RouteOutcome {
                        template: &case.response.json_body,
                        status: case.response.http_status_code,
                        matched: RouteMatch::Field {
                            locator: &rule.locator,
                            value: text,
                        },
                    };
                }
            }
        }

        RouteOutcome {
            template: &self.default.json_body,
            status: self.default.http_status_code,
            matched: RouteMatch::Default,
        }
    }

    /// Number of field rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_router() -> BodyRouter {
        let section: ByBodyResponse = serde_json::from_str(
            r#"{
                "default": {"response": {"http_status_code": 500, "json_body": {"error": "src:static|unknown"}}},
                "custom": {
                    "status_code": [
                        {"values": ["20005", "20006"], "response": {"http_status_code": 400, "json_body": "src:res_body|status_desc"}},
                        {"values": ["00000"], "response": {"http_status_code": 200, "json_body": {"ok": "src:static|true"}}}
                    ],
                    "data.score": [
                        {"values": [1, 2], "response": {"http_status_code": 200, "json_body": {"swapped": "src:static|true"}}}
                    ]
                }
            }"#,
        )
        .unwrap();
        BodyRouter::compile(&section)
    }

    #[test]
    fn test_field_match() {
        let router = make_router();
        assert_eq!(router.len(), 2);

        let body = json!({ "status_code": "20005", "status_desc": "Inactive" });
        let outcome = router.route(Some(&body));
        assert_eq!(outcome.status, 400);
        assert_eq!(outcome.template, &json!("src:res_body|status_desc"));
        assert_eq!(
            outcome.matched,
            RouteMatch::Field {
                locator: "status_code",
                value: "20005".to_string()
            }
        );
    }

    #[test]
    fn test_second_case_of_rule() {
        let body = json!({ "status_code": "00000" });
        let router = make_router();
        let outcome = router.route(Some(&body));
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.template, &json!({ "ok": "src:static|true" }));
    }

    #[test]
    fn test_values_compared_as_text() {
        let router = make_router();

        let body = json!({ "data": { "score": "2" } });
        assert_eq!(router.route(Some(&body)).status, 200);

        let body = json!({ "status_code": 20006 });
        assert_eq!(router.route(Some(&body)).status, 400);
    }

    #[test]
    fn test_first_declared_rule_wins() {
        // Both rules match; status_code is declared first
        let body = json!({ "status_code": "20005", "data": { "score": 1 } });
        let router = make_router();
        let outcome = router.route(Some(&body));
        assert_eq!(outcome.status, 400);
        assert!(matches!(
            outcome.matched,
            RouteMatch::Field { locator: "status_code", .. }
        ));
    }

    #[test]
    fn test_default_when_nothing_matches() {
        let router = make_router();

        let body = json!({ "status_code": "99999" });
        let outcome = router.route(Some(&body));
        assert_eq!(outcome.status, 500);
        assert_eq!(outcome.matched, RouteMatch::Default);

        // Missing field, non-JSON body
        assert_eq!(router.route(Some(&json!({}))).status, 500);
        assert_eq!(router.route(None).status, 500);
    }

    #[test]
    fn test_exactly_one_outcome() {
        let router = make_router();
        let cases = [
            (json!(null), 500, RouteMatch::Default),
            (json!([]), 500, RouteMatch::Default),
            (json!("text"), 500, RouteMatch::Default),
            (json!({ "status_code": null }), 500, RouteMatch::Default),
            (json!({ "data": { "score": 3 } }), 500, RouteMatch::Default),
            (
                json!({ "status_code": "20005" }),
                400,
                RouteMatch::Field {
                    locator: "status_code",
                    value: "20005".to_string(),
                },
            ),
            (
                json!({ "data": { "score": 2 } }),
                200,
                RouteMatch::Field {
                    locator: "data.score",
                    value: "2".to_string(),
                },
            ),
        ];
        for (body, status, matched) in &cases {
            let outcome = router.route(Some(body));
            assert_eq!(&outcome.matched, matched, "body {body}");
            assert_eq!(outcome.status, *status, "body {body}");
        }
    }
}
