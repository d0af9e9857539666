//! Forward-or-reject decisions over analysis responses.
//!
//! The analysis service answers with an envelope like
//! `{"analysis": "```json\n{\"sentiment\": ..., \"forward_to\": ...}\n```"}`.
//! The inner object may also arrive already decoded. Anything that does not
//! yield an allow-listed recipient is rejected.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::MalformedAnalysis;

/// Reject reason for recipients outside the allow-list, including empty ones.
pub const NOT_IN_ALLOW_LIST: &str = "not in allow-list";

/// Immutable set of addresses a message may be forwarded to.
///
/// Membership is an exact, case-sensitive string match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    addresses: HashSet<String>,
}

impl AllowList {
    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            addresses: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Sentiment and recipient reported by the analysis service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisResult {
    pub sentiment: String,
    pub forward_to: String,
}

/// How to treat missing `sentiment` / `forward_to` fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strictness {
    /// Missing or null fields read as empty strings.
    #[default]
    Permissive,
    /// Missing or null fields make the analysis malformed.
    Strict,
}

impl Strictness {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            Strictness::Strict
        } else {
            Strictness::Permissive
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingAction {
    Forward(String),
    Reject(String),
}

/// An action together with the analysis it was derived from, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub analysis: Option<AnalysisResult>,
    pub action: RoutingAction,
}

/// Take the contents of the first markdown code fence, if there is one.
///
/// Text before the opening fence and after the closing fence is dropped, as
/// is the language tag. An unclosed fence runs to the end. Text without a
/// fence is only trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let inner = trimmed[start + 3..].trim_start_matches(|c: char| c.is_ascii_alphanumeric());

    match inner.find("```") {
        Some(end) => inner[..end].trim(),
        None => inner.trim(),
    }
}

/// Parse the first JSON value in `text`, ignoring anything after it.
fn first_json_value(text: &str) -> Result<Value, MalformedAnalysis> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| MalformedAnalysis::NotJson("empty analysis text".to_string()))?
        .map_err(|e| MalformedAnalysis::NotJson(e.to_string()))
}

/// Parse an analysis envelope into a result.
pub fn parse_analysis(raw: &str, strictness: Strictness) -> Result<AnalysisResult, MalformedAnalysis> {
    let envelope: Value =
        serde_json::from_str(raw).map_err(|e| MalformedAnalysis::NotJson(e.to_string()))?;

    let analysis = match envelope.get("analysis") {
        None | Some(Value::Null) => return Err(MalformedAnalysis::MissingAnalysis),
        Some(Value::String(text)) => first_json_value(strip_code_fence(text))?,
        Some(other) => other.clone(),
    };

    let fields = analysis.as_object().ok_or(MalformedAnalysis::NotAnObject)?;

    Ok(AnalysisResult {
        sentiment: read_field(fields, "sentiment", strictness)?,
        forward_to: read_field(fields, "forward_to", strictness)?,
    })
}

fn read_field(
    fields: &Map<String, Value>,
    name: &'static str,
    strictness: Strictness,
) -> Result<String, MalformedAnalysis> {
    match fields.get(name) {
        Some(Value::String(value)) => Ok(value.clone()),
        None | Some(Value::Null) => match strictness {
            Strictness::Permissive => Ok(String::new()),
            Strictness::Strict => Err(MalformedAnalysis::MissingField(name)),
        },
        Some(_) => Err(MalformedAnalysis::NotAString(name)),
    }
}

/// Decides forward-or-reject against a shared allow-list.
///
/// Holds no mutable state: the same raw text always yields the same action.
#[derive(Debug, Clone)]
pub struct RoutingDecider {
    allow_list: Arc<AllowList>,
    strictness: Strictness,
}

impl RoutingDecider {
    pub fn new(allow_list: Arc<AllowList>, strictness: Strictness) -> Self {
        Self {
            allow_list,
            strictness,
        }
    }

    /// Decide and keep the parsed analysis for logging and publishing.
    pub fn evaluate(&self, raw: &str) -> Decision {
        let analysis = match parse_analysis(raw, self.strictness) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, raw_length = raw.len(), "analysis_malformed");
                return Decision {
                    analysis: None,
                    action: RoutingAction::Reject(format!("malformed analysis: {}", e)),
                };
            }
        };

        let action = if !analysis.forward_to.is_empty()
            && self.allow_list.contains(&analysis.forward_to)
        {
            RoutingAction::Forward(analysis.forward_to.clone())
        } else {
            RoutingAction::Reject(NOT_IN_ALLOW_LIST.to_string())
        };

        Decision {
            analysis: Some(analysis),
            action,
        }
    }

    pub fn decide(&self, raw: &str) -> RoutingAction {
        self.evaluate(raw).action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decider(strictness: Strictness) -> RoutingDecider {
        let allow_list: AllowList = ["alice.j@yourcompany.com", "rajiv.m@yourcompany.com"]
            .into_iter()
            .collect();
        RoutingDecider::new(Arc::new(allow_list), strictness)
    }

    fn envelope(inner: &str) -> String {
        serde_json::json!({ "analysis": inner }).to_string()
    }

    #[test]
    fn test_fenced_json_for_allowed_recipient_forwards() {
        let raw = envelope(
            "```json\n{\"sentiment\":\"negative\",\"forward_to\":\"alice.j@yourcompany.com\"}\n```",
        );

        let decision = decider(Strictness::Permissive).evaluate(&raw);

        assert_eq!(
            decision.action,
            RoutingAction::Forward("alice.j@yourcompany.com".to_string())
        );
        assert_eq!(decision.analysis.unwrap().sentiment, "negative");
    }

    #[test]
    fn test_allow_list_from_iter_dedupes() {
        let allow_list: AllowList = ["a@yourcompany.com", "a@yourcompany.com", "b@yourcompany.com"]
            .into_iter()
            .collect();

        assert_eq!(allow_list.len(), 2);
        assert!(!allow_list.is_empty());
        assert!(AllowList::default().is_empty());
    }

    #[test]
    fn test_unknown_recipient_rejected() {
        let raw = envelope(r#"{"sentiment":"positive","forward_to":"unknown@external.com"}"#);

        assert_eq!(
            decider(Strictness::Permissive).decide(&raw),
            RoutingAction::Reject("not in allow-list".to_string())
        );
    }

    #[test]
    fn test_empty_recipient_rejected() {
        let raw = envelope(r#"{"sentiment":"neutral","forward_to":""}"#);

        assert_eq!(
            decider(Strictness::Permissive).decide(&raw),
            RoutingAction::Reject(NOT_IN_ALLOW_LIST.to_string())
        );
    }

    #[test]
    fn test_allow_list_is_case_sensitive() {
        let raw = envelope(r#"{"sentiment":"neutral","forward_to":"Alice.J@yourcompany.com"}"#);

        assert!(matches!(
            decider(Strictness::Permissive).decide(&raw),
            RoutingAction::Reject(_)
        ));
    }

    #[test]
    fn test_object_analysis_accepted() {
        let raw = r#"{"analysis":{"sentiment":"negative","forward_to":"rajiv.m@yourcompany.com"}}"#;

        assert_eq!(
            decider(Strictness::Permissive).decide(raw),
            RoutingAction::Forward("rajiv.m@yourcompany.com".to_string())
        );
    }

    #[test]
    fn test_malformed_input_never_forwards() {
        let decider = decider(Strictness::Permissive);
        let inputs = [
            "not json at all".to_string(),
            r#"{"result": "alice.j@yourcompany.com"}"#.to_string(),
            r#"{"analysis": null}"#.to_string(),
            envelope("```json\n{\"forward_to\": \"alice.j@yourcompany.com\"\n```"),
            envelope("[\"alice.j@yourcompany.com\"]"),
            envelope(r#"{"sentiment":"negative","forward_to":42}"#),
        ];

        for raw in &inputs {
            match decider.decide(raw) {
                RoutingAction::Reject(reason) => assert!(reason.starts_with("malformed analysis")),
                other => panic!("expected reject for {}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_missing_fields_permissive_vs_strict() {
        let raw = envelope(r#"{"forward_to":"alice.j@yourcompany.com"}"#);

        assert_eq!(
            decider(Strictness::Permissive).decide(&raw),
            RoutingAction::Forward("alice.j@yourcompany.com".to_string())
        );

        let strict = decider(Strictness::Strict).evaluate(&raw);
        assert_eq!(strict.analysis, None);
        assert!(matches!(strict.action, RoutingAction::Reject(_)));

        assert_eq!(
            parse_analysis(&raw, Strictness::Strict),
            Err(MalformedAnalysis::MissingField("sentiment"))
        );
    }

    #[test]
    fn test_decide_is_deterministic() {
        let decider = decider(Strictness::Permissive);
        let raw = envelope("```\n{\"sentiment\":\"positive\",\"forward_to\":\"alice.j@yourcompany.com\"}```");

        let first = decider.decide(&raw);
        for _ in 0..5 {
            assert_eq!(decider.decide(&raw), first);
        }
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  ```\n{\"a\":1}```  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("\n\n"), "");
        assert_eq!(strip_code_fence("Sure:\n```json\n{}\n```\nThanks"), "{}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_text_after_closing_fence_still_forwards() {
        let raw = envelope(
            "```json\n{\"sentiment\":\"negative\",\"forward_to\":\"alice.j@yourcompany.com\"}\n```\nLet me know if you need anything else.",
        );

        assert_eq!(
            decider(Strictness::Permissive).decide(&raw),
            RoutingAction::Forward("alice.j@yourcompany.com".to_string())
        );
    }

    #[test]
    fn test_text_before_opening_fence_still_forwards() {
        let raw = envelope(
            "Here is the routing decision:\n```json\n{\"sentiment\":\"neutral\",\"forward_to\":\"rajiv.m@yourcompany.com\"}\n```",
        );

        assert_eq!(
            decider(Strictness::Permissive).decide(&raw),
            RoutingAction::Forward("rajiv.m@yourcompany.com".to_string())
        );
    }

    #[test]
    fn test_trailing_text_after_bare_object_ignored() {
        let raw = envelope(
            "{\"sentiment\":\"negative\",\"forward_to\":\"alice.j@yourcompany.com\"}\nHope this helps.",
        );

        assert_eq!(
            decider(Strictness::Permissive).decide(&raw),
            RoutingAction::Forward("alice.j@yourcompany.com".to_string())
        );
    }

    #[test]
    fn test_empty_fence_is_malformed() {
        let raw = envelope("```json\n```");

        assert_eq!(
            parse_analysis(&raw, Strictness::Permissive),
            Err(MalformedAnalysis::NotJson("empty analysis text".to_string()))
        );
    }
}
