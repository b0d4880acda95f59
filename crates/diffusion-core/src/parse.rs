//! Oracle response parsing and validation.
//!
//! Oracle text is expected to be a JSON object with exactly these fields:
//! `thinking`, `decision`, `reasoning`, `network_influence_level`,
//! `global_influence_level`, `confidence_level`. Extraction tries
//! progressively more lenient strategies before giving up:
//! 1. Direct `serde_json` deserialization
//! 2. Extract JSON from a markdown code block
//! 3. Strip trailing commas and retry
//! 4. Take the span from the first `{` to the last `}`
//!
//! On the final attempt, a response that fails full validation is still
//! accepted if `decision` and `reasoning` are valid; the ancillary fields
//! that are missing or malformed are dropped and the payload is marked
//! degraded.

use diffusion_types::{AdoptionDecision, DecisionPayload};
use serde_json::{Map, Value};
use tracing::warn;

/// Fields a complete response carries.
pub const EXPECTED_FIELDS: [&str; 6] = [
    "thinking",
    "decision",
    "reasoning",
    "network_influence_level",
    "global_influence_level",
    "confidence_level",
];

/// Upper bound of the 0-10 indicator scale.
pub const INDICATOR_MAX: i64 = 10;

/// A structurally invalid oracle response. Recoverable by retrying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReasoningError {
    /// No JSON object could be extracted.
    #[error("response is not a JSON object: {detail}")]
    Malformed {
        /// What went wrong.
        detail: String,
    },

    /// A required field is absent.
    #[error("response is missing field `{0}`")]
    MissingField(&'static str),

    /// A field outside the response contract is present.
    #[error("response has unexpected field `{0}`")]
    UnexpectedField(String),

    /// `decision` is not one of the two labels.
    #[error("decision must be ADOPT or NOT_ADOPT, got {0}")]
    InvalidDecision(String),

    /// A field has the wrong JSON type.
    #[error("field `{field}` must be {expected}")]
    WrongType {
        /// Field name.
        field: &'static str,
        /// Expected type.
        expected: &'static str,
    },

    /// An indicator is outside `0..=10`.
    #[error("field `{field}` must be between 0 and {INDICATOR_MAX}, got {value}")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// The offending value.
        value: i64,
    },
}

/// Parse and validate an oracle response.
///
/// With `final_attempt` set, falls back to degraded acceptance when the
/// full contract is not met.
pub fn parse_decision(raw: &str, final_attempt: bool) -> Result<DecisionPayload, ReasoningError> {
    let object = extract_object(raw)?;
    match validate_strict(&object) {
        Ok(payload) => Ok(payload),
        Err(strict_error) if final_attempt => {
            let payload = validate_degraded(&object)?;
            warn!(
                error = %strict_error,
                decision = %payload.decision,
                "Accepting incomplete response on final attempt"
            );
            Ok(payload)
        }
        Err(e) => Err(e),
    }
}

fn validate_strict(object: &Map<String, Value>) -> Result<DecisionPayload, ReasoningError> {
    for field in EXPECTED_FIELDS {
        if !object.contains_key(field) {
            return Err(ReasoningError::MissingField(field));
        }
    }
    if let Some(extra) = object.keys().find(|k| !EXPECTED_FIELDS.contains(&k.as_str())) {
        return Err(ReasoningError::UnexpectedField(extra.clone()));
    }

    let thinking = string_field(object, "thinking")?;
    let decision = decision_field(object)?;
    let reasoning = string_field(object, "reasoning")?;
    let network_influence_level = indicator_field(object, "network_influence_level")?;
    let global_influence_level = indicator_field(object, "global_influence_level")?;
    let confidence_level = indicator_field(object, "confidence_level")?;

    Ok(DecisionPayload {
        thinking: Some(thinking),
        decision,
        reasoning,
        network_influence_level: Some(network_influence_level),
        global_influence_level: Some(global_influence_level),
        confidence_level: Some(confidence_level),
        degraded: false,
    })
}

fn validate_degraded(object: &Map<String, Value>) -> Result<DecisionPayload, ReasoningError> {
    let decision = decision_field(object)?;
    let reasoning = string_field(object, "reasoning")?;
    Ok(DecisionPayload {
        thinking: string_field(object, "thinking").ok(),
        decision,
        reasoning,
        network_influence_level: indicator_field(object, "network_influence_level").ok(),
        global_influence_level: indicator_field(object, "global_influence_level").ok(),
        confidence_level: indicator_field(object, "confidence_level").ok(),
        degraded: true,
    })
}

fn decision_field(object: &Map<String, Value>) -> Result<AdoptionDecision, ReasoningError> {
    let value = object
        .get("decision")
        .ok_or(ReasoningError::MissingField("decision"))?;
    let label = value.as_str().ok_or(ReasoningError::WrongType {
        field: "decision",
        expected: "a string",
    })?;
    AdoptionDecision::from_label(label.trim())
        .ok_or_else(|| ReasoningError::InvalidDecision(label.to_owned()))
}

fn string_field(object: &Map<String, Value>, field: &'static str) -> Result<String, ReasoningError> {
    object
        .get(field)
        .ok_or(ReasoningError::MissingField(field))?
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or(ReasoningError::WrongType {
            field,
            expected: "a string",
        })
}

fn indicator_field(object: &Map<String, Value>, field: &'static str) -> Result<u8, ReasoningError> {
    let value = object.get(field).ok_or(ReasoningError::MissingField(field))?;
    let number = integer_value(value).ok_or(ReasoningError::WrongType {
        field,
        expected: "an integer",
    })?;
    match u8::try_from(number) {
        Ok(level) if i64::from(level) <= INDICATOR_MAX => Ok(level),
        _ => Err(ReasoningError::OutOfRange {
            field,
            value: number,
        }),
    }
}

/// Integers, and floats with no fractional part.
#[allow(clippy::cast_possible_truncation)]
fn integer_value(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f.abs() <= 1e6 {
        Some(f as i64)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

fn extract_object(raw: &str) -> Result<Map<String, Value>, ReasoningError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ReasoningError::Malformed {
            detail: "empty response".to_owned(),
        });
    }

    let mut candidates: Vec<String> = vec![trimmed.to_owned()];
    if let Some(block) = extract_json_from_codeblock(trimmed) {
        candidates.push(block.to_owned());
        candidates.push(strip_trailing_commas(block));
    }
    candidates.push(strip_trailing_commas(trimmed));
    if let Some(span) = outer_braces(trimmed) {
        candidates.push(strip_trailing_commas(span));
    }

    let mut last_detail = String::new();
    for candidate in &candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(other) => last_detail = format!("expected an object, got {}", type_name(&other)),
            Err(e) => last_detail = e.to_string(),
        }
    }
    Err(ReasoningError::Malformed {
        detail: last_detail,
    })
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Extract the body of the first markdown code block.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = text.get(open.checked_add(3)?..)?;
    // Skip the info string (e.g. `json`) up to the end of the line.
    let body_start = after_fence.find('\n').and_then(|nl| nl.checked_add(1))?;
    let body = after_fence.get(body_start..)?;
    let close = body.find("```")?;
    body.get(..close).map(str::trim)
}

/// The span from the first `{` to the last `}` inclusive.
fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    text.get(start..=end)
}

/// Strip commas that directly precede a closing brace or bracket.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ',' {
            let next = chars
                .iter()
                .skip(i.saturating_add(1))
                .find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "thinking": "the neighbors seem happy",
        "decision": "ADOPT",
        "reasoning": "clear advantage",
        "network_influence_level": 6,
        "global_influence_level": 3,
        "confidence_level": 8
    }"#;

    #[test]
    fn parse_complete_response() {
        let payload = parse_decision(FULL, false);
        assert!(payload.is_ok(), "{payload:?}");
        let payload = payload.unwrap_or_else(|_| unreachable_payload());
        assert_eq!(payload.decision, AdoptionDecision::Adopt);
        assert_eq!(payload.network_influence_level, Some(6));
        assert_eq!(payload.confidence_level, Some(8));
        assert!(!payload.degraded);
    }

    #[test]
    fn parse_from_codeblock_with_prose() {
        let raw = format!("Here is my answer:\n\n```json\n{FULL}\n```\nThanks.");
        assert!(parse_decision(&raw, false).is_ok());
    }

    #[test]
    fn parse_trailing_comma() {
        let raw = r#"{"thinking": "t", "decision": "NOT_ADOPT", "reasoning": "r",
            "network_influence_level": 1, "global_influence_level": 2, "confidence_level": 3,}"#;
        let payload = parse_decision(raw, false);
        assert_eq!(payload.map(|p| p.decision).ok(), Some(AdoptionDecision::NotAdopt));
    }

    #[test]
    fn parse_object_embedded_in_prose() {
        let raw = format!("I have decided. {FULL} That is all.");
        assert!(parse_decision(&raw, false).is_ok());
    }

    #[test]
    fn integral_float_indicators_are_accepted() {
        let raw = FULL.replace("\"confidence_level\": 8", "\"confidence_level\": 8.0");
        let payload = parse_decision(&raw, false);
        assert_eq!(payload.map(|p| p.confidence_level).ok(), Some(Some(8)));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_decision("I think I will adopt.", false),
            Err(ReasoningError::Malformed { .. })
        ));
        assert!(matches!(
            parse_decision("", true),
            Err(ReasoningError::Malformed { .. })
        ));
        assert!(matches!(
            parse_decision("[1, 2]", false),
            Err(ReasoningError::Malformed { .. })
        ));
    }

    #[test]
    fn missing_field_is_rejected() {
        let raw = r#"{"decision": "ADOPT", "reasoning": "r"}"#;
        assert_eq!(
            parse_decision(raw, false),
            Err(ReasoningError::MissingField("thinking"))
        );
    }

    #[test]
    fn unexpected_field_is_rejected() {
        let raw = FULL.replace("\"confidence_level\": 8", "\"confidence_level\": 8, \"mood\": \"ok\"");
        assert_eq!(
            parse_decision(&raw, false),
            Err(ReasoningError::UnexpectedField("mood".to_owned()))
        );
    }

    #[test]
    fn invalid_decision_is_rejected() {
        let raw = FULL.replace("\"ADOPT\"", "\"MAYBE\"");
        assert_eq!(
            parse_decision(&raw, false),
            Err(ReasoningError::InvalidDecision("MAYBE".to_owned()))
        );
        // not even degraded mode accepts it
        assert_eq!(
            parse_decision(&raw, true),
            Err(ReasoningError::InvalidDecision("MAYBE".to_owned()))
        );
    }

    #[test]
    fn indicator_type_and_range_are_checked() {
        let raw = FULL.replace("\"global_influence_level\": 3", "\"global_influence_level\": \"high\"");
        assert_eq!(
            parse_decision(&raw, false),
            Err(ReasoningError::WrongType {
                field: "global_influence_level",
                expected: "an integer"
            })
        );
        let raw = FULL.replace("\"global_influence_level\": 3", "\"global_influence_level\": 11");
        assert_eq!(
            parse_decision(&raw, false),
            Err(ReasoningError::OutOfRange {
                field: "global_influence_level",
                value: 11
            })
        );
    }

    #[test]
    fn final_attempt_accepts_decision_and_reasoning_only() {
        let raw = r#"{"decision": "ADOPT", "reasoning": "good enough", "confidence_level": 42}"#;
        assert!(parse_decision(raw, false).is_err());
        let payload = parse_decision(raw, true);
        assert!(payload.is_ok());
        let payload = payload.unwrap_or_else(|_| unreachable_payload());
        assert!(payload.degraded);
        assert_eq!(payload.thinking, None);
        assert_eq!(payload.confidence_level, None);
        assert_eq!(payload.reasoning, "good enough");
    }

    #[test]
    fn final_attempt_still_requires_reasoning() {
        let raw = r#"{"decision": "ADOPT", "thinking": "hmm"}"#;
        assert_eq!(
            parse_decision(raw, true),
            Err(ReasoningError::MissingField("reasoning"))
        );
    }

    #[test]
    fn extract_json_from_markdown() {
        let text = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json_from_codeblock(text), Some("{\"key\": \"value\"}"));
        let text = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(extract_json_from_codeblock(text), Some("{\"key\": \"value\"}"));
    }

    #[test]
    fn strip_commas_before_closers_only() {
        assert_eq!(strip_trailing_commas("{\"a\": [1, 2, ], }"), "{\"a\": [1, 2 ] }");
        assert_eq!(strip_trailing_commas("{\"a\": \"x, y\"}"), "{\"a\": \"x, y\"}");
    }

    fn unreachable_payload() -> DecisionPayload {
        DecisionPayload {
            thinking: None,
            decision: AdoptionDecision::NotAdopt,
            reasoning: String::new(),
            network_influence_level: None,
            global_influence_level: None,
            confidence_level: None,
            degraded: false,
        }
    }
}
