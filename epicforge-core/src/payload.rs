//! Best-effort parsing of generated text.
//!
//! Model output is expected to be JSON but nothing guarantees it. Parsing
//! never fails: text that does not decode becomes [`Payload::Unparsed`] and
//! every accessor falls back to an empty value.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Unparsed,
}

impl Payload {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Payload::Json(value),
            Err(e) => {
                tracing::debug!(error = %e, "Generated text is not valid JSON");
                Payload::Unparsed
            }
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Payload::Json(_))
    }

    /// The top-level `epic_title` string, or `""` when the text is not a JSON
    /// object or the field is missing or not a string.
    pub fn epic_title(&self) -> &str {
        match self {
            Payload::Json(Value::Object(map)) => {
                map.get("epic_title").and_then(Value::as_str).unwrap_or("")
            }
            _ => "",
        }
    }

    /// The decoded value, or an empty object for unparsed text.
    pub fn into_value(self) -> Value {
        match self {
            Payload::Json(value) => value,
            Payload::Unparsed => Value::Object(Map::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_with_title() {
        let payload = Payload::parse(r#"{"epic_title": "Dark Mode", "stories": []}"#);
        assert!(payload.is_json());
        assert_eq!(payload.epic_title(), "Dark Mode");
    }

    #[test]
    fn test_object_without_title() {
        let payload = Payload::parse(r#"{"description": "no title here"}"#);
        assert!(payload.is_json());
        assert_eq!(payload.epic_title(), "");
    }

    #[test]
    fn test_non_string_title_is_ignored() {
        assert_eq!(Payload::parse(r#"{"epic_title": 42}"#).epic_title(), "");
        assert_eq!(Payload::parse(r#"{"epic_title": null}"#).epic_title(), "");
    }

    #[test]
    fn test_array_has_no_title() {
        let payload = Payload::parse(r#"[{"epic_title": "nested"}]"#);
        assert!(payload.is_json());
        assert_eq!(payload.epic_title(), "");
    }

    #[test]
    fn test_malformed_text_defaults() {
        let payload = Payload::parse("```json\n{\"epic_title\": \"x\"");
        assert_eq!(payload, Payload::Unparsed);
        assert_eq!(payload.epic_title(), "");
        assert_eq!(payload.into_value(), json!({}));
    }

    #[test]
    fn test_into_value_keeps_parsed_document() {
        let payload = Payload::parse(r#"[1, 2, 3]"#);
        assert_eq!(payload.into_value(), json!([1, 2, 3]));
    }
}
