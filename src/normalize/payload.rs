//! Locating the JSON object inside an extraction response.
//!
//! The extraction model is asked for exactly one JSON object but routinely
//! wraps it in code fences, surrounds it with prose, or leaves trailing
//! commas behind. This module tolerates those before giving up.

use crate::error::SchemaError;
use serde_json::Value;
use tracing::debug;

/// Extract the single JSON value carried by `text`.
///
/// Tries, in order: the fenced (or whole) body as-is, the outermost
/// `{ ... }` slice of it, and the same slice with trailing commas removed.
pub fn extract_json_object(text: &str) -> Result<Value, SchemaError> {
    let body = strip_code_fence(text);

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Ok(value);
    }

    let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) else {
        return Err(SchemaError::NoJsonObject);
    };
    if end < start {
        return Err(SchemaError::NoJsonObject);
    }
    let candidate = &body[start..=end];

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => Ok(value),
        Err(first) => {
            debug!("Extraction JSON did not parse ({}), repairing trailing commas", first);
            let repaired = remove_trailing_commas(candidate);
            serde_json::from_str::<Value>(&repaired).map_err(|e| SchemaError::InvalidJson {
                reason: e.to_string(),
            })
        }
    }
}

/// Return the body of the first Markdown code fence, or the trimmed text
/// when there is none. An unterminated fence runs to the end of the text.
pub fn strip_code_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text.trim();
    };
    let after = &text[open + 3..];

    // Skip a language tag such as `json`.
    let tag_len = after
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    let body = &after[tag_len..];

    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Drop commas that directly precede `}` or `]`, ignoring string contents.
pub fn remove_trailing_commas(json: &str) -> String {
    let chars: Vec<char> = json.chars().collect();
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let value = extract_json_object(r#"{"id": "RFP-1"}"#).unwrap();
        assert_eq!(value["id"], "RFP-1");
    }

    #[test]
    fn test_fenced_object_with_prose() {
        let text = "Here is the data:\n```json\n{\"id\": \"RFP-2\", \"risks\": []}\n```\nLet me know.";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["id"], "RFP-2");
    }

    #[test]
    fn test_bare_fence() {
        let text = "```\n{\"id\": \"RFP-3\"}\n```";
        assert_eq!(extract_json_object(text).unwrap()["id"], "RFP-3");
    }

    #[test]
    fn test_trailing_commas_repaired() {
        let text = "```json\n{\"recommendations\": [\"a\", \"b\",], \"id\": \"RFP-4\",}\n```";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["id"], "RFP-4");
        assert_eq!(value["recommendations"].as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_commas_inside_strings_kept() {
        let repaired = remove_trailing_commas(r#"{"a": "x,}", "b": [1,2,],}"#);
        assert_eq!(repaired, r#"{"a": "x,}", "b": [1,2]}"#);
    }

    #[test]
    fn test_no_object() {
        assert_eq!(
            extract_json_object("The model refused to answer."),
            Err(SchemaError::NoJsonObject)
        );
    }

    #[test]
    fn test_unrepairable() {
        let err = extract_json_object("{\"id\": \"RFP-5\" \"title\": }").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidJson { .. }));
    }

    #[test]
    fn test_non_object_value_passes_through() {
        // The normalizer decides what to do with non-objects.
        let value = extract_json_object("[1, 2, 3]").unwrap();
        assert!(value.is_array());
    }
}
