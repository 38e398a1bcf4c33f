//! Recovery of JSON payloads embedded in free-form model output.
//!
//! Models wrap JSON in markdown fences, prefix it with prose, or append a
//! closing remark. [`json_blocks`] finds every top-level balanced `{...}` or
//! `[...]` span, skipping braces that appear inside string literals.

use serde::de::DeserializeOwned;

/// Returns the first balanced JSON-like block in `text`, if any.
#[must_use]
pub fn locate_json_block(text: &str) -> Option<&str> {
    json_blocks(text).into_iter().next()
}

/// Returns every top-level balanced block in order of appearance.
#[must_use]
pub fn json_blocks(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'{' | b'[') {
            if let Some(end) = balanced_end(bytes, i) {
                blocks.push(&text[i..=end]);
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    blocks
}

/// Deserializes the first block in `text` that matches `T`.
///
/// # Errors
///
/// Returns a human-readable reason when no block exists or none matches.
pub fn parse_json_block<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let mut reason = "no JSON object found in response".to_string();
    for block in json_blocks(text) {
        match serde_json::from_str::<T>(block) {
            Ok(value) => return Ok(value),
            Err(e) => reason = format!("JSON did not match the expected shape: {e}"),
        }
    }
    Err(reason)
}

// Only ASCII bytes are inspected, so every returned index is a char boundary.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let close = if bytes[start] == b'{' { b'}' } else { b']' };
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (b == close).then_some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        winner: String,
    }

    #[test]
    fn finds_block_inside_markdown_fence() {
        let text = "Here you go:\n```json\n{\"winner\": \"Acme\"}\n```\nHope that helps.";
        assert_eq!(locate_json_block(text), Some("{\"winner\": \"Acme\"}"));
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let text = r#"{"winner": "Acme {the best}", "note": "a \" quote }"}"#;
        assert_eq!(locate_json_block(text), Some(text));
    }

    #[test]
    fn nested_objects_are_one_block() {
        let text = r#"x {"a": {"b": [1, 2, {"c": 3}]}} y"#;
        assert_eq!(json_blocks(text), vec![r#"{"a": {"b": [1, 2, {"c": 3}]}}"#]);
    }

    #[test]
    fn unbalanced_text_yields_nothing() {
        assert_eq!(locate_json_block("{\"winner\": \"Acme\""), None);
        assert_eq!(locate_json_block("no json here"), None);
    }

    #[test]
    fn parse_skips_blocks_that_do_not_match() {
        let text = "According to [1], the answer is {\"winner\": \"Fizzco\"}.";
        let parsed: Verdict = parse_json_block(text).unwrap();
        assert_eq!(parsed.winner, "Fizzco");
    }

    #[test]
    fn parse_reports_missing_json() {
        let err = parse_json_block::<Verdict>("I cannot answer that.").unwrap_err();
        assert!(err.contains("no JSON object"));
    }

    #[test]
    fn multibyte_text_around_block_is_handled() {
        let text = "Résumé → {\"winner\": \"Café Ñ\"} ✓";
        let parsed: Verdict = parse_json_block(text).unwrap();
        assert_eq!(parsed.winner, "Café Ñ");
    }
}
