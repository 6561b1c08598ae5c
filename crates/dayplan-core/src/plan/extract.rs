//! Locate a JSON object inside free-form model output.
//!
//! Models wrap JSON in prose or markdown fences often enough that the raw
//! text cannot be parsed directly. The scanner walks each `{` candidate,
//! tracks depth outside string literals (honouring backslash escapes), and
//! returns the first balanced span that parses as a JSON object. A `{` that
//! never closes ends the scan: every later `{` sits inside it and cannot
//! close either.

use serde_json::Value;

/// Byte offset one past the `}` closing the object opened at `start`.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// The first balanced `{...}` span in `text` that parses as a JSON object.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut from = 0;

    while let Some(rel) = text[from..].find('{') {
        let start = from + rel;
        let end = balanced_end(bytes, start)?;
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&text[start..end]) {
            return Some(value);
        }
        from = start + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_object() {
        assert_eq!(extract_json_object(r#"{"a": 1}"#), Some(json!({"a": 1})));
    }

    #[test]
    fn strips_prose_and_fences() {
        let text = "Sure! Here is your plan:\n```json\n{\"goal\": \"x\", \"n\": [1, 2]}\n```\nGood luck.";
        assert_eq!(extract_json_object(text), Some(json!({"goal": "x", "n": [1, 2]})));
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let text = r#"{"focus": "use {curly} braces", "note": "a \"quoted\" } brace"}"#;
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["focus"], "use {curly} braces");
        assert_eq!(value["note"], "a \"quoted\" } brace");
    }

    #[test]
    fn returns_outermost_object() {
        let text = r#"{"outer": {"inner": {"deep": true}}}"#;
        assert_eq!(extract_json_object(text).unwrap()["outer"]["inner"]["deep"], true);
    }

    #[test]
    fn skips_non_json_brace_groups() {
        let text = r#"Plan for {your goal} follows: {"ok": true}"#;
        assert_eq!(extract_json_object(text), Some(json!({"ok": true})));
    }

    #[test]
    fn none_when_absent_or_unbalanced() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object(r#"{"a": [1, 2"#), None);
        assert_eq!(extract_json_object("[1, 2, 3]"), None);
    }

    #[test]
    fn unclosed_brace_ends_the_scan() {
        let text = "{".repeat(200_000);
        assert_eq!(extract_json_object(&text), None);

        let text = format!("{}{{\"a\": 1}}", "{ ".repeat(50_000));
        assert_eq!(extract_json_object(&text), None);
    }

    #[test]
    fn handles_multibyte_text() {
        let text = "Plan → {\"city\": \"Vizag ☀\"} ✓";
        assert_eq!(extract_json_object(text), Some(json!({"city": "Vizag ☀"})));
    }
}
