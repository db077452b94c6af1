use serde_json::Value;

/// Locates the first `{` and its matching last `}` in `content` and parses
/// that span as strict JSON (spec §4.5 artifact extraction). Bracket
/// matching ignores braces inside string literals so a JSON value with
/// `{` characters in prose fields doesn't short-circuit the scan.
pub fn extract_json_object(content: &str) -> Option<Value> {
    let bytes = content.as_bytes();
    let start = content.find('{')?;

    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = None;

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
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }

    let end = end?;
    let candidate = &content[start..=end];
    serde_json::from_str(candidate).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trailing_json_after_prose() {
        let content = r#"Here is my analysis: {"confidence": 0.8, "note": "looks {good}"}"#;
        let value = extract_json_object(content).unwrap();
        assert_eq!(value["confidence"], 0.8);
        assert_eq!(value["note"], "looks {good}");
    }

    #[test]
    fn returns_none_for_malformed_json() {
        let content = "{not valid json";
        assert!(extract_json_object(content).is_none());
    }

    #[test]
    fn returns_none_when_no_object_present() {
        assert!(extract_json_object("just prose, no braces").is_none());
    }

    #[test]
    fn matches_outermost_braces_across_nested_objects() {
        let content = r#"{"a": {"b": 1}, "c": 2}"#;
        let value = extract_json_object(content).unwrap();
        assert_eq!(value["c"], 2);
    }
}
