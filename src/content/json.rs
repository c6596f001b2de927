//! Pull a JSON value out of free-form model output.

use tracing::error;

/// Extract a JSON object, tolerating markdown fences and surrounding prose.
pub fn extract_json_object(text: &str) -> String {
    extract_json(text, '{', '}')
}

/// Extract a JSON array, tolerating markdown fences and surrounding prose.
pub fn extract_json_array(text: &str) -> String {
    extract_json(text, '[', ']')
}

fn extract_json(text: &str, open: char, close: char) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with(open) {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with(open) {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
        if end > start {
            return trimmed[start..=end].to_string();
        }
    }

    error!(text = trimmed, "Could not extract JSON from LLM response");
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_direct() {
        let input = r#"{"title": "t"}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn object_from_markdown() {
        let input = "好的：\n```json\n{\"title\": \"零知识证明\"}\n```\n";
        assert_eq!(extract_json_object(input), "{\"title\": \"零知识证明\"}");
    }

    #[test]
    fn object_from_bare_fence() {
        let input = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json_object(input), "{\"a\": 1}");
    }

    #[test]
    fn array_with_surrounding_text() {
        let input = "Questions: [\"a?\", \"b?\"] done";
        assert_eq!(extract_json_array(input), "[\"a?\", \"b?\"]");
    }

    #[test]
    fn gives_up_as_is() {
        assert_eq!(extract_json_object("  nothing here "), "nothing here");
    }
}
