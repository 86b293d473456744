//! Pulling payloads out of model text.

use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

/// Opening fence with an optional language tag, up to the closing fence or
/// the end of the text (the closing fence may not have streamed in yet).
const FENCE_PATTERN: &str = r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)(?:```|\z)";

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(FENCE_PATTERN).ok()).as_ref()
}

/// Strip prose and code fences around a fenced payload.
///
/// Returns the contents of the first ```` ``` ```` block (with or without a
/// language tag such as `json`). Text without fence markers comes back
/// unchanged.
///
/// ```rust
/// use flowkit_output::extract_json_from_markdown;
///
/// let text = "Here you go:\n```json\n{\"a\": 1}\n```\nAnything else?";
/// assert_eq!(extract_json_from_markdown(text), "{\"a\": 1}\n");
/// assert_eq!(extract_json_from_markdown("{\"a\": 1}"), "{\"a\": 1}");
/// ```
pub fn extract_json_from_markdown(text: &str) -> String {
    if !text.contains("```") {
        return text.to_string();
    }
    fence_regex()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map_or_else(|| text.to_string(), |m| m.as_str().to_string())
}

/// Extract the complete objects of a top-level JSON array.
///
/// Scanning starts at byte offset `cursor`; a cursor of `0` first skips to
/// just past the opening `[`. Returns the objects completed since `cursor`
/// and the offset to resume from next time. Incomplete trailing objects are
/// left for a later call.
pub fn extract_items(text: &str, cursor: usize) -> (Vec<JsonValue>, usize) {
    let mut items = Vec::new();
    let base = if cursor == 0 {
        match text.find('[') {
            Some(open) => open + 1,
            None => return (items, 0),
        }
    } else {
        cursor
    };
    let Some(rest) = text.get(base..) else {
        return (items, cursor);
    };

    let mut next = base;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;
    let mut object_start = None;

    for (offset, c) in rest.char_indices() {
        let i = base + offset;
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => {
                if depth == 0 && c == '{' {
                    object_start = Some(i);
                }
                depth += 1;
            }
            '}' | ']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(start) = object_start.take() {
                        if let Ok(value) = serde_json::from_str(&text[start..=i]) {
                            items.push(value);
                        }
                    }
                    next = i + 1;
                }
            }
            ']' => break,
            _ => {}
        }
    }

    (items, next)
}
