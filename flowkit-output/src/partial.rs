//! Recovery of truncated JSON.
//!
//! Streaming models emit JSON a few tokens at a time. [`parse_partial_json`]
//! turns whatever prefix has arrived into the largest value that can be
//! closed off cleanly.

use serde_json::Value as JsonValue;

use crate::error::{fragment, OutputError, Result};

/// A place the text can be cut and closed without breaking syntax.
struct CutPoint {
    end: usize,
    closers: Vec<char>,
}

/// Parse possibly incomplete JSON.
///
/// Complete input parses as-is. Otherwise open strings are closed, open
/// containers are closed innermost first, and if that still fails the text
/// is cut back to earlier member boundaries until something parses.
///
/// # Errors
///
/// [`OutputError::PartialParse`] when no object or array prefix is
/// recoverable.
///
/// # Example
///
/// ```rust
/// use flowkit_output::parse_partial_json;
/// use serde_json::json;
///
/// let value = parse_partial_json(r#"{"name": "Ada", "tags": ["math", "eng"#).unwrap();
/// assert_eq!(value, json!({"name": "Ada", "tags": ["math", "eng"]}));
/// ```
pub fn parse_partial_json(text: &str) -> Result<JsonValue> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let start = trimmed
        .find(['{', '['])
        .ok_or_else(|| OutputError::PartialParse(fragment(text)))?;
    let body = &trimmed[start..];

    let mut stack: Vec<char> = Vec::new();
    let mut cuts: Vec<CutPoint> = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for (i, c) in body.char_indices() {
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
                stack.push(if c == '{' { '}' } else { ']' });
                cuts.push(CutPoint {
                    end: i + 1,
                    closers: stack.clone(),
                });
            }
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                    if stack.is_empty() {
                        // A complete top-level value followed by junk.
                        return serde_json::from_str(&body[..=i])
                            .map_err(|_| OutputError::PartialParse(fragment(text)));
                    }
                    cuts.push(CutPoint {
                        end: i + 1,
                        closers: stack.clone(),
                    });
                }
            }
            ',' => cuts.push(CutPoint {
                end: i,
                closers: stack.clone(),
            }),
            _ => {}
        }
    }

    let mut head = body.to_string();
    if in_string {
        if escape {
            head.pop();
        }
        head.push('"');
    }
    if let Some(value) = close_and_parse(&head, &stack) {
        return Ok(value);
    }

    for cut in cuts.iter().rev() {
        if let Some(value) = close_and_parse(&body[..cut.end], &cut.closers) {
            return Ok(value);
        }
    }

    Err(OutputError::PartialParse(fragment(text)))
}

fn close_and_parse(head: &str, closers: &[char]) -> Option<JsonValue> {
    let mut candidate = head.trim_end().to_string();
    while candidate.ends_with(',') {
        candidate.pop();
        candidate.truncate(candidate.trim_end().len());
    }
    candidate.extend(closers.iter().rev());
    serde_json::from_str(&candidate).ok()
}
