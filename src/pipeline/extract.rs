//! Recover the JSON payload from a free-text service reply.
//!
//! The service may answer with pure JSON, with JSON inside a fenced block, or
//! with JSON surrounded by prose. The fallback order is fixed:
//! 1. interior of the first ```json fenced block
//! 2. first balanced `{...}` span (braces inside JSON strings ignored)
//! 3. `MalformedResponse`

use super::types::RawServiceReply;
use super::AnalysisError;

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Extract the JSON text from a raw reply.
pub fn extract(reply: &RawServiceReply) -> Result<&str, AnalysisError> {
    extract_json(reply.as_str())
}

/// Extract the JSON text from any string.
pub fn extract_json(response: &str) -> Result<&str, AnalysisError> {
    if let Some(block) = fenced_json_block(response) {
        return Ok(block);
    }

    if let Some(span) = first_balanced_object(response) {
        return Ok(span);
    }

    Err(AnalysisError::MalformedResponse(
        "No JSON object found in service reply".into(),
    ))
}

/// Interior of the first fence tagged `json` (any case). Unclosed or empty
/// fences yield `None` so the caller falls back to the brace scan.
fn fenced_json_block(response: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets aligned with `response`.
    let lower = response.to_ascii_lowercase();
    let tag_start = lower.find(JSON_FENCE)?;
    let content_start = tag_start + JSON_FENCE.len();
    let content_end = content_start + response[content_start..].find(FENCE)?;

    let block = response[content_start..content_end].trim();
    if block.is_empty() {
        None
    } else {
        Some(block)
    }
}

/// First `{` that opens a balanced span, honoring JSON string escapes.
/// A `{` left unclosed (stray brace in prose) moves the scan to the next one.
fn first_balanced_object(response: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(offset) = response[from..].find('{') {
        let start = from + offset;
        if let Some(end) = balanced_end(&response[start..]) {
            return Some(&response[start..start + end]);
        }
        from = start + 1;
    }
    None
}

/// Byte length of the balanced object at the head of `text`, if it closes.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}
