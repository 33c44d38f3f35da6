use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;

lazy_static! {
    // ```json { ... } ``` fenced blocks, case-insensitive, dot matches newline
    static ref JSON_FENCE: Regex =
        Regex::new(r"(?si)```(?:json)?\s*(\{.*?\})\s*```").expect("fence pattern");
    // bare one-level-nested JSON objects embedded in prose
    static ref JSON_OBJECT: Regex =
        Regex::new(r"\{[^{}]*(?:\{[^{}]*\}[^{}]*)*\}").expect("object pattern");
}

/// Best-effort JSON extraction from model output that may wrap the payload
/// in markdown fences or surrounding prose. Returns the first candidate
/// that parses, trying fenced blocks, then embedded objects, then the whole
/// text.
pub fn extract_json_from_text(text: &str) -> Option<JsonValue> {
    for capture in JSON_FENCE.captures_iter(text) {
        if let Ok(value) = serde_json::from_str(capture[1].trim()) {
            return Some(value);
        }
    }

    for found in JSON_OBJECT.find_iter(text) {
        if let Ok(value) = serde_json::from_str(found.as_str()) {
            return Some(value);
        }
    }

    serde_json::from_str(text.trim()).ok()
}
