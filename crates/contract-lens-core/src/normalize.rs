//! Recovery of a JSON object from free-text model output.
//!
//! Models wrap payloads in code fences, prepend chatter, or leave raw newlines
//! inside strings. [`normalize`] isolates the outermost object and parses it,
//! first strictly, then after escaping control characters inside strings, then
//! as JSON5. It either returns a complete object or a [`ParseFailure`]; text
//! without any object at all normalizes to `{}`. Unbalanced input, such as a
//! reply cut off by a token limit, is never closed up and always fails.

use std::env;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

const FENCE: &str = "```";
const EMPTY_OBJECT: &str = "{}";

#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("model response is not valid JSON even after repair")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },
    #[error("model response is JSON but not an object")]
    NotAnObject,
    #[error("model response does not match the expected {expected} structure")]
    Schema {
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse the object embedded in `raw`.
pub fn normalize(raw: &str) -> Result<Map<String, Value>, ParseFailure> {
    let isolated = isolate_object(raw);
    debug!(
        raw_len = raw.len(),
        cleaned_len = isolated.len(),
        "normalized model response"
    );
    let parsed = parse_lenient(isolated).and_then(into_object);
    if parsed.is_err() {
        debug_log_payload(raw);
    }
    parsed
}

fn into_object(value: Value) -> Result<Map<String, Value>, ParseFailure> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ParseFailure::NotAnObject),
    }
}

/// Normalize `raw` and deserialize the object into `T`.
pub fn parse_payload<T: DeserializeOwned>(raw: &str) -> Result<T, ParseFailure> {
    let object = normalize(raw)?;
    serde_json::from_value(Value::Object(object)).map_err(|source| ParseFailure::Schema {
        expected: short_type_name::<T>(),
        source,
    })
}

/// Slice of `raw` holding the candidate object, or `"{}"` when the text has no
/// opening brace at all. An opener without a closer is returned as is so the
/// parse fails.
pub fn isolate_object(raw: &str) -> &str {
    let mut cleaned = strip_code_fence(raw).trim();

    if let Some(first) = cleaned.find('{') {
        if first > 0 {
            cleaned = &cleaned[first..];
        }
    }
    if let Some(last) = cleaned.rfind('}') {
        if last + 1 < cleaned.len() {
            cleaned = &cleaned[..=last];
        }
    }
    if cleaned.starts_with('{') && cleaned.ends_with('}') {
        return cleaned;
    }
    match greedy_object_span(cleaned) {
        Some(span) => span,
        None if cleaned.contains('{') => cleaned,
        None => EMPTY_OBJECT,
    }
}

/// First `{` through last `}` when they appear in that order.
fn greedy_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn strip_code_fence(input: &str) -> &str {
    let mut trimmed = input.trim();
    if let Some(rest) = trimmed.strip_prefix(FENCE) {
        // Drop an optional language tag such as `json` or `JSON5`.
        let tag_len = rest
            .find(|c: char| c.is_whitespace() || c == '{')
            .unwrap_or(rest.len());
        trimmed = &rest[tag_len..];
    }
    if let Some(rest) = trimmed.trim_end().strip_suffix(FENCE) {
        trimmed = rest;
    }
    trimmed
}

fn parse_lenient(payload: &str) -> Result<Value, ParseFailure> {
    let strict_err = match serde_json::from_str::<Value>(payload) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let sanitized = sanitize_json_strings(payload);
    if sanitized != payload {
        if let Ok(value) = serde_json::from_str::<Value>(&sanitized) {
            debug!("model response parsed after string repair");
            return Ok(value);
        }
    }

    match json5::from_str::<Value>(&sanitized) {
        Ok(value) => {
            debug!("model response parsed with relaxed JSON5 syntax");
            Ok(value)
        }
        Err(_) => {
            warn!(error = %strict_err, "model response could not be parsed even with relaxed JSON");
            Err(ParseFailure::Malformed { source: strict_err })
        }
    }
}

/// Escape raw newlines, carriage returns and tabs inside string literals.
/// Nothing is added or removed otherwise, so truncated input stays invalid.
pub(crate) fn sanitize_json_strings(payload: &str) -> String {
    let mut result = String::with_capacity(payload.len());
    let mut in_string = false;
    let mut escape = false;

    for ch in payload.chars() {
        if !in_string {
            result.push(ch);
            if ch == '"' {
                in_string = true;
            }
            continue;
        }
        if escape {
            result.push(ch);
            escape = false;
            continue;
        }
        match ch {
            '\\' => {
                result.push(ch);
                escape = true;
            }
            '"' => {
                result.push(ch);
                in_string = false;
            }
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ => result.push(ch),
        }
    }
    result
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

fn debug_log_payload(payload: &str) {
    if debug_enabled() {
        warn!("unparsable model payload: {}", payload);
    }
}

pub(crate) fn debug_enabled() -> bool {
    matches!(env::var("CONTRACT_LENS_DEBUG"), Ok(val) if !val.is_empty() && val != "0")
}
