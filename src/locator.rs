//! JSON body locators.
//!
//! A small, gjson-flavoured path syntax used by `src:req_body` and
//! `src:res_body` expressions and by body routing rules:
//!
//! - `status_code`, `data.user.name` - object keys
//! - `items.0.name` - numeric segments index arrays
//! - `items[0].name` - bracket indexing
//! - `items.#` - length of an array
//! - `$.data.name` - optional JSONPath-style root prefix
//! - `a\.b` - escaped dot inside a key
//!
//! An empty locator (or `$`) selects the whole document.

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Object key, or array index when the key is numeric
    Key(String),
    /// Explicit `[n]` index
    Index(usize),
    /// `#`: array length
    Count,
}

/// Parse a locator into segments.
fn parse(locator: &str) -> Vec<Segment> {
    let path = locator.trim();
    let path = path.strip_prefix("$.").unwrap_or(path);
    let path = path.strip_prefix('$').unwrap_or(path);

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();

    let flush = |current: &mut String, segments: &mut Vec<Segment>| {
        if current.is_empty() {
            return;
        }
        if current == "#" {
            segments.push(Segment::Count);
        } else {
            segments.push(Segment::Key(current.clone()));
        }
        current.clear();
    };

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '.' => flush(&mut current, &mut segments),
            '[' => {
                flush(&mut current, &mut segments);
                let idx_str: String = chars.by_ref().take_while(|&c| c != ']').collect();
                match idx_str.trim().parse::<usize>() {
                    Ok(idx) => segments.push(Segment::Index(idx)),
                    // Not an index: keep it as a literal key
                    Err(_) => segments.push(Segment::Key(idx_str)),
                }
            }
            c => current.push(c),
        }
    }
    flush(&mut current, &mut segments);

    segments
}

/// Select the value at `locator`, or `None` when any segment misses.
pub fn select(json: &JsonValue, locator: &str) -> Option<JsonValue> {
    let segments = parse(locator);
    let mut current = json;

    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Key(key) => {
                current = match current {
                    JsonValue::Object(map) => map.get(key)?,
                    JsonValue::Array(arr) => arr.get(key.parse::<usize>().ok()?)?,
                    _ => return None,
                };
            }
            Segment::Index(idx) => {
                current = current.as_array()?.get(*idx)?;
            }
            Segment::Count => {
                // Only meaningful as the final segment
                if i + 1 != segments.len() {
                    return None;
                }
                return current.as_array().map(|arr| JsonValue::from(arr.len()));
            }
        }
    }

    Some(current.clone())
}

/// Text form of a selected value, used when comparing against literal match
/// values: strings compare unquoted, everything else as compact JSON.
pub fn as_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
