//! Dotted-path resolution over JSON trees
//!
//! A path is a `.`-separated list of segments. A segment is either a field
//! name, optionally followed by `[n]` index suffixes (`items[0][2]`), or a
//! bare index run (`[1]`). When a field segment meets a sequence, the first
//! element that is an object holding that field is used.

use serde_json::Value;

// =============================================================================
// Segment Parsing
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment<'a> {
    field: Option<&'a str>,
    indices: Vec<usize>,
}

fn parse_segment(raw: &str) -> Option<Segment<'_>> {
    let Some(open) = raw.find('[') else {
        return Some(Segment {
            field: Some(raw),
            indices: Vec::new(),
        });
    };

    let field = if open == 0 { None } else { Some(&raw[..open]) };
    let mut indices = Vec::new();
    let mut rest = &raw[open..];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indices.push(inner[..close].parse().ok()?);
        rest = &inner[close + 1..];
    }

    Some(Segment { field, indices })
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolve a single path. `None` means some segment did not resolve, which is
/// distinct from `Some(Value::Null)`.
pub fn resolve<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let mut node = root;
    for raw in path.split('.') {
        let segment = parse_segment(raw)?;
        if let Some(field) = segment.field {
            node = step_field(node, field)?;
        }
        for idx in segment.indices {
            node = node.as_array()?.get(idx)?;
        }
    }
    Some(node)
}

fn step_field<'v>(node: &'v Value, field: &str) -> Option<&'v Value> {
    match node {
        Value::Array(items) => items
            .iter()
            .find_map(|item| item.as_object().and_then(|obj| obj.get(field))),
        Value::Object(map) => map.get(field),
        _ => None,
    }
}

/// Resolve the first of several alternative paths that fully resolves.
pub fn resolve_first<'v>(root: &'v Value, paths: &[&str]) -> Option<&'v Value> {
    paths.iter().find_map(|path| resolve(root, path))
}

/// Resolve the first matching path and flatten it to text.
pub fn resolve_text(root: &Value, paths: &[&str]) -> Option<String> {
    resolve_first(root, paths).map(flatten_text)
}

// =============================================================================
// Rich Text
// =============================================================================

/// Flatten one of the host's text-node shapes into a plain string.
///
/// `{simpleText}` yields the text, `{runs: [{text}, ...]}` joins the run
/// fragments with single spaces, anything else is stringified.
pub fn flatten_text(value: &Value) -> String {
    if !is_truthy(value) {
        return String::new();
    }

    if let Some(obj) = value.as_object() {
        if let Some(simple) = obj.get("simpleText") {
            return scalar_text(simple);
        }
        if let Some(Value::Array(runs)) = obj.get("runs") {
            return runs
                .iter()
                .filter_map(|run| run.as_object().and_then(|r| r.get("text")))
                .map(scalar_text)
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    scalar_text(value)
}

/// Plain string form of a value. Null is empty, strings are taken verbatim,
/// sequences join their elements with commas and objects render as JSON.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Host-side truthiness: null, false, zero and the empty string are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
