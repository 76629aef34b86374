use serde_json::Value;

use cs_core::types::PublisherRecord;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Invalid blocklist JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Blocklist root must be an object, found {0}")]
    NotAnObject(&'static str),
}

/// Read the `blockedChannels` array of a blocklist document.
///
/// Non-string fields are treated as empty, every field is trimmed, and
/// entries naming neither an id nor a name are dropped. A missing or
/// malformed `blockedChannels` gives an empty list.
pub fn parse_blocklist(document: &Value) -> Vec<PublisherRecord> {
    let Some(entries) = document.get("blockedChannels").and_then(Value::as_array) else {
        log::debug!("blocklist has no blockedChannels array");
        return Vec::new();
    };

    let records: Vec<PublisherRecord> = entries
        .iter()
        .map(PublisherRecord::from_value)
        .filter(PublisherRecord::is_usable)
        .collect();

    if records.len() < entries.len() {
        log::debug!("dropped {} unusable blocklist entries", entries.len() - records.len());
    }
    records
}

pub fn parse_blocklist_str(text: &str) -> Result<Vec<PublisherRecord>, CompileError> {
    let document: Value = serde_json::from_str(text)?;
    if !document.is_object() {
        return Err(CompileError::NotAnObject(type_name(&document)));
    }
    Ok(parse_blocklist(&document))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_blocklist() {
        let records = parse_blocklist(&json!({
            "blockedChannels": [
                {"id": " UC1 ", "name": "One", "owner": "Owner"},
                {"name": "Name only"},
                {"id": 12, "name": ["x"], "owner": "Orphan"},
                "not an object",
                {"id": "   ", "name": ""}
            ]
        }));

        assert_eq!(
            records,
            vec![
                PublisherRecord::new("UC1", "One", "Owner"),
                PublisherRecord::new("", "Name only", ""),
            ]
        );
    }

    #[test]
    fn test_missing_list() {
        assert!(parse_blocklist(&json!({"other": []})).is_empty());
        assert!(parse_blocklist(&json!({"blockedChannels": {"id": "UC1"}})).is_empty());
    }

    #[test]
    fn test_parse_blocklist_str() {
        let records = parse_blocklist_str(r#"{"blockedChannels": [{"id": "UC1"}]}"#).unwrap();
        assert_eq!(records.len(), 1);

        assert!(matches!(parse_blocklist_str("[1, 2]"), Err(CompileError::NotAnObject("array"))));
        assert!(matches!(parse_blocklist_str("{oops"), Err(CompileError::Json(_))));
    }
}
