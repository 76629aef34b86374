//! Core type definitions for ChannelShield
//!
//! These types cross the boundary between the page engine, the content
//! side and the blocklist store, so all of them are serde-friendly.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =============================================================================
// Publisher Records
// =============================================================================

/// A blocklist entry naming a publisher by identifier and/or display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublisherRecord {
    #[serde(default, deserialize_with = "trimmed_string")]
    pub id: String,
    #[serde(default, deserialize_with = "trimmed_string")]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed_string")]
    pub owner: String,
}

impl PublisherRecord {
    pub fn new(id: &str, name: &str, owner: &str) -> Self {
        Self {
            id: id.trim().to_string(),
            name: name.trim().to_string(),
            owner: owner.trim().to_string(),
        }
    }

    /// Build a record from an arbitrary JSON value.
    ///
    /// Non-object values yield an empty record; non-string fields are
    /// treated as empty.
    pub fn from_value(value: &Value) -> Self {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        Self {
            id: field("id"),
            name: field("name"),
            owner: field("owner"),
        }
    }

    /// A record participates in blocking only if it names an id or a name.
    pub fn is_usable(&self) -> bool {
        !self.id.trim().is_empty() || !self.name.trim().is_empty()
    }
}

fn trimmed_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().map(|s| s.trim().to_string()).unwrap_or_default())
}

// =============================================================================
// Page Identity
// =============================================================================

/// Channel identity detected on the current page by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelIdentity {
    pub id: String,
    pub name: String,
}

impl ChannelIdentity {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

// =============================================================================
// Overlay & Notifications
// =============================================================================

/// What the "content is blocked" cover displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayPayload {
    pub name: String,
    #[serde(default)]
    pub owner: String,
}

impl From<&PublisherRecord> for OverlayPayload {
    fn from(record: &PublisherRecord) -> Self {
        Self {
            name: record.name.clone(),
            owner: record.owner.clone(),
        }
    }
}

/// Sent by the page engine whenever the player handler blocks a video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockNotification {
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_fields_are_trimmed() {
        let record: PublisherRecord =
            serde_json::from_value(json!({"id": "  UC1 ", "name": " Name\t", "owner": 7})).unwrap();
        assert_eq!(record, PublisherRecord::new("UC1", "Name", ""));
    }

    #[test]
    fn record_usability() {
        assert!(PublisherRecord::new("UC1", "", "").is_usable());
        assert!(PublisherRecord::new("", "Name", "").is_usable());
        assert!(!PublisherRecord::new("  ", " ", "Owner").is_usable());
        assert!(!PublisherRecord::from_value(&json!("not an object")).is_usable());
    }

    #[test]
    fn notification_wire_names() {
        let notification = BlockNotification {
            channel_id: "UC1".into(),
            channel_name: "Chan".into(),
            message: "Blocked".into(),
        };
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value, json!({"channelId": "UC1", "channelName": "Chan", "message": "Blocked"}));
    }
}
