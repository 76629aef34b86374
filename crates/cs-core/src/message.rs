//! Same-origin messages between the content side and the page engine
//!
//! Every message is an [`Envelope`] tagged with its sender. Receivers ignore
//! anything that does not carry the expected origin tag or a known type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{FROM_CONTENT, FROM_PAGE};
use crate::pattern::FilterFeed;
use crate::types::BlockNotification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    /// Content to page: a rule feed, or null to clear the rules.
    StorageData,
    /// Page to content: the engine is listening.
    Ready,
    /// Page to content: the player handler blocked a video.
    PlayerBlocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn storage_data(feed: Option<&FilterFeed>) -> Self {
        Self {
            from: FROM_CONTENT.to_string(),
            kind: MessageType::StorageData,
            data: Some(feed.and_then(|f| serde_json::to_value(f).ok()).unwrap_or(Value::Null)),
        }
    }

    pub fn ready() -> Self {
        Self {
            from: FROM_PAGE.to_string(),
            kind: MessageType::Ready,
            data: None,
        }
    }

    pub fn player_blocked(notification: &BlockNotification) -> Self {
        Self {
            from: FROM_PAGE.to_string(),
            kind: MessageType::PlayerBlocked,
            data: serde_json::to_value(notification).ok(),
        }
    }

    /// Parse a posted message. Foreign or malformed messages give `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    pub fn is_from_content(&self) -> bool {
        self.from == FROM_CONTENT
    }

    pub fn is_from_page(&self) -> bool {
        self.from == FROM_PAGE
    }

    /// Payload of a `playerBlocked` message. Missing fields default to empty.
    pub fn notification(&self) -> Option<BlockNotification> {
        if self.kind != MessageType::PlayerBlocked {
            return None;
        }
        match &self.data {
            Some(data) => serde_json::from_value(data.clone()).ok(),
            None => Some(BlockNotification::default()),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape() {
        assert_eq!(
            Envelope::ready().to_value(),
            json!({"from": "CHANNELSHIELD_PAGE", "type": "ready"})
        );
        assert_eq!(
            Envelope::storage_data(None).to_value(),
            json!({"from": "CHANNELSHIELD_CONTENT", "type": "storageData", "data": null})
        );
    }

    #[test]
    fn parses_player_blocked() {
        let envelope = Envelope::from_value(&json!({
            "from": "CHANNELSHIELD_PAGE",
            "type": "playerBlocked",
            "data": {"channelId": "UC1", "channelName": "Chan"}
        }))
        .unwrap();

        assert!(envelope.is_from_page());
        let notification = envelope.notification().unwrap();
        assert_eq!(notification.channel_id, "UC1");
        assert_eq!(notification.message, "");
    }

    #[test]
    fn unknown_messages_are_rejected() {
        assert!(Envelope::from_value(&json!({"from": "X", "type": "other"})).is_none());
        assert!(Envelope::from_value(&json!("text")).is_none());
        assert!(Envelope::ready().notification().is_none());
    }
}
