//! Fan-out event definitions.
//!
//! Every event is serialized once, here, into a flat JSON object:
//!
//! ```json
//! {
//!     "type": "newMessage",
//!     "timestamp": "2026-01-12T10:30:00Z",
//!     ...event fields...
//! }
//! ```
//!
//! The event kinds match what the web client already listens for.

use crate::models::{ConversationView, MessageView};
use crate::websocket::{pubsub, ChannelId, ConnectionRegistry};
use axum::extract::ws::Message;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChatEvent {
    NewMessage {
        message: MessageView,
    },
    /// Conversation snapshot pushed alongside every send and on explicit
    /// creation, so conversation lists stay current without a refetch.
    ConversationCreated {
        conversation: ConversationView,
    },
    /// First message in a direct conversation that did not exist before the
    /// send; carries the freshly created conversation.
    FirstMessage {
        conversation: ConversationView,
    },
    MessageEdited {
        message: MessageView,
    },
    MessageReacted {
        message: MessageView,
    },
    MessageDeleted {
        id: Uuid,
        #[serde(rename = "forEveryone")]
        for_everyone: bool,
        #[serde(rename = "userId")]
        user_id: Uuid,
    },
}

impl ChatEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::NewMessage { .. } => "newMessage",
            Self::ConversationCreated { .. } => "conversationCreated",
            Self::FirstMessage { .. } => "firstMessage",
            Self::MessageEdited { .. } => "messageEdited",
            Self::MessageReacted { .. } => "messageReacted",
            Self::MessageDeleted { .. } => "messageDeleted",
        }
    }

    /// Flat broadcast payload: type + timestamp + the event's own fields.
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        let mut payload = serde_json::json!({
            "type": self.event_type(),
            "timestamp": Utc::now().to_rfc3339(),
        });
        let event_data = serde_json::to_value(self)?;
        if let serde_json::Value::Object(map) = event_data {
            for (key, value) in map {
                payload[key] = value;
            }
        }
        serde_json::to_string(&payload)
    }
}

/// Deliver an event to a set of channels, locally and across instances.
///
/// Best-effort by contract: a failed publish is logged and never fails the
/// originating write.
pub async fn broadcast_event(
    registry: &ConnectionRegistry,
    redis: &redis::Client,
    channels: &[ChannelId],
    event: &ChatEvent,
) {
    let payload = match event.to_payload() {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, kind = event.event_type(), "failed to serialize event");
            return;
        }
    };

    for channel in channels {
        registry
            .broadcast(*channel, Message::Text(payload.clone()))
            .await;
        if let Err(e) = pubsub::publish(redis, *channel, &payload).await {
            tracing::warn!(error = %e, %channel, "redis publish failed; local delivery only");
        }
    }
}

/// Channel set for a conversation-scoped event: every participant's user
/// channel plus the conversation's own channel.
pub fn participant_channels(participants: &[Uuid], conversation_id: Uuid) -> Vec<ChannelId> {
    let mut channels: Vec<ChannelId> = participants.iter().copied().map(ChannelId::User).collect();
    channels.push(ChannelId::Conversation(conversation_id));
    channels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_naming() {
        let event = ChatEvent::MessageDeleted {
            id: Uuid::new_v4(),
            for_everyone: true,
            user_id: Uuid::new_v4(),
        };
        assert_eq!(event.event_type(), "messageDeleted");
    }

    #[test]
    fn deleted_event_payload_is_flat() {
        let id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let event = ChatEvent::MessageDeleted {
            id,
            for_everyone: false,
            user_id,
        };

        let payload = event.to_payload().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(parsed["type"], "messageDeleted");
        assert_eq!(parsed["id"], id.to_string());
        assert_eq!(parsed["forEveryone"], false);
        assert_eq!(parsed["userId"], user_id.to_string());
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn participant_channels_include_conversation() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conv = Uuid::new_v4();

        let channels = participant_channels(&[a, b], conv);
        assert_eq!(channels.len(), 3);
        assert!(channels.contains(&ChannelId::User(a)));
        assert!(channels.contains(&ChannelId::User(b)));
        assert!(channels.contains(&ChannelId::Conversation(conv)));
    }
}
