use chrono::Utc;
use school_messaging_service::models::{ConversationView, LastMessage, MessageView, UserSummary};
use school_messaging_service::websocket::events::ChatEvent;
use std::collections::HashMap;
use uuid::Uuid;

fn user(name: &str) -> UserSummary {
    UserSummary {
        id: Uuid::new_v4(),
        name: name.into(),
        email: Some(format!("{name}@school.test")),
        avatar: None,
        role: "student".into(),
    }
}

fn message(sender: UserSummary, conversation_id: Uuid, content: &str) -> MessageView {
    MessageView {
        id: Uuid::new_v4(),
        conversation_id,
        sender,
        receiver_id: None,
        content: Some(content.into()),
        file_url: None,
        reply_to: None,
        reactions: vec![],
        deleted_by: vec![],
        created_at: Utc::now(),
        edited_at: None,
    }
}

#[test]
fn new_message_payload_carries_full_message() {
    let sender = user("alice");
    let conversation_id = Uuid::new_v4();
    let msg = message(sender.clone(), conversation_id, "hello");
    let message_id = msg.id;

    let payload = ChatEvent::NewMessage { message: msg }.to_payload().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();

    assert_eq!(parsed["type"], "newMessage");
    assert!(parsed["timestamp"].is_string());
    assert_eq!(parsed["message"]["id"], message_id.to_string());
    assert_eq!(parsed["message"]["content"], "hello");
    assert_eq!(parsed["message"]["sender"]["name"], "alice");
    assert_eq!(
        parsed["message"]["conversation_id"],
        conversation_id.to_string()
    );
}

#[test]
fn conversation_created_payload_carries_unread_counts() {
    let a = user("alice");
    let b = user("bob");
    let conversation_id = Uuid::new_v4();
    let last_id = Uuid::new_v4();
    let mut unread_counts = HashMap::new();
    unread_counts.insert(a.id, 0);
    unread_counts.insert(b.id, 3);
    let b_id = b.id;

    let conversation = ConversationView {
        id: conversation_id,
        is_group: false,
        group_name: String::new(),
        group_admin: None,
        created_by: Some(a.id),
        participants: vec![a, b],
        last_message: Some(LastMessage {
            id: last_id,
            content: "hello".into(),
            timestamp: Utc::now(),
        }),
        unread_counts,
        pinned_message_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let payload = ChatEvent::ConversationCreated { conversation }
        .to_payload()
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();

    assert_eq!(parsed["type"], "conversationCreated");
    assert_eq!(parsed["conversation"]["id"], conversation_id.to_string());
    assert_eq!(parsed["conversation"]["last_message"]["content"], "hello");
    assert_eq!(
        parsed["conversation"]["unread_counts"][b_id.to_string()],
        3
    );
    assert_eq!(
        parsed["conversation"]["participants"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn first_message_and_edit_kinds() {
    let sender = user("carol");
    let conversation_id = Uuid::new_v4();
    let edited = ChatEvent::MessageEdited {
        message: message(sender, conversation_id, "fixed typo"),
    };
    assert_eq!(edited.event_type(), "messageEdited");

    let conversation = ConversationView {
        id: conversation_id,
        is_group: false,
        group_name: String::new(),
        group_admin: None,
        created_by: None,
        participants: vec![],
        last_message: None,
        unread_counts: HashMap::new(),
        pinned_message_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let first = ChatEvent::FirstMessage { conversation };
    assert_eq!(first.event_type(), "firstMessage");
    let parsed: serde_json::Value =
        serde_json::from_str(&first.to_payload().unwrap()).unwrap();
    assert_eq!(parsed["type"], "firstMessage");
    assert_eq!(parsed["conversation"]["id"], conversation_id.to_string());
}
