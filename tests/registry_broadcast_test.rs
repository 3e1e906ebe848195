use axum::extract::ws::Message;
use school_messaging_service::websocket::{ChannelId, ConnectionRegistry};
use tokio::sync::mpsc::unbounded_channel;
use uuid::Uuid;

#[tokio::test]
async fn broadcast_reaches_all_channel_subscribers() {
    let registry = ConnectionRegistry::new();
    let conversation = ChannelId::Conversation(Uuid::new_v4());

    let (tx_a, mut rx_a) = unbounded_channel();
    let (tx_b, mut rx_b) = unbounded_channel();
    registry.subscribe(conversation, Uuid::new_v4(), tx_a).await;
    registry.subscribe(conversation, Uuid::new_v4(), tx_b).await;

    registry
        .broadcast(conversation, Message::Text("hello".into()))
        .await;

    assert_eq!(rx_a.recv().await, Some(Message::Text("hello".into())));
    assert_eq!(rx_b.recv().await, Some(Message::Text("hello".into())));
}

#[tokio::test]
async fn broadcast_does_not_cross_channels() {
    let registry = ConnectionRegistry::new();
    let user_a = ChannelId::User(Uuid::new_v4());
    let user_b = ChannelId::User(Uuid::new_v4());

    let (tx, mut rx) = unbounded_channel();
    registry.subscribe(user_a, Uuid::new_v4(), tx).await;

    registry.broadcast(user_b, Message::Text("not yours".into())).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let registry = ConnectionRegistry::new();
    let channel = ChannelId::Conversation(Uuid::new_v4());
    let session = Uuid::new_v4();

    let (tx, mut rx) = unbounded_channel();
    registry.subscribe(channel, session, tx).await;
    registry.unsubscribe(channel, session).await;

    registry.broadcast(channel, Message::Text("gone".into())).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(registry.subscriber_count(channel).await, 0);
}

#[tokio::test]
async fn dead_subscribers_are_pruned_on_broadcast() {
    let registry = ConnectionRegistry::new();
    let channel = ChannelId::User(Uuid::new_v4());

    let (tx, rx) = unbounded_channel();
    registry.subscribe(channel, Uuid::new_v4(), tx).await;
    drop(rx);

    registry.broadcast(channel, Message::Text("anyone?".into())).await;
    assert_eq!(registry.subscriber_count(channel).await, 0);
}

#[tokio::test]
async fn duplicate_subscribe_is_idempotent() {
    let registry = ConnectionRegistry::new();
    let channel = ChannelId::Conversation(Uuid::new_v4());
    let session = Uuid::new_v4();

    let (tx, mut rx) = unbounded_channel();
    registry.subscribe(channel, session, tx.clone()).await;
    registry.subscribe(channel, session, tx).await;

    registry.broadcast(channel, Message::Text("once".into())).await;
    assert_eq!(rx.recv().await, Some(Message::Text("once".into())));
    assert!(rx.try_recv().is_err());
}

#[test]
fn channel_names_round_trip() {
    let user = ChannelId::User(Uuid::new_v4());
    let conversation = ChannelId::Conversation(Uuid::new_v4());

    assert_eq!(ChannelId::parse(&user.to_string()), Some(user));
    assert_eq!(ChannelId::parse(&conversation.to_string()), Some(conversation));
    assert_eq!(ChannelId::parse("presence:abc"), None);
    assert_eq!(ChannelId::parse("user:not-a-uuid"), None);
}
