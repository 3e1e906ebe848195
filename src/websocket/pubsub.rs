use crate::websocket::{ChannelId, ConnectionRegistry};
use axum::extract::ws::Message;
use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::Client;

pub async fn publish(client: &Client, channel: ChannelId, payload: &str) -> redis::RedisResult<()> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    conn.publish::<_, _, ()>(channel.to_string(), payload).await
}

/// Cross-instance fan-out: relay anything published on a user or
/// conversation channel to the locally connected sessions.
pub async fn start_pubsub_listener(
    client: Client,
    registry: ConnectionRegistry,
) -> redis::RedisResult<()> {
    // PubSub requires a dedicated connection, not multiplexed
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.psubscribe("user:*").await?;
    pubsub.psubscribe("conversation:*").await?;
    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel_name: String = msg.get_channel_name().into();
        let payload: String = msg.get_payload()?;
        match ChannelId::parse(&channel_name) {
            Some(channel) => {
                registry.broadcast(channel, Message::Text(payload)).await;
            }
            None => {
                tracing::warn!(channel = %channel_name, "unrecognized pubsub channel");
            }
        }
    }
    Ok(())
}
