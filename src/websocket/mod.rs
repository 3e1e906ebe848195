use axum::extract::ws::Message;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc::UnboundedSender, RwLock};
use uuid::Uuid;

pub mod events;
pub mod handlers;
pub mod pubsub;

/// The two channel kinds of the fan-out layer: every session sits on its
/// own user channel for the lifetime of the connection, and transiently on
/// a conversation channel while that conversation is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    User(Uuid),
    Conversation(Uuid),
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::User(id) => write!(f, "user:{id}"),
            ChannelId::Conversation(id) => write!(f, "conversation:{id}"),
        }
    }
}

impl ChannelId {
    /// Parse a Redis channel name back into a channel id.
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(rest) = name.strip_prefix("user:") {
            return Uuid::parse_str(rest).ok().map(ChannelId::User);
        }
        if let Some(rest) = name.strip_prefix("conversation:") {
            return Uuid::parse_str(rest).ok().map(ChannelId::Conversation);
        }
        None
    }
}

/// In-process session registry. Each connected session registers one mpsc
/// sender under every channel it is subscribed to; broadcast prunes senders
/// whose receiving session has gone away.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<ChannelId, Vec<(Uuid, UnboundedSender<Message>)>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(
        &self,
        channel: ChannelId,
        session_id: Uuid,
        tx: UnboundedSender<Message>,
    ) {
        let mut guard = self.inner.write().await;
        let list = guard.entry(channel).or_default();
        if !list.iter().any(|(sid, _)| *sid == session_id) {
            list.push((session_id, tx));
        }
    }

    pub async fn unsubscribe(&self, channel: ChannelId, session_id: Uuid) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(&channel) {
            list.retain(|(sid, _)| *sid != session_id);
            if list.is_empty() {
                guard.remove(&channel);
            }
        }
    }

    pub async fn broadcast(&self, channel: ChannelId, msg: Message) {
        let mut guard = self.inner.write().await;
        if let Some(list) = guard.get_mut(&channel) {
            list.retain(|(_, sender)| sender.send(msg.clone()).is_ok());
            if list.is_empty() {
                guard.remove(&channel);
            }
        }
    }

    pub async fn subscriber_count(&self, channel: ChannelId) -> usize {
        let guard = self.inner.read().await;
        guard.get(&channel).map(|l| l.len()).unwrap_or(0)
    }
}
