pub mod conversation;
pub mod message;
pub mod user;

pub use conversation::{ConversationView, LastMessage};
pub use message::{MessageView, Reaction, ReplyPreview};
pub use user::UserSummary;
