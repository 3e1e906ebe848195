pub mod conversation_service;
pub mod directory_service;
pub mod message_service;
