pub mod conversation_deletion;
pub mod conversation_dto;
pub mod conversation_handlers;
pub mod conversation_models;
pub mod conversation_repository;

pub use conversation_deletion::ConversationDeletion;
pub use conversation_models::{Conversation, ConversationPreview};
pub use conversation_repository::ConversationRepository;
