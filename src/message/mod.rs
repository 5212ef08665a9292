pub mod message_dto;
pub mod message_handlers;
pub mod message_models;
pub mod message_repository;
pub mod read_marker;

pub use message_models::{Message, MessageEvent};
pub use message_repository::MessageRepository;
pub use read_marker::ReadMarker;
