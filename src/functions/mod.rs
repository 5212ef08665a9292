//! Small HTTP functions the mobile client calls directly: translation,
//! push-token registration and secret lookup.

pub mod functions_dto;
pub mod functions_handlers;
pub mod translator;

pub use translator::Translator;
