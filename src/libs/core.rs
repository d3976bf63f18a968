pub mod conversation_resolver;
pub mod models;
