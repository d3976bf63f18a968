//! Messaging core of Farmified, a marketplace connecting farmers and consumers.
//!
//! # Layout
//! - [`libs::storage`]: SQLite schema, records and the r2d2 backed store.
//! - [`libs::core`]: ids, timestamps, participant pairs and the conversation resolver.
//! - [`libs::messaging`]: request-scoped operations used by the HTTP layer.
//! - [`libs::server`]: axum router, configuration and graceful shutdown.
//! - [`libs::sync`]: client side cache kept fresh by polling the server.
//!
//! # Conversations
//! There is exactly one conversation per unordered pair of users. The pair is stored
//! under a normalized `participant_key` (both trimmed emails, sorted) with a UNIQUE
//! constraint, and the resolver runs its lookup and insert inside one immediate
//! transaction, so concurrent "find or create" calls for the same pair all land on
//! the same row.
//!
//! # Running
//! ```sh
//! RUST_LOG=info PORT=5001 DATABASE_PATH=database.sqlite cargo run --bin farmified-server
//! ```
pub mod libs;

pub use crate::libs::core::models::{PairError, ParticipantPair, RecordId, Timestamp, UserType};
pub use crate::libs::error::MessagingError;
pub use crate::libs::messaging::MessagingService;
pub use crate::libs::storage::database::storage_sqlite::SqliteStore;
pub use crate::libs::storage::database::storage_traits::StoreError;
pub use crate::libs::storage::records::{ConversationRecord, MessageRecord, NewUser, UserRecord};
pub use crate::libs::sync::api_client::{HttpMessagingClient, MessagingApi};
pub use crate::libs::sync::synchronizer::MessageSynchronizer;
pub use crate::libs::sync::{SyncConfig, SyncError};

/// Opens the database at `path` and returns a service ready to serve requests.
pub fn open_messaging_service(path: &str, pool_size: u32) -> Result<MessagingService, StoreError> {
    Ok(MessagingService::new(SqliteStore::open(path, pool_size)?))
}
