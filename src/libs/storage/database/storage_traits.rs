use crate::libs::core::models::{ParticipantPair, RecordId, Timestamp};
use crate::libs::storage::records::{ConversationRecord, MessageRecord, UserRecord};
use thiserror::Error;

pub trait Transactional {
    fn commit(self) -> Result<(), StoreError>;
    fn rollback(self) -> Result<(), StoreError>;
}

pub trait UserStore {
    /// Fails with [`StoreError::UserAlreadyExists`] when the email or phone is taken.
    fn store_user(&mut self, record: &UserRecord) -> Result<(), StoreError>;
    fn load_user_by_id(&mut self, user_id: &RecordId) -> Result<Option<UserRecord>, StoreError>;
    fn load_user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>, StoreError>;
}

pub trait ConversationStore {
    /// Returns the conversation for `pair`, inserting `candidate` only when the pair
    /// has none yet. The boolean is true when `candidate` was inserted.
    fn find_or_insert_conversation(
        &mut self,
        pair: &ParticipantPair,
        candidate: &ConversationRecord,
    ) -> Result<(ConversationRecord, bool), StoreError>;

    fn load_conversation(
        &mut self,
        conversation_id: &RecordId,
    ) -> Result<Option<ConversationRecord>, StoreError>;

    /// Newest first.
    fn load_conversations_for_user(
        &mut self,
        email: &str,
    ) -> Result<Vec<ConversationRecord>, StoreError>;

    /// Moves `updated_at` forward, never backwards. The preview is only replaced
    /// when `updated_at` is not older than the stored one.
    fn touch_conversation(
        &mut self,
        conversation_id: &RecordId,
        last_message: &str,
        updated_at: Timestamp,
    ) -> Result<(), StoreError>;
}

pub trait MessageStore {
    fn store_message(&mut self, record: &MessageRecord) -> Result<(), StoreError>;

    /// Oldest first, ties in insertion order.
    fn load_messages(
        &mut self,
        conversation_id: &RecordId,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    fn latest_message_timestamp(
        &mut self,
        conversation_id: &RecordId,
    ) -> Result<Option<Timestamp>, StoreError>;
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Sqlite Error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("ConnectionPool Error: {0}")]
    ConnectionPool(#[from] r2d2::Error),
    #[error("Initialisation Error: {0}")]
    Initialisation(String),
    #[error("User Already Exists: {0}")]
    UserAlreadyExists(String),
}
