//! Server side messaging operations.
//!
//! Every call checks out a pooled connection, runs inside its own transaction and
//! commits before returning, so requests never share in-process state. All methods
//! block on SQLite; async callers should go through `spawn_blocking`.

use crate::libs::core::conversation_resolver;
use crate::libs::core::models::{RecordId, Timestamp};
use crate::libs::error::MessagingError;
use crate::libs::storage::database::storage_sqlite::{SqliteStore, SqliteTransaction};
use crate::libs::storage::database::storage_traits::{
    ConversationStore, MessageStore, Transactional, UserStore,
};
use crate::libs::storage::records::{ConversationRecord, MessageRecord, NewUser, UserRecord};
use tracing::{debug, error};

#[derive(Clone, Debug)]
pub struct MessagingService {
    store: SqliteStore,
}

impl MessagingService {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    pub fn create_user(&self, new_user: NewUser) -> Result<UserRecord, MessagingError> {
        if let Some(field) = new_user.missing_field() {
            return Err(MessagingError::validation(format!(
                "Missing required field: {field}"
            )));
        }

        let record = new_user.into_record();
        let mut connection = self.store.new_connection()?;
        let mut sqlite_transaction = SqliteTransaction::new_immediate(&mut connection)?;
        sqlite_transaction.store_user(&record)?;
        sqlite_transaction.commit()?;

        debug!(user_id = %record.id, "Stored user {}", record.email);
        Ok(record)
    }

    pub fn load_user_by_id(&self, user_id: &RecordId) -> Result<UserRecord, MessagingError> {
        let mut connection = self.store.new_connection()?;
        let mut sqlite_transaction = SqliteTransaction::new(&mut connection)?;
        let user = sqlite_transaction.load_user_by_id(user_id)?;
        sqlite_transaction.commit()?;

        user.ok_or_else(|| MessagingError::not_found("User not found"))
    }

    pub fn load_user_by_email(&self, email: &str) -> Result<UserRecord, MessagingError> {
        if email.trim().is_empty() {
            return Err(MessagingError::validation("Email is required"));
        }

        let mut connection = self.store.new_connection()?;
        let mut sqlite_transaction = SqliteTransaction::new(&mut connection)?;
        let user = require_user(&mut sqlite_transaction, email)?;
        sqlite_transaction.commit()?;
        Ok(user)
    }

    /// Both participants must exist in the user directory. The lookups, the
    /// search and the insert share one immediate transaction.
    pub fn find_or_create_conversation(
        &self,
        email_a: &str,
        email_b: &str,
    ) -> Result<ConversationRecord, MessagingError> {
        let mut connection = self.store.new_connection()?;
        let mut sqlite_transaction = SqliteTransaction::new_immediate(&mut connection)?;

        for email in [email_a, email_b] {
            if !email.trim().is_empty() {
                require_user(&mut sqlite_transaction, email)?;
            }
        }

        let conversation = conversation_resolver::find_or_create_conversation(
            &mut sqlite_transaction,
            email_a,
            email_b,
        )?;
        sqlite_transaction.commit()?;
        Ok(conversation)
    }

    /// Persists the message, then refreshes the conversation preview in a second
    /// write. The second write failing is logged and does not fail the send.
    pub fn append_message(
        &self,
        conversation_id: &RecordId,
        sender_email: &str,
        body: &str,
    ) -> Result<MessageRecord, MessagingError> {
        let sender_email = sender_email.trim();
        let body = body.trim();
        if sender_email.is_empty() {
            return Err(MessagingError::validation("Sender email is required"));
        }
        if body.is_empty() {
            return Err(MessagingError::validation("Message cannot be empty"));
        }

        let mut connection = self.store.new_connection()?;
        let message = {
            let mut sqlite_transaction = SqliteTransaction::new_immediate(&mut connection)?;
            let conversation = require_conversation(&mut sqlite_transaction, conversation_id)?;
            if !conversation.has_participant(sender_email) {
                return Err(MessagingError::validation(
                    "Sender is not a participant of this conversation",
                ));
            }

            // keeps createdAt strictly increasing within the conversation
            let now = Timestamp::now();
            let created_at = match sqlite_transaction.latest_message_timestamp(conversation_id)? {
                Some(latest) if latest >= now => Timestamp::from_millis(latest.as_millis() + 1),
                _ => now,
            };

            let message = MessageRecord::new(
                *conversation_id,
                sender_email.to_string(),
                body.to_string(),
                created_at,
            );
            sqlite_transaction.store_message(&message)?;
            sqlite_transaction.commit()?;
            message
        };

        if let Err(err) = self.touch_conversation(&mut connection, &message) {
            error!(
                conversation_id = %conversation_id,
                message_id = %message.id,
                "Message stored but conversation preview was not updated: {err}"
            );
        }

        Ok(message)
    }

    fn touch_conversation(
        &self,
        connection: &mut r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>,
        message: &MessageRecord,
    ) -> Result<(), MessagingError> {
        let mut sqlite_transaction = SqliteTransaction::new(connection)?;
        sqlite_transaction.touch_conversation(
            &message.conversation_id,
            &message.body,
            message.created_at,
        )?;
        sqlite_transaction.commit()?;
        Ok(())
    }

    pub fn list_messages(
        &self,
        conversation_id: &RecordId,
    ) -> Result<Vec<MessageRecord>, MessagingError> {
        let mut connection = self.store.new_connection()?;
        let mut sqlite_transaction = SqliteTransaction::new(&mut connection)?;
        require_conversation(&mut sqlite_transaction, conversation_id)?;
        let messages = sqlite_transaction.load_messages(conversation_id)?;
        sqlite_transaction.commit()?;
        Ok(messages)
    }

    pub fn list_conversations_for_user(
        &self,
        email: &str,
    ) -> Result<Vec<ConversationRecord>, MessagingError> {
        if email.trim().is_empty() {
            return Err(MessagingError::validation("Email is required"));
        }

        let mut connection = self.store.new_connection()?;
        let mut sqlite_transaction = SqliteTransaction::new(&mut connection)?;
        let conversations = sqlite_transaction.load_conversations_for_user(email)?;
        sqlite_transaction.commit()?;
        Ok(conversations)
    }
}

fn require_user<S: UserStore>(store: &mut S, email: &str) -> Result<UserRecord, MessagingError> {
    store
        .load_user_by_email(email)?
        .ok_or_else(|| MessagingError::not_found(format!("User not found: {}", email.trim())))
}

fn require_conversation<S: ConversationStore>(
    store: &mut S,
    conversation_id: &RecordId,
) -> Result<ConversationRecord, MessagingError> {
    store
        .load_conversation(conversation_id)?
        .ok_or_else(|| MessagingError::not_found("Conversation not found"))
}
