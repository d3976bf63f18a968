use crate::libs::core::models::{ParticipantPair, RecordId, Timestamp};
use crate::libs::storage::database::database::db_migration;
use crate::libs::storage::database::storage_traits::{
    ConversationStore, MessageStore, StoreError, Transactional, UserStore,
};
use crate::libs::storage::records::{ConversationRecord, MessageRecord, UserRecord};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Result, Transaction, TransactionBehavior};
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> SqliteTransaction<'conn> {
    pub fn new(
        conn: &'conn mut PooledConnection<SqliteConnectionManager>,
    ) -> Result<Self, StoreError> {
        let trans = conn.transaction()?;
        Ok(Self { tx: trans })
    }

    /// Takes the write lock up front so read-then-write sequences cannot interleave
    /// with another writer.
    pub fn new_immediate(
        conn: &'conn mut PooledConnection<SqliteConnectionManager>,
    ) -> Result<Self, StoreError> {
        let trans = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(Self { tx: trans })
    }

    pub fn inner(&self) -> &Transaction<'conn> {
        &self.tx
    }
}

impl<'conn> Transactional for SqliteTransaction<'conn> {
    fn commit(self) -> Result<(), StoreError> {
        Ok(self.tx.commit()?)
    }

    fn rollback(self) -> Result<(), StoreError> {
        Ok(self.tx.rollback()?)
    }
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn_pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and runs the schema migration.
    pub fn open(db_path: &str, pool_size: u32) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
        });
        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;

        let store = Self { conn_pool: pool };
        db_migration(&store)?;
        debug!(path = db_path, "Opened sqlite store");
        Ok(store)
    }

    pub fn new_connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.conn_pool.get()?)
    }
}

impl<'conn> UserStore for SqliteTransaction<'conn> {
    fn store_user(&mut self, record: &UserRecord) -> Result<(), StoreError> {
        let existing = self
            .tx
            .query_row(
                "SELECT email FROM users WHERE email = ?1 OR phone = ?2",
                params![record.email, record.phone],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        if let Some(email) = existing {
            let taken = if email == record.email { "Email" } else { "Phone" };
            return Err(StoreError::UserAlreadyExists(format!(
                "{taken} already registered"
            )));
        }

        self.tx.execute(
            "INSERT INTO users (user_id, first_name, last_name, email, phone, location, user_type,
                farm_name, crops, farm_size, preferences, delivery_address, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.id,
                record.first_name,
                record.last_name,
                record.email,
                record.phone,
                record.location,
                record.user_type,
                record.farm_name,
                record.crops,
                record.farm_size,
                record.preferences,
                record.delivery_address,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn load_user_by_id(&mut self, user_id: &RecordId) -> Result<Option<UserRecord>, StoreError> {
        let user = self
            .tx
            .query_row(
                &format!("SELECT {} FROM users WHERE user_id = ?1", UserRecord::COLUMNS),
                params![user_id],
                UserRecord::from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn load_user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let user = self
            .tx
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", UserRecord::COLUMNS),
                params![email.trim()],
                UserRecord::from_row,
            )
            .optional()?;
        Ok(user)
    }
}

impl<'conn> ConversationStore for SqliteTransaction<'conn> {
    fn find_or_insert_conversation(
        &mut self,
        pair: &ParticipantPair,
        candidate: &ConversationRecord,
    ) -> Result<(ConversationRecord, bool), StoreError> {
        let key = pair.key();

        // the unique key makes a losing concurrent insert a no-op instead of a duplicate
        let inserted = self.tx.execute(
            "INSERT INTO conversations
                (conversation_id, participant_a, participant_b, participant_key, last_message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(participant_key) DO NOTHING",
            params![
                candidate.id,
                pair.first(),
                pair.second(),
                key,
                candidate.last_message,
                candidate.updated_at,
            ],
        )?;

        let conversation = self.tx.query_row(
            &format!(
                "SELECT {} FROM conversations WHERE participant_key = ?1",
                ConversationRecord::COLUMNS
            ),
            params![key],
            ConversationRecord::from_row,
        )?;

        Ok((conversation, inserted == 1))
    }

    fn load_conversation(
        &mut self,
        conversation_id: &RecordId,
    ) -> Result<Option<ConversationRecord>, StoreError> {
        let conversation = self
            .tx
            .query_row(
                &format!(
                    "SELECT {} FROM conversations WHERE conversation_id = ?1",
                    ConversationRecord::COLUMNS
                ),
                params![conversation_id],
                ConversationRecord::from_row,
            )
            .optional()?;
        Ok(conversation)
    }

    fn load_conversations_for_user(
        &mut self,
        email: &str,
    ) -> Result<Vec<ConversationRecord>, StoreError> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {} FROM conversations
             WHERE participant_a = ?1 OR participant_b = ?1
             ORDER BY updated_at DESC, rowid DESC",
            ConversationRecord::COLUMNS
        ))?;

        let conversations = stmt
            .query_map(params![email.trim()], ConversationRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(conversations)
    }

    fn touch_conversation(
        &mut self,
        conversation_id: &RecordId,
        last_message: &str,
        updated_at: Timestamp,
    ) -> Result<(), StoreError> {
        let updated = self.tx.execute(
            "UPDATE conversations
             SET last_message = CASE WHEN ?3 >= updated_at THEN ?2 ELSE last_message END,
                 updated_at = MAX(updated_at, ?3)
             WHERE conversation_id = ?1",
            params![conversation_id, last_message, updated_at],
        )?;

        if updated == 0 {
            return Err(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
        }
        Ok(())
    }
}

impl<'conn> MessageStore for SqliteTransaction<'conn> {
    fn store_message(&mut self, record: &MessageRecord) -> Result<(), StoreError> {
        self.tx.execute(
            "INSERT INTO messages (message_id, conversation_id, sender_email, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.conversation_id,
                record.sender_email,
                record.body,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn load_messages(
        &mut self,
        conversation_id: &RecordId,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {} FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at ASC, rowid ASC",
            MessageRecord::COLUMNS
        ))?;

        let messages = stmt
            .query_map(params![conversation_id], MessageRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    fn latest_message_timestamp(
        &mut self,
        conversation_id: &RecordId,
    ) -> Result<Option<Timestamp>, StoreError> {
        let latest = self.tx.query_row(
            "SELECT MAX(created_at) FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get::<_, Option<Timestamp>>(0),
        )?;
        Ok(latest)
    }
}
