use tracing::info;

use crate::libs::storage::database::storage_sqlite::{SqliteStore, SqliteTransaction};
use crate::libs::storage::database::storage_traits::{StoreError, Transactional};

/// Creates the messaging schema. Safe to run against an existing database.
pub fn db_migration(store: &SqliteStore) -> Result<(), StoreError> {
    let mut connection = store.new_connection()?;
    let sqlite_transaction = SqliteTransaction::new(&mut connection)?;

    // users are owned by the signup flow; messaging only reads them
    sqlite_transaction
        .inner()
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                phone TEXT NOT NULL UNIQUE,
                location TEXT NOT NULL,
                user_type TEXT NOT NULL,
                farm_name TEXT,
                crops TEXT,
                farm_size TEXT,
                preferences TEXT,
                delivery_address TEXT,
                created_at INTEGER NOT NULL,

                CHECK (user_type IN ('farmer', 'consumer'))
            );",
        )
        .map_err(|e| StoreError::Initialisation(e.to_string()))?;

    sqlite_transaction
        .inner()
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS conversations (
                conversation_id TEXT PRIMARY KEY,
                participant_a TEXT NOT NULL,
                participant_b TEXT NOT NULL,
                participant_key TEXT NOT NULL UNIQUE,
                last_message TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,

                CHECK (participant_a < participant_b)
            );
            CREATE INDEX IF NOT EXISTS idx_conversations_participant_a ON conversations(participant_a);
            CREATE INDEX IF NOT EXISTS idx_conversations_participant_b ON conversations(participant_b);
            CREATE INDEX IF NOT EXISTS idx_conversations_updated_at ON conversations(updated_at);",
        )
        .map_err(|e| StoreError::Initialisation(e.to_string()))?;

    sqlite_transaction
        .inner()
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                message_id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                sender_email TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at INTEGER NOT NULL,

                FOREIGN KEY (conversation_id) REFERENCES conversations(conversation_id),

                CHECK (length(trim(body)) > 0)
            );
            CREATE INDEX IF NOT EXISTS idx_messages_conversation_id_created_at ON messages(conversation_id, created_at);",
        )
        .map_err(|e| StoreError::Initialisation(e.to_string()))?;

    sqlite_transaction
        .commit()
        .map_err(|e| StoreError::Initialisation(format!("Could not commit initial db: {e}")))?;

    info!("Database schema ready");
    Ok(())
}
