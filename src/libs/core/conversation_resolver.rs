use crate::libs::core::models::ParticipantPair;
use crate::libs::error::MessagingError;
use crate::libs::storage::database::storage_traits::ConversationStore;
use crate::libs::storage::records::ConversationRecord;
use tracing::info;

/// Returns the canonical conversation between two participants, creating it on
/// first use. Argument order does not matter and repeated calls never mutate an
/// existing conversation.
///
/// Atomicity comes from the store: the caller is expected to run this inside an
/// immediate transaction, and the insert itself is a no-op when the pair exists.
pub fn find_or_create_conversation<S: ConversationStore>(
    store: &mut S,
    email_a: &str,
    email_b: &str,
) -> Result<ConversationRecord, MessagingError> {
    let pair = ParticipantPair::new(email_a, email_b)?;

    let candidate = ConversationRecord::new(&pair);
    let (conversation, created) = store.find_or_insert_conversation(&pair, &candidate)?;

    if created {
        info!(
            conversation_id = %conversation.id,
            "Created conversation between {} and {}",
            pair.first(),
            pair.second()
        );
    }

    Ok(conversation)
}
