use std::collections::HashSet;
use std::time::Duration;

use crate::libs::core::models::{RecordId, Timestamp};
use crate::libs::storage::records::{ConversationRecord, MessageRecord};

use super::SyncError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryState {
    /// Shown locally, request still in flight.
    Pending,
    /// Acknowledged by the server.
    Confirmed,
    /// The server rejected it or could not be reached.
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CachedMessage {
    pub message: MessageRecord,
    pub state: DeliveryState,
    /// Set only on entries created by a local send.
    pub correlation_id: Option<RecordId>,
}

impl CachedMessage {
    fn from_server(message: MessageRecord) -> Self {
        Self {
            message,
            state: DeliveryState::Confirmed,
            correlation_id: None,
        }
    }

    fn is_optimistic(&self) -> bool {
        self.correlation_id.is_some()
    }

    /// Whether `server` is the authoritative copy of this optimistic entry.
    ///
    /// A pending entry is only ever matched against server messages the cache has
    /// not seen before; `known` holds the ids of server copies already cached.
    fn is_confirmed_by(
        &self,
        server: &MessageRecord,
        window: Duration,
        known: &HashSet<RecordId>,
    ) -> bool {
        match self.state {
            DeliveryState::Confirmed => self.message.id == server.id,
            DeliveryState::Pending => {
                let earliest = self.message.created_at.as_millis() - window.as_millis() as i64;
                !known.contains(&server.id)
                    && server.sender_email == self.message.sender_email
                    && server.body == self.message.body
                    && server.created_at.as_millis() >= earliest
            }
            DeliveryState::Failed => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CachedConversation {
    pub conversation: ConversationRecord,
    pub messages: Vec<CachedMessage>,
}

impl CachedConversation {
    pub fn new(conversation: ConversationRecord) -> Self {
        Self {
            conversation,
            messages: Vec::new(),
        }
    }

    /// Preview text: the last message when there is one, else the stored preview.
    pub fn last_message(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.message.body.as_str())
            .unwrap_or(&self.conversation.last_message)
    }

    /// Recency used for ordering: the last message time, else the stored time.
    pub fn updated_at(&self) -> Timestamp {
        self.messages
            .last()
            .map(|m| m.message.created_at)
            .unwrap_or(self.conversation.updated_at)
    }

    fn sync_summary(&mut self) {
        if let Some(last) = self.messages.last() {
            self.conversation.last_message = last.message.body.clone();
            self.conversation.updated_at = last.message.created_at;
        }
    }

    fn find_optimistic_mut(&mut self, correlation_id: &RecordId) -> Option<&mut CachedMessage> {
        self.messages
            .iter_mut()
            .find(|m| m.correlation_id.as_ref() == Some(correlation_id))
    }
}

/// The client's copy of every conversation of the signed-in user.
#[derive(Debug, Default)]
pub struct ConversationCache {
    user_email: Option<String>,
    conversations: Vec<CachedConversation>,
    selected: Option<RecordId>,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_email(&self) -> Option<&str> {
        self.user_email.as_deref()
    }

    /// Switching to a different user drops everything cached for the previous one.
    pub fn set_user(&mut self, email: &str) {
        let email = email.trim();
        if self.user_email.as_deref() != Some(email) {
            self.conversations.clear();
            self.selected = None;
            self.user_email = Some(email.to_string());
        }
    }

    pub fn clear_user(&mut self) {
        self.user_email = None;
        self.conversations.clear();
        self.selected = None;
    }

    pub fn conversations(&self) -> &[CachedConversation] {
        &self.conversations
    }

    pub fn conversation(&self, conversation_id: &RecordId) -> Option<&CachedConversation> {
        self.conversations
            .iter()
            .find(|c| &c.conversation.id == conversation_id)
    }

    pub fn selected_id(&self) -> Option<RecordId> {
        self.selected
    }

    pub fn selected(&self) -> Option<&CachedConversation> {
        self.selected.as_ref().and_then(|id| self.conversation(id))
    }

    /// Returns false when the conversation is not cached.
    pub fn select(&mut self, conversation_id: &RecordId) -> bool {
        let known = self.conversation(conversation_id).is_some();
        if known {
            self.selected = Some(*conversation_id);
        }
        known
    }

    /// Moves the conversation to the front of the list, adding it when it is not
    /// cached yet, and selects it.
    pub fn insert_conversation(&mut self, conversation: ConversationRecord) {
        let id = conversation.id;
        let cached = match self
            .conversations
            .iter()
            .position(|c| c.conversation.id == id)
        {
            Some(index) => self.conversations.remove(index),
            None => CachedConversation::new(conversation),
        };
        self.conversations.insert(0, cached);
        self.selected = Some(id);
    }

    /// Replaces the cached list with a fresh server snapshot.
    ///
    /// Optimistic entries survive unless the snapshot already holds their server
    /// copy; survivors are kept after the server messages in send order.
    pub fn replace_from_server(
        &mut self,
        snapshot: Vec<(ConversationRecord, Vec<MessageRecord>)>,
        reconcile_window: Duration,
    ) {
        let mut previous = std::mem::take(&mut self.conversations);

        let mut refreshed: Vec<CachedConversation> = snapshot
            .into_iter()
            .map(|(conversation, server_messages)| {
                let local = previous
                    .iter_mut()
                    .find(|c| c.conversation.id == conversation.id)
                    .map(|c| std::mem::take(&mut c.messages))
                    .unwrap_or_default();
                let known: HashSet<RecordId> = local
                    .iter()
                    .filter(|m| m.state == DeliveryState::Confirmed)
                    .map(|m| m.message.id)
                    .collect();

                let mut unmatched: Vec<bool> = vec![true; server_messages.len()];
                let survivors: Vec<CachedMessage> = local
                    .into_iter()
                    .filter(|m| m.is_optimistic())
                    .filter(|m| {
                        let hit = server_messages
                            .iter()
                            .enumerate()
                            .find(|(i, s)| {
                                unmatched[*i] && m.is_confirmed_by(s, reconcile_window, &known)
                            })
                            .map(|(i, _)| i);
                        match hit {
                            Some(i) => {
                                unmatched[i] = false;
                                false
                            }
                            None => true,
                        }
                    })
                    .collect();

                let mut cached = CachedConversation::new(conversation);
                cached.messages = server_messages
                    .into_iter()
                    .map(CachedMessage::from_server)
                    .chain(survivors)
                    .collect();
                cached.sync_summary();
                cached
            })
            .collect();

        sort_by_recency(&mut refreshed);
        self.conversations = refreshed;

        if let Some(id) = self.selected {
            if self.conversation(&id).is_none() {
                self.selected = None;
            }
        }
    }

    /// Shows a message as sent before the server has seen it. Returns the
    /// correlation id used to settle the entry later.
    pub fn apply_optimistic_send(
        &mut self,
        conversation_id: &RecordId,
        sender_email: &str,
        body: &str,
    ) -> Result<RecordId, SyncError> {
        let conversation = self
            .conversations
            .iter_mut()
            .find(|c| &c.conversation.id == conversation_id)
            .ok_or_else(|| SyncError::UnknownConversation(conversation_id.to_string()))?;

        let correlation_id = RecordId::new();
        // never stamp before the current tail, so the entry stays last
        let created_at = conversation.updated_at().max(Timestamp::now());
        let mut message = MessageRecord::new(
            *conversation_id,
            sender_email.to_string(),
            body.to_string(),
            created_at,
        );
        message.id = correlation_id;

        conversation.messages.push(CachedMessage {
            message,
            state: DeliveryState::Pending,
            correlation_id: Some(correlation_id),
        });
        conversation.sync_summary();

        sort_by_recency(&mut self.conversations);
        Ok(correlation_id)
    }

    /// Swaps the optimistic entry for the server's copy.
    pub fn confirm_send(&mut self, correlation_id: &RecordId, server: MessageRecord) -> bool {
        let Some(conversation) = self
            .conversations
            .iter_mut()
            .find(|c| c.conversation.id == server.conversation_id)
        else {
            return false;
        };

        match conversation.find_optimistic_mut(correlation_id) {
            Some(entry) => {
                entry.message = server;
                entry.state = DeliveryState::Confirmed;
                true
            }
            None => false,
        }
    }

    pub fn fail_send(&mut self, correlation_id: &RecordId) -> bool {
        self.conversations
            .iter_mut()
            .find_map(|c| c.find_optimistic_mut(correlation_id))
            .map(|entry| entry.state = DeliveryState::Failed)
            .is_some()
    }
}

/// Most recently active first. Stable, so equal times keep server order.
fn sort_by_recency(conversations: &mut [CachedConversation]) {
    conversations.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::core::models::ParticipantPair;

    const WINDOW: Duration = Duration::from_secs(5);

    fn conversation(a: &str, b: &str, updated_at: i64) -> ConversationRecord {
        let mut record = ConversationRecord::new(&ParticipantPair::new(a, b).unwrap());
        record.updated_at = Timestamp::from_millis(updated_at);
        record
    }

    fn message(conversation: &ConversationRecord, sender: &str, body: &str, at: i64) -> MessageRecord {
        MessageRecord::new(
            conversation.id,
            sender.to_string(),
            body.to_string(),
            Timestamp::from_millis(at),
        )
    }

    fn bodies(cached: &CachedConversation) -> Vec<&str> {
        cached.messages.iter().map(|m| m.message.body.as_str()).collect()
    }

    #[test]
    fn test_refresh_orders_by_effective_recency() {
        let c1 = conversation("a@x.com", "b@x.com", 1_000);
        let c2 = conversation("a@x.com", "c@x.com", 3_000);
        let c3 = conversation("a@x.com", "d@x.com", 2_000);
        // c1 has a newer message than its stored timestamp
        let m1 = message(&c1, "b@x.com", "latest", 9_000);

        let mut cache = ConversationCache::new();
        cache.set_user("a@x.com");
        cache.replace_from_server(
            vec![
                (c1.clone(), vec![m1]),
                (c2.clone(), Vec::new()),
                (c3.clone(), Vec::new()),
            ],
            WINDOW,
        );

        let order: Vec<RecordId> = cache.conversations().iter().map(|c| c.conversation.id).collect();
        assert_eq!(order, vec![c1.id, c2.id, c3.id]);
        assert_eq!(cache.conversations()[0].last_message(), "latest");
        assert_eq!(cache.conversations()[1].last_message(), "");
    }

    #[test]
    fn test_optimistic_send_moves_conversation_to_front() {
        let old = conversation("a@x.com", "b@x.com", 1_000);
        let new = conversation("a@x.com", "c@x.com", 2_000);

        let mut cache = ConversationCache::new();
        cache.set_user("a@x.com");
        cache.replace_from_server(vec![(old.clone(), Vec::new()), (new.clone(), Vec::new())], WINDOW);
        assert_eq!(cache.conversations()[0].conversation.id, new.id);

        let correlation = cache.apply_optimistic_send(&old.id, "a@x.com", "hello").unwrap();

        let front = &cache.conversations()[0];
        assert_eq!(front.conversation.id, old.id);
        assert_eq!(front.last_message(), "hello");
        assert_eq!(front.messages[0].state, DeliveryState::Pending);
        assert_eq!(front.messages[0].correlation_id, Some(correlation));
    }

    #[test]
    fn test_pending_entry_survives_until_server_copy_arrives() {
        let c1 = conversation("a@x.com", "b@x.com", 1_000);
        let mut cache = ConversationCache::new();
        cache.set_user("a@x.com");
        cache.replace_from_server(vec![(c1.clone(), Vec::new())], WINDOW);

        cache.apply_optimistic_send(&c1.id, "a@x.com", "hi").unwrap();

        // poll lands before the send reached the server
        cache.replace_from_server(vec![(c1.clone(), Vec::new())], WINDOW);
        assert_eq!(bodies(&cache.conversations()[0]), vec!["hi"]);

        // poll after the server stored it: exactly one copy remains
        let sent_at = cache.conversations()[0].messages[0].message.created_at.as_millis();
        let server_copy = message(&c1, "a@x.com", "hi", sent_at + 40);
        cache.replace_from_server(vec![(c1.clone(), vec![server_copy.clone()])], WINDOW);

        let cached = &cache.conversations()[0];
        assert_eq!(bodies(cached), vec!["hi"]);
        assert_eq!(cached.messages[0].message.id, server_copy.id);
        assert_eq!(cached.messages[0].state, DeliveryState::Confirmed);
    }

    #[test]
    fn test_repeated_body_is_not_matched_against_an_earlier_copy() {
        let c1 = conversation("a@x.com", "b@x.com", 1_000);
        let first_ok = message(&c1, "a@x.com", "ok", Timestamp::now().as_millis());
        let mut cache = ConversationCache::new();
        cache.set_user("a@x.com");
        cache.replace_from_server(vec![(c1.clone(), vec![first_ok.clone()])], WINDOW);

        let correlation = cache.apply_optimistic_send(&c1.id, "a@x.com", "ok").unwrap();
        assert_eq!(cache.conversations()[0].messages.len(), 2);

        // second "ok" still in flight, the server only knows the first one
        cache.replace_from_server(vec![(c1.clone(), vec![first_ok.clone()])], WINDOW);
        let cached = &cache.conversations()[0];
        assert_eq!(bodies(cached), vec!["ok", "ok"]);
        assert_eq!(cached.messages[1].state, DeliveryState::Pending);

        assert!(cache.fail_send(&correlation));
        cache.replace_from_server(vec![(c1.clone(), vec![first_ok.clone()])], WINDOW);
        let cached = &cache.conversations()[0];
        assert_eq!(bodies(cached), vec!["ok", "ok"]);
        assert_eq!(cached.messages[1].state, DeliveryState::Failed);
    }

    #[test]
    fn test_repeated_body_matches_its_own_server_copy() {
        let c1 = conversation("a@x.com", "b@x.com", 1_000);
        let first_ok = message(&c1, "a@x.com", "ok", Timestamp::now().as_millis());
        let mut cache = ConversationCache::new();
        cache.set_user("a@x.com");
        cache.replace_from_server(vec![(c1.clone(), vec![first_ok.clone()])], WINDOW);

        cache.apply_optimistic_send(&c1.id, "a@x.com", "ok").unwrap();
        let sent_at = cache.conversations()[0].messages[1].message.created_at.as_millis();
        let second_ok = message(&c1, "a@x.com", "ok", sent_at + 10);

        cache.replace_from_server(
            vec![(c1.clone(), vec![first_ok.clone(), second_ok.clone()])],
            WINDOW,
        );
        let cached = &cache.conversations()[0];
        let ids: Vec<RecordId> = cached.messages.iter().map(|m| m.message.id).collect();
        assert_eq!(ids, vec![first_ok.id, second_ok.id]);
        assert!(cached.messages.iter().all(|m| m.state == DeliveryState::Confirmed));
    }

    #[test]
    fn test_confirmed_entry_is_dropped_by_server_id() {
        let c1 = conversation("a@x.com", "b@x.com", 1_000);
        let mut cache = ConversationCache::new();
        cache.set_user("a@x.com");
        cache.replace_from_server(vec![(c1.clone(), Vec::new())], WINDOW);

        let correlation = cache.apply_optimistic_send(&c1.id, "a@x.com", "hi").unwrap();
        let server_copy = message(&c1, "a@x.com", "hi", 5_000);
        assert!(cache.confirm_send(&correlation, server_copy.clone()));

        cache.replace_from_server(vec![(c1.clone(), vec![server_copy])], WINDOW);
        assert_eq!(cache.conversations()[0].messages.len(), 1);
        assert_eq!(cache.conversations()[0].messages[0].correlation_id, None);
    }

    #[test]
    fn test_failed_send_is_kept_and_flagged() {
        let c1 = conversation("a@x.com", "b@x.com", 1_000);
        let mut cache = ConversationCache::new();
        cache.set_user("a@x.com");
        cache.replace_from_server(vec![(c1.clone(), Vec::new())], WINDOW);

        let correlation = cache.apply_optimistic_send(&c1.id, "a@x.com", "lost").unwrap();
        assert!(cache.fail_send(&correlation));

        cache.replace_from_server(vec![(c1.clone(), Vec::new())], WINDOW);
        let cached = &cache.conversations()[0];
        assert_eq!(bodies(cached), vec!["lost"]);
        assert_eq!(cached.messages[0].state, DeliveryState::Failed);
    }

    #[test]
    fn test_send_to_unknown_conversation_fails() {
        let mut cache = ConversationCache::new();
        cache.set_user("a@x.com");
        let result = cache.apply_optimistic_send(&RecordId::new(), "a@x.com", "hi");
        assert!(matches!(result, Err(SyncError::UnknownConversation(_))));
    }

    #[test]
    fn test_insert_conversation_prepends_once_and_selects() {
        let c1 = conversation("a@x.com", "b@x.com", 1_000);
        let c2 = conversation("a@x.com", "c@x.com", 2_000);
        let mut cache = ConversationCache::new();
        cache.set_user("a@x.com");
        cache.replace_from_server(vec![(c1.clone(), Vec::new())], WINDOW);

        cache.insert_conversation(c2.clone());
        cache.insert_conversation(c2.clone());

        assert_eq!(cache.conversations().len(), 2);
        assert_eq!(cache.conversations()[0].conversation.id, c2.id);
        assert_eq!(cache.selected_id(), Some(c2.id));

        // an already cached conversation moves back to the front
        cache.insert_conversation(c1.clone());
        let order: Vec<RecordId> = cache.conversations().iter().map(|c| c.conversation.id).collect();
        assert_eq!(order, vec![c1.id, c2.id]);
        assert_eq!(cache.selected_id(), Some(c1.id));
    }

    #[test]
    fn test_switching_user_clears_cache() {
        let c1 = conversation("a@x.com", "b@x.com", 1_000);
        let mut cache = ConversationCache::new();
        cache.set_user("a@x.com");
        cache.replace_from_server(vec![(c1.clone(), Vec::new())], WINDOW);
        assert!(cache.select(&c1.id));

        cache.set_user("a@x.com");
        assert_eq!(cache.conversations().len(), 1);

        cache.set_user("c@x.com");
        assert!(cache.conversations().is_empty());
        assert_eq!(cache.selected_id(), None);
    }
}
