use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::libs::core::models::RecordId;
use crate::libs::storage::records::ConversationRecord;

use super::api_client::MessagingApi;
use super::cache::{CachedConversation, ConversationCache};
use super::{SyncConfig, SyncError};

/// Owns the conversation cache of one client and keeps it in step with the server.
///
/// Cheap to clone; clones share the cache. The cache lock is never held while a
/// request is in flight, so sends and polls interleave freely.
pub struct MessageSynchronizer<A: MessagingApi + 'static> {
    api: Arc<A>,
    cache: Arc<Mutex<ConversationCache>>,
    config: SyncConfig,
}

impl<A: MessagingApi + 'static> Clone for MessageSynchronizer<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
        }
    }
}

/// A message shown before the server acknowledged it.
pub struct OptimisticSend {
    pub correlation_id: RecordId,
    /// Completes once the server answered and the cache entry was settled.
    pub delivery: JoinHandle<()>,
}

/// Running poll loop. Dropping the handle stops the loop.
pub struct PollHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(err) = (&mut self.task).await {
            warn!("Poll loop ended abnormally: {err}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl<A: MessagingApi + 'static> MessageSynchronizer<A> {
    pub fn new(api: A, config: SyncConfig) -> Self {
        Self {
            api: Arc::new(api),
            cache: Arc::new(Mutex::new(ConversationCache::new())),
            config,
        }
    }

    pub async fn set_user(&self, email: &str) {
        self.cache.lock().await.set_user(email);
    }

    /// Ends the session. A running poll loop exits on its next tick.
    pub async fn clear_user(&self) {
        self.cache.lock().await.clear_user();
    }

    pub async fn snapshot(&self) -> Vec<CachedConversation> {
        self.cache.lock().await.conversations().to_vec()
    }

    pub async fn selected(&self) -> Option<CachedConversation> {
        self.cache.lock().await.selected().cloned()
    }

    pub async fn select(&self, conversation_id: &RecordId) -> bool {
        self.cache.lock().await.select(conversation_id)
    }

    /// One full poll cycle: conversations, then messages of each, then a wholesale
    /// replace of the cache.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let email = self
            .cache
            .lock()
            .await
            .user_email()
            .map(str::to_string)
            .ok_or(SyncError::NoActiveUser)?;

        let conversations = self.api.list_conversations(&email).await?;
        let mut snapshot = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let messages = self.api.list_messages(&conversation.id).await?;
            snapshot.push((conversation, messages));
        }

        let mut cache = self.cache.lock().await;
        if cache.user_email() != Some(email.as_str()) {
            debug!("User changed during refresh, discarding snapshot for {email}");
            return Ok(());
        }
        cache.replace_from_server(snapshot, self.config.reconcile_window);
        debug!(
            conversations = cache.conversations().len(),
            "Refreshed conversations for {email}"
        );
        Ok(())
    }

    /// Polls immediately, then every `poll_interval` until stopped or until no user
    /// is signed in. A failed cycle is logged and retried on the next tick.
    pub fn start_polling(&self) -> PollHandle {
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
        let synchronizer = self.clone();
        let period = self.config.poll_interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("Poll loop cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        match synchronizer.refresh().await {
                            Ok(()) => {}
                            Err(SyncError::NoActiveUser) => {
                                info!("No active user, stopping poll loop");
                                break;
                            }
                            Err(err) => warn!("Poll cycle failed, retrying next tick: {err}"),
                        }
                    }
                }
            }
        });

        PollHandle {
            shutdown: Some(shutdown),
            task,
        }
    }

    /// Shows `body` in the selected conversation right away and delivers it in
    /// the background.
    pub async fn send_message(&self, body: &str) -> Result<OptimisticSend, SyncError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(SyncError::EmptyMessage);
        }

        let (conversation_id, sender_email, correlation_id) = {
            let mut cache = self.cache.lock().await;
            let sender_email = cache
                .user_email()
                .map(str::to_string)
                .ok_or(SyncError::NoActiveUser)?;
            let conversation_id = cache.selected_id().ok_or(SyncError::NoSelection)?;
            let correlation_id =
                cache.apply_optimistic_send(&conversation_id, &sender_email, body)?;
            (conversation_id, sender_email, correlation_id)
        };

        let api = Arc::clone(&self.api);
        let cache = Arc::clone(&self.cache);
        let body = body.to_string();
        let delivery = tokio::spawn(async move {
            match api.append_message(&conversation_id, &sender_email, &body).await {
                Ok(server_copy) => {
                    cache.lock().await.confirm_send(&correlation_id, server_copy);
                }
                Err(err) => {
                    warn!(
                        conversation_id = %conversation_id,
                        "Failed to deliver message: {err}"
                    );
                    cache.lock().await.fail_send(&correlation_id);
                }
            }
        });

        Ok(OptimisticSend {
            correlation_id,
            delivery,
        })
    }

    /// "Add user": resolves the counterpart by email, finds or creates the
    /// conversation and puts it at the top of the list, selected.
    pub async fn start_conversation(
        &self,
        counterpart_email: &str,
    ) -> Result<ConversationRecord, SyncError> {
        let email = self
            .cache
            .lock()
            .await
            .user_email()
            .map(str::to_string)
            .ok_or(SyncError::NoActiveUser)?;

        let counterpart = self.api.find_user_by_email(counterpart_email).await?;
        let conversation = self
            .api
            .find_or_create_conversation(&email, &counterpart.email)
            .await?;

        self.cache
            .lock()
            .await
            .insert_conversation(conversation.clone());
        Ok(conversation)
    }
}
