//! Client side view of a user's conversations, kept in step with the server by
//! polling.
//!
//! Every poll cycle fetches the user's conversations, then the messages of each
//! conversation, and replaces the cached list wholesale, newest conversation first.
//! Sends are applied to the cache immediately and delivered in the background;
//! those local entries stay visible across polls until the server copy shows up.

use std::time::Duration;

use thiserror::Error;

use crate::libs::server::config::try_load;

pub mod api_client;
pub mod cache;
pub mod synchronizer;

/// How long before its local send time a server message may be stamped and still
/// count as the confirmation of an optimistic entry.
pub const RECONCILE_WINDOW: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub reconcile_window: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://localhost:5001/api"),
            poll_interval: Duration::from_secs(2),
            reconcile_window: RECONCILE_WINDOW,
        }
    }
}

impl SyncConfig {
    pub fn load() -> Self {
        let defaults = Self::default();

        Self {
            base_url: try_load("FARMIFIED_API_URL", defaults.base_url),
            poll_interval: Duration::from_millis(try_load(
                "FARMIFIED_POLL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            reconcile_window: defaults.reconcile_window,
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Http Error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid server url: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Server responded {status}: {message}")]
    Server { status: u16, message: String },
    #[error("No user is signed in")]
    NoActiveUser,
    #[error("No conversation is selected")]
    NoSelection,
    #[error("Conversation {0} is not cached")]
    UnknownConversation(String),
    #[error("Message cannot be empty")]
    EmptyMessage,
}
