use async_trait::async_trait;
use reqwest::{Client as HttpClient, Response, StatusCode, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::libs::core::models::RecordId;
use crate::libs::storage::records::{ConversationRecord, MessageRecord, UserRecord};

use super::SyncError;

/// Server operations the synchronizer depends on.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    async fn list_conversations(&self, email: &str)
        -> Result<Vec<ConversationRecord>, SyncError>;

    async fn list_messages(
        &self,
        conversation_id: &RecordId,
    ) -> Result<Vec<MessageRecord>, SyncError>;

    async fn append_message(
        &self,
        conversation_id: &RecordId,
        sender_email: &str,
        body: &str,
    ) -> Result<MessageRecord, SyncError>;

    async fn find_or_create_conversation(
        &self,
        email_a: &str,
        email_b: &str,
    ) -> Result<ConversationRecord, SyncError>;

    async fn find_user_by_email(&self, email: &str) -> Result<UserRecord, SyncError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct ConversationsBody {
    conversations: Vec<ConversationRecord>,
}

#[derive(Deserialize)]
struct ConversationBody {
    conversation: ConversationRecord,
}

#[derive(Deserialize)]
struct MessagesBody {
    messages: Vec<MessageRecord>,
}

#[derive(Deserialize)]
struct UserBody {
    user: UserRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody<'a> {
    sender_email: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversationBody<'a> {
    user1_email: &'a str,
    user2_email: &'a str,
}

/// [`MessagingApi`] over the JSON endpoints served under `/api`.
#[derive(Clone, Debug)]
pub struct HttpMessagingClient {
    http: HttpClient,
    base_url: Url,
}

impl HttpMessagingClient {
    pub fn new(base_url: &str) -> Result<Self, SyncError> {
        let base_url =
            Url::parse(base_url).map_err(|e| SyncError::InvalidUrl(format!("{base_url}: {e}")))?;

        Ok(Self {
            http: HttpClient::new(),
            base_url,
        })
    }

    /// Appends percent-encoded path segments to the base url.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SyncError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SyncError::InvalidUrl(self.base_url.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());

        if status == StatusCode::NOT_FOUND {
            Err(SyncError::NotFound(message))
        } else {
            Err(SyncError::Server {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl MessagingApi for HttpMessagingClient {
    async fn list_conversations(
        &self,
        email: &str,
    ) -> Result<Vec<ConversationRecord>, SyncError> {
        let url = self.endpoint(&["conversations", email])?;
        debug!("GET {url}");
        let response = self.http.get(url).send().await?;
        Ok(Self::decode::<ConversationsBody>(response).await?.conversations)
    }

    async fn list_messages(
        &self,
        conversation_id: &RecordId,
    ) -> Result<Vec<MessageRecord>, SyncError> {
        let id = conversation_id.to_string();
        let url = self.endpoint(&["messages", &id])?;
        debug!("GET {url}");
        let response = self.http.get(url).send().await?;
        Ok(Self::decode::<MessagesBody>(response).await?.messages)
    }

    async fn append_message(
        &self,
        conversation_id: &RecordId,
        sender_email: &str,
        body: &str,
    ) -> Result<MessageRecord, SyncError> {
        let id = conversation_id.to_string();
        let url = self.endpoint(&["messages", &id])?;
        debug!("POST {url}");
        let response = self
            .http
            .post(url)
            .json(&SendMessageBody {
                sender_email,
                message: body,
            })
            .send()
            .await?;
        Self::decode::<MessageRecord>(response).await
    }

    async fn find_or_create_conversation(
        &self,
        email_a: &str,
        email_b: &str,
    ) -> Result<ConversationRecord, SyncError> {
        let url = self.endpoint(&["conversations"])?;
        debug!("POST {url}");
        let response = self
            .http
            .post(url)
            .json(&CreateConversationBody {
                user1_email: email_a,
                user2_email: email_b,
            })
            .send()
            .await?;
        Ok(Self::decode::<ConversationBody>(response).await?.conversation)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<UserRecord, SyncError> {
        let url = self.endpoint(&["user", "email", email])?;
        debug!("GET {url}");
        let response = self.http.get(url).send().await?;
        Ok(Self::decode::<UserBody>(response).await?.user)
    }
}
