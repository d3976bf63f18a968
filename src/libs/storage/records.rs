use crate::libs::core::models::{ParticipantPair, RecordId, Timestamp, UserType};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub user_type: UserType,
    pub farm_name: Option<String>,
    pub crops: Option<String>,
    pub farm_size: Option<String>,
    pub preferences: Option<String>,
    pub delivery_address: Option<String>,
    pub created_at: Timestamp,
}

impl UserRecord {
    pub(crate) const COLUMNS: &'static str = "user_id, first_name, last_name, email, phone, location, user_type,
         farm_name, crops, farm_size, preferences, delivery_address, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            location: row.get(5)?,
            user_type: row.get(6)?,
            farm_name: row.get(7)?,
            crops: row.get(8)?,
            farm_size: row.get(9)?,
            preferences: row.get(10)?,
            delivery_address: row.get(11)?,
            created_at: row.get(12)?,
        })
    }
}

/// Directory entry as handed over by the signup flow. Farm fields only apply to
/// farmers, preference fields only to consumers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub user_type: UserType,
    #[serde(default)]
    pub farm_name: Option<String>,
    #[serde(default)]
    pub crops: Vec<String>,
    #[serde(default)]
    pub farm_size: Option<String>,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
}

impl NewUser {
    pub fn new(
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: &str,
        user_type: UserType,
    ) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            location: String::from("Unknown"),
            user_type,
            farm_name: None,
            crops: Vec::new(),
            farm_size: None,
            preferences: Vec::new(),
            delivery_address: None,
        }
    }

    /// Name of the first missing required field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("location", &self.location),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }

    /// Stored shape of this entry with a fresh id and creation time.
    pub fn into_record(self) -> UserRecord {
        let is_farmer = self.user_type == UserType::Farmer;
        let join = |values: Vec<String>| (!values.is_empty()).then(|| values.join(", "));

        UserRecord {
            id: RecordId::new(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            location: self.location.trim().to_string(),
            user_type: self.user_type,
            farm_name: self.farm_name.filter(|_| is_farmer),
            crops: if is_farmer { join(self.crops) } else { None },
            farm_size: self.farm_size.filter(|_| is_farmer),
            preferences: if is_farmer { None } else { join(self.preferences) },
            delivery_address: self.delivery_address.filter(|_| !is_farmer),
            created_at: Timestamp::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: RecordId,
    pub participant_a: String,
    pub participant_b: String,
    pub last_message: String,
    pub updated_at: Timestamp,
}

impl ConversationRecord {
    pub(crate) const COLUMNS: &'static str =
        "conversation_id, participant_a, participant_b, last_message, updated_at";

    pub fn new(pair: &ParticipantPair) -> Self {
        Self {
            id: RecordId::new(),
            participant_a: pair.first().to_string(),
            participant_b: pair.second().to_string(),
            last_message: String::new(),
            updated_at: Timestamp::now(),
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            participant_a: row.get(1)?,
            participant_b: row.get(2)?,
            last_message: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    pub fn has_participant(&self, email: &str) -> bool {
        let email = email.trim();
        self.participant_a == email || self.participant_b == email
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: RecordId,
    pub conversation_id: RecordId,
    pub sender_email: String,
    pub body: String,
    pub created_at: Timestamp,
}

impl MessageRecord {
    pub(crate) const COLUMNS: &'static str =
        "message_id, conversation_id, sender_email, body, created_at";

    pub fn new(
        conversation_id: RecordId,
        sender_email: String,
        body: String,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: RecordId::new(),
            conversation_id,
            sender_email,
            body,
            created_at,
        }
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender_email: row.get(2)?,
            body: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}
