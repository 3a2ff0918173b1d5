use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

pub const MAX_MESSAGE_LEN: usize = 5000;

/// Messages kept in one conversation document. At 5000 four-byte characters
/// per message this stays well under MongoDB's 16 MB document limit.
pub const MAX_MESSAGES_PER_CONVERSATION: usize = 600;

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Message {
    pub message_id: String,
    pub sender_id: String,
    pub text: String,
    pub timestamp: i64,
    #[serde(default)]
    pub read: bool,
}

/// Conversation document in the "conversations" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub participants: Vec<String>,
    /// Sorted participant ids joined with `|`, unique per pair
    pub pair_key: String,
    #[serde(default)]
    pub appointment_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub last_message_at: i64,
    pub created_at: i64,
}

impl Conversation {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    pub fn unread_for(&self, user_id: &str) -> usize {
        self.messages
            .iter()
            .filter(|m| !m.read && m.sender_id != user_id)
            .count()
    }
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateConversationRequest {
    pub participant_id: String,
    pub appointment_id: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SendMessageRequest {
    pub text: String,
}

/// Compact conversation entry for inbox listings, computed server side so
/// the message array never leaves the database.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ConversationSummary {
    pub id: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub appointment_id: Option<String>,
    #[serde(default)]
    pub last_message: Option<Message>,
    pub unread_count: usize,
    pub last_message_at: i64,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ConversationResponse {
    pub id: String,
    pub participants: Vec<String>,
    pub appointment_id: Option<String>,
    pub messages: Vec<Message>,
    pub last_message_at: i64,
    pub created_at: i64,
}

impl From<Conversation> for ConversationResponse {
    fn from(conversation: Conversation) -> Self {
        ConversationResponse {
            id: conversation.id.map(|id| id.to_hex()).unwrap_or_default(),
            participants: conversation.participants,
            appointment_id: conversation.appointment_id,
            messages: conversation.messages,
            last_message_at: conversation.last_message_at,
            created_at: conversation.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: &str, read: bool) -> Message {
        Message {
            message_id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender.to_string(),
            text: "hello".to_string(),
            timestamp: 1,
            read,
        }
    }

    #[test]
    fn test_unread_counts_only_other_senders() {
        let conversation = Conversation {
            id: None,
            participants: vec!["a".into(), "b".into()],
            pair_key: "a|b".into(),
            appointment_id: None,
            messages: vec![message("a", false), message("b", false), message("b", true)],
            last_message_at: 1,
            created_at: 1,
        };

        assert_eq!(conversation.unread_for("a"), 1);
        assert_eq!(conversation.unread_for("b"), 1);
        assert!(conversation.is_participant("a"));
        assert!(!conversation.is_participant("c"));
    }

    #[test]
    fn test_summary_from_aggregation_row() {
        let row = mongodb::bson::doc! {
            "id": "65f1c0ffee0000000000abcd",
            "participants": ["a", "b"],
            "unread_count": 2_i32,
            "last_message_at": 10_i64,
        };
        let summary: ConversationSummary = mongodb::bson::from_document(row).unwrap();
        assert_eq!(summary.unread_count, 2);
        assert!(summary.last_message.is_none());
        assert!(summary.appointment_id.is_none());
    }
}
