use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::Validate;

use crate::utils::to_chrono;

/// A two-member chat thread. Live delivery happens elsewhere; this is the
/// persisted side only.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Conversation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub members: Vec<ObjectId>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Conversation {
    pub fn new(a: ObjectId, b: ObjectId) -> Self {
        let now = DateTime::now();
        Conversation {
            id: None,
            members: vec![a, b],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_member(&self, person: &ObjectId) -> bool {
        self.members.contains(person)
    }

    /// Matches the thread of exactly these two people, in either order.
    pub fn pair_filter(a: &ObjectId, b: &ObjectId) -> Document {
        doc! { "members": { "$all": [*a, *b], "$size": 2 } }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub conversation: ObjectId,
    pub sender: ObjectId,
    pub text: String,
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenConversationDto {
    pub sender_id: String,
    pub receiver_id: String,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageDto {
    pub conversation_id: String,
    #[validate(length(min = 1, max = 5000, message = "Message must be between 1 and 5000 characters"))]
    pub text: String,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: String,
    pub members: Vec<String>,
    pub created_at: ChronoDateTime<Utc>,
    pub updated_at: ChronoDateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(conversation: Conversation) -> Self {
        ConversationResponse {
            id: conversation.id.map(|id| id.to_hex()).unwrap_or_default(),
            members: conversation.members.iter().map(|m| m.to_hex()).collect(),
            created_at: to_chrono(conversation.created_at),
            updated_at: to_chrono(conversation.updated_at),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub text: String,
    pub created_at: ChronoDateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        MessageResponse {
            id: message.id.map(|id| id.to_hex()).unwrap_or_default(),
            conversation_id: message.conversation.to_hex(),
            sender: message.sender.to_hex(),
            text: message.text,
            created_at: to_chrono(message.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_filter_ignores_member_order() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let members = Conversation::pair_filter(&a, &b);
        let members = members.get_document("members").unwrap();

        assert_eq!(members.get_i32("$size").unwrap(), 2);
        let all = members.get_array("$all").unwrap();
        assert!(all.contains(&a.into()) && all.contains(&b.into()));
    }

    #[test]
    fn membership() {
        let a = ObjectId::new();
        let conversation = Conversation::new(a, ObjectId::new());
        assert!(conversation.has_member(&a));
        assert!(!conversation.has_member(&ObjectId::new()));
    }
}
