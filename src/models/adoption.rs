use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;

use crate::utils::{ApiError, to_chrono};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AdoptionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl AdoptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdoptionStatus::Pending => "pending",
            AdoptionStatus::Accepted => "accepted",
            AdoptionStatus::Rejected => "rejected",
        }
    }

    /// pending -> accepted | rejected; both outcomes are final.
    pub fn can_transition_to(self, next: AdoptionStatus) -> bool {
        matches!(
            (self, next),
            (AdoptionStatus::Pending, AdoptionStatus::Accepted)
                | (AdoptionStatus::Pending, AdoptionStatus::Rejected)
        )
    }
}

/// A company's declared interest in a student.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Adoption {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub adopter: ObjectId, // company
    pub adopted: ObjectId, // student
    pub status: AdoptionStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Adoption {
    pub fn new(adopter: ObjectId, adopted: ObjectId) -> Self {
        let now = DateTime::now();
        Adoption {
            id: None,
            adopter,
            adopted,
            status: AdoptionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Explains why `actor` may not move this adoption to `next`.
    pub fn check_resolution(&self, actor: &ObjectId, next: AdoptionStatus) -> Result<(), ApiError> {
        if &self.adopted != actor {
            return Err(ApiError::forbidden("Only the adopted student can answer this adoption"));
        }
        if !self.status.can_transition_to(next) {
            return Err(ApiError::not_found(format!(
                "No pending adoption found (status is {})",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    pub fn check_cancel(&self, actor: &ObjectId) -> Result<(), ApiError> {
        if &self.adopter != actor {
            return Err(ApiError::forbidden("Only the adopting company can cancel this adoption"));
        }
        if self.status != AdoptionStatus::Pending {
            return Err(ApiError::forbidden(format!(
                "Adoption can no longer be cancelled (status is {})",
                self.status.as_str()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdoptionDto {
    pub adopter_id: String,
    pub adopted_id: String,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionResponse {
    pub id: String,
    pub adopter: String,
    pub adopted: String,
    pub status: AdoptionStatus,
    pub created_at: ChronoDateTime<Utc>,
    pub updated_at: ChronoDateTime<Utc>,
}

impl From<Adoption> for AdoptionResponse {
    fn from(adoption: Adoption) -> Self {
        AdoptionResponse {
            id: adoption.id.map(|id| id.to_hex()).unwrap_or_default(),
            adopter: adoption.adopter.to_hex(),
            adopted: adoption.adopted.to_hex(),
            status: adoption.status,
            created_at: to_chrono(adoption.created_at),
            updated_at: to_chrono(adoption.updated_at),
        }
    }
}
