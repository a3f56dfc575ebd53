use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::Validate;

use crate::utils::{ApiError, to_chrono};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Reviewed,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 4] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Reviewed,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewed => "reviewed",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// pending -> reviewed | accepted | rejected, reviewed -> accepted | rejected.
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        match self {
            Pending => matches!(next, Reviewed | Accepted | Rejected),
            Reviewed => matches!(next, Accepted | Rejected),
            Accepted | Rejected => false,
        }
    }

    /// Statuses a review can start from to reach `next`.
    pub fn sources_of(next: ApplicationStatus) -> Vec<&'static str> {
        Self::ALL
            .iter()
            .filter(|from| from.can_transition_to(next))
            .map(|from| from.as_str())
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobApplication {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub student: ObjectId,
    pub job_offer: ObjectId,
    pub company: ObjectId, // owner of the job offer
    pub cover_letter: Option<String>,
    pub status: ApplicationStatus,
    pub review_notes: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl JobApplication {
    pub fn new(student: ObjectId, job_offer: ObjectId, company: ObjectId, cover_letter: Option<String>) -> Self {
        let now = DateTime::now();
        JobApplication {
            id: None,
            student,
            job_offer,
            company,
            cover_letter,
            status: ApplicationStatus::Pending,
            review_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn check_review(&self, company: &ObjectId, next: ApplicationStatus) -> Result<(), ApiError> {
        if &self.company != company {
            return Err(ApiError::forbidden("Only the offering company can review this application"));
        }
        if !self.status.can_transition_to(next) {
            return Err(ApiError::conflict(format!(
                "Application cannot go from {} to {}",
                self.status.as_str(),
                next.as_str()
            )));
        }
        Ok(())
    }

    pub fn check_withdraw(&self, student: &ObjectId) -> Result<(), ApiError> {
        if &self.student != student {
            return Err(ApiError::forbidden("Only the applicant can withdraw this application"));
        }
        if self.status != ApplicationStatus::Pending {
            return Err(ApiError::conflict("Only pending applications can be withdrawn"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplicationDto {
    pub student_id: String,
    pub job_offer_id: String,
    #[validate(length(max = 10000, message = "Cover letter is too long"))]
    pub cover_letter: Option<String>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApplicationStatusDto {
    pub status: ApplicationStatus,
    #[validate(length(max = 5000, message = "Review notes are too long"))]
    pub review_notes: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResponse {
    pub id: String,
    pub student: String,
    pub job_offer: String,
    pub company: String,
    pub cover_letter: Option<String>,
    pub status: ApplicationStatus,
    pub review_notes: Option<String>,
    pub created_at: ChronoDateTime<Utc>,
    pub updated_at: ChronoDateTime<Utc>,
}

impl From<JobApplication> for ApplicationResponse {
    fn from(application: JobApplication) -> Self {
        ApplicationResponse {
            id: application.id.map(|id| id.to_hex()).unwrap_or_default(),
            student: application.student.to_hex(),
            job_offer: application.job_offer.to_hex(),
            company: application.company.to_hex(),
            cover_letter: application.cover_letter,
            status: application.status,
            review_notes: application.review_notes,
            created_at: to_chrono(application.created_at),
            updated_at: to_chrono(application.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;

    #[test]
    fn review_graph() {
        use ApplicationStatus::*;
        assert!(Pending.can_transition_to(Reviewed));
        assert!(Pending.can_transition_to(Accepted));
        assert!(Reviewed.can_transition_to(Rejected));
        assert!(!Reviewed.can_transition_to(Pending));
        assert!(!Reviewed.can_transition_to(Reviewed));
        assert!(!Accepted.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Accepted));

        assert_eq!(ApplicationStatus::sources_of(Accepted), vec!["pending", "reviewed"]);
        assert_eq!(ApplicationStatus::sources_of(Reviewed), vec!["pending"]);
        assert!(ApplicationStatus::sources_of(Pending).is_empty());
    }

    #[test]
    fn only_the_offering_company_reviews() {
        let company = ObjectId::new();
        let application = JobApplication::new(ObjectId::new(), ObjectId::new(), company, None);

        assert!(application.check_review(&company, ApplicationStatus::Reviewed).is_ok());
        let err = application.check_review(&ObjectId::new(), ApplicationStatus::Reviewed).unwrap_err();
        assert_eq!(err.status, Status::Forbidden);
        let err = application.check_review(&company, ApplicationStatus::Pending).unwrap_err();
        assert_eq!(err.status, Status::Conflict);
    }

    #[test]
    fn withdraw_only_while_pending() {
        let student = ObjectId::new();
        let mut application = JobApplication::new(student, ObjectId::new(), ObjectId::new(), None);
        assert!(application.check_withdraw(&student).is_ok());
        assert_eq!(application.check_withdraw(&ObjectId::new()).unwrap_err().status, Status::Forbidden);

        application.status = ApplicationStatus::Reviewed;
        assert_eq!(application.check_withdraw(&student).unwrap_err().status, Status::Conflict);
    }
}
