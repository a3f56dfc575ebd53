use chrono::{DateTime as ChronoDateTime, NaiveDate, Utc};
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::Validate;

use crate::utils::{ApiError, bson_to_date, date_to_bson, parse_date, to_chrono};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobOfferStatus {
    Draft,
    Published,
    Closed,
}

impl JobOfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOfferStatus::Draft => "draft",
            JobOfferStatus::Published => "published",
            JobOfferStatus::Closed => "closed",
        }
    }

    /// draft -> published -> closed, nothing else.
    pub fn can_transition_to(self, next: JobOfferStatus) -> bool {
        matches!(
            (self, next),
            (JobOfferStatus::Draft, JobOfferStatus::Published)
                | (JobOfferStatus::Published, JobOfferStatus::Closed)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobOffer {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub company: ObjectId,
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub job_type: Option<String>, // "stage", "alternance", "cdd", ...
    pub domain: Option<String>,
    pub location: Option<String>,
    pub salary: Option<f64>,
    pub duration: Option<String>,
    pub start_date: Option<DateTime>,
    pub end_date: Option<DateTime>,
    pub application_deadline: Option<DateTime>,
    #[serde(default)]
    pub benefits: Vec<String>,
    pub working_hours: Option<String>,
    pub status: JobOfferStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl JobOffer {
    pub fn check_owner(&self, company: &ObjectId) -> Result<(), ApiError> {
        if &self.company != company {
            return Err(ApiError::forbidden("This job offer belongs to another company"));
        }
        Ok(())
    }

    pub fn check_transition(&self, next: JobOfferStatus) -> Result<(), ApiError> {
        if !self.status.can_transition_to(next) {
            return Err(ApiError::conflict(format!(
                "Job offer cannot go from {} to {}",
                self.status.as_str(),
                next.as_str()
            )));
        }
        Ok(())
    }

    /// Students may only apply to published offers whose deadline is not past.
    pub fn check_open_for_applications(&self, today: NaiveDate) -> Result<(), ApiError> {
        if self.status != JobOfferStatus::Published {
            return Err(ApiError::conflict("This job offer is not open for applications"));
        }
        if let Some(deadline) = self.application_deadline {
            if bson_to_date(deadline) < today {
                return Err(ApiError::conflict("The application deadline has passed"));
            }
        }
        Ok(())
    }
}

fn parse_optional(value: &Option<String>, field: &str) -> Result<Option<NaiveDate>, ApiError> {
    value.as_deref().map(|v| parse_date(v, field)).transpose()
}

fn check_date_order(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), ApiError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end <= start {
            return Err(ApiError::invalid_field("endDate", "End date must be after start date"));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobOfferDto {
    #[validate(length(min = 1, max = 200, message = "Title is required (200 characters max)"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub requirements: Option<String>,
    pub job_type: Option<String>,
    pub domain: Option<String>,
    pub location: Option<String>,
    #[validate(range(min = 0.0, message = "Salary cannot be negative"))]
    pub salary: Option<f64>,
    pub duration: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub application_deadline: Option<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    pub working_hours: Option<String>,
}

impl CreateJobOfferDto {
    pub fn into_job_offer(self, company: ObjectId) -> Result<JobOffer, ApiError> {
        let start = parse_optional(&self.start_date, "startDate")?;
        let end = parse_optional(&self.end_date, "endDate")?;
        let deadline = parse_optional(&self.application_deadline, "applicationDeadline")?;
        check_date_order(start, end)?;

        let now = DateTime::now();
        Ok(JobOffer {
            id: None,
            company,
            title: self.title.trim().to_string(),
            description: self.description,
            requirements: self.requirements,
            job_type: self.job_type,
            domain: self.domain,
            location: self.location,
            salary: self.salary,
            duration: self.duration,
            start_date: start.map(date_to_bson),
            end_date: end.map(date_to_bson),
            application_deadline: deadline.map(date_to_bson),
            benefits: self.benefits,
            working_hours: self.working_hours,
            status: JobOfferStatus::Draft,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Default, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobOfferDto {
    #[validate(length(min = 1, max = 200, message = "Title cannot be empty (200 characters max)"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub job_type: Option<String>,
    pub domain: Option<String>,
    pub location: Option<String>,
    #[validate(range(min = 0.0, message = "Salary cannot be negative"))]
    pub salary: Option<f64>,
    pub duration: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub application_deadline: Option<String>,
    pub benefits: Option<Vec<String>>,
    pub working_hours: Option<String>,
}

impl UpdateJobOfferDto {
    /// `$set` document; date ordering is checked against the stored offer
    /// for whichever bound is not being changed.
    pub fn to_update(&self, current: &JobOffer) -> Result<Document, ApiError> {
        let mut update = doc! { "updated_at": DateTime::now() };

        if let Some(ref title) = self.title {
            update.insert("title", title.trim());
        }
        for (key, value) in [
            ("description", &self.description),
            ("requirements", &self.requirements),
            ("job_type", &self.job_type),
            ("domain", &self.domain),
            ("location", &self.location),
            ("duration", &self.duration),
            ("working_hours", &self.working_hours),
        ] {
            if let Some(v) = value {
                update.insert(key, v);
            }
        }
        if let Some(salary) = self.salary {
            update.insert("salary", salary);
        }
        if let Some(ref benefits) = self.benefits {
            update.insert("benefits", benefits);
        }

        let start = parse_optional(&self.start_date, "startDate")?;
        let end = parse_optional(&self.end_date, "endDate")?;
        let deadline = parse_optional(&self.application_deadline, "applicationDeadline")?;
        check_date_order(
            start.or(current.start_date.map(bson_to_date)),
            end.or(current.end_date.map(bson_to_date)),
        )?;

        for (key, value) in [
            ("start_date", start),
            ("end_date", end),
            ("application_deadline", deadline),
        ] {
            if let Some(date) = value {
                update.insert(key, date_to_bson(date));
            }
        }

        Ok(update)
    }
}

#[derive(FromForm, Deserialize, JsonSchema)]
pub struct JobOfferQuery {
    pub search: Option<String>,
    pub domain: Option<String>,
    pub job_type: Option<String>,
    pub location: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl JobOfferQuery {
    /// Filter for the public job board: published offers only.
    pub fn to_filter(&self) -> Document {
        let mut filter = doc! { "status": JobOfferStatus::Published.as_str() };

        if let Some(ref search) = self.search {
            let pattern = regex::escape(search.trim());
            if !pattern.is_empty() {
                filter.insert(
                    "$or",
                    vec![
                        doc! { "title": { "$regex": &pattern, "$options": "i" } },
                        doc! { "description": { "$regex": &pattern, "$options": "i" } },
                    ],
                );
            }
        }
        if let Some(ref domain) = self.domain {
            filter.insert("domain", domain);
        }
        if let Some(ref job_type) = self.job_type {
            filter.insert("job_type", job_type);
        }
        if let Some(ref location) = self.location {
            filter.insert(
                "location",
                doc! { "$regex": regex::escape(location.trim()), "$options": "i" },
            );
        }

        filter
    }
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobOfferResponse {
    pub id: String,
    pub company: String,
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub job_type: Option<String>,
    pub domain: Option<String>,
    pub location: Option<String>,
    pub salary: Option<f64>,
    pub duration: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub application_deadline: Option<NaiveDate>,
    pub benefits: Vec<String>,
    pub working_hours: Option<String>,
    pub status: JobOfferStatus,
    pub application_count: u64,
    pub created_at: ChronoDateTime<Utc>,
    pub updated_at: ChronoDateTime<Utc>,
}

impl JobOfferResponse {
    pub fn from_offer(offer: JobOffer, application_count: u64) -> Self {
        JobOfferResponse {
            id: offer.id.map(|id| id.to_hex()).unwrap_or_default(),
            company: offer.company.to_hex(),
            title: offer.title,
            description: offer.description,
            requirements: offer.requirements,
            job_type: offer.job_type,
            domain: offer.domain,
            location: offer.location,
            salary: offer.salary,
            duration: offer.duration,
            start_date: offer.start_date.map(bson_to_date),
            end_date: offer.end_date.map(bson_to_date),
            application_deadline: offer.application_deadline.map(bson_to_date),
            benefits: offer.benefits,
            working_hours: offer.working_hours,
            status: offer.status,
            application_count,
            created_at: to_chrono(offer.created_at),
            updated_at: to_chrono(offer.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;

    fn dto() -> CreateJobOfferDto {
        CreateJobOfferDto {
            title: "  Alternance développeur Rust ".to_string(),
            description: "Backend".to_string(),
            requirements: None,
            job_type: Some("alternance".to_string()),
            domain: Some("informatique".to_string()),
            location: Some("Paris".to_string()),
            salary: Some(1200.0),
            duration: Some("12 mois".to_string()),
            start_date: Some("2025-09-01".to_string()),
            end_date: Some("2026-08-31".to_string()),
            application_deadline: Some("2025-07-15".to_string()),
            benefits: vec!["tickets restaurant".to_string()],
            working_hours: None,
        }
    }

    #[test]
    fn offers_start_as_drafts() {
        let offer = dto().into_job_offer(ObjectId::new()).unwrap();
        assert_eq!(offer.status, JobOfferStatus::Draft);
        assert_eq!(offer.title, "Alternance développeur Rust");
        assert_eq!(offer.application_deadline.map(bson_to_date), NaiveDate::from_ymd_opt(2025, 7, 15));
    }

    #[test]
    fn offer_dates_must_be_ordered() {
        let mut bad = dto();
        bad.end_date = Some("2025-08-01".to_string());
        assert_eq!(bad.into_job_offer(ObjectId::new()).unwrap_err().status, Status::BadRequest);
    }

    #[test]
    fn lifecycle_has_no_way_back() {
        use JobOfferStatus::*;
        assert!(Draft.can_transition_to(Published));
        assert!(Published.can_transition_to(Closed));
        assert!(!Closed.can_transition_to(Published));
        assert!(!Draft.can_transition_to(Closed));
        assert!(!Published.can_transition_to(Published));

        let mut offer = dto().into_job_offer(ObjectId::new()).unwrap();
        offer.status = Closed;
        assert_eq!(offer.check_transition(Published).unwrap_err().status, Status::Conflict);
    }

    #[test]
    fn ownership_is_checked() {
        let company = ObjectId::new();
        let offer = dto().into_job_offer(company).unwrap();
        assert!(offer.check_owner(&company).is_ok());
        assert_eq!(offer.check_owner(&ObjectId::new()).unwrap_err().status, Status::Forbidden);
    }

    #[test]
    fn applications_need_a_published_offer_before_deadline() {
        let mut offer = dto().into_job_offer(ObjectId::new()).unwrap();
        let before = NaiveDate::from_ymd_opt(2025, 7, 15).unwrap();
        let after = NaiveDate::from_ymd_opt(2025, 7, 16).unwrap();

        assert!(offer.check_open_for_applications(before).is_err());
        offer.status = JobOfferStatus::Published;
        assert!(offer.check_open_for_applications(before).is_ok());
        assert!(offer.check_open_for_applications(after).is_err());
    }

    #[test]
    fn update_checks_dates_against_stored_offer() {
        let offer = dto().into_job_offer(ObjectId::new()).unwrap();
        let update = UpdateJobOfferDto { end_date: Some("2025-06-01".to_string()), ..Default::default() };
        assert!(update.to_update(&offer).is_err());

        let update = UpdateJobOfferDto { location: Some("Lyon".to_string()), ..Default::default() };
        let set = update.to_update(&offer).unwrap();
        assert_eq!(set.get_str("location").unwrap(), "Lyon");
        assert!(!set.contains_key("title"));
    }

    #[test]
    fn board_filter_only_shows_published_offers() {
        let query = JobOfferQuery {
            search: Some("rust (backend)".to_string()),
            domain: Some("informatique".to_string()),
            job_type: None,
            location: None,
            page: None,
            limit: None,
        };
        let filter = query.to_filter();
        assert_eq!(filter.get_str("status").unwrap(), "published");
        assert_eq!(filter.get_str("domain").unwrap(), "informatique");
        assert!(filter.contains_key("$or"));
    }
}
