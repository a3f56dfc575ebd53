use chrono::{DateTime as ChronoDateTime, Datelike, NaiveDate, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use validator::Validate;

use crate::utils::{ApiError, bson_to_date, parse_date, to_chrono};

const MILLIS_PER_30_DAYS: i64 = 30 * 24 * 60 * 60 * 1000;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Pending,
    Active,
    Terminated,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Pending => "pending",
            ContractStatus::Active => "active",
            ContractStatus::Terminated => "terminated",
        }
    }

    /// Dashboard filter value: exact status name, any case.
    pub fn parse_filter(value: &str) -> Result<Self, ApiError> {
        match value.trim().to_lowercase().as_str() {
            "pending" => Ok(ContractStatus::Pending),
            "active" => Ok(ContractStatus::Active),
            "terminated" => Ok(ContractStatus::Terminated),
            _ => Err(ApiError::invalid_field(
                "status",
                "Status must be one of pending, active, terminated",
            )),
        }
    }
}

/// Whole months between two dates, counted on the calendar month number
/// only. Jan 20 -> Feb 5 is one month.
pub fn duration_months(start: NaiveDate, end: NaiveDate) -> i32 {
    (end.month() as i32 - start.month() as i32) + 12 * (end.year() - start.year())
}

/// Duration minus the number of elapsed 30-day blocks since `start`.
/// Goes negative once the contract is over.
pub fn remaining_months(start: NaiveDate, end: NaiveDate, now: ChronoDateTime<Utc>) -> i64 {
    let start_millis = start
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc().timestamp_millis())
        .unwrap_or_default();
    let elapsed_blocks = (now.timestamp_millis() - start_millis).div_euclid(MILLIS_PER_30_DAYS);
    i64::from(duration_months(start, end)) - elapsed_blocks
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Contract {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub company: ObjectId,
    pub student: ObjectId,
    pub start_date: DateTime,
    pub end_date: DateTime,
    pub terms: String,
    pub status: ContractStatus,
    pub signed_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Contract {
    pub fn start(&self) -> NaiveDate {
        bson_to_date(self.start_date)
    }

    pub fn end(&self) -> NaiveDate {
        bson_to_date(self.end_date)
    }

    pub fn duration_months(&self) -> i32 {
        duration_months(self.start(), self.end())
    }

    pub fn remaining_months(&self, now: ChronoDateTime<Utc>) -> i64 {
        remaining_months(self.start(), self.end(), now)
    }

    pub fn is_party(&self, person: &ObjectId) -> bool {
        &self.company == person || &self.student == person
    }

    pub fn check_sign(&self, actor: &ObjectId) -> Result<(), ApiError> {
        if &self.student != actor {
            return Err(ApiError::forbidden("Only the contracted student can sign"));
        }
        if self.status != ContractStatus::Pending {
            return Err(ApiError::not_found(format!(
                "No pending contract found (status is {})",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    pub fn check_cancel(&self, actor: &ObjectId) -> Result<(), ApiError> {
        if !self.is_party(actor) {
            return Err(ApiError::forbidden("Not a party to this contract"));
        }
        if self.status != ContractStatus::Pending {
            return Err(ApiError::forbidden(format!(
                "Only pending contracts can be cancelled (status is {})",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    pub fn check_terminate(&self, actor: &ObjectId) -> Result<(), ApiError> {
        if !self.is_party(actor) {
            return Err(ApiError::forbidden("Not a party to this contract"));
        }
        if self.status != ContractStatus::Active {
            return Err(ApiError::conflict(format!(
                "Only active contracts can be terminated (status is {})",
                self.status.as_str()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateContractDto {
    pub company_id: String,
    pub student_id: String,
    pub start_date: String,
    pub end_date: String,
    #[validate(length(max = 20000, message = "Terms are too long"))]
    #[serde(default)]
    pub terms: String,
}

impl CreateContractDto {
    /// Parsed `(start, end)`; the range must not be empty.
    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate), ApiError> {
        let start = parse_date(&self.start_date, "startDate")?;
        let end = parse_date(&self.end_date, "endDate")?;
        if end <= start {
            return Err(ApiError::invalid_field("endDate", "End date must be after start date"));
        }
        Ok((start, end))
    }
}

#[derive(FromForm, Deserialize, JsonSchema)]
pub struct ContractListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractResponse {
    pub id: String,
    pub company: String,
    pub student: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub terms: String,
    pub status: ContractStatus,
    pub signed_at: Option<ChronoDateTime<Utc>>,
    pub created_at: ChronoDateTime<Utc>,
    pub updated_at: ChronoDateTime<Utc>,
    pub duration_months: i32,
    pub remaining_months: i64,
}

impl ContractResponse {
    pub fn from_contract(contract: Contract, now: ChronoDateTime<Utc>) -> Self {
        ContractResponse {
            id: contract.id.map(|id| id.to_hex()).unwrap_or_default(),
            company: contract.company.to_hex(),
            student: contract.student.to_hex(),
            start_date: contract.start(),
            end_date: contract.end(),
            duration_months: contract.duration_months(),
            remaining_months: contract.remaining_months(now),
            terms: contract.terms,
            status: contract.status,
            signed_at: contract.signed_at.map(to_chrono),
            created_at: to_chrono(contract.created_at),
            updated_at: to_chrono(contract.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::date_to_bson;
    use chrono::TimeZone;
    use rocket::http::Status;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contract(status: ContractStatus) -> Contract {
        let now = DateTime::now();
        Contract {
            id: Some(ObjectId::new()),
            company: ObjectId::new(),
            student: ObjectId::new(),
            start_date: date_to_bson(ymd(2025, 1, 1)),
            end_date: date_to_bson(ymd(2025, 7, 1)),
            terms: "terms".to_string(),
            status,
            signed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn duration_counts_calendar_months() {
        assert_eq!(duration_months(ymd(2024, 1, 15), ymd(2024, 7, 15)), 6);
        assert_eq!(duration_months(ymd(2024, 11, 1), ymd(2025, 2, 1)), 3);
        // day of month is ignored
        assert_eq!(duration_months(ymd(2024, 1, 20), ymd(2024, 2, 5)), 1);
    }

    #[test]
    fn remaining_counts_30_day_blocks_and_goes_negative() {
        let start = ymd(2025, 1, 1);
        let end = ymd(2025, 7, 1);

        let at_start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(remaining_months(start, end, at_start), 6);

        // 61 days in: two full blocks
        let later = Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap();
        assert_eq!(remaining_months(start, end, later), 4);

        let long_after = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert!(remaining_months(start, end, long_after) < 0);

        // before the start the elapsed block count is negative
        let before = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(remaining_months(start, end, before), 7);
    }

    #[test]
    fn empty_or_reversed_ranges_are_rejected() {
        let mut dto = CreateContractDto {
            company_id: ObjectId::new().to_hex(),
            student_id: ObjectId::new().to_hex(),
            start_date: "2025-07-01".to_string(),
            end_date: "2025-07-01".to_string(),
            terms: String::new(),
        };
        let err = dto.date_range().unwrap_err();
        assert_eq!(err.status, Status::BadRequest);
        assert!(err.errors.unwrap().contains_key("endDate"));

        dto.end_date = "2025-01-01".to_string();
        assert!(dto.date_range().is_err());

        dto.end_date = "2026-01-01".to_string();
        assert_eq!(dto.date_range().unwrap(), (ymd(2025, 7, 1), ymd(2026, 1, 1)));
    }

    #[test]
    fn filter_is_exact_and_case_insensitive() {
        assert_eq!(ContractStatus::parse_filter("ACTIVE").unwrap(), ContractStatus::Active);
        assert_eq!(ContractStatus::parse_filter(" pending ").unwrap(), ContractStatus::Pending);
        assert!(ContractStatus::parse_filter("e").is_err());
        assert!(ContractStatus::parse_filter("activ").is_err());
    }

    #[test]
    fn signing_rules() {
        let pending = contract(ContractStatus::Pending);
        assert!(pending.check_sign(&pending.student).is_ok());
        assert_eq!(pending.check_sign(&pending.company).unwrap_err().status, Status::Forbidden);

        let active = contract(ContractStatus::Active);
        assert_eq!(active.check_sign(&active.student).unwrap_err().status, Status::NotFound);
    }

    #[test]
    fn cancel_and_terminate_rules() {
        let pending = contract(ContractStatus::Pending);
        assert!(pending.check_cancel(&pending.company).is_ok());
        assert!(pending.check_cancel(&pending.student).is_ok());
        assert_eq!(pending.check_cancel(&ObjectId::new()).unwrap_err().status, Status::Forbidden);
        assert_eq!(pending.check_terminate(&pending.company).unwrap_err().status, Status::Conflict);

        let active = contract(ContractStatus::Active);
        assert_eq!(active.check_cancel(&active.company).unwrap_err().status, Status::Forbidden);
        assert!(active.check_terminate(&active.student).is_ok());
    }

    #[test]
    fn response_carries_computed_durations() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let response = ContractResponse::from_contract(contract(ContractStatus::Active), now);
        assert_eq!(response.duration_months, 6);
        assert_eq!(response.remaining_months, 6);
        assert_eq!(response.start_date, ymd(2025, 1, 1));
    }
}
