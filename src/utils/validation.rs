use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;

use super::ApiError;

/// Parses a hex ObjectId coming from a path or body, naming the field on failure.
pub fn parse_object_id(value: &str, field: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(value).map_err(|_| ApiError::invalid_field(field, format!("Invalid {}", field)))
}

/// Accepts `YYYY-MM-DD` as well as a full RFC 3339 timestamp (the date part is kept).
pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ApiError> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.date_naive()))
        .map_err(|_| ApiError::invalid_field(field, format!("Invalid {}. Use YYYY-MM-DD", field)))
}

/// Page and limit the way every listing endpoint clamps them.
pub fn pagination(page: Option<i64>, limit: Option<i64>) -> (i64, i64, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(20).clamp(1, 100);
    let skip = u64::try_from((page - 1).saturating_mul(limit)).unwrap_or(u64::MAX);
    (page, limit, skip)
}

pub fn total_pages(total: u64, limit: i64) -> i64 {
    let limit = limit.max(1) as u64;
    total.div_ceil(limit) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_accept_plain_and_rfc3339() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(parse_date("2025-01-01", "startDate").unwrap(), expected);
        assert_eq!(parse_date("2025-01-01T00:00:00Z", "startDate").unwrap(), expected);

        let err = parse_date("01/01/2025", "startDate").unwrap_err();
        assert!(err.errors.unwrap().contains_key("startDate"));
    }

    #[test]
    fn object_ids_are_checked() {
        assert!(parse_object_id("65a1b2c3d4e5f60718293a4b", "id").is_ok());
        assert!(parse_object_id("not-an-id", "id").is_err());
    }

    #[test]
    fn pagination_is_clamped() {
        assert_eq!(pagination(None, None), (1, 20, 0));
        assert_eq!(pagination(Some(0), Some(500)), (1, 100, 0));
        assert_eq!(pagination(Some(3), Some(10)), (3, 10, 20));
        assert_eq!(pagination(Some(i64::MAX), Some(100)), (i64::MAX, 100, i64::MAX as u64));
        assert_eq!(pagination(Some(i64::MIN), Some(i64::MIN)), (1, 1, 0));
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(41, 20), 3);
    }
}
