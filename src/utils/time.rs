use chrono::{NaiveDate, Utc};
use mongodb::bson::DateTime;

pub fn to_chrono(dt: DateTime) -> chrono::DateTime<Utc> {
    chrono::DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or_default()
}

/// Calendar dates are stored as midnight UTC.
pub fn date_to_bson(date: NaiveDate) -> DateTime {
    let millis = date
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc().timestamp_millis())
        .unwrap_or_default();
    DateTime::from_millis(millis)
}

pub fn bson_to_date(dt: DateTime) -> NaiveDate {
    to_chrono(dt).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_dates_survive_storage() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(bson_to_date(date_to_bson(date)), date);
    }
}
