//! Date helper functions

use chrono::{DateTime, TimeZone, Utc};

/// RFC 822 date as used by RSS, always rendered in GMT
///
/// # Examples
/// ```ignore
/// rfc822(&date) // -> "Fri, 01 Mar 2024 00:00:00 GMT"
/// ```
pub fn rfc822<Tz: TimeZone>(date: &DateTime<Tz>) -> String {
    date.with_timezone(&Utc)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Format a date in ISO 8601 / XML format
pub fn date_xml<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Format date in full format (like "January 15, 2024")
pub fn full_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%B %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_rfc822_converts_to_gmt() {
        let date = DateTime::parse_from_rfc3339("2024-03-01T02:00:00+02:00").unwrap();
        assert_eq!(rfc822(&date), "Fri, 01 Mar 2024 00:00:00 GMT");
    }

    #[test]
    fn test_full_date() {
        let date = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 5, 10, 30, 0)
            .unwrap();
        assert_eq!(full_date(&date), "January 5, 2024");
        assert_eq!(date_xml(&date), "2024-01-05T10:30:00+00:00");
    }
}
