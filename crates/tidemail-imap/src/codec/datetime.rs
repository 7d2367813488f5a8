//! IMAP date-time formatting and parsing.
//!
//! The `date-time` grammar of RFC 3501: `"dd-Mon-yyyy hh:mm:ss +zzzz"` with
//! a space-padded day. Used by APPEND (INTERNALDATE argument), FETCH
//! responses and ID value normalization.

use chrono::{DateTime, FixedOffset};

/// Formats a timestamp as an IMAP date-time (without the surrounding quotes).
#[must_use]
pub fn format_datetime(datetime: &DateTime<FixedOffset>) -> String {
    datetime.format("%e-%b-%Y %H:%M:%S %z").to_string()
}

/// Parses an IMAP date-time string (as found in INTERNALDATE).
#[must_use]
pub fn parse_datetime(input: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(input.trim_start(), "%d-%b-%Y %H:%M:%S %z").ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_space_padded_day() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let dt = offset.with_ymd_and_hms(2024, 1, 5, 12, 30, 0).unwrap();
        assert_eq!(format_datetime(&dt), " 5-Jan-2024 12:30:00 +0000");
    }

    #[test]
    fn formats_two_digit_day() {
        let offset = FixedOffset::east_opt(3600).unwrap();
        let dt = offset.with_ymd_and_hms(2023, 12, 25, 23, 59, 59).unwrap();
        assert_eq!(format_datetime(&dt), "25-Dec-2023 23:59:59 +0100");
    }

    #[test]
    fn parses_either_day_padding() {
        let parsed = parse_datetime(" 5-Jan-2024 12:30:00 +0000").unwrap();
        assert_eq!(parsed.timestamp(), 1_704_457_800);
        let parsed = parse_datetime("05-Jan-2024 12:30:00 +0000").unwrap();
        assert_eq!(parsed.timestamp(), 1_704_457_800);
    }

    #[test]
    fn round_trips() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let dt = offset.with_ymd_and_hms(2022, 7, 4, 8, 15, 30).unwrap();
        assert_eq!(parse_datetime(&format_datetime(&dt)).unwrap(), dt);
    }
}
