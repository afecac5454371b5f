//! Time manipulation utilities.

/// DateTime in UTC, the only timezone signing ever happens in.
pub type DateTime = chrono::DateTime<chrono::Utc>;

/// Return the current time in UTC.
pub fn now() -> DateTime {
    chrono::Utc::now()
}

/// Format a date in the scope format: `20220313`.
pub fn format_date(t: DateTime) -> String {
    t.format("%Y%m%d").to_string()
}

/// Format a timestamp in ISO 8601 basic format: `20220313T072004Z`.
pub fn format_iso8601(t: DateTime) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Parse a timestamp in ISO 8601 basic format: `20220313T072004Z`.
pub fn parse_iso8601(s: &str) -> crate::Result<DateTime> {
    let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%SZ")
        .map_err(|e| crate::Error::validation(format!("invalid timestamp: {s}")).with_source(e))?;
    Ok(DateTime::from_naive_utc_and_offset(naive, chrono::Utc))
}
