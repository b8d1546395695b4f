//! Date parsing for imports and forms

use crate::error::{CampusError, Result};
use chrono::{DateTime, NaiveDate};

/// Parses `dd/mm/yyyy` (import files and forms), falling back to ISO
/// `yyyy-mm-dd` and RFC 3339 timestamps.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let value = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%d/%m/%Y") {
        return Ok(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Ok(datetime.date_naive());
    }

    Err(CampusError::validation(format!("Date invalide: {}", value)))
}

/// Blank input means "no date".
pub fn parse_optional_date(input: Option<&str>) -> Result<Option<NaiveDate>> {
    match input.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_date(value).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_french_and_iso_dates() {
        let expected = NaiveDate::from_ymd_opt(1998, 3, 7).unwrap();
        assert_eq!(parse_date("07/03/1998").unwrap(), expected);
        assert_eq!(parse_date("7/3/1998").unwrap(), expected);
        assert_eq!(parse_date("1998-03-07").unwrap(), expected);
        assert_eq!(parse_date("1998-03-07T10:00:00Z").unwrap(), expected);
    }

    #[test]
    fn test_invalid_dates() {
        assert!(matches!(
            parse_date("31/02/2001"),
            Err(CampusError::Validation(_))
        ));
        assert!(parse_date("hier").is_err());
        assert_eq!(parse_optional_date(Some("  ")).unwrap(), None);
        assert_eq!(parse_optional_date(None).unwrap(), None);
    }
}
