//! Input normalisation shared by every service

use crate::error::{CampusError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,7})+$").expect("valid email regex")
});

/// Trimmed value, `None` when absent or blank.
pub fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trimmed non-blank value or a validation error carrying `message`.
pub fn required(value: Option<&str>, message: &str) -> Result<String> {
    clean(value).ok_or_else(|| CampusError::validation(message))
}

/// Lower-cased email, rejected when it does not look like an address.
pub fn email(value: Option<&str>) -> Result<Option<String>> {
    match clean(value) {
        None => Ok(None),
        Some(email) => {
            let email = email.to_lowercase();
            if EMAIL_RE.is_match(&email) {
                Ok(Some(email))
            } else {
                Err(CampusError::validation(format!("Email invalide: {}", email)))
            }
        }
    }
}

pub fn positive_amount(value: Option<f64>, message: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(CampusError::validation(message)),
    }
}

pub fn non_negative_amount(value: Option<f64>, message: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(CampusError::validation(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalisation() {
        assert_eq!(
            email(Some(" Jean.Kabila@INBTP.cd ")).unwrap().as_deref(),
            Some("jean.kabila@inbtp.cd")
        );
        assert!(email(Some("pas-une-adresse")).is_err());
        assert_eq!(email(Some("")).unwrap(), None);
    }

    #[test]
    fn test_required_and_amounts() {
        assert_eq!(required(Some("  KABILA "), "Nom requis").unwrap(), "KABILA");
        assert!(required(Some("   "), "Nom requis").is_err());
        assert!(positive_amount(Some(0.0), "Montant invalide").is_err());
        assert!(positive_amount(Some(f64::NAN), "Montant invalide").is_err());
        assert_eq!(non_negative_amount(Some(0.0), "Montant invalide").unwrap(), 0.0);
    }
}
