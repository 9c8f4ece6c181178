use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use uuid::Uuid;

use crate::errors::AppError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
        .expect("email pattern is valid")
});

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

/// Trims and validates an email, returning the trimmed form.
pub fn require_email(field: &str, email: &str) -> Result<String, AppError> {
    let email = email.trim();
    if is_valid_email(email) {
        Ok(email.to_string())
    } else {
        Err(AppError::Validation(format!("{field}: value is not a valid email address")))
    }
}

pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        Err(AppError::Validation(format!("{field}: must not be empty")))
    } else {
        Ok(())
    }
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid {field} format. Use YYYY-MM-DD")))
}

/// Path ids that are not UUIDs cannot name a stored row, so they read as 404.
pub fn parse_path_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::NotFound(format!("{what} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("jane.doe+visa@example.co.uk"));
        assert!(!is_valid_email("jane@"));
        assert!(!is_valid_email("not an email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_require_email_trims() {
        assert_eq!(require_email("email", "  a@b.ca ").unwrap(), "a@b.ca");
        assert!(require_email("email", "nope").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("birth_date", "1990-02-28").unwrap(),
            NaiveDate::from_ymd_opt(1990, 2, 28).unwrap()
        );
        assert!(parse_date("birth_date", "28/02/1990").is_err());
        assert!(parse_date("birth_date", "1990-02-30").is_err());
    }

    #[test]
    fn test_malformed_path_id_is_not_found() {
        assert!(matches!(
            parse_path_id("not-a-uuid", "Report"),
            Err(AppError::NotFound(msg)) if msg == "Report not found"
        ));
        let id = Uuid::new_v4();
        assert_eq!(parse_path_id(&id.to_string(), "Report").unwrap(), id);
    }
}
