//! Common validation utilities.

use chrono::{DateTime, Utc};
use validator::ValidationError;

/// Validates that a phone number looks like E.164: a leading `+` followed by
/// 7 to 15 digits.
pub fn validate_phone_number(phone: &str) -> Result<(), ValidationError> {
    let digits = match phone.strip_prefix('+') {
        Some(rest) => rest,
        None => {
            let mut err = ValidationError::new("phone_format");
            err.message = Some("Phone number must start with '+'".into());
            return Err(err);
        }
    };

    if (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone_format");
        err.message = Some("Phone number must be 7-15 digits in E.164 format".into());
        Err(err)
    }
}

/// Validates that a username is 3-32 characters of lowercase alphanumerics,
/// underscores, or dots.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.');

    if (3..=32).contains(&username.len()) && valid_chars {
        Ok(())
    } else {
        let mut err = ValidationError::new("username_format");
        err.message =
            Some("Username must be 3-32 lowercase letters, digits, '_' or '.'".into());
        Err(err)
    }
}

/// Validates that an expiry timestamp lies in the future.
pub fn validate_future_timestamp(ts: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *ts > Utc::now() {
        Ok(())
    } else {
        let mut err = ValidationError::new("expiry_in_past");
        err.message = Some("Expiry must be in the future".into());
        Err(err)
    }
}
