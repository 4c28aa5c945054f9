//! Field validators for passenger input.
//!
//! Every validator is a pure function over a raw string. A rejected value
//! comes back as a [`ValidationError`] whose message is shown to the user as-is.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex_lite::Regex;
use thiserror::Error;

/// Why a raw input value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("phone number must be 11 digits starting with 010 (e.g. 01012345678)")]
    Phone,

    #[error("time must be HHMM or HH:MM (e.g. 1037 or 10:37)")]
    TimeFormat,

    #[error("time {hour:02}:{minute:02} is out of range (hour 00-23, minute 00-59)")]
    TimeRange { hour: u32, minute: u32 },

    #[error("date must be 8 digits in YYYYMMDD form (e.g. 20250622)")]
    DateFormat,

    #[error("{0} is not a real calendar date")]
    DateInvalid(String),

    #[error("email address is not valid (e.g. example@gmail.com)")]
    Email,

    #[error("password must be exactly 5 digits")]
    Password,
}

/// Reject empty or whitespace-only values.
pub fn validate_required(value: &str, field: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// `010` followed by exactly eight digits.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    match phone.strip_prefix("010") {
        Some(rest) if rest.len() == 8 && all_ascii_digits(rest) => Ok(()),
        _ => Err(ValidationError::Phone),
    }
}

/// Accept `HHMM` or `HH:MM` with an in-range hour and minute.
pub fn validate_time(time: &str) -> Result<(), ValidationError> {
    normalize_time(time).map(|_| ())
}

/// Parse a time of day and return it in the `HH:MM` form used by the results table.
pub fn normalize_time(time: &str) -> Result<String, ValidationError> {
    let digits: String = match time.len() {
        4 => time.to_string(),
        5 if time.as_bytes()[2] == b':' => format!("{}{}", &time[..2], &time[3..]),
        _ => return Err(ValidationError::TimeFormat),
    };
    if !all_ascii_digits(&digits) {
        return Err(ValidationError::TimeFormat);
    }

    let hour: u32 = digits[..2].parse().map_err(|_| ValidationError::TimeFormat)?;
    let minute: u32 = digits[2..].parse().map_err(|_| ValidationError::TimeFormat)?;
    if hour > 23 || minute > 59 {
        return Err(ValidationError::TimeRange { hour, minute });
    }

    Ok(format!("{hour:02}:{minute:02}"))
}

/// Eight digits that name a real calendar day.
pub fn validate_date(date: &str) -> Result<(), ValidationError> {
    if date.len() != 8 || !all_ascii_digits(date) {
        return Err(ValidationError::DateFormat);
    }
    NaiveDate::parse_from_str(date, "%Y%m%d")
        .map(|_| ())
        .map_err(|_| ValidationError::DateInvalid(date.to_string()))
}

/// `local@domain.tld`, or empty since the address is optional.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() || email_regex().is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::Email)
    }
}

/// Exactly five ASCII digits.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.len() == 5 && all_ascii_digits(password) {
        Ok(())
    } else {
        Err(ValidationError::Password)
    }
}

fn all_ascii_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is valid")
    })
}
