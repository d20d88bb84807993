use crate::error::ValidationError;
use crate::models::{Priority, Status, DATE_FORMAT};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

fn date_re() -> &'static Regex {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    DATE_RE.get_or_init(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").expect("valid date pattern"))
}

/// Parses a due date typed as `DD.MM.YYYY`.
///
/// Blank input means "no due date" and yields an empty string. Anything else
/// must name a real calendar day and comes back zero-padded, so `1.3.2024`
/// becomes `01.03.2024`.
pub fn parse_due_date(input: &str) -> Result<String, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(String::new());
    }

    let invalid = || ValidationError::InvalidDate(input.to_string());
    let caps = date_re().captures(input).ok_or_else(invalid)?;

    let day = caps[1].parse::<u32>().map_err(|_| invalid())?;
    let month = caps[2].parse::<u32>().map_err(|_| invalid())?;
    let year = caps[3].parse::<i32>().map_err(|_| invalid())?;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
    Ok(date.format(DATE_FORMAT).to_string())
}

pub fn parse_priority(code: &str) -> Result<Priority, ValidationError> {
    match code.trim() {
        "1" => Ok(Priority::Low),
        "2" => Ok(Priority::Medium),
        "3" => Ok(Priority::High),
        other => Err(ValidationError::InvalidPriority(other.to_string())),
    }
}

pub fn parse_status(code: &str) -> Result<Status, ValidationError> {
    match code.trim() {
        "1" => Ok(Status::Pending),
        "2" => Ok(Status::InProgress),
        "3" => Ok(Status::Done),
        other => Err(ValidationError::InvalidStatus(other.to_string())),
    }
}

pub fn parse_task_id(input: &str) -> Result<u32, ValidationError> {
    let input = input.trim();
    input
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidId(input.to_string()))
}

// Only an explicit yes confirms.
pub fn parse_confirmation(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}
