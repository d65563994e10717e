use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use uuid::Uuid;

use crate::errors::Error;
use crate::stats::{Observation, MAX_LUTEAL_PHASE_LENGTH};

pub const DEFAULT_TIMEZONE: &str = "America/New_York";
pub const DEFAULT_LUTEAL_PHASE_LENGTH: i32 = 14;
const MAX_TEXT_LENGTH: usize = 255;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub timezone: String,
    pub send_emails: bool,
    pub birth_date: Option<NaiveDate>,
    pub luteal_phase_length: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_send_emails")]
    pub send_emails: bool,
    pub birth_date: Option<NaiveDate>,
    #[serde(default = "default_luteal_phase_length")]
    pub luteal_phase_length: i32,
}

/// Partial profile update; absent fields are left unchanged.
///
/// Optional profile fields use `Option<Option<_>>`: absent keeps the value,
/// an explicit `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    #[serde(default, with = "double_option")]
    pub first_name: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub last_name: Option<Option<String>>,
    pub timezone: Option<String>,
    pub send_emails: Option<bool>,
    #[serde(default, with = "double_option")]
    pub birth_date: Option<Option<NaiveDate>>,
    pub luteal_phase_length: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Period {
    pub id: Uuid,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub first_day: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPeriod {
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub first_day: bool,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_send_emails() -> bool {
    true
}

fn default_luteal_phase_length() -> i32 {
    DEFAULT_LUTEAL_PHASE_LENGTH
}

impl From<&Period> for Observation {
    fn from(period: &Period) -> Self {
        Observation {
            timestamp: period.timestamp,
            first_day: period.first_day,
        }
    }
}

impl User {
    pub fn apply(&mut self, update: UserUpdate) {
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(first_name) = update.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            self.last_name = last_name;
        }
        if let Some(timezone) = update.timezone {
            self.timezone = timezone;
        }
        if let Some(send_emails) = update.send_emails {
            self.send_emails = send_emails;
        }
        if let Some(birth_date) = update.birth_date {
            self.birth_date = birth_date;
        }
        if let Some(luteal_phase_length) = update.luteal_phase_length {
            self.luteal_phase_length = luteal_phase_length;
        }
    }
}

impl NewUser {
    pub fn validate(&self, today: NaiveDate) -> Result<(), Error> {
        validate_email(&self.email)?;
        validate_optional_text("first_name", self.first_name.as_deref())?;
        validate_optional_text("last_name", self.last_name.as_deref())?;
        validate_timezone(&self.timezone)?;
        validate_birth_date(self.birth_date, today)?;
        validate_luteal_phase_length(self.luteal_phase_length)
    }
}

impl UserUpdate {
    pub fn validate(&self, today: NaiveDate) -> Result<(), Error> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        validate_optional_text("first_name", self.first_name.as_ref().and_then(Option::as_deref))?;
        validate_optional_text("last_name", self.last_name.as_ref().and_then(Option::as_deref))?;
        if let Some(timezone) = &self.timezone {
            validate_timezone(timezone)?;
        }
        validate_birth_date(self.birth_date.flatten(), today)?;
        match self.luteal_phase_length {
            Some(length) => validate_luteal_phase_length(length),
            None => Ok(()),
        }
    }
}

fn bad_request(message: impl Into<String>) -> Error {
    Error::BadRequest { message: message.into() }
}

/// Rejects null bytes, control characters and overlong values.
fn validate_text(field: &str, value: &str) -> Result<(), Error> {
    if value.chars().any(char::is_control) {
        return Err(bad_request(format!("{field} contains invalid control characters")));
    }
    if value.len() > MAX_TEXT_LENGTH {
        return Err(bad_request(format!(
            "{field} exceeds maximum length of {MAX_TEXT_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_optional_text(field: &str, value: Option<&str>) -> Result<(), Error> {
    value.map_or(Ok(()), |value| validate_text(field, value))
}

fn validate_email(email: &str) -> Result<(), Error> {
    validate_text("email", email)?;
    let Some((local, domain)) = email.split_once('@') else {
        return Err(bad_request("email must be a valid address"));
    };
    let domain_ok = domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.');
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) || domain.contains('@') {
        return Err(bad_request("email must be a valid address"));
    }
    Ok(())
}

fn validate_timezone(timezone: &str) -> Result<(), Error> {
    if timezone.trim().is_empty() {
        return Err(bad_request("timezone must not be empty"));
    }
    validate_text("timezone", timezone)
}

fn validate_birth_date(birth_date: Option<NaiveDate>, today: NaiveDate) -> Result<(), Error> {
    match birth_date {
        Some(date) if date > today => Err(bad_request("birth_date cannot be in the future")),
        _ => Ok(()),
    }
}

fn validate_luteal_phase_length(length: i32) -> Result<(), Error> {
    if !(1..=MAX_LUTEAL_PHASE_LENGTH).contains(&length) {
        return Err(bad_request(format!(
            "luteal_phase_length must be between 1 and {MAX_LUTEAL_PHASE_LENGTH} days"
        )));
    }
    Ok(())
}
