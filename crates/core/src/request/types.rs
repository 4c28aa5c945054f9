//! Passenger request types.

use serde::{Deserialize, Serialize};

use super::validate::{
    normalize_time, validate_date, validate_email, validate_password, validate_phone,
    validate_required, ValidationError,
};

/// Everything the orchestrator needs to attempt one reservation.
///
/// Built once by the input layer and only ever read afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerRequest {
    /// Departure station name as typed into the search form.
    pub departure_station: String,
    /// Arrival station name as typed into the search form.
    pub arrival_station: String,
    /// Departure time, `HH:MM`.
    pub departure_time: String,
    /// Arrival time, `HH:MM`.
    pub arrival_time: String,
    /// Travel date, `YYYYMMDD`.
    pub travel_date: String,
    /// Checkout path and the credentials it needs.
    pub identity: IdentityMode,
    /// Where to send the outcome email, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_email: Option<String>,
}

/// Which checkout path the reservation goes through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IdentityMode {
    /// Guest checkout with a name, phone number and 5-digit password.
    Unregistered {
        name: String,
        phone: String,
        password: String,
    },
    /// Member checkout through the site's login form.
    LoggedIn {
        kind: LoginKind,
        identifier: String,
        password: String,
    },
}

/// Identifier type accepted by the member login form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginKind {
    MemberId,
    Email,
    Phone,
}

impl LoginKind {
    pub const ALL: [LoginKind; 3] = [LoginKind::MemberId, LoginKind::Email, LoginKind::Phone];

    pub fn label(self) -> &'static str {
        match self {
            LoginKind::MemberId => "membership number",
            LoginKind::Email => "email",
            LoginKind::Phone => "phone number",
        }
    }
}

impl std::fmt::Display for LoginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl IdentityMode {
    pub fn is_guest(&self) -> bool {
        matches!(self, IdentityMode::Unregistered { .. })
    }

    /// Short name used in logs.
    pub fn mode_name(&self) -> &'static str {
        match self {
            IdentityMode::Unregistered { .. } => "unregistered",
            IdentityMode::LoggedIn { .. } => "logged_in",
        }
    }
}

impl PassengerRequest {
    /// Check every field, normalising the two times to `HH:MM`.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        validate_required(&self.departure_station, "departure station")?;
        validate_required(&self.arrival_station, "arrival station")?;
        self.departure_station = self.departure_station.trim().to_string();
        self.arrival_station = self.arrival_station.trim().to_string();
        self.departure_time = normalize_time(&self.departure_time)?;
        self.arrival_time = normalize_time(&self.arrival_time)?;
        validate_date(&self.travel_date)?;

        match &self.identity {
            IdentityMode::Unregistered {
                name,
                phone,
                password,
            } => {
                validate_required(name, "passenger name")?;
                validate_phone(phone)?;
                validate_password(password)?;
            }
            IdentityMode::LoggedIn {
                kind,
                identifier,
                password,
            } => {
                validate_required(identifier, "login identifier")?;
                validate_required(password, "login password")?;
                match kind {
                    LoginKind::Email => validate_email(identifier)?,
                    LoginKind::Phone => validate_phone(identifier)?,
                    LoginKind::MemberId => {}
                }
            }
        }

        if let Some(email) = &self.notify_email {
            validate_required(email, "notification email")?;
            validate_email(email)?;
        }

        Ok(self)
    }

    /// The passenger name, if this is a guest reservation.
    pub fn passenger_name(&self) -> Option<&str> {
        match &self.identity {
            IdentityMode::Unregistered { name, .. } => Some(name),
            IdentityMode::LoggedIn { .. } => None,
        }
    }

    /// One-line summary of the journey, shared by logs and emails.
    pub fn journey_summary(&self) -> String {
        format!(
            "{} ({}) -> {} ({}) on {}",
            self.departure_station,
            self.departure_time,
            self.arrival_station,
            self.arrival_time,
            self.travel_date
        )
    }
}

/// Split a validated phone number into the 3/4/4 parts the guest form expects.
pub fn phone_parts(phone: &str) -> Result<[&str; 3], ValidationError> {
    validate_phone(phone)?;
    Ok([&phone[..3], &phone[3..7], &phone[7..]])
}
