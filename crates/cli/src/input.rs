//! Collecting the passenger request, from a file or interactively.

use std::path::Path;

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password, Select};

use railbook_core::request::{
    validate_date, validate_email, validate_password, validate_phone, validate_required,
    validate_time,
};
use railbook_core::{IdentityMode, LoginKind, PassengerRequest};

/// Load and validate a request written as TOML.
pub fn load_request(path: &Path) -> Result<PassengerRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {:?}", path))?;
    parse_request(&raw).with_context(|| format!("Invalid request file {:?}", path))
}

fn parse_request(raw: &str) -> Result<PassengerRequest> {
    let request: PassengerRequest = toml::from_str(raw).context("Failed to parse request")?;
    Ok(request.validated()?)
}

/// Prompt until the user confirms a reviewed request.
///
/// Blocks on the terminal; call from a blocking thread.
pub fn collect_request() -> Result<PassengerRequest> {
    let theme = ColorfulTheme::default();
    loop {
        let request = prompt_request(&theme)?.validated()?;

        println!();
        println!("{}", summary(&request));
        println!();

        let confirmed = Confirm::with_theme(&theme)
            .with_prompt("Start reserving with these details?")
            .default(true)
            .interact()?;
        if confirmed {
            return Ok(request);
        }
        println!("Let's try again.\n");
    }
}

fn prompt_request(theme: &ColorfulTheme) -> Result<PassengerRequest> {
    let departure_station = required(theme, "Departure station", "departure station")?;
    let arrival_station = required(theme, "Arrival station", "arrival station")?;
    let departure_time = Input::<String>::with_theme(theme)
        .with_prompt("Departure time (HHMM or HH:MM)")
        .validate_with(|v: &String| validate_time(v))
        .interact_text()?;
    let arrival_time = Input::<String>::with_theme(theme)
        .with_prompt("Arrival time (HHMM or HH:MM)")
        .validate_with(|v: &String| validate_time(v))
        .interact_text()?;
    let travel_date = Input::<String>::with_theme(theme)
        .with_prompt("Travel date (YYYYMMDD)")
        .validate_with(|v: &String| validate_date(v))
        .interact_text()?;

    let identity = prompt_identity(theme)?;

    let notify_email = Input::<String>::with_theme(theme)
        .with_prompt("Notification email (leave empty to skip)")
        .allow_empty(true)
        .validate_with(|v: &String| {
            if v.trim().is_empty() {
                Ok(())
            } else {
                validate_email(v)
            }
        })
        .interact_text()?;

    Ok(PassengerRequest {
        departure_station,
        arrival_station,
        departure_time,
        arrival_time,
        travel_date,
        identity,
        notify_email: Some(notify_email.trim().to_string()).filter(|e| !e.is_empty()),
    })
}

fn prompt_identity(theme: &ColorfulTheme) -> Result<IdentityMode> {
    let mode = Select::with_theme(theme)
        .with_prompt("Reserve as")
        .items(&["Guest (unregistered)", "Member (log in)"])
        .default(0)
        .interact()?;

    if mode == 0 {
        let name = required(theme, "Passenger name", "passenger name")?;
        let phone = Input::<String>::with_theme(theme)
            .with_prompt("Phone number (01012345678)")
            .validate_with(|v: &String| validate_phone(v))
            .interact_text()?;
        let password = Password::with_theme(theme)
            .with_prompt("Reservation password (5 digits)")
            .with_confirmation("Repeat password", "Passwords do not match")
            .validate_with(|v: &String| validate_password(v))
            .interact()?;
        return Ok(IdentityMode::Unregistered {
            name,
            phone,
            password,
        });
    }

    let labels: Vec<&str> = LoginKind::ALL.iter().map(|k| k.label()).collect();
    let choice = Select::with_theme(theme)
        .with_prompt("Log in with")
        .items(&labels)
        .default(0)
        .interact()?;
    let kind = LoginKind::ALL[choice];

    let identifier = Input::<String>::with_theme(theme)
        .with_prompt(format!("Login {}", kind.label()))
        .validate_with(move |v: &String| match kind {
            LoginKind::Email => validate_email(v),
            LoginKind::Phone => validate_phone(v),
            LoginKind::MemberId => validate_required(v, "membership number"),
        })
        .interact_text()?;
    let password = Password::with_theme(theme)
        .with_prompt("Login password")
        .interact()?;

    Ok(IdentityMode::LoggedIn {
        kind,
        identifier,
        password,
    })
}

fn required(theme: &ColorfulTheme, prompt: &str, field: &'static str) -> Result<String> {
    let value = Input::<String>::with_theme(theme)
        .with_prompt(prompt)
        .validate_with(move |v: &String| validate_required(v, field))
        .interact_text()?;
    Ok(value.trim().to_string())
}

fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

/// Human-readable review of a request with passwords masked.
pub fn summary(request: &PassengerRequest) -> String {
    let mut lines = vec![
        format!(
            "Journey:  {} {} -> {} {}",
            request.departure_station,
            request.departure_time,
            request.arrival_station,
            request.arrival_time
        ),
        format!("Date:     {}", request.travel_date),
    ];

    match &request.identity {
        IdentityMode::Unregistered {
            name,
            phone,
            password,
        } => {
            lines.push("Checkout: guest".to_string());
            lines.push(format!("Name:     {name}"));
            lines.push(format!("Phone:    {phone}"));
            lines.push(format!("Password: {}", mask(password)));
        }
        IdentityMode::LoggedIn {
            kind,
            identifier,
            password,
        } => {
            lines.push(format!("Checkout: member ({kind})"));
            lines.push(format!("Login:    {identifier}"));
            lines.push(format!("Password: {}", mask(password)));
        }
    }

    lines.push(format!(
        "Notify:   {}",
        request.notify_email.as_deref().unwrap_or("(none)")
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GUEST_TOML: &str = r#"
departure_station = "동탄"
arrival_station = "전주"
departure_time = "1037"
arrival_time = "12:07"
travel_date = "20250622"
notify_email = "me@example.com"

[identity]
mode = "unregistered"
name = "홍길동"
phone = "01012345678"
password = "12345"
"#;

    #[test]
    fn test_parse_request_normalises_times() {
        let request = parse_request(GUEST_TOML).unwrap();
        assert_eq!(request.departure_time, "10:37");
        assert_eq!(request.arrival_time, "12:07");
        assert!(request.identity.is_guest());
    }

    #[test]
    fn test_parse_member_request() {
        let raw = r#"
departure_station = "수서"
arrival_station = "부산"
departure_time = "08:00"
arrival_time = "10:30"
travel_date = "20250701"

[identity]
mode = "logged_in"
kind = "email"
identifier = "member@example.com"
password = "secret"
"#;
        let request = parse_request(raw).unwrap();
        assert!(matches!(
            request.identity,
            IdentityMode::LoggedIn {
                kind: LoginKind::Email,
                ..
            }
        ));
        assert_eq!(request.notify_email, None);
    }

    #[test]
    fn test_parse_request_rejects_invalid_fields() {
        let raw = GUEST_TOML.replace("01012345678", "0101234");
        assert!(parse_request(&raw).is_err());
    }

    #[test]
    fn test_load_request_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(GUEST_TOML.as_bytes()).unwrap();

        let request = load_request(file.path()).unwrap();
        assert_eq!(request.departure_station, "동탄");
    }

    #[test]
    fn test_load_missing_request_file() {
        let err = load_request(Path::new("/nonexistent/request.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read request file"));
    }

    #[test]
    fn test_summary_masks_passwords() {
        let request = parse_request(GUEST_TOML).unwrap();
        let text = summary(&request);

        assert!(text.contains("Password: *****"));
        assert!(!text.contains("12345"));
        assert!(text.contains("동탄 10:37 -> 전주 12:07"));
        assert!(text.contains("me@example.com"));
    }

    #[test]
    fn test_summary_for_member() {
        let request = PassengerRequest {
            identity: IdentityMode::LoggedIn {
                kind: LoginKind::Phone,
                identifier: "01098765432".to_string(),
                password: "hunter2".to_string(),
            },
            notify_email: None,
            ..parse_request(GUEST_TOML).unwrap()
        };
        let text = summary(&request);

        assert!(text.contains("Checkout: member (phone number)"));
        assert!(text.contains("Password: *******"));
        assert!(!text.contains("hunter2"));
        assert!(text.contains("Notify:   (none)"));
    }
}
