use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - At least one attempt is allowed
/// - The gate timeout is not zero
/// - `reservation.initial_url` and `browser.debug_url` are http(s) URLs
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.reservation.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "reservation.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.reservation.gate_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "reservation.gate_timeout_ms cannot be 0".to_string(),
        ));
    }

    check_http_url("reservation.initial_url", &config.reservation.initial_url)?;
    check_http_url("browser.debug_url", &config.browser.debug_url)?;

    Ok(())
}

fn check_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::ValidationError(format!(
            "{field} must be an http(s) URL, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BrowserConfig, ReservationConfig};

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_attempts_fails() {
        let config = Config {
            reservation: ReservationConfig {
                max_attempts: 0,
                ..Default::default()
            },
            browser: BrowserConfig::default(),
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_gate_timeout_fails() {
        let config = Config {
            reservation: ReservationConfig {
                gate_timeout_ms: 0,
                ..Default::default()
            },
            browser: BrowserConfig::default(),
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_non_http_urls_fail() {
        let config = Config {
            reservation: ReservationConfig {
                initial_url: "file:///tmp/schedule.html".to_string(),
                ..Default::default()
            },
            browser: BrowserConfig::default(),
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("reservation.initial_url"));

        let config = Config {
            reservation: ReservationConfig::default(),
            browser: BrowserConfig {
                debug_url: "127.0.0.1:9222".to_string(),
                ..Default::default()
            },
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("browser.debug_url"));
    }
}
