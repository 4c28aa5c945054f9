use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError, SmtpSettings};

/// Load configuration: built-in defaults, then the TOML file (if given), then
/// `RAILBOOK_` environment variables (`RAILBOOK_RESERVATION__MAX_ATTEMPTS=3`).
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(Env::prefixed("RAILBOOK_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// SMTP settings from `SMTP_HOST`, `SMTP_PORT`, `SENDER_EMAIL` and
/// `SENDER_PASSWORD`. `None` when any of them is unset.
pub fn load_smtp_settings() -> Result<Option<SmtpSettings>, ConfigError> {
    smtp_settings_from(|key| std::env::var(key).ok())
}

pub(crate) fn smtp_settings_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<SmtpSettings>, ConfigError> {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let (Some(host), Some(port), Some(sender), Some(password)) = (
        get("SMTP_HOST"),
        get("SMTP_PORT"),
        get("SENDER_EMAIL"),
        get("SENDER_PASSWORD"),
    ) else {
        return Ok(None);
    };

    let port = port.trim().parse::<u16>().map_err(|_| {
        ConfigError::ValidationError(format!("SMTP_PORT is not a port number: {port}"))
    })?;

    Ok(Some(SmtpSettings {
        host: host.trim().to_string(),
        port,
        sender: sender.trim().to_string(),
        password,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[reservation]
max_attempts = 3
gate_timeout_ms = 1000

[browser]
headless = true
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.reservation.max_attempts, 3);
        assert_eq!(config.reservation.gate_timeout_ms, 1000);
        assert_eq!(config.reservation.retry_delay_ms, 3000);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let toml = r#"
[reservation]
max_attempts = "many"
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Some(Path::new("/nonexistent/railbook.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[browser]
debug_url = "http://127.0.0.1:9333"
executable = "/usr/bin/chromium"
"#
        )
        .unwrap();

        let config = load_config(Some(temp_file.path())).unwrap();
        assert_eq!(config.browser.debug_url, "http://127.0.0.1:9333");
        assert_eq!(
            config.browser.executable.as_deref(),
            Some(Path::new("/usr/bin/chromium"))
        );
        assert_eq!(config.reservation.max_attempts, 10);
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "railbook.toml",
                r#"
[reservation]
max_attempts = 4
"#,
            )?;
            jail.set_env("RAILBOOK_RESERVATION__MAX_ATTEMPTS", "7");
            jail.set_env("RAILBOOK_BROWSER__CDP_URL", "ws://127.0.0.1:9222/devtools/page/A");

            let config = load_config(Some(Path::new("railbook.toml"))).unwrap();
            assert_eq!(config.reservation.max_attempts, 7);
            assert_eq!(
                config.browser.cdp_url.as_deref(),
                Some("ws://127.0.0.1:9222/devtools/page/A")
            );
            Ok(())
        });
    }

    #[test]
    fn test_defaults_without_file() {
        figment::Jail::expect_with(|_jail| {
            let config = load_config(None).unwrap();
            assert_eq!(config.reservation.max_attempts, 10);
            assert_eq!(config.browser.debug_url, "http://127.0.0.1:9222");
            Ok(())
        });
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_smtp_settings_complete() {
        let vars = env(&[
            ("SMTP_HOST", "smtp.gmail.com"),
            ("SMTP_PORT", "587"),
            ("SENDER_EMAIL", "bot@example.com"),
            ("SENDER_PASSWORD", "0123"),
        ]);
        let settings = smtp_settings_from(|k| vars.get(k).cloned())
            .unwrap()
            .unwrap();
        assert_eq!(settings.host, "smtp.gmail.com");
        assert_eq!(settings.port, 587);
        assert_eq!(settings.password, "0123");
    }

    #[test]
    fn test_smtp_settings_missing_value_disables() {
        let vars = env(&[
            ("SMTP_HOST", "smtp.gmail.com"),
            ("SMTP_PORT", "587"),
            ("SENDER_EMAIL", "bot@example.com"),
        ]);
        assert!(smtp_settings_from(|k| vars.get(k).cloned())
            .unwrap()
            .is_none());

        let vars = env(&[
            ("SMTP_HOST", ""),
            ("SMTP_PORT", "587"),
            ("SENDER_EMAIL", "bot@example.com"),
            ("SENDER_PASSWORD", "secret"),
        ]);
        assert!(smtp_settings_from(|k| vars.get(k).cloned())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_smtp_settings_bad_port() {
        let vars = env(&[
            ("SMTP_HOST", "smtp.gmail.com"),
            ("SMTP_PORT", "submission"),
            ("SENDER_EMAIL", "bot@example.com"),
            ("SENDER_PASSWORD", "secret"),
        ]);
        let err = smtp_settings_from(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
