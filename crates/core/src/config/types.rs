use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub reservation: ReservationConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Attempt budget and the fixed pauses of the reservation flow.
///
/// Every pause is a plain millisecond count so tests can shrink them to zero.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReservationConfig {
    /// Attempts before giving up (default: 10)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Schedule search page opened before the first attempt
    #[serde(default = "default_initial_url")]
    pub initial_url: String,
    /// Pause after reloading between attempts
    #[serde(default = "default_long_settle_ms")]
    pub reload_settle_ms: u64,
    /// Pause after a failed attempt
    #[serde(default = "default_long_settle_ms")]
    pub retry_delay_ms: u64,
    /// Pause after submitting the search
    #[serde(default = "default_long_settle_ms")]
    pub search_settle_ms: u64,
    /// Longest wait for the queueing gate to clear
    #[serde(default = "default_gate_timeout_ms")]
    pub gate_timeout_ms: u64,
    /// Progress log interval while waiting on the gate
    #[serde(default = "default_gate_pulse_ms")]
    pub gate_pulse_ms: u64,
    #[serde(default = "default_short_settle_ms")]
    pub post_gate_settle_ms: u64,
    /// Pause between finding the train and pressing its reserve button
    #[serde(default = "default_long_settle_ms")]
    pub pre_reserve_settle_ms: u64,
    /// Pause before taking the guest checkout route
    #[serde(default = "default_short_settle_ms")]
    pub route_settle_ms: u64,
    /// Pause after submitting the login form
    #[serde(default = "default_login_settle_ms")]
    pub login_settle_ms: u64,
    /// How long the browser stays open after a reservation for payment
    #[serde(default = "default_hold_after_success_secs")]
    pub hold_after_success_secs: u64,
}

impl ReservationConfig {
    pub fn reload_settle(&self) -> Duration {
        Duration::from_millis(self.reload_settle_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn search_settle(&self) -> Duration {
        Duration::from_millis(self.search_settle_ms)
    }

    pub fn gate_timeout(&self) -> Duration {
        Duration::from_millis(self.gate_timeout_ms)
    }

    pub fn gate_pulse(&self) -> Duration {
        Duration::from_millis(self.gate_pulse_ms)
    }

    pub fn post_gate_settle(&self) -> Duration {
        Duration::from_millis(self.post_gate_settle_ms)
    }

    pub fn pre_reserve_settle(&self) -> Duration {
        Duration::from_millis(self.pre_reserve_settle_ms)
    }

    pub fn route_settle(&self) -> Duration {
        Duration::from_millis(self.route_settle_ms)
    }

    pub fn login_settle(&self) -> Duration {
        Duration::from_millis(self.login_settle_ms)
    }

    pub fn hold_after_success(&self) -> Duration {
        Duration::from_secs(self.hold_after_success_secs)
    }
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_url: default_initial_url(),
            reload_settle_ms: default_long_settle_ms(),
            retry_delay_ms: default_long_settle_ms(),
            search_settle_ms: default_long_settle_ms(),
            gate_timeout_ms: default_gate_timeout_ms(),
            gate_pulse_ms: default_gate_pulse_ms(),
            post_gate_settle_ms: default_short_settle_ms(),
            pre_reserve_settle_ms: default_long_settle_ms(),
            route_settle_ms: default_short_settle_ms(),
            login_settle_ms: default_login_settle_ms(),
            hold_after_success_secs: default_hold_after_success_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_initial_url() -> String {
    "https://etk.srail.kr/hpg/hra/01/selectScheduleList.do?pageId=TK0101010000".to_string()
}

fn default_long_settle_ms() -> u64 {
    3000
}

fn default_short_settle_ms() -> u64 {
    1000
}

fn default_gate_timeout_ms() -> u64 {
    60_000
}

fn default_gate_pulse_ms() -> u64 {
    5000
}

fn default_login_settle_ms() -> u64 {
    2000
}

fn default_hold_after_success_secs() -> u64 {
    600
}

/// Browser connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    /// WebSocket URL of an existing page target. Skips launching and discovery.
    #[serde(default)]
    pub cdp_url: Option<String>,
    /// DevTools HTTP endpoint (default: "http://127.0.0.1:9222")
    #[serde(default = "default_debug_url")]
    pub debug_url: String,
    /// Chrome binary to launch. When unset, a browser must already be listening on `debug_url`.
    #[serde(default)]
    pub executable: Option<PathBuf>,
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            cdp_url: None,
            debug_url: default_debug_url(),
            executable: None,
            headless: false,
            user_data_dir: None,
            startup_timeout_ms: default_startup_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
        }
    }
}

fn default_debug_url() -> String {
    "http://127.0.0.1:9222".to_string()
}

fn default_startup_timeout_ms() -> u64 {
    15_000
}

fn default_command_timeout_ms() -> u64 {
    30_000
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

/// Outgoing mail server, read from the process environment.
#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub sender: String,
    pub password: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_defaults() {
        let config = ReservationConfig::default();
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.gate_timeout(), Duration::from_secs(60));
        assert_eq!(config.reload_settle(), Duration::from_secs(3));
        assert_eq!(config.route_settle(), Duration::from_secs(1));
        assert_eq!(config.hold_after_success(), Duration::from_secs(600));
        assert!(config.initial_url.contains("selectScheduleList.do"));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.reservation.max_attempts, 10);
        assert_eq!(config.browser.debug_url, "http://127.0.0.1:9222");
        assert!(config.browser.cdp_url.is_none());
        assert!(!config.browser.headless);
    }

    #[test]
    fn test_smtp_debug_redacts_password() {
        let settings = SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            sender: "bot@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{settings:?}");
        assert!(debug.contains("smtp.example.com"));
        assert!(!debug.contains("hunter2"));
    }
}
