pub mod automation;
pub mod config;
pub mod notify;
pub mod request;
pub mod reservation;
pub mod testing;

pub use automation::{
    AutomationError, BrowserLauncher, CdpPage, DialogPolicy, ElementHandle, Key, PageAutomation,
};
pub use config::{
    load_config, load_config_from_str, load_smtp_settings, validate_config, BrowserConfig, Config,
    ConfigError, ReservationConfig, SmtpSettings,
};
pub use notify::{
    compose_message, EmailMessage, NotificationDispatcher, Notifier, NotifyError, SmtpNotifier,
};
pub use request::{IdentityMode, LoginKind, PassengerRequest, ValidationError};
pub use reservation::{
    AttemptResult, ReservationError, ReservationOrchestrator, ReservationSession, RunOutcome,
};
