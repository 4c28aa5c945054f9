mod input;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use railbook_core::{
    load_config, load_smtp_settings, validate_config, BrowserLauncher, CdpPage, Config,
    NotificationDispatcher, PageAutomation, ReservationSession, RunOutcome, SmtpNotifier,
};

/// Exit status when the run never started.
const EXIT_SETUP_FAILED: i32 = 2;

/// Keep retrying an SRT seat reservation until it goes through.
#[derive(Parser, Debug)]
#[command(name = "railbook", version, about)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, env = "RAILBOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Passenger request file (TOML); prompts interactively when absent
    #[arg(long)]
    request: Option<PathBuf>,

    /// Override the number of attempts
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Attach to this DevTools page WebSocket instead of opening a new page
    #[arg(long)]
    cdp_url: Option<String>,

    /// Run a launched browser headless
    #[arg(long)]
    headless: bool,

    /// Close the browser as soon as a reservation succeeds
    #[arg(long)]
    no_hold: bool,
}

#[tokio::main]
async fn main() {
    // .env first: clap reads RAILBOOK_CONFIG while parsing
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let code = match run(args).await {
        Ok(outcome) => exit_code(&outcome),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            EXIT_SETUP_FAILED
        }
    };
    std::process::exit(code);
}

fn exit_code(outcome: &RunOutcome) -> i32 {
    if outcome.is_reserved() {
        0
    } else {
        1
    }
}

async fn run(args: Args) -> Result<RunOutcome> {
    // Load configuration
    let mut config = load_config(args.config.as_deref()).context("Failed to load config")?;
    apply_overrides(&mut config, &args);
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        max_attempts = config.reservation.max_attempts,
        gate_timeout_ms = config.reservation.gate_timeout_ms,
        "Configuration loaded"
    );

    // Collect the passenger request before touching the browser
    let request = match &args.request {
        Some(path) => input::load_request(path)?,
        None => tokio::task::spawn_blocking(input::collect_request)
            .await
            .context("Input prompt task failed")??,
    };
    info!(
        journey = %request.journey_summary(),
        identity = request.identity.mode_name(),
        "Passenger request ready"
    );

    // Email notification, if SMTP is configured
    let dispatcher = match load_smtp_settings().context("Invalid SMTP settings")? {
        Some(settings) => {
            info!(host = %settings.host, port = settings.port, "Email notification enabled");
            let notifier = SmtpNotifier::new(&settings).context("Failed to create notifier")?;
            NotificationDispatcher::new(Some(Arc::new(notifier)))
        }
        None => {
            if request.notify_email.is_some() {
                warn!("SMTP settings are incomplete, no email will be sent");
            }
            NotificationDispatcher::disabled()
        }
    };

    // Browser
    let browser = BrowserLauncher::new(config.browser.clone())
        .start()
        .await
        .context("Failed to start browser")?;
    let page: Arc<dyn PageAutomation> = Arc::new(
        CdpPage::open(browser, &config.browser)
            .await
            .context("Failed to open page")?,
    );
    info!("Using page driver: {}", page.name());

    // Ctrl-C stops the attempts and ends the payment hold
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping");
            let _ = cancel_tx.send(true);
        }
    });

    let mut session = ReservationSession::new(config.reservation, page, dispatcher)
        .with_cancellation(cancel_rx);
    if args.no_hold {
        session = session.without_hold();
    }

    let outcome = session.run(&request).await;
    match &outcome {
        RunOutcome::Reserved { .. } => info!("{}", outcome),
        _ => error!("{}", outcome),
    }
    Ok(outcome)
}

/// Command-line flags win over file and environment settings.
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(max_attempts) = args.max_attempts {
        config.reservation.max_attempts = max_attempts;
    }
    if let Some(cdp_url) = &args.cdp_url {
        config.browser.cdp_url = Some(cdp_url.clone());
    }
    if args.headless {
        config.browser.headless = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railbook_core::ReservationError;
    use std::io::Write;

    #[test]
    fn test_overrides_replace_config_values() {
        let args = Args::parse_from([
            "railbook",
            "--max-attempts",
            "3",
            "--cdp-url",
            "ws://127.0.0.1:9222/devtools/page/ABC",
            "--headless",
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.reservation.max_attempts, 3);
        assert_eq!(
            config.browser.cdp_url.as_deref(),
            Some("ws://127.0.0.1:9222/devtools/page/ABC")
        );
        assert!(config.browser.headless);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::parse_from(["railbook"]);
        let mut config = Config::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.reservation.max_attempts, 10);
        assert!(config.browser.cdp_url.is_none());
        assert!(!args.no_hold);
    }

    #[test]
    fn test_config_path_from_env_file() {
        let mut env_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(env_file, "RAILBOOK_CONFIG=/etc/railbook-from-dotenv.toml").unwrap();
        dotenvy::from_path(env_file.path()).unwrap();

        let args = Args::parse_from(["railbook"]);
        assert_eq!(
            args.config.as_deref(),
            Some(std::path::Path::new("/etc/railbook-from-dotenv.toml"))
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&RunOutcome::Reserved { attempt: 4 }), 0);
        assert_eq!(
            exit_code(&RunOutcome::Aborted {
                attempt: 1,
                reason: ReservationError::Cancelled
            }),
            1
        );
    }
}
