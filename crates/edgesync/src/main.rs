// # edgesync - one-shot settings applier
//
// This binary is a THIN integration layer only:
// - No reconciliation, template or dispatch logic lives here
// - All of that is in edgesync-core
// - Process configuration is via environment variables only; the settings
//   template and domain list come from the JSON document they point at
//
// The binary is responsible for:
// 1. Reading configuration from environment variables
// 2. Loading the configuration document
// 3. Initializing logging and the runtime
// 4. Building the Cloudflare provider and running every zone once
//
// ## Configuration
//
// - `EDGESYNC_CONFIG`: Path to the JSON configuration document (required)
// - `EDGESYNC_API_TOKEN`: Account API token (overrides `account.token`)
// - `EDGESYNC_AUTH_EMAIL`: Account email (overrides `account.email`)
// - `EDGESYNC_AUTH_KEY`: Global API key (overrides `account.key`)
// - `EDGESYNC_PACING_MS`: Delay before each sequential provider call
// - `EDGESYNC_DOMAINS`: Comma-separated list; only these domains are applied
// - `EDGESYNC_MODE`: `live` (default) or `dry-run`
// - `EDGESYNC_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export EDGESYNC_CONFIG=/etc/edgesync/zones.json
// export EDGESYNC_API_TOKEN=your_token
// export EDGESYNC_MODE=dry-run
//
// edgesync
// ```

use anyhow::{Context, Result};
use edgesync_core::{AccountCredentials, ApplyConfig, RunReport, Runner};
use edgesync_provider_cloudflare::CloudflareProvider;
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Every zone, setting and item succeeded
/// - 1: Configuration or startup error (nothing was applied)
/// - 2: Runtime error (unexpected, or interrupted by a signal)
/// - 3: The run finished but reported at least one failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgesyncExitCode {
    Clean = 0,
    ConfigError = 1,
    RuntimeError = 2,
    RunFailures = 3,
}

impl From<EdgesyncExitCode> for ExitCode {
    fn from(code: EdgesyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl EdgesyncExitCode {
    fn for_report(report: &RunReport) -> Self {
        if report.is_clean() {
            EdgesyncExitCode::Clean
        } else {
            EdgesyncExitCode::RunFailures
        }
    }
}

/// Process configuration
struct Config {
    config_path: String,
    api_token: Option<String>,
    auth_email: Option<String>,
    auth_key: Option<String>,
    pacing_ms: Option<u64>,
    domains: Option<Vec<String>>,
    dry_run: bool,
    log_level: Level,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let config_path = env::var("EDGESYNC_CONFIG").context(
            "EDGESYNC_CONFIG is required. \
            Set it via: export EDGESYNC_CONFIG=/etc/edgesync/zones.json",
        )?;

        let pacing_ms = match non_empty_var("EDGESYNC_PACING_MS") {
            Some(raw) => Some(raw.parse().with_context(|| {
                format!("EDGESYNC_PACING_MS must be a whole number of milliseconds. Got: {}", raw)
            })?),
            None => None,
        };

        Ok(Self {
            config_path,
            api_token: non_empty_var("EDGESYNC_API_TOKEN"),
            auth_email: non_empty_var("EDGESYNC_AUTH_EMAIL"),
            auth_key: non_empty_var("EDGESYNC_AUTH_KEY"),
            pacing_ms,
            domains: non_empty_var("EDGESYNC_DOMAINS").map(|raw| parse_domains(&raw)),
            dry_run: parse_mode(&env::var("EDGESYNC_MODE").unwrap_or_default())?,
            log_level: parse_log_level(
                &env::var("EDGESYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            )?,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.config_path.trim().is_empty() {
            anyhow::bail!("EDGESYNC_CONFIG cannot be empty");
        }

        if self.auth_email.is_some() != self.auth_key.is_some() {
            anyhow::bail!(
                "EDGESYNC_AUTH_EMAIL and EDGESYNC_AUTH_KEY must be set together. \
                Prefer EDGESYNC_API_TOKEN for scoped access."
            );
        }

        if self.domains.as_ref().is_some_and(Vec::is_empty) {
            anyhow::bail!("EDGESYNC_DOMAINS is set but names no domain");
        }

        Ok(())
    }

    /// Load the configuration document and apply environment overrides
    fn load_document(&self) -> Result<ApplyConfig> {
        let mut document = ApplyConfig::from_file(&self.config_path)
            .with_context(|| format!("failed to load {}", self.config_path))?;

        if self.api_token.is_some() || self.auth_email.is_some() {
            document.account = AccountCredentials {
                email: self.auth_email.clone(),
                key: self.auth_key.clone(),
                token: self.api_token.clone(),
            };
        }

        if let Some(pacing_ms) = self.pacing_ms {
            document.pacing_ms = pacing_ms;
        }

        Ok(document)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_domains(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_mode(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "" | "live" => Ok(false),
        "dry-run" => Ok(true),
        other => anyhow::bail!(
            "EDGESYNC_MODE '{}' is not valid. Valid modes: live, dry-run",
            other
        ),
    }
}

fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "EDGESYNC_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return EdgesyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return EdgesyncExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return EdgesyncExitCode::ConfigError.into();
    }

    let runner = match build_runner(&config) {
        Ok(runner) => runner,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return EdgesyncExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return EdgesyncExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        tokio::select! {
            report = runner.run() => {
                if !report.is_clean() {
                    warn!("Run finished with {} failure(s)", report.failure_count());
                }
                EdgesyncExitCode::for_report(&report)
            }
            interrupted = wait_for_shutdown() => {
                match interrupted {
                    Ok(signal) => warn!("Received {}, run interrupted", signal),
                    Err(e) => error!("Signal handling failed: {:#}", e),
                }
                EdgesyncExitCode::RuntimeError
            }
        }
    });

    code.into()
}

/// Load the document, build the provider and the runner
fn build_runner(config: &Config) -> Result<Runner> {
    let document = config.load_document()?;

    info!(
        "Configuration loaded: {} domain(s), {} setting key(s)",
        document.domains.len(),
        document.settings.as_object().map_or(0, |s| s.len())
    );

    let provider = CloudflareProvider::new(config.dry_run)?;
    if provider.is_dry_run() {
        warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
    }

    let mut runner = Runner::new(Box::new(provider), document)?;
    if let Some(domains) = &config.domains {
        runner = runner.with_domain_filter(domains.clone());
    }

    Ok(runner)
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
