//! Firmdesk - console for the advisory platform
//!
//! A CLI that signs in to the platform API, lists the clients visible to
//! the user's role and watches AI diagnostics until their reports are
//! generated.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (connection, config, authentication, etc.)
//!   2 - Client listing produced in degraded mode (upstream fetch failed)

mod aggregation;
mod api;
mod cli;
mod config;
mod models;
mod navigation;
mod polling;
mod report;
mod session;

use aggregation::ClientAggregator;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, Command, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use models::{ClientsReport, ListingSummary, ReportMetadata};
use navigation::Section;
use polling::{DiagnosticPoller, PollSchedule};
use session::Session;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so `[general] verbose` applies
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("Firmdesk v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .firmdesk.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the API URL, token file, polling intervals and output.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Sign in and dispatch the command. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let Some(command) = args.command.clone() else {
        bail!("No command given");
    };

    let token = session::resolve_token(args.token.as_deref(), config.api.token_file.as_deref())?;
    let session = Session::open(config.api_client_config(), &token).await?;

    match command {
        Command::Clients { output, .. } => run_clients(&session, &config, output).await,
        Command::Diagnostics {
            engagement,
            submit,
            once,
            output,
            ..
        } => {
            run_diagnostics(
                &session,
                &config,
                &engagement,
                submit.as_deref(),
                once,
                output,
                args.quiet,
            )
            .await
        }
        Command::Download {
            diagnostic,
            file,
            dir,
        } => {
            let dir = dir.unwrap_or_else(|| config.output.download_dir.clone());
            let path = session
                .api
                .download_file(&diagnostic, &file, &dir)
                .await
                .with_context(|| format!("Failed to download file {}", file))?;
            println!("✅ Saved {}", path.display());
            Ok(0)
        }
        Command::Nav => run_nav(&session, &config),
    }
}

/// `clients`: aggregate the role-visible client list and report it.
async fn run_clients(session: &Session, config: &Config, output: Option<PathBuf>) -> Result<i32> {
    let start_time = Instant::now();

    if !navigation::can_access(session.user.role, Section::Clients) {
        info!(
            "{} accounts have no client directory; listing clients from engagements",
            session.user.role
        );
    }

    let aggregator = ClientAggregator::new(session.api.clone(), &session.user);

    let (_, stats) = tokio::join!(aggregator.refresh(), session.api.dashboard_stats());
    let stats = match stats {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!("Dashboard stats unavailable: {}", e);
            None
        }
    };

    let listing = aggregator.listing().await;
    let summary = ListingSummary::from_clients(&listing.clients);

    let report = ClientsReport {
        metadata: ReportMetadata {
            api_url: session.api.base_url().to_string(),
            generated_at: Utc::now(),
            user_name: session.user.name.clone(),
            role: session.user.role,
            strategy: listing.strategy.name().to_string(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        summary: summary.clone(),
        clients: listing.clients,
        stats,
        error: listing.error,
    };

    let content = match config.output.format {
        OutputFormat::Json => report::generate_json(&report)?,
        OutputFormat::Markdown => report::generate_clients_markdown(&report),
    };

    let target = output.or_else(|| config.output.clients_report.clone());
    report::write_output(&content, target.as_deref())?;

    if let Some(path) = target {
        println!(
            "\n✅ {} clients ({} active, {} pending). Report saved to: {}",
            summary.total,
            summary.active,
            summary.pending,
            path.display()
        );
    }

    if let Some(ref e) = report.error {
        eprintln!(
            "\n⛔ Client list could not be loaded ({}). Exiting with code 2.",
            e
        );
        return Ok(2);
    }

    Ok(0)
}

/// `diagnostics`: load, optionally submit, then watch until nothing is processing.
async fn run_diagnostics(
    session: &Session,
    config: &Config,
    engagement_id: &str,
    submit: Option<&str>,
    once: bool,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<i32> {
    if !navigation::can_access(session.user.role, Section::Diagnostics) {
        bail!(
            "Diagnostics are not available to {} accounts",
            session.user.role
        );
    }

    let schedule = PollSchedule::from(&config.polling);
    let poller = Arc::new(DiagnosticPoller::new(
        session.api.clone(),
        engagement_id,
        schedule,
    ));

    poller
        .load()
        .await
        .with_context(|| format!("Failed to load diagnostics for engagement {}", engagement_id))?;

    if let Some(id) = submit {
        poller
            .submit(id)
            .await
            .with_context(|| format!("Failed to submit diagnostic {}", id))?;
        println!("📤 Submitted diagnostic {}", id);
    }

    if !once {
        watch_until_settled(&poller, quiet).await;
    }

    let snapshot = poller.snapshot();
    let content = match config.output.format {
        OutputFormat::Json => report::generate_json(&snapshot)?,
        OutputFormat::Markdown => report::generate_diagnostics_markdown(engagement_id, &snapshot),
    };

    let target = output.or_else(|| config.output.diagnostics_report.clone());
    report::write_output(&content, target.as_deref())?;

    if let Some(path) = target {
        println!(
            "\n✅ {} files listed. Report saved to: {}",
            snapshot.files.len(),
            path.display()
        );
    }

    Ok(0)
}

/// Run the poll loop and show a spinner until no diagnostic is processing
/// or the user interrupts.
async fn watch_until_settled(poller: &Arc<DiagnosticPoller>, quiet: bool) {
    let mut updates = poller.subscribe();
    let handle = poller.spawn();

    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    loop {
        let processing = updates.borrow_and_update().processing;
        if processing == 0 {
            break;
        }
        spinner.set_message(format!("{} diagnostic(s) processing...", processing));

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() || !handle.is_running() {
                    warn!("Poller stopped unexpectedly");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping the poller");
                break;
            }
        }
    }

    spinner.finish_and_clear();
    handle.stop().await;
}

/// `nav`: print the dashboard sections the user may open.
fn run_nav(session: &Session, config: &Config) -> Result<i32> {
    let sections = navigation::sections_for(session.user.role);

    let content = match config.output.format {
        OutputFormat::Json => {
            let entries: Vec<report::NavigationEntry> =
                sections.iter().copied().map(Into::into).collect();
            report::generate_json(&entries)?
        }
        OutputFormat::Markdown => report::generate_navigation_markdown(&session.user, &sections),
    };

    report::write_output(&content, None)?;
    Ok(0)
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is initialized, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
