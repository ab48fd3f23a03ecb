#![warn(clippy::all, rust_2018_idioms)]

use anyhow::Context;
use awsconsole::app::collaborators::{LogNotifier, SystemBrowser};
use awsconsole::app::http_requester::ReqwestTransport;
use awsconsole::app::scheduler::RefreshScheduler;
use awsconsole::app::triggers::{self, ForegroundTriggers};
use awsconsole::{ConsoleConfig, ConsolePipeline, RunOutcome};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_BRANCH"),
    "@",
    env!("GIT_COMMIT"),
    ")"
);

const DEFAULT_LOG_FILTER: &str = "awsconsole=info,reqwest=warn,hyper=warn,cookie_store=warn";

/// How long in-flight runs get to finish after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(
    name = "awsconsole",
    version = VERSION,
    about = "Sign in to the AWS Console with this instance's IAM role"
)]
struct Cli {
    /// Path to config.json (defaults to the user config directory)
    #[arg(long, global = true, env = "AWSCONSOLE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in once and open the console in the default browser
    Open,
    /// Print a federated sign-in URL without using it
    SigninUrl,
    /// Refresh the session in the background; Enter or SIGUSR1 opens the console
    Daemon,
}

fn init_logging() -> anyhow::Result<Option<PathBuf>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::builder().parse(DEFAULT_LOG_FILTER))
        .context("Failed to parse log filter")?;

    let Some(proj_dirs) = directories::ProjectDirs::from("com", "", "awsconsole") else {
        // No home directory: log to stderr instead of a file
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber)
            .context("Failed to set tracing subscriber")?;
        tracing_log::LogTracer::init().context("Failed to initialize log-to-tracing bridge")?;
        return Ok(None);
    };

    let log_dir = proj_dirs.data_dir().join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;
    let log_path = log_dir.join("awsconsole.log");

    let file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    // Set restrictive permissions (owner read/write only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = file.metadata() {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            if let Err(e) = std::fs::set_permissions(&log_path, perms) {
                eprintln!("[SECURITY] Failed to set log file permissions: {}", e);
            }
        }
    }

    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false),
    );
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    // Bridge log crate events (reqwest, hyper) to tracing.
    // Must run after the subscriber is installed.
    tracing_log::LogTracer::init().context("Failed to initialize log-to-tracing bridge")?;

    Ok(Some(log_path))
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        let details = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("unknown panic");

        tracing::error!("Panic at {}: {}", location, details);
        eprintln!("awsconsole crashed at {}: {}", location, details);

        // The log file may not be set up yet, so keep a separate crash record
        let Some(proj_dirs) = directories::ProjectDirs::from("com", "", "awsconsole") else {
            return;
        };
        let log_dir = proj_dirs.data_dir().join("logs");
        let _ = std::fs::create_dir_all(&log_dir);
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(log_dir.join("crash.log"))
        {
            use std::io::Write;
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(file, "{} panic at {}: {}", timestamp, location, details);
        }
    }));
}

async fn open(pipeline: Arc<ConsolePipeline>) -> ExitCode {
    match pipeline.run(true).await {
        RunOutcome::Completed(_) => {
            println!("Opened the AWS Console in the default browser");
            ExitCode::SUCCESS
        }
        // Unreachable and role-not-found were already reported by the notifier
        RunOutcome::Failed(failure) if failure.is_user_visible() => ExitCode::FAILURE,
        outcome => {
            eprintln!("Console sign-in {}", outcome);
            ExitCode::FAILURE
        }
    }
}

async fn signin_url(pipeline: Arc<ConsolePipeline>) -> ExitCode {
    match pipeline.signin_url(true).await {
        RunOutcome::Completed(session) => {
            println!("{}", session.login_url);
            ExitCode::SUCCESS
        }
        RunOutcome::Failed(failure) if failure.is_user_visible() => ExitCode::FAILURE,
        outcome => {
            eprintln!("Sign-in URL {}", outcome);
            ExitCode::FAILURE
        }
    }
}

async fn daemon(pipeline: Arc<ConsolePipeline>) -> anyhow::Result<ExitCode> {
    let shutdown = CancellationToken::new();

    let scheduler = RefreshScheduler::new(pipeline.clone());
    tracing::info!("Refreshing every {:?}", scheduler.interval());
    let scheduler = scheduler.spawn(shutdown.clone());

    let foreground = ForegroundTriggers::new();
    triggers::spawn_keyboard_origin(foreground.sender());
    #[cfg(unix)]
    triggers::spawn_signal_origin(foreground.sender())
        .context("Failed to install SIGUSR1 handler")?;
    let listener = foreground.spawn(pipeline, shutdown.clone());

    println!("Press Enter to open the AWS Console, Ctrl-C to quit");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down");
    shutdown.cancel();
    let drain = async {
        let _ = scheduler.await;
        let _ = listener.await;
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        tracing::warn!("Runs still in flight after {:?}, exiting anyway", SHUTDOWN_GRACE);
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> anyhow::Result<ExitCode> {
    setup_panic_handler();

    let cli = Cli::parse();
    let log_path = init_logging()?;
    tracing::info!("awsconsole {} starting, log file: {:?}", VERSION, log_path);

    let config = ConsoleConfig::load(cli.config.as_deref());
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let result = runtime.block_on(async move {
        let transport = Arc::new(ReqwestTransport::new()?);
        let pipeline = Arc::new(ConsolePipeline::new(
            config,
            transport,
            Arc::new(LogNotifier),
            Arc::new(SystemBrowser),
        ));

        match cli.command {
            Command::Open => Ok(open(pipeline).await),
            Command::SigninUrl => Ok(signin_url(pipeline).await),
            Command::Daemon => daemon(pipeline).await,
        }
    });

    // The stdin reader sits on a blocking thread that never returns on its own
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}
