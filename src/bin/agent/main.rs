use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use computer_use_agent::brain::Brain;
use computer_use_agent::config::{AgentConfig, BrowserConfig, ServiceConfig};
use computer_use_agent::hands::{BrowserCapability, HeadlessBrowser};
use computer_use_agent::types::{DEFAULT_MAX_TURNS, DEFAULT_MODEL};
use computer_use_agent::{Agent, Outcome};

/// Let a computer-use model operate a browser until it can answer your goal.
#[derive(Debug, Parser)]
#[command(name = "agent", version)]
struct Cli {
    /// Page to start from
    #[arg(value_parser = parse_url)]
    url: String,

    /// What the model should accomplish
    goal: String,

    #[arg(long, default_value_t = DEFAULT_MAX_TURNS, value_parser = parse_max_turns)]
    max_turns: usize,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Attach to a running Chrome (remote debugging URL) instead of launching one
    #[arg(long)]
    connect: Option<String>,

    /// Chrome executable to launch
    #[arg(long)]
    chrome: Option<PathBuf>,

    #[arg(long, default_value_t = 1024)]
    width: u32,

    #[arg(long, default_value_t = 768)]
    height: u32,

    /// Save every screenshot into this directory
    #[arg(long)]
    screenshots: Option<PathBuf>,

    /// Send pending safety checks back as acknowledged
    #[arg(long)]
    ack_safety_checks: bool,

    /// Pause between turns
    #[arg(long, default_value_t = 1000)]
    turn_delay_ms: u64,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_url(raw: &str) -> std::result::Result<String, String> {
    url::Url::parse(raw)
        .map(|_| raw.to_string())
        .map_err(|e| format!("invalid URL '{raw}': {e}"))
}

fn parse_max_turns(raw: &str) -> std::result::Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn init_logging(level: &str) -> Result<()> {
    let level: tracing::Level = level.parse().context("Invalid log level")?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string())))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(Outcome::Answer(answer)) => {
            println!("{answer}");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Exhausted { turns }) => {
            eprintln!("No answer after {turns} turns");
            ExitCode::from(2)
        }
        Ok(Outcome::Cancelled) => {
            eprintln!("Cancelled before an answer was produced");
            ExitCode::from(3)
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Outcome> {
    // Fail on a missing key before paying for a Chrome launch.
    let service = ServiceConfig::from_env()?.with_display(cli.width, cli.height);
    let brain = Brain::new(service)?;

    let browser_config = BrowserConfig {
        width: cli.width,
        height: cli.height,
        headless: !cli.headed,
        chrome_path: cli.chrome,
        ..Default::default()
    };
    let connect = cli.connect;
    let browser = tokio::task::spawn_blocking(move || match connect {
        Some(url) => HeadlessBrowser::connect(&url, &browser_config),
        None => HeadlessBrowser::launch(&browser_config),
    })
    .await
    .context("Browser launch panicked")??;
    let browser: Arc<dyn BrowserCapability> = Arc::new(browser);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping at the next turn");
            on_interrupt.cancel();
        }
    });

    let config = AgentConfig {
        model: cli.model,
        turn_delay: Duration::from_millis(cli.turn_delay_ms),
        acknowledge_safety_checks: cli.ack_safety_checks,
        screenshots_dir: cli.screenshots,
        ..Default::default()
    };
    let agent = Agent::new(Arc::new(brain), browser, config);

    let deadline = Instant::now() + Duration::from_secs(cli.timeout);
    let outcome = agent
        .run(&cancel, deadline, &cli.goal, &cli.url, cli.max_turns)
        .await?;
    Ok(outcome)
}
