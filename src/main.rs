mod logging;

use anyhow::{bail, Context, Result};
use background_service::{Collaborators, CycleScheduler, EngagementController, EngagementPolicy};
use clap::Parser;
use database::Database;
use engager_core::{BotConfig, ErrorExt, SystemClock};
use llm_interface::{load_template, GeminiCli, LmStudioClient};
use reddit_client::RedditClient;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about = "Discovers Reddit threads and posts drafted replies", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Skip the startup checks against Gemini, Reddit and LM Studio
    #[arg(long)]
    skip_connection_checks: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = BotConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = logging::init_logging(&config.logging)?;

    info!("{}", "=".repeat(60));
    info!("Reddit User Engagement Bot");
    info!("{}", "=".repeat(60));
    info!(
        "Subreddit cooldown: {} days, thread cooldown: {} days",
        config.schedule.subreddit_cooldown_days, config.schedule.thread_cooldown_days
    );

    let database = Database::open(&config.database.path)
        .await
        .context("Failed to initialize database")?;

    let reddit = RedditClient::new(&config.reddit).context("Failed to create Reddit client")?;
    let gemini = GeminiCli::new(
        config.discovery.cli_path.clone(),
        Duration::from_secs(config.discovery.timeout_secs),
    );
    let response_template = load_template(&config.generation.prompt_file)?;
    let lm_studio = LmStudioClient::new(&config.generation, &response_template)
        .context("Failed to create LM Studio client")?;
    let discovery_prompt = load_template(&config.discovery.prompt_file)?;

    if cli.skip_connection_checks {
        warn!("Skipping connection checks");
    } else {
        check_connections(&gemini, &reddit, &lm_studio).await?;
    }

    let controller = EngagementController::new(
        Collaborators {
            discovery: gemini,
            lookup: reddit.clone(),
            generator: lm_studio,
            poster: reddit,
        },
        database.clone(),
        discovery_prompt,
        EngagementPolicy::from_schedule(&config.schedule),
    )?;
    let (mut scheduler, stop) =
        CycleScheduler::new(controller, SystemClock, config.schedule.check_interval());

    if cli.once {
        scheduler.run_once().await;
    } else {
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, stopping after the current phase...");
            stop.stop();
        });
        scheduler.run().await;
    }

    database.close().await;
    info!("Bot shutdown complete");
    Ok(())
}

async fn check_connections(
    gemini: &GeminiCli,
    reddit: &RedditClient,
    lm_studio: &LmStudioClient,
) -> Result<()> {
    info!("Testing connections...");
    let mut failed = Vec::new();

    if let Err(e) = gemini.check_connection().await {
        error!("Gemini CLI check failed: {}", e.user_friendly_message());
        e.log_error();
        failed.push("Gemini CLI");
    }
    if let Err(e) = reddit.check_connection().await {
        error!("Reddit check failed: {}", e.user_friendly_message());
        e.log_error();
        failed.push("Reddit");
    }
    if let Err(e) = lm_studio.check_connection().await {
        error!("LM Studio check failed: {}", e.user_friendly_message());
        e.log_error();
        failed.push("LM Studio");
    }

    if !failed.is_empty() {
        bail!("Connection checks failed: {}", failed.join(", "));
    }
    info!("All connections successful");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
