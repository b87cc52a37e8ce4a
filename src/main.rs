use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use wabot::{BotError, cli, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file before anything else (silently ignore if missing)
    dotenvy::dotenv().ok();

    let cli_args = cli::Cli::parse();
    let config = cli::load_config(cli_args.config.as_deref())?;

    let mut log_config = logging::LogConfig::new()
        .with_level(config.logging.level.clone())
        .with_debug_mode(cli_args.debug);
    if let Some(dir) = &config.logging.dir {
        log_config = log_config.with_log_dir(dir.clone());
    }

    let guard = logging::init_logging(log_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    // Clean up old log files (keep last 7 days)
    let log_dir = config.logging.dir.clone().unwrap_or_else(|| PathBuf::from("logs"));
    if let Ok(removed) = logging::cleanup_old_logs(&log_dir, 7)
        && removed > 0
    {
        tracing::info!("Cleaned up {} old log file(s)", removed);
    }

    match cli::run(cli_args, config).await {
        Ok(()) => Ok(()),
        Err(e) if matches!(e.downcast_ref::<BotError>(), Some(BotError::LoggedOut)) => {
            tracing::error!("{}", e);
            eprintln!("WhatsApp session logged out. Remove the session database and pair again.");
            drop(guard);
            std::process::exit(2);
        }
        Err(e) => Err(e),
    }
}
