//! CLI Module
//!
//! Command-line interface for wabot using Clap v4.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::bot::router::{SETMEAL_MAX_DAY, split_dishes};
use crate::config::Config;
use crate::error::BotError;
use crate::menu::{self, DAYS_IN_WEEK, FileMenuStore, MenuStore};

/// wabot - WhatsApp meal-menu and Q&A bot
#[derive(Parser, Debug)]
#[command(name = "wabot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging (also writes log files to ./logs)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect and answer chat messages (default)
    Run,

    /// Initialize configuration
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration
    Config {
        /// Show full configuration including secrets
        #[arg(short, long)]
        show_secrets: bool,
    },

    /// Print the stored menu for one day, or the whole week
    Meal {
        /// Day index, 0 (Monday) to 6 (Sunday)
        day: Option<usize>,
    },

    /// Store the menu for a day, 0 (Monday) to 5 (Saturday)
    SetMeal {
        day: usize,
        /// Comma-separated dishes, e.g. "nasi putih, tempe goreng"
        dishes: String,
    },
}

/// Load configuration from file or defaults
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    let config = if let Some(path) = config_path {
        Config::load_from_path(path)?
    } else {
        Config::load()?
    };

    config.validate()?;

    Ok(config)
}

/// Main CLI entry point
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    if cli.debug {
        tracing::info!("Debug mode enabled");
    }

    match cli.command {
        None | Some(Commands::Run) => crate::app::run_bot(config).await,
        Some(Commands::Init { force }) => cmd_init(force),
        Some(Commands::Config { show_secrets }) => cmd_config(&config, show_secrets),
        Some(Commands::Meal { day }) => cmd_meal(&config, day).await,
        Some(Commands::SetMeal { day, dishes }) => cmd_set_meal(&config, day, &dishes).await,
    }
}

/// Initialize configuration file
fn cmd_init(force: bool) -> Result<()> {
    let config_path =
        Config::system_config_path().context("Could not determine config directory")?;

    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at: {}\nUse --force to overwrite",
            config_path.display()
        );
    }

    Config::default().save(&config_path)?;

    println!("Configuration initialized at: {}", config_path.display());
    println!("\nNext steps:");
    println!("   1. Set OPENAI_API_KEY (or openai.api_key) to enable !ask");
    println!("   2. Set gateway.enabled = true to expose POST /send-meal");
    println!("   3. Run 'wabot' and scan the QR code with WhatsApp");

    Ok(())
}

/// Show configuration
fn cmd_config(config: &Config, show_secrets: bool) -> Result<()> {
    let shown = if show_secrets {
        config.clone()
    } else {
        config.redacted()
    };
    let rendered = toml::to_string_pretty(&shown).context("Failed to render configuration")?;
    println!("{}", rendered);
    if !show_secrets {
        println!("# Use --show-secrets to display API keys");
    }
    Ok(())
}

async fn cmd_meal(config: &Config, day: Option<usize>) -> Result<()> {
    let store = FileMenuStore::new(config.menu.path.clone());
    let record = match store.get_all().await {
        Ok(record) => record,
        Err(BotError::NotFound(_)) => {
            anyhow::bail!("No menu stored yet at {}", config.menu.path.display())
        }
        Err(e) => return Err(e.into()),
    };

    match day {
        Some(day) => {
            menu::check_day(day)?;
            println!("{}", menu::render_day(&record, day));
        }
        None => {
            for day in 0..DAYS_IN_WEEK {
                println!("{}\n", menu::render_day(&record, day));
            }
        }
    }
    Ok(())
}

async fn cmd_set_meal(config: &Config, day: usize, dishes: &str) -> Result<()> {
    if day > SETMEAL_MAX_DAY {
        anyhow::bail!("Day must be between 0 (Monday) and {} (Saturday)", SETMEAL_MAX_DAY);
    }
    let dishes = split_dishes(dishes);
    if dishes.is_empty() {
        anyhow::bail!("No dishes given");
    }

    let store = FileMenuStore::new(config.menu.path.clone());
    store.set_day(day, dishes).await?;
    println!(
        "Stored menu for {} in {}",
        menu::DAY_NAMES[day],
        config.menu.path.display()
    );
    Ok(())
}
