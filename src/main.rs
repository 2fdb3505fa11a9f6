//! review-watch CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use review_watch::{
    commands::{
        cmd_analyze, cmd_crawl, cmd_init, cmd_schedule, cmd_tick, print_crawl_stats,
    },
    config::Config,
    error::{Error, Result},
    progress::LogWriterFactory,
    report::print_summary,
};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "review-watch")]
#[command(version, about = "Incremental review scraper with problem reports", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Override crawl.base_url from the config
    #[arg(long, global = true, env = "REVIEW_WATCH_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Crawl new reviews and merge them into the table
    Crawl,

    /// Classify stored reviews and write the report
    Analyze,

    /// Run one crawl + analysis tick
    Once,

    /// Run ticks on a fixed interval until interrupted
    Run {
        /// Seconds between ticks (overrides schedule.interval_secs)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory))
        .with(filter)
        .init();

    let config_path = cli.config.as_deref();
    let base_url = cli.base_url.as_deref();

    match cli.command {
        Commands::Init { force } => {
            handle_init(config_path, force).await?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "review-watch", &mut std::io::stdout());
        }

        Commands::Crawl => {
            let stats = cmd_crawl(&load_config(config_path, base_url)?).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_crawl_stats(&stats);
            }
        }

        Commands::Analyze => {
            let summary = cmd_analyze(&load_config(config_path, base_url)?).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary.stats, &summary.recommendations);
            }
        }

        Commands::Once => {
            let stats = cmd_tick(&load_config(config_path, base_url)?).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_crawl_stats(&stats.crawl);
                print_summary(&stats.analysis.stats, &stats.analysis.recommendations);
            }
        }

        Commands::Run { interval_secs } => {
            cmd_schedule(&load_config(config_path, base_url)?, interval_secs).await?;
        }
    }

    Ok(())
}

async fn handle_init(path: Option<&Path>, force: bool) -> Result<()> {
    // A .toml path names the file; anything else names the directory
    let base_dir = path.map(|p| {
        if p.extension().is_some_and(|e| e == "toml") {
            p.parent().map(PathBuf::from).unwrap_or_else(Config::default_base_dir)
        } else {
            p.to_path_buf()
        }
    });

    let config = cmd_init(base_dir, force).await?;

    println!("✓ review-watch initialized");
    println!("  Config: {}", config.paths.config_file.display());
    println!("  Table:  {}", config.table_path().display());
    println!("\nNext steps:");
    println!("  1. Edit the config file to choose companies and keywords");
    println!("  2. Run a single tick: review-watch once");
    println!("  3. Keep it running: review-watch run");

    Ok(())
}

fn load_config(path: Option<&Path>, base_url: Option<&str>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        return Err(Error::NotInitialized);
    }

    let mut config = Config::load(&config_path)?;
    if let Some(url) = base_url {
        config.crawl.base_url = url.to_string();
        config.validate()?;
    }
    Ok(config)
}
