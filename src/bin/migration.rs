use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use ticketflow_api::{config, db, migrator::Migrator};

/// Manage the ticket workflow database schema
#[derive(Debug, Parser)]
#[command(name = "migration", version)]
struct Cli {
    /// Database URL; falls back to DATABASE_URL, then to the loaded configuration
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up {
        /// Apply at most this many migrations
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Show applied and pending migrations
    Status,
    /// Drop every table and re-apply all migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_tracing("info", false);

    let database_url = match cli.database_url {
        Some(url) => url,
        None => match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                config::load_config()
                    .context("failed to load configuration")?
                    .database_url
            }
        },
    };

    let pool = db::establish_connection(&database_url)
        .await
        .context("failed to connect to database")?;

    match cli.command.unwrap_or(Command::Up { steps: None }) {
        Command::Up { steps } => {
            Migrator::up(&pool, steps).await?;
            info!("Migrations applied");
        }
        Command::Down { steps } => {
            Migrator::down(&pool, Some(steps)).await?;
            info!(steps, "Migrations rolled back");
        }
        Command::Status => {
            Migrator::status(&pool).await?;
        }
        Command::Fresh => {
            Migrator::fresh(&pool).await?;
            info!("Schema rebuilt from scratch");
        }
    }

    Ok(())
}
