use clap::{Parser, Subcommand};
use cosmos_indexer::utils::logging;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::env;
use std::error::Error;

/// Index schema management
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations (default)
    Up {
        /// Number of migrations to apply (all if not specified)
        #[arg(short, long)]
        steps: Option<u32>,
    },
    /// Roll back migrations
    Down {
        /// Number of migrations to roll back (one if not specified)
        #[arg(short, long)]
        steps: Option<u32>,
    },
    /// Drop every table and apply all migrations
    Fresh,
    /// Show applied and pending migrations
    Status,
}

async fn connect() -> Result<DatabaseConnection, Box<dyn Error>> {
    let database_url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    logging::log_database_connection_details(&database_url, None);
    Ok(Database::connect(&database_url).await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init_logger();
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let connection = connect().await?;

    match cli.command.unwrap_or(Commands::Up { steps: None }) {
        Commands::Up { steps } => {
            logging::log_info(&format!(
                "[MIGRATE] Found {} migration files",
                Migrator::migrations().len()
            ));
            Migrator::up(&connection, steps).await?;
            logging::log_info("[MIGRATE] Migrations applied");
        }
        Commands::Down { steps } => {
            let steps = steps.unwrap_or(1);
            Migrator::down(&connection, Some(steps)).await?;
            logging::log_info(&format!("[MIGRATE] Rolled back {} migrations", steps));
        }
        Commands::Fresh => {
            logging::log_warning("[MIGRATE] Dropping all tables");
            Migrator::fresh(&connection).await?;
            logging::log_info("[MIGRATE] Schema recreated");
        }
        Commands::Status => {
            Migrator::status(&connection).await?;
        }
    }

    Ok(())
}
