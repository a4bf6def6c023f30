use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use placement_insights::auth::AuthConfig;
use placement_insights::core::Database;
use placement_insights::{start_web_server, AppConfig};
use std::fs::OpenOptions;
use std::path::Path;
use tracing::info;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "placement_insights=info,rocket::server=off";

#[derive(Parser)]
#[command(name = "placement-insights")]
#[command(about = "Analytics query engine for the placement portal")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API (default)
    Serve,
    /// Issue a signed bearer token for a user id
    Token {
        /// Id of a row in the users table
        #[arg(long)]
        user_id: String,
        /// Validity in hours
        #[arg(long, default_value = "24")]
        hours: i64,
    },
    /// Create or upgrade the database schema and exit
    Migrate,
}

fn init_logging(log_path: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let file_layer = match log_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true) // Clear file on startup
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_current_span(false)
                    .with_span_list(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(file_layer)
        .with(filter)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    init_logging(config.log_path.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => start_web_server(config).await,
        Commands::Token { user_id, hours } => {
            let token = AuthConfig::new(&config.jwt_secret).issue_token(
                &user_id,
                chrono::Duration::hours(hours),
                chrono::Utc::now(),
            )?;
            println!("{}", token);
            Ok(())
        }
        Commands::Migrate => {
            Database::new(&config.database_path).await?;
            info!("Database ready at {}", config.database_path.display());
            Ok(())
        }
    }
}
