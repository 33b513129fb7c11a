use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use clap::{Parser, Subcommand};

mod column;
mod commands;
mod config;
mod error;
mod metrics;
mod models;
mod store;
mod types;

pub(crate) use error::{ApiError, ApiResult};

use config::Config;
use metrics::{Metrics, SharedMetrics};
use store::PasteStore;

#[derive(Parser)]
#[command(version, about = "Content-addressed paste service")]
struct Cli {
    /// Path to the config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web service.
    Serve,
    /// Store a paste read from stdin and print its id.
    Put {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        syntax: Option<String>,
    },
    /// Print the data of a paste.
    Get { id: String },
}

#[derive(Clone, FromRef)]
pub struct App {
    pub config: Config,
    pub store: PasteStore,
    pub metrics: SharedMetrics,
}

impl App {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let client = column::connect(&config.database)
            .await
            .context("failed to connect to column store")?;

        let metrics: SharedMetrics = Arc::new(Metrics::default());
        let store = PasteStore::new(
            client,
            config.database.column_family.clone(),
            config.database.consistency,
            metrics.clone(),
        );

        Ok(App {
            config,
            store,
            metrics,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let app = App::new(config).await?;

    match cli.command {
        Command::Serve => commands::serve::run(app).await,
        Command::Put {
            owner,
            title,
            syntax,
        } => commands::put::run(app, &owner, title, syntax).await,
        Command::Get { id } => commands::get::run(app, &id).await,
    }
}
