use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use photoclusters_common::Config;
use photoclusters_scout::traits::HttpImageSource;
use photoclusters_scout::Pipeline;
use photoclusters_store::{Confirmation, PhotoStore, Table};
use pushshift_client::PushshiftClient;

#[derive(Parser)]
#[command(name = "photoclusters-scout", about = "Harvest subreddit images and their dominant colours")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl, download, prune and cluster (default).
    Run,
    /// Drop and recreate one table.
    RecreateTable {
        #[arg(value_parser = parse_table)]
        table: Table,
        /// Must be the confirmation phrase.
        #[arg(long)]
        confirm: String,
    },
}

fn parse_table(name: &str) -> Result<Table, String> {
    Table::from_name(name).ok_or_else(|| {
        let names: Vec<&str> = Table::ALL.iter().map(|t| t.name()).collect();
        format!("expected one of: {}", names.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("photoclusters=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    config.log_summary();

    let store = PhotoStore::connect(&config.database_url).await?;
    store.ensure_schema().await?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(store, &config).await,
        Command::RecreateTable { table, confirm } => {
            let Some(confirmed) = Confirmation::from_phrase(&confirm) else {
                bail!("Refusing to recreate {table}: confirmation phrase did not match");
            };
            store.recreate_table(table, confirmed).await?;
            info!(table = table.name(), "Table recreated");
            Ok(())
        }
    }
}

async fn run(store: PhotoStore, config: &Config) -> Result<()> {
    let subreddits = match &config.subreddits {
        Some(subs) => subs.clone(),
        None => store.distinct_subreddits().await?,
    };
    if subreddits.is_empty() {
        bail!("No subreddits configured and none stored; set SUBREDDITS");
    }

    let source = Arc::new(PushshiftClient::new(&config.pushshift_base_url)?);
    let images = Arc::new(HttpImageSource::new()?);
    let pipeline = Pipeline::from_config(store, source, images, config);

    info!(subreddits = ?subreddits, "Photo harvest starting...");
    let stats = pipeline.run(&subreddits).await;
    info!("{stats}");
    Ok(())
}
