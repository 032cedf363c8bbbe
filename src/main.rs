mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use recollect::config::RecollectConfig;
use recollect::retrieval::normalize::RetrieveRequest;
use recollect::server;

#[derive(Parser)]
#[command(
    name = "recollect",
    version,
    about = "Hybrid memory retrieval for conversational agents"
)]
struct Cli {
    /// Config file (defaults to ~/.recollect/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP retrieval endpoint
    Serve,
    /// Serve the MCP tool over stdio
    Mcp,
    /// Run one retrieval and print the results
    Search {
        query: String,
        /// embedding, bm25 or rrf
        #[arg(long)]
        mode: Option<String>,
        /// episode, event_log or semantic_fact
        #[arg(long)]
        source: Option<String>,
        /// all, personal or group
        #[arg(long)]
        scope: Option<String>,
        #[arg(long)]
        top_k: Option<i64>,
        #[arg(long)]
        days: Option<i64>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        group: Option<String>,
    },
    /// Import records from a JSONL file
    Import { file: PathBuf },
    /// Check database health
    Doctor,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.recollect/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RecollectConfig::load_from(path)?,
        None => RecollectConfig::load()?,
    };

    // stderr keeps stdout clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve_http(config).await?,
        Command::Mcp => server::serve_stdio(config).await?,
        Command::Search {
            query,
            mode,
            source,
            scope,
            top_k,
            days,
            user,
            group,
        } => {
            let request = RetrieveRequest {
                query: Some(query),
                user_id: user,
                group_id: group,
                time_range_days: days,
                top_k,
                retrieval_mode: mode,
                data_source: source,
                memory_scope: scope,
            };
            cli::search::search(&config, request).await?;
        }
        Command::Import { file } => cli::import::import(&config, &file).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
    }

    Ok(())
}
