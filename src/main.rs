use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use code_sage::{Config, IndexClient, IndexEvent, IndexOptions};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "code-sage")]
#[command(about = "Incremental semantic indexing and search for source trees", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, env = "CODE_SAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Workspace root to index
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the workspace, skipping unchanged files
    Index {
        /// Re-embed every file regardless of stored hashes
        #[arg(short, long)]
        force: bool,
    },

    /// Re-index a single file if its content changed
    Update {
        /// File path, absolute or relative to the workspace
        file: PathBuf,
    },

    /// Remove a file's points from the index
    Remove {
        /// File path, absolute or relative to the workspace
        file: PathBuf,
    },

    /// Show the derived index status as JSON
    Status,

    /// Semantic search over the indexed workspace
    Search {
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Forget the index summary so the next run re-embeds everything
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    tracing::debug!(
        "code-sage {} ({}, built {}, {} backend)",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("VECTOR_DB_BACKEND")
    );

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default()?,
    };
    config.apply_env_overrides();
    if let Some(workspace) = cli.workspace {
        config.workspace.root = Some(workspace);
    } else if config.workspace.root.is_none() {
        config.workspace.root = Some(std::env::current_dir()?);
    }

    let client = IndexClient::with_config(config)?;
    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    match cli.command {
        Commands::Index { force } => {
            let mut events = client.subscribe();
            let progress = tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    if let IndexEvent::FileProcessed {
                        processed, total, ..
                    } = event
                        && (processed % 100 == 0 || processed == total)
                    {
                        eprintln!("  {}/{} files", processed, total);
                    }
                }
            });

            let result = client.index_workspace(IndexOptions { force }, cancel).await;
            progress.abort();
            let report = result?;

            println!("{}", report.summary());
            for error in report.errors.iter().take(10) {
                eprintln!("  {}", error);
            }
            if report.errors.len() > 10 {
                eprintln!("  ... and {} more", report.errors.len() - 10);
            }
        }
        Commands::Update { file } => {
            let outcome = client.index_file(&file, &cancel).await?;
            println!("{:?}", outcome);
        }
        Commands::Remove { file } => {
            if client.remove_file(&file).await? {
                println!("Removed {}", file.display());
            } else {
                println!("{} was not indexed", file.display());
            }
        }
        Commands::Status => {
            let status = client.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Search { query, limit } => {
            let hits = client.search(&query, limit, &cancel).await?;
            if hits.is_empty() {
                println!("No results");
            }
            for hit in hits {
                println!(
                    "{}:{}-{} (score {:.3})",
                    hit.file_path, hit.line_start, hit.line_end, hit.score
                );
                for line in hit.content.lines().take(3) {
                    println!("    {}", line);
                }
            }
        }
        Commands::Clear => {
            client.clear_index().await?;
            println!("Index state cleared");
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine readable
fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            cancel.cancel();
        }
    });
}
