use clap::{Parser, Subcommand};
use manual_rag::Result;
use manual_rag::commands::{ask, ingest_manual, reset_index, show_status};
use manual_rag::config::{get_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "manual-rag")]
#[command(about = "Ask questions about a technical manual, answered from its own pages")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector index
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index a PDF manual
    Ingest {
        /// Path to the PDF file
        pdf: PathBuf,
        /// Remove previously indexed chunks before indexing
        #[arg(long)]
        reset: bool,
    },
    /// Ask a question about the indexed manual
    Ask {
        question: String,
        /// Print the answer and its source pages as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show Ollama and index health
    Status,
    /// Remove every indexed chunk
    Reset {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Ingest { pdf, reset } => {
            ingest_manual(&base_dir, &pdf, reset).await?;
        }
        Commands::Ask { question, json } => {
            ask(&base_dir, &question, json).await?;
        }
        Commands::Status => {
            show_status(&base_dir).await?;
        }
        Commands::Reset { yes } => {
            reset_index(&base_dir, yes).await?;
        }
    }

    Ok(())
}
