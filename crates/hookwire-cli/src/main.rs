//! Hookwire CLI
//!
//! Runs the webhook server and works with producer/consumer definition
//! files locally.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Hookwire - webhook attribute mapping and delivery
#[derive(Parser)]
#[command(name = "hookwire")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "hookwire.yaml", global = true)]
    config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new Hookwire project
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Project name (defaults to directory name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Run the HTTP API server
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Validate configuration and definitions without serving
    Validate,

    /// Transform a payload for one consumer definition
    Transform {
        /// Producer definition file
        #[arg(short, long)]
        producer: String,

        /// Consumer definition file
        #[arg(short = 'k', long)]
        consumer: String,

        /// Payload JSON file
        #[arg(short = 'd', long)]
        payload: String,
    },

    /// Evaluate a mapping expression
    Eval {
        /// Expression text, e.g. "${price} * ${qty}"
        expression: String,

        /// Payload as inline JSON or a path to a JSON file
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Print a starter payload for a producer definition
    Sample {
        /// Producer definition file
        #[arg(short, long)]
        producer: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    match cli.command {
        Commands::Init { path, name } => {
            commands::init::run(&path, name.as_deref()).await?;
        }
        Commands::Serve { bind } => {
            commands::serve::run(&cli.config, bind.as_deref()).await?;
        }
        Commands::Validate => {
            commands::validate::run(&cli.config).await?;
        }
        Commands::Transform {
            producer,
            consumer,
            payload,
        } => {
            commands::transform::run(&producer, &consumer, &payload).await?;
        }
        Commands::Eval { expression, data } => {
            commands::eval::run(&expression, data.as_deref()).await?;
        }
        Commands::Sample { producer } => {
            commands::sample::run(&producer).await?;
        }
    }

    Ok(())
}
