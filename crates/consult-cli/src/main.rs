mod config;
mod console;

use crate::config::ConsultConfig;
use crate::console::{ConsoleSink, StdinInput};
use anyhow::Context;
use clap::{Parser, Subcommand};
use consult_agent::SessionMode;
use consult_gateway::GatewayServer;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "consult", about = "Retrieval-augmented business consulting reports")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "consult.toml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a consulting session in the terminal
    Run {
        /// Initial business question
        #[arg(short, long, conflicts_with = "query_file")]
        query: Option<String>,
        /// Read the initial question from a file
        #[arg(long)]
        query_file: Option<PathBuf>,
        /// Stop after one round instead of asking for follow-ups
        #[arg(long)]
        single_shot: bool,
        /// Where reports, transcripts and logs are written (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Continuation prompts allowed per step (overrides config)
        #[arg(long)]
        max_continuations: Option<u32>,
    },
    /// Start the web gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr);
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let mut config = ConsultConfig::load(&cli.config).await?;
    config.resolve_keys();

    match cli.command {
        Commands::Run {
            query,
            query_file,
            single_shot,
            output_dir,
            max_continuations,
        } => {
            if let Some(dir) = output_dir {
                config.session.output_dir = dir;
            }
            if let Some(n) = max_continuations {
                config.session.max_continuations = n;
            }
            let mode = if single_shot || config.session.single_shot {
                SessionMode::SingleShot
            } else {
                SessionMode::Interactive
            };

            let runner = config.build_runner(mode).await?;
            let mut input = StdinInput::new();

            let initial = match (query, query_file) {
                (Some(q), _) => q,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read query file '{}'", path.display()))?,
                (None, None) => {
                    println!("Describe the business problem you want analysed (or 'exit').");
                    match input.prompt().await? {
                        Some(line) => line,
                        None => return Ok(()),
                    }
                }
            };
            info!(
                output_dir = %config.session.output_dir.display(),
                ?mode,
                "Starting terminal session"
            );

            let outcome = runner
                .run_session(&initial, &mut input, Arc::new(ConsoleSink))
                .await?;
            info!(
                rounds = outcome.rounds,
                turns = outcome.turns,
                artifacts = outcome.artifacts.len(),
                "Session complete"
            );
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            // Each inbound message runs exactly one round.
            let runner = Arc::new(config.build_runner(SessionMode::SingleShot).await?);
            let app = GatewayServer::build(runner, &config.server);

            let addr = config.server.bind_addr();
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Consulting gateway listening on {}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
