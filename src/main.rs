//! `mirrorlink` CLI - resolve content ids and inspect the mirror pool

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use mirrorlink::{ResolutionService, ResolverConfig};

#[derive(Parser)]
#[command(name = "mirrorlink")]
#[command(about = "Resolve content ids to playable stream URLs through a mirror pool")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/mirrorlink/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a content id and print the result as JSON
    Resolve {
        /// Content id to resolve
        id: String,

        /// Format identifier (itag) to look for
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Refresh the mirror directory and list known instances
    Instances,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr; stdout carries JSON only.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ResolverConfig::load_from(path)?,
        None => ResolverConfig::load()?,
    };

    match cli.command {
        Commands::Resolve { id, format } => cmd_resolve(&config, &id, format.as_deref()).await,
        Commands::Instances => cmd_instances(&config).await,
    }
}

async fn cmd_resolve(config: &ResolverConfig, id: &str, format: Option<&str>) -> Result<ExitCode> {
    let service = ResolutionService::from_config(config)?;
    let format = format.unwrap_or(&config.default_format);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let Some(result) = service.resolve_until(id, format, &cancel).await else {
        eprintln!("Interrupted");
        return Ok(ExitCode::from(130));
    };

    let (status, body) = result.into_response(id);
    println!("{}", serde_json::to_string_pretty(&body)?);

    Ok(if status == 200 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn cmd_instances(config: &ResolverConfig) -> Result<ExitCode> {
    let service = ResolutionService::from_config(config)?;

    match service.directory().refresh().await {
        Ok(snapshot) => {
            let instances: Vec<&str> = snapshot.instances.iter().map(|i| i.base_url()).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "fetched_at": snapshot.fetched_at,
                    "instances": instances,
                }))?
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            Ok(ExitCode::FAILURE)
        }
    }
}
