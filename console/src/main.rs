use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::ConsoleConfig;

mod commands;
mod config;
mod dashboard;
mod output;

#[derive(Parser)]
#[command(name = "certwatch-console")]
pub struct Args {
    #[command(subcommand)]
    command: Command,

    #[arg(
        long,
        short,
        global = true,
        env = "CERTWATCH_CONSOLE_CONFIG_PATH",
        default_value = "/etc/certwatch/console.toml"
    )]
    config_path: PathBuf,

    /// Overrides the API base URL from the config file
    #[arg(long, global = true, env = "CERTWATCH_API_URL")]
    api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the live dashboard session
    Watch,

    /// Fetch and print the certificate table once
    List(commands::certs::ListArgs),

    /// Add an endpoint to monitor
    Add {
        /// Hostname to monitor, e.g. example.com
        domain: String,

        #[arg(long, default_value = "https")]
        protocol: String,

        /// Omitted from the canonical URL when it is 443 or 80
        #[arg(long)]
        port: Option<u16>,
    },

    /// Import endpoints from a protocol,domain,port CSV file
    Import { file: PathBuf },

    /// Stop monitoring an endpoint
    Delete { id: u64 },

    /// Trigger an immediate re-check of an endpoint
    Refresh { id: u64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or("certwatch_console=info,certwatch_client=info".into()),
        )
        .init();

    let mut config = ConsoleConfig::load(args.config_path)?;
    if let Some(api_url) = args.api_url {
        config.api_url = api_url;
    }

    match args.command {
        Command::Watch => commands::watch::watch(config).await,
        Command::List(list_args) => commands::certs::list(&config, list_args).await,
        Command::Add { domain, protocol, port } => {
            commands::certs::add(&config, &protocol, &domain, port).await
        }
        Command::Import { file } => commands::certs::import(&config, &file).await,
        Command::Delete { id } => commands::certs::delete(&config, id).await,
        Command::Refresh { id } => commands::certs::refresh(&config, id).await,
    }
}
